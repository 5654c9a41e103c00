// tests/common/mod.rs
pub use axum::{Router, Form};
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::post;
use chrono::Duration as ChronoDuration;
use http::StatusCode;
use reqwest::Client;

use crate::credentials::key::{ScopeSet, ServiceAccountKey};
use crate::credentials::loader;
use crate::sources::provider::ProviderSettings;

pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/service_account_key.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/service_account_key.pub.pem");
pub const TEST_CLIENT_EMAIL: &str = "probe-runner@test-project.iam.gserviceaccount.com";
pub const TEST_KEY_ID: &str = "3f1c2b0e9a";
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";
pub const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

pub fn credential_json(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "project_id": "test-project",
        "private_key_id": TEST_KEY_ID,
        "private_key": TEST_PRIVATE_KEY,
        "client_email": TEST_CLIENT_EMAIL,
        "client_id": "1234567890",
        "token_uri": token_uri,
    })
    .to_string()
}

pub fn drive_scopes() -> ScopeSet {
    ScopeSet::new([DRIVE_SCOPE]).unwrap()
}

pub fn test_key(token_uri: &str) -> ServiceAccountKey {
    loader::from_slice(credential_json(token_uri).as_bytes(), drive_scopes()).expect("test key loads")
}

pub fn provider_settings(safety_margin_seconds: i64) -> ProviderSettings {
    ProviderSettings {
        safety_margin: ChronoDuration::seconds(safety_margin_seconds),
        assertion_lifetime: ChronoDuration::seconds(3600),
    }
}

/// Mock token endpoint: counts exchanges, records submitted forms, answers with
/// `respond(nth_call)` after `delay`.
pub struct TokenEndpoint {
    pub url: String,
    pub hits: Arc<AtomicUsize>,
    pub forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
    pub handle: JoinHandle<()>,
}

impl TokenEndpoint {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn assertions(&self) -> Vec<String> {
        self.forms
            .lock()
            .unwrap()
            .iter()
            .filter_map(|form| form.get("assertion").cloned())
            .collect()
    }
}

impl Drop for TokenEndpoint {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn spawn_token_endpoint<F>(delay: Duration, respond: F) -> TokenEndpoint
where
    F: Fn(usize) -> (StatusCode, String) + Send + Sync + 'static,
{
    let hits = Arc::new(AtomicUsize::new(0));
    let forms = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let router = Router::new().route("/token", post({
        let hits = hits.clone();
        let forms = forms.clone();
        move |Form(form): Form<HashMap<String, String>>| {
            let hits = hits.clone();
            let forms = forms.clone();
            let respond = respond.clone();
            async move {
                let n = hits.fetch_add(1, Ordering::SeqCst);
                forms.lock().unwrap().push(form);
                tokio::time::sleep(delay).await;
                respond(n)
            }
        }
    }));
    let (handle, addr) = spawn_axum(router).await;
    TokenEndpoint { url: format!("http://{}/token", addr), hits, forms, handle }
}

pub fn token_body(access_token: &str, expires_in: i64) -> String {
    json!({"access_token": access_token, "expires_in": expires_in, "token_type": "Bearer"}).to_string()
}

/// Endpoint that always issues `access_token` valid for `expires_in` seconds.
pub async fn spawn_issuing_endpoint(access_token: &'static str, expires_in: i64, delay: Duration) -> TokenEndpoint {
    spawn_token_endpoint(delay, move |_| (StatusCode::OK, token_body(access_token, expires_in))).await
}
