use std::collections::HashMap;

use http::{header, Method, StatusCode};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::credentials::key::ScopeSet;
use crate::error::TokenError;
use crate::sources::provider::TokenProvider;

#[derive(Debug, Error)]
pub enum FixtureError {
    /// The provider could not vouch for a token; surfaced as-is.
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("request failed: {0}")]
    Http(String),

    #[error("expected status {expected}, got {actual}: {body}")]
    UnexpectedStatus { expected: u16, actual: u16, body: String },

    #[error("response field '{0}' is missing or null")]
    MissingField(String),

    #[error("response body is not JSON: {0}")]
    InvalidBody(String),
}

/// Authenticated response as seen by an assertion.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn expect_status(self, expected: u16) -> Result<Self, FixtureError> {
        if self.status.as_u16() != expected {
            return Err(FixtureError::UnexpectedStatus {
                expected,
                actual: self.status.as_u16(),
                body: self.body.chars().take(256).collect(),
            });
        }
        Ok(self)
    }

    pub fn json(&self) -> Result<Value, FixtureError> {
        serde_json::from_str(&self.body).map_err(|err| FixtureError::InvalidBody(err.to_string()))
    }
}

/// Issues requests against an API with a fresh bearer token from the injected provider.
/// Tokens are never kept here; every request asks the provider.
#[derive(Clone)]
pub struct ApiFixture {
    base_url: String,
    client: Client,
    provider: TokenProvider,
}

impl ApiFixture {
    pub fn new(base_url: impl Into<String>, client: Client, provider: TokenProvider) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { base_url, client, provider }
    }

    pub fn provider(&self) -> &TokenProvider {
        &self.provider
    }

    pub async fn get(&self, path: &str, query: &HashMap<String, String>) -> Result<ApiResponse, FixtureError> {
        self.send(Method::GET, path, query, None, None).await
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> Result<ApiResponse, FixtureError> {
        self.send(Method::POST, path, &HashMap::new(), Some(body), None).await
    }

    /// `scopes` defaults to the credential's scope set.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &HashMap<String, String>,
        body: Option<&Value>,
        scopes: Option<&ScopeSet>,
    ) -> Result<ApiResponse, FixtureError> {
        let token = match scopes {
            Some(scopes) => self.provider.get_token(scopes).await?,
            None => self.provider.token().await?,
        };

        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(header::AUTHORIZATION, token.bearer())
            .header(header::ACCEPT, "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| FixtureError::Http(err.without_url().to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| FixtureError::Http(err.without_url().to_string()))?;
        debug!(method = %method, path = %path, status = status.as_u16(), "api response");
        Ok(ApiResponse { status, body })
    }
}

/// Look up a dotted path (`user.emailAddress`) in a JSON document; null counts as absent.
pub fn field<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
        .filter(|value| !value.is_null())
}

pub fn require_fields(document: &Value, paths: &[String]) -> Result<(), FixtureError> {
    for path in paths {
        if field(document, path).is_none() {
            return Err(FixtureError::MissingField(path.clone()));
        }
    }
    Ok(())
}
