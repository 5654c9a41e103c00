//! Access-token provider for a single service account.
//!
//! Reads are served from [`TokenCache`] while the token outlives the safety margin. Once it
//! does not, one refresh per scope set runs on a spawned task and every concurrent caller
//! awaits a shared handle to it. A caller that gives up waiting only drops its handle; the
//! exchange and the other waiters carry on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::Duration;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::cache::token::AccessToken;
use crate::cache::token_cache::TokenCache;
use crate::config::settings::SettingsConfig;
use crate::credentials::key::{ScopeSet, ServiceAccountKey};
use crate::error::TokenError;
use crate::helpers::time::{get_instant, get_token_safety_margin_seconds, Clock, SystemClock};
use crate::observability::metrics::get_metrics;
use crate::sources::assertion::{Claims, SignedAssertion};
use crate::sources::exchange::TokenExchange;
use crate::utils::constants::MAX_ASSERTION_LIFETIME_SECS;

type InflightRefresh = Shared<BoxFuture<'static, Result<Arc<AccessToken>, TokenError>>>;

#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Tokens are treated as expired this long before their literal expiry.
    pub safety_margin: Duration,
    /// `exp - iat` of each signed assertion, capped at one hour.
    pub assertion_lifetime: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            safety_margin: Duration::seconds(get_token_safety_margin_seconds(None) as i64),
            assertion_lifetime: Duration::seconds(MAX_ASSERTION_LIFETIME_SECS as i64),
        }
    }
}

impl ProviderSettings {
    pub fn from_settings(settings: &SettingsConfig) -> Self {
        let assertion_lifetime = settings
            .assertion_lifetime_seconds
            .unwrap_or(MAX_ASSERTION_LIFETIME_SECS)
            .min(MAX_ASSERTION_LIFETIME_SECS);
        Self {
            safety_margin: Duration::seconds(get_token_safety_margin_seconds(settings.safety_margin_seconds) as i64),
            assertion_lifetime: Duration::seconds(assertion_lifetime as i64),
        }
    }
}

enum Lookup {
    Cached(Arc<AccessToken>),
    Pending { refresh: InflightRefresh, started: bool },
}

/// Cheap to clone; all clones share one cache.
#[derive(Clone)]
pub struct TokenProvider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    key: Arc<ServiceAccountKey>,
    exchange: TokenExchange,
    cache: TokenCache,
    inflight: Mutex<HashMap<ScopeSet, InflightRefresh>>,
    clock: Arc<dyn Clock>,
    settings: ProviderSettings,
}

impl TokenProvider {
    pub fn new(key: ServiceAccountKey, client: Client, settings: ProviderSettings) -> Self {
        Self::with_clock(key, client, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(key: ServiceAccountKey, client: Client, settings: ProviderSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                key: Arc::new(key),
                exchange: TokenExchange::new(client),
                cache: TokenCache::new(),
                inflight: Mutex::new(HashMap::new()),
                clock,
                settings,
            }),
        }
    }

    pub fn key(&self) -> &ServiceAccountKey {
        &self.inner.key
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.inner.settings
    }

    pub fn cache(&self) -> &TokenCache {
        &self.inner.cache
    }

    /// Token for the scopes the key was loaded with.
    pub async fn token(&self) -> Result<AccessToken, TokenError> {
        let scopes = self.inner.key.scopes().clone();
        self.get_token(&scopes).await
    }

    /// A token for `scopes` that is valid beyond the safety margin, refreshing if needed.
    pub async fn get_token(&self, scopes: &ScopeSet) -> Result<AccessToken, TokenError> {
        if let Some(token) = self.inner.cached(scopes) {
            get_metrics().await.token_requests.with_label_values(&["cache_hit"]).inc();
            return Ok(token.as_ref().clone());
        }
        self.await_refresh(scopes, false).await
    }

    /// Like [`get_token`](Self::get_token) but gives up waiting after `timeout`.
    pub async fn get_token_with_timeout(&self, scopes: &ScopeSet, timeout: StdDuration) -> Result<AccessToken, TokenError> {
        tokio::time::timeout(timeout, self.get_token(scopes))
            .await
            .map_err(|_| TokenError::Timeout(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)))?
    }

    /// Exchange a new token even if the cached one is still valid, e.g. after the API
    /// answered 401. A failed refresh leaves the cached token in place.
    pub async fn refresh(&self, scopes: &ScopeSet) -> Result<AccessToken, TokenError> {
        self.await_refresh(scopes, true).await
    }

    /// Forget the cached token for `scopes`; the next call refreshes.
    pub fn invalidate(&self, scopes: &ScopeSet) {
        if self.inner.cache.remove(scopes).is_some() {
            debug!(scopes = %scopes, "cached token invalidated");
        }
    }

    async fn await_refresh(&self, scopes: &ScopeSet, force: bool) -> Result<AccessToken, TokenError> {
        let metrics = get_metrics().await;
        let refresh = match self.inner.join_or_start(scopes, force) {
            Lookup::Cached(token) => {
                metrics.token_requests.with_label_values(&["cache_hit"]).inc();
                return Ok(token.as_ref().clone());
            }
            Lookup::Pending { refresh, started } => {
                let outcome = if started { "refresh" } else { "joined" };
                metrics.token_requests.with_label_values(&[outcome]).inc();
                refresh
            }
        };

        let token = refresh.await?;
        // the wait may have been long; never hand out a token we cannot vouch for
        if !token.is_valid_at(self.inner.clock.now(), self.inner.settings.safety_margin) {
            return Err(TokenError::TokenExchangeRejected {
                status: None,
                reason: "issued token already within the expiry safety margin".to_owned(),
            });
        }
        Ok(token.as_ref().clone())
    }
}

impl ProviderInner {
    fn cached(&self, scopes: &ScopeSet) -> Option<Arc<AccessToken>> {
        self.cache.get_valid(scopes, self.clock.now(), self.settings.safety_margin)
    }

    fn join_or_start(self: &Arc<Self>, scopes: &ScopeSet, force: bool) -> Lookup {
        let mut inflight = self.inflight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        // re-check under the lock: a refresh may have installed a token since the fast path
        if !force {
            if let Some(token) = self.cached(scopes) {
                return Lookup::Cached(token);
            }
        }

        if let Some(refresh) = inflight.get(scopes).filter(|refresh| refresh.peek().is_none()) {
            debug!(scopes = %scopes, "joining in-flight token refresh");
            return Lookup::Pending { refresh: refresh.clone(), started: false };
        }

        let refresh = self.spawn_refresh(scopes.clone());
        inflight.insert(scopes.clone(), refresh.clone());
        Lookup::Pending { refresh, started: true }
    }

    /// Must be called with the in-flight lock held so the task cannot deregister itself
    /// before it has been registered.
    fn spawn_refresh(self: &Arc<Self>, scopes: ScopeSet) -> InflightRefresh {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = inner.refresh(&scopes).await;
            inner
                .inflight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .remove(&scopes);
            result
        });

        async move {
            handle
                .await
                .unwrap_or_else(|err| Err(TokenError::RefreshAborted(err.to_string())))
        }
        .boxed()
        .shared()
    }

    async fn refresh(&self, scopes: &ScopeSet) -> Result<Arc<AccessToken>, TokenError> {
        let metrics = get_metrics().await;
        let label = scopes.to_string();
        let start = get_instant();
        metrics.token_exchanges.with_label_values(&[&label]).inc();

        let result = self.sign_and_exchange(scopes).await;
        metrics.token_exchange_duration.with_label_values(&[&label]).observe(start.elapsed().as_secs_f64());

        match result {
            Ok(token) => {
                let token = self.cache.set(scopes, token);
                metrics.token_expiry_unix.with_label_values(&[&label]).set(token.expires_at().timestamp());
                info!(
                    client_email = %self.key.client_email(),
                    scopes = %scopes,
                    expires_at = %token.expires_at(),
                    token_len = token.value().len(),
                    "access token refreshed"
                );
                Ok(token)
            }
            Err(err) => {
                metrics.token_exchange_failures.with_label_values(&[label.as_str(), err.reason()]).inc();
                warn!(
                    client_email = %self.key.client_email(),
                    scopes = %scopes,
                    reason = err.reason(),
                    error = %err,
                    "access token refresh failed"
                );
                Err(err)
            }
        }
    }

    async fn sign_and_exchange(&self, scopes: &ScopeSet) -> Result<AccessToken, TokenError> {
        // expiry is measured from before the request, so it errs on the early side
        let issued_at = self.clock.now();
        let claims = Claims::new(&self.key, scopes, issued_at, self.settings.assertion_lifetime);
        let assertion = SignedAssertion::sign(&self.key, &claims)?;

        let response = self.exchange.exchange(self.key.token_uri(), assertion).await?;

        let out_of_range = || TokenError::TokenExchangeRejected {
            status: Some(200),
            reason: format!("expires_in {}s is out of range", response.expires_in),
        };
        let lifetime = Duration::try_seconds(response.expires_in).ok_or_else(out_of_range)?;
        let expires_at = issued_at.checked_add_signed(lifetime).ok_or_else(out_of_range)?;
        if lifetime <= self.settings.safety_margin {
            return Err(TokenError::TokenExchangeRejected {
                status: Some(200),
                reason: format!(
                    "expires_in {}s does not exceed the {}s safety margin",
                    response.expires_in,
                    self.settings.safety_margin.num_seconds()
                ),
            });
        }
        Ok(AccessToken::new(response.access_token, expires_at))
    }
}
