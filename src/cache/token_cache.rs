use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};

use crate::cache::token::AccessToken;
use crate::credentials::key::ScopeSet;

/// Scope-aware token cache: scope set -> current token.
///
/// Entries are swapped whole (`Arc<AccessToken>`), readers never see a token paired with
/// another token's expiry. Guards are never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    inner: Arc<RwLock<HashMap<ScopeSet, Arc<AccessToken>>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `token` as current for `scopes`, replacing whatever was there.
    pub fn set(&self, scopes: &ScopeSet, token: AccessToken) -> Arc<AccessToken> {
        let token = Arc::new(token);
        let mut map = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.insert(scopes.clone(), token.clone());
        token
    }

    /// Token for `scopes` if it is still valid at `now` with the given margin.
    pub fn get_valid(&self, scopes: &ScopeSet, now: DateTime<Utc>, safety_margin: Duration) -> Option<Arc<AccessToken>> {
        self.get(scopes).filter(|token| token.is_valid_at(now, safety_margin))
    }

    /// Token for `scopes` regardless of expiry.
    pub fn get(&self, scopes: &ScopeSet) -> Option<Arc<AccessToken>> {
        let map = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.get(scopes).cloned()
    }

    pub fn remove(&self, scopes: &ScopeSet) -> Option<Arc<AccessToken>> {
        let mut map = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        map.remove(scopes)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
