use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde::{Deserialize, Serialize};

use crate::credentials::key::{ScopeSet, ServiceAccountKey};
use crate::error::TokenError;
use crate::utils::constants::MAX_ASSERTION_LIFETIME_SECS;

static ASSERTION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Claim set of a JWT-bearer grant assertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    /// unique per assertion, so a retry never resends an identical JWT
    pub jti: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl Claims {
    pub fn new(key: &ServiceAccountKey, scopes: &ScopeSet, issued_at: DateTime<Utc>, lifetime: Duration) -> Self {
        let lifetime = lifetime.min(Duration::seconds(MAX_ASSERTION_LIFETIME_SECS as i64));
        Self {
            iss: key.client_email().to_owned(),
            scope: scopes.claim(),
            aud: key.token_uri().to_owned(),
            iat: issued_at.timestamp(),
            exp: (issued_at + lifetime).timestamp(),
            jti: format!(
                "{:x}-{:x}",
                issued_at.timestamp_nanos_opt().unwrap_or_default(),
                ASSERTION_SEQ.fetch_add(1, Ordering::Relaxed)
            ),
            sub: key.subject().map(str::to_owned),
        }
    }
}

/// Signed, single-use assertion. Bearer-equivalent to the key while valid, so it has no
/// `Debug`/`Display` and is consumed by the exchange.
pub struct SignedAssertion(String);

impl SignedAssertion {
    pub fn sign(key: &ServiceAccountKey, claims: &Claims) -> Result<Self, TokenError> {
        let mut header = Header::new(Algorithm::RS256);
        header.typ = Some("JWT".to_owned());
        header.kid = key.private_key_id().map(str::to_owned);
        encode(&header, claims, key.signing_key())
            .map(SignedAssertion)
            .map_err(|err| TokenError::SigningFailure(err.to_string()))
    }

    pub(crate) fn into_inner(self) -> String {
        self.0
    }
}
