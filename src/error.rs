use thiserror::Error;

/// Errors surfaced by the credential loader and the token provider.
///
/// `Clone` because a single coalesced refresh hands the same outcome to every waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    #[error("credential malformed: {0}")]
    CredentialMalformed(String),

    #[error("assertion signing failed: {0}")]
    SigningFailure(String),

    #[error("token exchange network error: {0}")]
    TokenExchangeNetworkError(String),

    #[error("token exchange rejected (status: {status:?}): {reason}")]
    TokenExchangeRejected { status: Option<u16>, reason: String },

    #[error("token refresh aborted: {0}")]
    RefreshAborted(String),

    #[error("timed out waiting for token after {0} ms")]
    Timeout(u64),
}

impl TokenError {
    /// Whether a caller may reasonably try again with a fresh refresh cycle.
    /// Credential and signing problems are static and never become retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            TokenError::TokenExchangeNetworkError(_)
            | TokenError::RefreshAborted(_)
            | TokenError::Timeout(_) => true,
            TokenError::TokenExchangeRejected { status: Some(status), .. } => {
                *status == 429 || *status >= 500
            }
            _ => false,
        }
    }

    /// Short label used for metrics and structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::CredentialNotFound(_) => "credential_not_found",
            TokenError::CredentialMalformed(_) => "credential_malformed",
            TokenError::SigningFailure(_) => "signing_failure",
            TokenError::TokenExchangeNetworkError(_) => "network",
            TokenError::TokenExchangeRejected { .. } => "rejected",
            TokenError::RefreshAborted(_) => "aborted",
            TokenError::Timeout(_) => "timeout",
        }
    }
}
