use http::StatusCode;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::TokenError;
use crate::sources::assertion::SignedAssertion;
use crate::utils::constants::JWT_BEARER_GRANT_TYPE;

const MAX_REASON_LEN: usize = 256;

/// Successful token endpoint response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// RFC 6749 error body.
#[derive(Debug, Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Trades signed assertions for access tokens at the authorization server.
#[derive(Debug, Clone)]
pub struct TokenExchange {
    client: Client,
}

impl TokenExchange {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn exchange(&self, token_uri: &str, assertion: SignedAssertion) -> Result<TokenResponse, TokenError> {
        let assertion = assertion.into_inner();
        let form = [("grant_type", JWT_BEARER_GRANT_TYPE), ("assertion", assertion.as_str())];

        let response = self
            .client
            .post(token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|err| TokenError::TokenExchangeNetworkError(err.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| TokenError::TokenExchangeNetworkError(err.without_url().to_string()))?;

        if status != StatusCode::OK {
            let reason = rejection_reason(&body);
            warn!(status = status.as_u16(), reason = %reason, "token endpoint rejected assertion");
            return Err(TokenError::TokenExchangeRejected { status: Some(status.as_u16()), reason });
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|err| TokenError::TokenExchangeRejected {
            status: Some(status.as_u16()),
            reason: format!("unparsable token response: {}", err),
        })?;

        if parsed.access_token.is_empty() {
            return Err(TokenError::TokenExchangeRejected {
                status: Some(status.as_u16()),
                reason: "empty access_token".to_owned(),
            });
        }
        if parsed.expires_in <= 0 {
            return Err(TokenError::TokenExchangeRejected {
                status: Some(status.as_u16()),
                reason: format!("non-positive expires_in {}", parsed.expires_in),
            });
        }

        debug!(
            expires_in = parsed.expires_in,
            token_type = parsed.token_type.as_deref().unwrap_or("-"),
            token_len = parsed.access_token.len(),
            "token endpoint issued access token"
        );
        Ok(parsed)
    }
}

fn rejection_reason(body: &str) -> String {
    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(OAuthErrorBody { error, error_description: Some(description) }) => format!("{}: {}", error, description),
        Ok(OAuthErrorBody { error, error_description: None }) => error,
        Err(_) => body.chars().take(MAX_REASON_LEN).collect(),
    }
}
