//! Service-account credential document loading.
//!
//! Accepts the JSON key file format issued for service accounts:
//! `private_key` (PEM), `client_email`, `token_uri` and optionally `private_key_id` / `type`.
//! The key is trial-signed before it is accepted, so a loaded key is always usable.

use std::fs;
use std::io::Read;
use std::path::Path;

use jsonwebtoken::{Algorithm, EncodingKey};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::sources::CredentialSource;
use crate::credentials::key::{ScopeSet, ServiceAccountKey};
use crate::error::TokenError;
use crate::utils::constants::SERVICE_ACCOUNT_TYPE;

#[derive(Debug, Deserialize)]
struct CredentialDocument {
    #[serde(rename = "type")]
    account_type: Option<String>,
    private_key: Option<String>,
    private_key_id: Option<String>,
    client_email: Option<String>,
    token_uri: Option<String>,
}

/// Load a key from wherever the configuration points.
pub fn load(source: &CredentialSource, scopes: ScopeSet) -> Result<ServiceAccountKey, TokenError> {
    match source {
        CredentialSource::Path { path } => load_from_path(path, scopes),
        CredentialSource::FromEnv { from_env } => {
            let raw = std::env::var(from_env).map_err(|err| {
                TokenError::CredentialNotFound(format!("environment variable '{}': {}", from_env, err))
            })?;
            debug!(env = %from_env, "loading service account credential from environment");
            from_slice(raw.as_bytes(), scopes)
        }
    }
}

pub fn load_from_path<P: AsRef<Path>>(path: P, scopes: ScopeSet) -> Result<ServiceAccountKey, TokenError> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|err| {
        TokenError::CredentialNotFound(format!("'{}': {}", path.display(), err))
    })?;
    debug!(path = %path.display(), "loading service account credential from file");
    from_reader(file, scopes)
}

pub fn from_reader<R: Read>(mut reader: R, scopes: ScopeSet) -> Result<ServiceAccountKey, TokenError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|err| TokenError::CredentialNotFound(format!("credential source unreadable: {}", err)))?;
    from_slice(&bytes, scopes)
}

pub fn from_slice(bytes: &[u8], scopes: ScopeSet) -> Result<ServiceAccountKey, TokenError> {
    let document: CredentialDocument = serde_json::from_slice(bytes)
        .map_err(|err| TokenError::CredentialMalformed(format!("invalid credential document: {}", err)))?;

    if let Some(account_type) = &document.account_type {
        if account_type != SERVICE_ACCOUNT_TYPE {
            return Err(TokenError::CredentialMalformed(format!(
                "unsupported credential type '{}', expected '{}'",
                account_type, SERVICE_ACCOUNT_TYPE
            )));
        }
    }

    let private_key = required(document.private_key, "private_key")?;
    let client_email = required(document.client_email, "client_email")?;
    let token_uri = required(document.token_uri, "token_uri")?;
    let private_key_id = document.private_key_id.filter(|id| !id.trim().is_empty());

    let signing_key = parse_signing_key(&private_key)?;

    info!(
        client_email = %client_email,
        private_key_id = private_key_id.as_deref().unwrap_or("-"),
        scopes = %scopes,
        "service account credential loaded"
    );
    Ok(ServiceAccountKey::new(client_email, private_key_id, token_uri, scopes, signing_key))
}

fn required(value: Option<String>, field: &str) -> Result<String, TokenError> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TokenError::CredentialMalformed(format!("missing field '{}'", field)))
}

fn parse_signing_key(pem: &str) -> Result<EncodingKey, TokenError> {
    // the PEM wrapper is decoded eagerly but the RSA structure only on first use
    let key = EncodingKey::from_rsa_pem(pem.as_bytes())
        .map_err(|err| TokenError::CredentialMalformed(format!("private_key is not an RSA PEM key: {}", err)))?;
    jsonwebtoken::crypto::sign(b"key-check", &key, Algorithm::RS256)
        .map_err(|err| TokenError::CredentialMalformed(format!("private_key cannot sign: {}", err)))?;
    Ok(key)
}
