//! Shared constants and invariants

pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;

/// Upper bound for the lifetime of a signed assertion.
pub const MAX_ASSERTION_LIFETIME_SECS: u64 = 3600;

pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
pub const SERVICE_ACCOUNT_TYPE: &str = "service_account";

pub const DEFAULT_CONFIG_PATH: &str = "sa-token-agent.yaml";
