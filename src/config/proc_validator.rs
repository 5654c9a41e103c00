//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates:
//!   * settings invariants (margin vs assertion lifetime, retry, server, logging, metrics)
//!   * credential source and scope set
//!   * API base url and probe definitions

use std::collections::HashSet;
use tracing::{error, info};

use crate::config::settings::{RetryConfig, SettingsConfig};
use crate::config::sources::{ApiConfig, CredentialSource, CredentialsConfig, ProbeConfig, ServiceConfig};
use crate::utils::constants::MAX_ASSERTION_LIFETIME_SECS;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_credentials(&cfg.credentials, &mut errors);
    if let Some(api) = &cfg.api {
        validate_api(api, &mut errors);
    }

    if errors.is_empty() {
        info!("config is valid");
        Ok(())
    } else {
        for e in &errors {
            error!("config error: {}", e);
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    // retry invariants
    if let Some(retry) = &settings.retry {
        validate_retry("settings.retry", retry, errors);
    }

    // a margin at least as long as a token's typical life would force a refresh on every call
    if let Some(s) = settings.safety_margin_seconds {
        if s >= MAX_ASSERTION_LIFETIME_SECS {
            errors.push(format!(
                "settings.safety_margin_seconds ({}) must be < {}",
                s, MAX_ASSERTION_LIFETIME_SECS
            ));
        }
    }

    if let Some(lifetime) = settings.assertion_lifetime_seconds {
        if lifetime == 0 || lifetime > MAX_ASSERTION_LIFETIME_SECS {
            errors.push(format!(
                "settings.assertion_lifetime_seconds ({}) must be in 1..={}",
                lifetime, MAX_ASSERTION_LIFETIME_SECS
            ));
        }
    }

    if let Some(timeout) = settings.http_timeout_ms {
        if timeout == 0 {
            errors.push("settings.http_timeout_ms must be > 0".to_string());
        }
    }

    if let Some(server) = &settings.server {
        if server.host.is_empty() {
            errors.push(format!("settings.server.host '{}' must be valid", server.host));
        }
        if server.port.parse::<u16>().is_err() {
            errors.push(format!("settings.server.port '{}' must be a valid port", server.port));
        }
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }

    // logging level
    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

fn validate_retry(path: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if let Some(attempts) = retry.attempts {
        if attempts == 0 {
            errors.push(format!("{}.attempts must be > 0", path));
        }
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "{}.max_delay_ms ({}) must be >= base_delay_ms ({})",
                path, max, base
            ));
        }
    }
}

fn validate_credentials(credentials: &CredentialsConfig, errors: &mut Vec<String>) {
    match &credentials.source {
        CredentialSource::Path { path } => {
            if path.trim().is_empty() {
                errors.push("credentials.source.path cannot be empty".to_string());
            }
            // existence is checked when the key is loaded
        }
        CredentialSource::FromEnv { from_env } => {
            if from_env.trim().is_empty() {
                errors.push("credentials.source.from_env: env name cannot be empty".to_string());
            }
        }
    }
    validate_scopes("credentials.scopes", &credentials.scopes, errors);
}

fn validate_scopes(path: &str, scopes: &[String], errors: &mut Vec<String>) {
    if scopes.iter().all(|s| s.trim().is_empty()) {
        errors.push(format!("{}: at least one scope required", path));
    }
    for scope in scopes {
        if scope.contains(char::is_whitespace) {
            errors.push(format!("{}: scope '{}' must not contain whitespace", path, scope));
        }
    }
}

fn validate_api(api: &ApiConfig, errors: &mut Vec<String>) {
    if !(api.base_url.starts_with("http://") || api.base_url.starts_with("https://")) {
        errors.push(format!("api.base_url '{}' must be an http(s) url", api.base_url));
    }
    if api.interval_seconds == Some(0) {
        errors.push("api.interval_seconds must be > 0".to_string());
    }
    if api.probes.is_empty() {
        errors.push("api.probes is empty; at least one probe required".to_string());
    }
    for (name, probe) in &api.probes {
        validate_probe(name, probe, errors);
    }
}

fn validate_probe(name: &str, probe: &ProbeConfig, errors: &mut Vec<String>) {
    if !probe.path.starts_with('/') {
        errors.push(format!("api.probes['{}'].path '{}' must start with '/'", name, probe.path));
    }
    if !(100..=599).contains(&probe.expect_status) {
        errors.push(format!(
            "api.probes['{}'].expect_status {} is not an HTTP status",
            name, probe.expect_status
        ));
    }
    let mut seen = HashSet::new();
    for field in &probe.expect_fields {
        if field.is_empty() || field.split('.').any(str::is_empty) {
            errors.push(format!("api.probes['{}'].expect_fields: '{}' is not a dotted path", name, field));
        }
        if !seen.insert(field) {
            errors.push(format!("api.probes['{}'].expect_fields: '{}' listed twice", name, field));
        }
    }
    if let Some(scopes) = &probe.scopes {
        validate_scopes(&format!("api.probes['{}'].scopes", name), scopes, errors);
    }
}
