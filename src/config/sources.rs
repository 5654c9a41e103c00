use http::Method;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use crate::config::settings::SettingsConfig;


/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub credentials: CredentialsConfig,
    pub api: Option<ApiConfig>,
}

/// ================================
/// Credentials
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct CredentialsConfig {
    pub source: CredentialSource,
    /// default scope set requested for the service account
    pub scopes: Vec<String>,
    /// user to impersonate through domain-wide delegation
    pub subject: Option<String>,
}

/// Where the credential document lives
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum CredentialSource {
    Path {
        path: String,
    },
    /// the whole JSON document inline in an environment variable
    FromEnv {
        from_env: String,
    },
}

/// ================================
/// API under test
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    /// rerun probes periodically instead of once
    pub interval_seconds: Option<u64>,
    #[serde(default)]
    pub probes: BTreeMap<String, ProbeConfig>,
}

/// One authenticated request and what its response must look like
#[derive(Debug, Deserialize, Clone)]
pub struct ProbeConfig {
    #[serde(with = "http_serde::method", default = "default_method")]
    pub method: Method,
    pub path: String,
    #[serde(default)]
    pub query: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
    /// overrides the credential's default scopes
    pub scopes: Option<Vec<String>>,
    #[serde(default = "default_expect_status")]
    pub expect_status: u16,
    /// dotted paths that must be present and non-null in the JSON response
    #[serde(default)]
    pub expect_fields: Vec<String>,
}

fn default_method() -> Method {
    Method::GET
}

fn default_expect_status() -> u16 {
    200
}
