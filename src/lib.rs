//! # Service-Account Token Agent
//!
//! Turns a service-account key into short-lived OAuth2 bearer tokens (JWT-bearer grant),
//! caches them per scope set and refreshes them only when they approach expiry. Concurrent
//! refreshes are coalesced into one exchange.
//!
//! Modules:
//! - `credentials`: service-account key loading
//! - `sources`: assertion signing, token exchange and the caching provider
//! - `cache`: access token and scope-keyed cache
//! - `fixture`: authenticated HTTP requests and probes built on the provider
//! - `config`: YAML configuration and validation

pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod fixture;
pub mod helpers;
pub mod observability;
pub mod resilience;
pub mod server;
pub mod sources;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::cache::token::AccessToken;
pub use crate::config::sources::*;
pub use crate::credentials::{ScopeSet, ServiceAccountKey};
pub use crate::error::TokenError;
pub use crate::sources::{ProviderSettings, TokenProvider};
