/// Sources module
///
/// Everything between a loaded service-account key and a cached bearer token:
/// assertion signing, the token endpoint exchange and the caching provider.

pub mod assertion;
pub mod exchange;
pub mod provider;

pub use provider::{ProviderSettings, TokenProvider};
