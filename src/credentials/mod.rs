pub mod key;
pub mod loader;

pub use key::{ScopeSet, ServiceAccountKey};
