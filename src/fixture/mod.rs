//! HTTP test fixture
//!
//! Consumer of the token provider: authenticated requests plus declarative probes.

pub mod client;
pub mod probe;

pub use client::{ApiFixture, ApiResponse, FixtureError};
pub use probe::{run_probes, ProbeReport};
