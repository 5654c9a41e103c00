pub mod common;

mod coalescing;
mod config_validation;
