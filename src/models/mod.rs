//! Core data models for sensorsweep.
//!
//! - `config`: file-backed settings, the per-run `SimulationConfig`
//! - `error`: error taxonomy and the crate `Result`
//! - `record`: policies, sweep tuples, metric records and statistics

mod config;
mod error;
mod record;

pub use config::*;
pub use error::*;
pub use record::*;
