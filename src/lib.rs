//! sensorsweep - Discrete-event simulation of sensor refresh policies.
//!
//! ## Architecture
//!
//! Queries arrive as a Poisson process, sample a subset of sensors and ask
//! for refreshes under a pluggable policy until a quality target or the
//! refinement cap is reached. One run is a single-threaded event loop; a
//! sweep runs every `(policy, bandwidth, arrival_rate, trial)` tuple in
//! parallel.
//!
//! ```text
//! SweepPipeline ──▶ WorkerPool ──▶ Simulation (per tuple)
//!                                    ├── QueryState ──▶ PolicySelector
//!                                    └── SensorPopulation
//!               ◀── UnitReport ───────┘
//!       │
//!       ▼
//! ResultAggregator ──▶ CSV (+ manifest)
//! ```
//!
//! ## Determinism
//!
//! - Each run owns its population, counters and `ChaCha8Rng` stream
//! - Events are ordered by `(time, sequence)`
//! - Output rows follow sweep enumeration order, not completion order

pub mod models;
pub mod pipeline;
pub mod pool;
pub mod sim;

// Re-exports for convenience
pub use models::{
    Config, ConfigError, MetricRecord, Policy, Result, RunParams, SimError, SimulationConfig,
    SweepStats,
};
pub use pipeline::{ResultAggregator, SweepManifest, SweepPipeline, SweepResults};
pub use pool::WorkerPool;
pub use sim::{QualityFactory, QualityMetric, RunReport, Simulation};
