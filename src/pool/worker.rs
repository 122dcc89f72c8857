//! Worker pool for sweep units.
//!
//! - Each unit is a pure function of `(settings, tuple, seed, metric)`
//! - Units run on blocking threads, bounded by a semaphore
//! - Results travel back over a channel; a unit that errors or panics is
//!   reported as failed and never takes its siblings down

use crate::models::{Result, RunParams, SimError, SimulationConfig, SimulationSettings};
use crate::sim::{placeholder_factory, trial_rng, QualityFactory, RunReport, Simulation};
use std::any::Any;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinError;
use tracing::debug;

/// Result of one unit, tagged with its position in the sweep.
#[derive(Debug)]
pub struct UnitReport {
    /// Index of the tuple in enumeration order
    pub index: usize,
    /// The tuple that ran
    pub params: RunParams,
    /// Records and stats, or the fault that stopped the unit
    pub outcome: Result<RunReport>,
}

/// Worker pool for parallel simulation runs.
pub struct WorkerPool {
    /// Shared population/query parameters
    settings: Arc<SimulationSettings>,
    /// Builds each run's quality metric
    quality: QualityFactory,
    /// Base seed trial streams are derived from
    base_seed: u64,
    /// Pool size (max concurrent units)
    pool_size: usize,
    /// Semaphore for concurrency control
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    /// Create a new worker pool.
    pub fn new(settings: SimulationSettings, base_seed: u64, pool_size: usize) -> Self {
        let pool_size = pool_size.max(1);
        Self {
            settings: Arc::new(settings),
            quality: placeholder_factory(),
            base_seed,
            pool_size,
            semaphore: Arc::new(Semaphore::new(pool_size)),
        }
    }

    /// Replace the quality metric factory.
    pub fn with_quality(mut self, quality: QualityFactory) -> Self {
        self.quality = quality;
        self
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Run one unit to completion on the current thread.
    pub fn run_unit(
        settings: &SimulationSettings,
        params: RunParams,
        base_seed: u64,
        quality: &QualityFactory,
    ) -> Result<RunReport> {
        let config = SimulationConfig::new(settings, params);
        Simulation::from_rng(config, trial_rng(base_seed, params.trial))?
            .with_quality(quality(&params))
            .run()
    }

    /// Dispatch every unit and stream reports back as they finish.
    ///
    /// The receiver closes once every unit has reported.
    pub fn submit_all(&self, runs: Vec<RunParams>) -> mpsc::Receiver<UnitReport> {
        let (tx, rx) = mpsc::channel(self.pool_size * 2);

        for (index, params) in runs.into_iter().enumerate() {
            let tx = tx.clone();
            let semaphore = Arc::clone(&self.semaphore);
            let settings = Arc::clone(&self.settings);
            let quality = Arc::clone(&self.quality);
            let base_seed = self.base_seed;

            tokio::spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        let joined = tokio::task::spawn_blocking(move || {
                            let _permit = permit;
                            Self::run_unit(&settings, params, base_seed, &quality)
                        })
                        .await;
                        joined.unwrap_or_else(|e| Err(join_failure(e)))
                    }
                    Err(_) => Err(SimError::Internal("Semaphore closed".to_string())),
                };

                if tx.send(UnitReport { index, params, outcome }).await.is_err() {
                    debug!(run = %params, "Collector dropped before unit reported");
                }
            });
        }

        rx
    }
}

/// Turn a blocking-task failure into a unit fault.
fn join_failure(e: JoinError) -> SimError {
    if e.is_panic() {
        SimError::Panicked(panic_message(e.into_panic()))
    } else {
        SimError::Panicked("unit was cancelled".to_string())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
