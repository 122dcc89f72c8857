//! Lifecycle of a single query.
//!
//! ```text
//! Sampling ──▶ Refining ──▶ Terminated
//!                 │  ▲
//!                 ▼  │ Refresh event (1 / bandwidth later)
//!              reset(sensor)
//! ```
//!
//! Sampling happens in [`QueryState::sample`]. Each call to
//! [`QueryState::refine`] is one pass of the refine loop; the scheduler owns
//! the continuation between passes.

use super::policy::Selection;
use super::population::{SensorId, SensorPopulation};
use super::quality::{self, QualityMetric};
use crate::models::{MetricRecord, Result, SimulationConfig, MAX_REFINEMENTS};
use rand::RngCore;

/// In-flight state of one query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    /// Simulated arrival time
    pub start_time: f64,
    /// Sampled sensors, fixed for the query's lifetime
    pub subset: Vec<SensorId>,
    /// Refreshes this query has issued
    pub updates_done: u32,
}

/// Outcome of one refine pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The query is done and produced its record.
    Terminated(MetricRecord),
    /// A sensor was refreshed; the query resumes after the refresh delay.
    Refreshed(SensorId),
}

/// Run-level state a refine pass reads and mutates.
pub(crate) struct RefineEnv<'a> {
    pub config: &'a SimulationConfig,
    pub population: &'a mut SensorPopulation,
    pub quality: &'a mut dyn QualityMetric,
    pub rng: &'a mut dyn RngCore,
    pub global_updates: &'a mut u64,
    pub now: f64,
}

impl QueryState {
    /// Draw a subset uniformly without replacement.
    ///
    /// # Panics
    ///
    /// Panics if `subset_size > num_sensors`.
    pub fn sample(
        start_time: f64,
        num_sensors: usize,
        subset_size: usize,
        rng: &mut dyn RngCore,
    ) -> Self {
        assert!(
            subset_size <= num_sensors,
            "query subset of {subset_size} exceeds population of {num_sensors}"
        );
        let subset = rand::seq::index::sample(rng, num_sensors, subset_size).into_vec();
        Self {
            start_time,
            subset,
            updates_done: 0,
        }
    }

    /// One pass of the refine loop.
    pub(crate) fn refine(&mut self, env: RefineEnv<'_>) -> Result<Transition> {
        let snapshot = env.population.snapshot();
        let quality = quality::checked(env.quality.evaluate(&snapshot, env.rng)?)?;
        let avg_uncertainty = snapshot.avg_uncertainty();

        if quality >= env.config.target_quality || self.updates_done >= MAX_REFINEMENTS {
            return Ok(Transition::Terminated(MetricRecord {
                policy: env.config.policy,
                bandwidth: env.config.bandwidth,
                arrival_rate: env.config.arrival_rate,
                trial: env.config.trial_id,
                run_time: env.now - self.start_time,
                quality,
                avg_uncertainty,
            }));
        }

        let selection = Selection {
            snapshot,
            subset: &self.subset,
            local_updates: self.updates_done,
            global_updates: *env.global_updates,
        };
        let sensor = env.config.policy.selector().select(&selection, env.rng);
        *env.global_updates += 1;

        env.population.reset(sensor, env.now);
        self.updates_done += 1;
        Ok(Transition::Refreshed(sensor))
    }
}
