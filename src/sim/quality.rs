//! Query quality metrics.
//!
//! A metric maps the population state to a value in `[0, 1]` that queries
//! compare against their target. The default is a random placeholder; a real
//! convergence metric plugs in here without touching the scheduler.

use super::population::PopulationSnapshot;
use crate::models::{Result, RunParams, SimError};
use rand::{Rng, RngCore};
use std::sync::Arc;

/// Quality of the population as seen by a query.
pub trait QualityMetric: Send {
    /// Evaluate quality; the scheduler rejects values outside `[0, 1]`.
    fn evaluate(&mut self, snapshot: &PopulationSnapshot<'_>, rng: &mut dyn RngCore)
        -> Result<f64>;
}

/// Builds the metric for each run of a sweep.
pub type QualityFactory = Arc<dyn Fn(&RunParams) -> Box<dyn QualityMetric> + Send + Sync>;

/// Uniform draw from the run's stream, independent of sensor state.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderQuality;

impl QualityMetric for PlaceholderQuality {
    fn evaluate(
        &mut self,
        _snapshot: &PopulationSnapshot<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<f64> {
        Ok(rng.gen::<f64>())
    }
}

/// Always reports the same value.
#[derive(Debug, Clone, Copy)]
pub struct ConstantQuality(pub f64);

impl QualityMetric for ConstantQuality {
    fn evaluate(
        &mut self,
        _snapshot: &PopulationSnapshot<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<f64> {
        Ok(self.0)
    }
}

/// Factory producing [`PlaceholderQuality`] for every run.
pub fn placeholder_factory() -> QualityFactory {
    Arc::new(|_: &RunParams| -> Box<dyn QualityMetric> { Box::new(PlaceholderQuality) })
}

/// Reject values a record may not carry.
pub(crate) fn checked(value: f64) -> Result<f64> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SimError::InvalidQuality { value })
    }
}
