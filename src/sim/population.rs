//! Per-sensor uncertainty state for one run.

use serde::{Deserialize, Serialize};

/// Index of a sensor within its population.
pub type SensorId = usize;

/// Uncertainty interval of a single sensor.
///
/// Invariant: `0 <= lower <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorState {
    pub id: SensorId,
    pub lower: f64,
    pub upper: f64,
    /// Simulated time of the last refresh
    pub last_update: f64,
}

impl SensorState {
    fn fresh(id: SensorId) -> Self {
        Self {
            id,
            lower: 0.0,
            upper: 0.0,
            last_update: 0.0,
        }
    }

    /// Width of the uncertainty interval.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Sensors owned by a single run.
///
/// Never shared across runs; the scheduler holds it exclusively.
#[derive(Debug, Clone)]
pub struct SensorPopulation {
    sensors: Vec<SensorState>,
}

impl SensorPopulation {
    /// Create `num_sensors` sensors with collapsed intervals.
    pub fn new(num_sensors: usize) -> Self {
        Self {
            sensors: (0..num_sensors).map(SensorState::fresh).collect(),
        }
    }

    /// Build a population from explicit states (ids are reassigned by position).
    pub fn from_states(states: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let sensors = states
            .into_iter()
            .enumerate()
            .map(|(id, (lower, upper))| {
                assert!(
                    0.0 <= lower && lower <= upper,
                    "sensor {id}: interval [{lower}, {upper}] violates 0 <= lower <= upper"
                );
                SensorState {
                    id,
                    lower,
                    upper,
                    last_update: 0.0,
                }
            })
            .collect();
        Self { sensors }
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Refresh a sensor: collapse its interval and stamp the time.
    ///
    /// # Panics
    ///
    /// Panics if `id` is outside `[0, len)`.
    pub fn reset(&mut self, id: SensorId, now: f64) {
        let len = self.sensors.len();
        let sensor = self
            .sensors
            .get_mut(id)
            .unwrap_or_else(|| panic!("sensor id {id} out of range for population of {len}"));
        sensor.lower = 0.0;
        sensor.upper = 0.0;
        sensor.last_update = now;
    }

    /// Read-only view for policies and quality metrics.
    pub fn snapshot(&self) -> PopulationSnapshot<'_> {
        PopulationSnapshot {
            sensors: &self.sensors,
        }
    }
}

/// Immutable view of a population at one instant.
#[derive(Debug, Clone, Copy)]
pub struct PopulationSnapshot<'a> {
    sensors: &'a [SensorState],
}

impl<'a> PopulationSnapshot<'a> {
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// State of one sensor.
    ///
    /// # Panics
    ///
    /// Panics if `id` is outside `[0, len)`.
    pub fn sensor(&self, id: SensorId) -> &'a SensorState {
        self.sensors.get(id).unwrap_or_else(|| {
            panic!(
                "sensor id {id} out of range for population of {}",
                self.sensors.len()
            )
        })
    }

    pub fn sensors(&self) -> &'a [SensorState] {
        self.sensors
    }

    /// Mean interval width across every sensor (not just a query's subset).
    pub fn avg_uncertainty(&self) -> f64 {
        if self.sensors.is_empty() {
            return 0.0;
        }
        let total: f64 = self.sensors.iter().map(SensorState::width).sum();
        total / self.sensors.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_population_is_collapsed() {
        let population = SensorPopulation::new(4);
        let snapshot = population.snapshot();
        assert_eq!(snapshot.len(), 4);
        for (i, sensor) in snapshot.sensors().iter().enumerate() {
            assert_eq!(sensor.id, i);
            assert_eq!(sensor.width(), 0.0);
        }
        assert_eq!(snapshot.avg_uncertainty(), 0.0);
    }

    #[test]
    fn test_reset_collapses_interval_and_stamps_time() {
        let mut population = SensorPopulation::from_states([(0.1, 0.5), (0.2, 0.4)]);
        assert!((population.snapshot().avg_uncertainty() - 0.3).abs() < 1e-12);

        population.reset(0, 7.5);
        let sensor = population.snapshot().sensor(0);
        assert_eq!(sensor.lower, 0.0);
        assert_eq!(sensor.upper, 0.0);
        assert_eq!(sensor.last_update, 7.5);
        assert!((population.snapshot().avg_uncertainty() - 0.1).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_reset_out_of_range_panics() {
        let mut population = SensorPopulation::new(3);
        population.reset(3, 0.0);
    }

    #[test]
    #[should_panic(expected = "violates")]
    fn test_inverted_interval_rejected() {
        SensorPopulation::from_states([(0.5, 0.1)]);
    }
}
