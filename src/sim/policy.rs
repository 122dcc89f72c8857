//! Refresh policies.
//!
//! Each [`Policy`] maps to one stateless [`PolicySelector`]; the scheduler
//! owns the counters and passes them in, so selectors stay pure apart from
//! the random baseline drawing from the run's stream.

use super::population::{PopulationSnapshot, SensorId, SensorState};
use crate::models::Policy;
use rand::seq::SliceRandom;
use rand::RngCore;

/// Everything a policy may look at when picking the next sensor.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    /// Population state at the decision instant
    pub snapshot: PopulationSnapshot<'a>,
    /// The querying process's fixed subset
    pub subset: &'a [SensorId],
    /// Refreshes already issued by this query
    pub local_updates: u32,
    /// Refreshes already issued by every query in the run
    pub global_updates: u64,
}

/// Strategy choosing which sensor to refresh next.
pub trait PolicySelector: Send + Sync {
    fn select(&self, selection: &Selection<'_>, rng: &mut dyn RngCore) -> SensorId;
}

/// Round-robin over the whole population, shared by every query.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalRoundRobin;

impl PolicySelector for GlobalRoundRobin {
    fn select(&self, selection: &Selection<'_>, _rng: &mut dyn RngCore) -> SensorId {
        (selection.global_updates % selection.snapshot.len() as u64) as SensorId
    }
}

/// Round-robin over the query's subset.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalRoundRobin;

impl PolicySelector for LocalRoundRobin {
    fn select(&self, selection: &Selection<'_>, _rng: &mut dyn RngCore) -> SensorId {
        selection.subset[selection.local_updates as usize % selection.subset.len()]
    }
}

/// Sensor with the smallest lower bound; smallest id on ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct MinMin;

impl PolicySelector for MinMin {
    fn select(&self, selection: &Selection<'_>, _rng: &mut dyn RngCore) -> SensorId {
        arg_best(selection, |a, b| a < b, |s| s.lower)
    }
}

/// Sensor with the widest interval; smallest id on ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaxUncertainty;

impl PolicySelector for MaxUncertainty {
    fn select(&self, selection: &Selection<'_>, _rng: &mut dyn RngCore) -> SensorId {
        arg_best(selection, |a, b| a > b, |s| s.width())
    }
}

/// Uniform random member of the subset.
///
/// Stands in for an expected-entropy minimizer.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomBaseline;

impl PolicySelector for RandomBaseline {
    fn select(&self, selection: &Selection<'_>, rng: &mut dyn RngCore) -> SensorId {
        *selection
            .subset
            .choose(rng)
            .expect("query subset must not be empty")
    }
}

/// Scan the subset for the best key, keeping the smallest id on ties.
///
/// `better(candidate, incumbent)` must be a strict comparison.
fn arg_best(
    selection: &Selection<'_>,
    better: impl Fn(f64, f64) -> bool,
    key: impl Fn(&SensorState) -> f64,
) -> SensorId {
    let mut best: Option<(SensorId, f64)> = None;
    for &id in selection.subset {
        let value = key(selection.snapshot.sensor(id));
        best = match best {
            None => Some((id, value)),
            Some((best_id, best_value)) => {
                if better(value, best_value) || (value == best_value && id < best_id) {
                    Some((id, value))
                } else {
                    Some((best_id, best_value))
                }
            }
        };
    }
    best.map(|(id, _)| id)
        .expect("query subset must not be empty")
}

static GLOBAL_ROUND_ROBIN: GlobalRoundRobin = GlobalRoundRobin;
static LOCAL_ROUND_ROBIN: LocalRoundRobin = LocalRoundRobin;
static MIN_MIN: MinMin = MinMin;
static MAX_UNCERTAINTY: MaxUncertainty = MaxUncertainty;
static RANDOM_BASELINE: RandomBaseline = RandomBaseline;

impl Policy {
    /// Selector implementing this policy.
    pub fn selector(&self) -> &'static dyn PolicySelector {
        match self {
            Policy::GlbRr => &GLOBAL_ROUND_ROBIN,
            Policy::LocRr => &LOCAL_ROUND_ROBIN,
            Policy::MinMin => &MIN_MIN,
            Policy::MaxUnc => &MAX_UNCERTAINTY,
            Policy::MinExpEntropy => &RANDOM_BASELINE,
        }
    }
}
