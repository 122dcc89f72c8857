//! Deterministic discrete-event loop for one run.
//!
//! A run owns its population, random stream, counters and event queue. Given
//! the same configuration and seed it produces identical records.

use super::event_queue::{Event, EventKey, QueryId};
use super::population::{SensorId, SensorPopulation};
use super::query::{QueryState, RefineEnv, Transition};
use super::quality::{PlaceholderQuality, QualityMetric};
use crate::models::{MetricRecord, Result, RunParams, RunStats, SimError, SimulationConfig};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Random stream for a trial.
///
/// Every tuple sharing a trial index draws from the same stream, so policies
/// are compared under common random numbers. The base seed keys the generator
/// and the trial selects its stream, so distinct `(base_seed, trial)` pairs
/// never share a stream.
pub fn trial_rng(base_seed: u64, trial: u32) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(base_seed);
    rng.set_stream(u64::from(trial));
    rng
}

/// Everything a finished run hands back.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// The tuple this run simulated
    pub params: RunParams,
    /// One record per terminated query, in termination order
    pub records: Vec<MetricRecord>,
    /// Counters
    pub stats: RunStats,
    /// Selected sensors in order, when requested
    pub refresh_log: Option<Vec<SensorId>>,
}

/// Single-threaded event loop over one run.
pub struct Simulation {
    config: SimulationConfig,

    /// Sensors owned by this run.
    population: SensorPopulation,

    /// Quality metric queries compare against their target.
    quality: Box<dyn QualityMetric>,

    /// Pending events, ordered deterministically.
    event_queue: BTreeMap<EventKey, Event>,

    /// Sequence counter for deterministic ordering.
    sequence: u64,

    /// In-flight queries.
    queries: BTreeMap<QueryId, QueryState>,

    /// Next query identifier.
    next_query: QueryId,

    /// Current simulation time.
    now: f64,

    /// The run's only random stream.
    rng: ChaCha8Rng,

    /// Inter-arrival distribution, mean `1 / arrival_rate`.
    arrivals: Exp<f64>,

    /// Refreshes issued by every query so far (drives Glb_RR).
    global_updates: u64,

    /// Whether arrivals are generated from the Poisson process.
    arrival_process: bool,

    records: Vec<MetricRecord>,
    stats: RunStats,
    refresh_log: Option<Vec<SensorId>>,
}

impl Simulation {
    /// Create a run with the placeholder quality metric.
    pub fn new(config: SimulationConfig, seed: u64) -> Result<Self> {
        Self::from_rng(config, ChaCha8Rng::seed_from_u64(seed))
    }

    /// Create a run drawing from an existing stream.
    ///
    /// Rejects configurations a run cannot start from.
    pub fn from_rng(config: SimulationConfig, rng: ChaCha8Rng) -> Result<Self> {
        config.validate()?;
        let arrivals = Exp::new(f64::from(config.arrival_rate))
            .map_err(|e| SimError::Internal(format!("arrival distribution: {e}")))?;
        let population = SensorPopulation::new(config.num_sensors);

        Ok(Self {
            config,
            population,
            quality: Box::new(PlaceholderQuality),
            event_queue: BTreeMap::new(),
            sequence: 0,
            queries: BTreeMap::new(),
            next_query: 0,
            now: 0.0,
            rng,
            arrivals,
            global_updates: 0,
            arrival_process: true,
            records: Vec::new(),
            stats: RunStats::default(),
            refresh_log: None,
        })
    }

    /// Replace the quality metric.
    pub fn with_quality(mut self, quality: Box<dyn QualityMetric>) -> Self {
        self.quality = quality;
        self
    }

    /// Record every selected sensor in order.
    pub fn with_refresh_log(mut self) -> Self {
        self.refresh_log = Some(Vec::new());
        self
    }

    /// Disable the Poisson arrival process; only injected arrivals occur.
    pub fn without_arrival_process(mut self) -> Self {
        self.arrival_process = false;
        self
    }

    /// Inject a single query arrival at `time`.
    pub fn schedule_arrival(&mut self, time: f64) {
        self.schedule_event(time, Event::Arrival { generated: false });
    }

    /// Run until the queue drains or the horizon is reached.
    pub fn run(mut self) -> Result<RunReport> {
        if self.arrival_process {
            let first = self.next_interarrival();
            self.schedule_event(first, Event::Arrival { generated: true });
        }

        while let Some((key, event)) = self.event_queue.pop_first() {
            self.now = key.time;
            self.stats.events_processed += 1;
            trace!(time = self.now, ?event, "Processing event");

            match event {
                Event::Arrival { generated } => {
                    if generated {
                        let next = self.now + self.next_interarrival();
                        self.schedule_event(next, Event::Arrival { generated: true });
                    }
                    self.spawn_query()?;
                }
                Event::Refresh { query } => self.advance_query(query)?,
            }
        }

        self.stats.final_time = self.now;
        self.stats.queries_abandoned = self.queries.len() as u64;

        debug!(
            run = %self.config.params(),
            records = self.records.len(),
            events = self.stats.events_processed,
            abandoned = self.stats.queries_abandoned,
            "Run complete"
        );

        Ok(RunReport {
            params: self.config.params(),
            records: self.records,
            stats: self.stats,
            refresh_log: self.refresh_log,
        })
    }

    fn next_interarrival(&mut self) -> f64 {
        self.arrivals.sample(&mut self.rng)
    }

    /// Sample a new query and run its first refine pass at the arrival instant.
    fn spawn_query(&mut self) -> Result<()> {
        let id = self.next_query;
        self.next_query += 1;
        self.stats.arrivals += 1;

        let query = QueryState::sample(
            self.now,
            self.config.num_sensors,
            self.config.query_subset_size,
            &mut self.rng,
        );
        trace!(query = id, subset = query.subset.len(), "Query arrived");
        self.queries.insert(id, query);
        self.advance_query(id)
    }

    /// Resume a query's refine loop.
    fn advance_query(&mut self, id: QueryId) -> Result<()> {
        let query = self
            .queries
            .get_mut(&id)
            .ok_or_else(|| SimError::Internal(format!("refresh for unknown query {id}")))?;

        let env = RefineEnv {
            config: &self.config,
            population: &mut self.population,
            quality: self.quality.as_mut(),
            rng: &mut self.rng,
            global_updates: &mut self.global_updates,
            now: self.now,
        };

        match query.refine(env)? {
            Transition::Terminated(record) => {
                trace!(query = id, run_time = record.run_time, "Query terminated");
                self.queries.remove(&id);
                self.records.push(record);
                self.stats.queries_completed += 1;
            }
            Transition::Refreshed(sensor) => {
                self.stats.refreshes_issued += 1;
                if let Some(log) = self.refresh_log.as_mut() {
                    log.push(sensor);
                }
                let resume_at = self.now + self.config.refresh_delay();
                self.schedule_event(resume_at, Event::Refresh { query: id });
            }
        }
        Ok(())
    }

    /// Schedule an event, dropping it if it falls at or beyond the horizon.
    fn schedule_event(&mut self, time: f64, event: Event) {
        if time >= self.config.horizon {
            self.stats.events_dropped += 1;
            trace!(time, ?event, "Event past horizon dropped");
            return;
        }
        self.sequence += 1;
        let key = EventKey {
            time,
            sequence: self.sequence,
        };
        self.event_queue.insert(key, event);
    }
}
