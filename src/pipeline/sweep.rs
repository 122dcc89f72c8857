//! Parameter sweep pipeline.
//!
//! Pipeline flow:
//! Config → validate → tuples → Worker Pool → Unit reports → Aggregator → CSV (+ manifest)

use super::aggregate::ResultAggregator;
use super::manifest::SweepManifest;
use crate::models::{Config, Result, RunParams, SimError, SweepStats};
use crate::pool::WorkerPool;
use crate::sim::{QualityFactory, RunReport};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything collected from a sweep before it is persisted.
#[derive(Debug)]
pub struct SweepResults {
    /// Successful runs in enumeration order
    pub reports: Vec<RunReport>,
    /// Tuples whose unit faulted, with the fault
    pub failed: Vec<(RunParams, SimError)>,
    /// Aggregate statistics
    pub stats: SweepStats,
}

impl SweepResults {
    /// Flatten successful runs into one table.
    pub fn aggregate(&self) -> ResultAggregator {
        ResultAggregator::from_reports(&self.reports)
    }

    pub fn failed_params(&self) -> Vec<RunParams> {
        self.failed.iter().map(|(params, _)| *params).collect()
    }
}

/// Sweep pipeline for running the full parameter grid.
pub struct SweepPipeline {
    pool: WorkerPool,
    config: Config,
    show_progress: bool,
}

impl SweepPipeline {
    /// Create a new sweep pipeline; invalid configuration fails here.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        if config.simulation.uncertainty_rate > 0.0 {
            debug!(
                uncertainty_rate = config.simulation.uncertainty_rate,
                "uncertainty_rate is reserved; sensors do not drift between refreshes"
            );
        }

        let pool = WorkerPool::new(
            config.simulation.clone(),
            config.sweep.seed,
            config.sweep.effective_workers(),
        );

        Ok(Self {
            pool,
            config,
            show_progress: true,
        })
    }

    /// Replace the quality metric used by every unit.
    pub fn with_quality(mut self, quality: QualityFactory) -> Self {
        self.pool = self.pool.with_quality(quality);
        self
    }

    /// Enable or disable the progress bar.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every unit and collect the results without writing anything.
    pub async fn execute(&self) -> Result<SweepResults> {
        let start = Instant::now();
        let runs = self.config.sweep.runs();
        let total = runs.len();

        info!(
            units = total,
            workers = self.pool.pool_size(),
            policies = self.config.sweep.policies.len(),
            trials = self.config.sweep.trials,
            "Starting sweep"
        );

        let pb = if self.show_progress {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({percent}%) {msg}")
                    .map_err(|e| SimError::Internal(format!("Invalid progress template: {e}")))?
                    .progress_chars("##-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        let mut rx = self.pool.submit_all(runs);
        let mut slots: Vec<Option<RunReport>> = (0..total).map(|_| None).collect();
        let mut failed = Vec::new();
        let mut records = 0usize;

        while let Some(report) = rx.recv().await {
            match report.outcome {
                Ok(run) => {
                    records += run.records.len();
                    slots[report.index] = Some(run);
                }
                // Any fault inside a unit stays inside that unit.
                Err(e) => {
                    warn!(
                        policy = %report.params.policy,
                        bandwidth = report.params.bandwidth,
                        arrival_rate = report.params.arrival_rate,
                        trial = report.params.trial,
                        error = %e,
                        "Unit failed, skipping"
                    );
                    failed.push((report.params, e));
                }
            }

            pb.inc(1);
            pb.set_message(format!("records: {}, failed: {}", records, failed.len()));
        }

        pb.finish_with_message(format!("Done! {} records, {} failed", records, failed.len()));

        let reports: Vec<RunReport> = slots.into_iter().flatten().collect();
        if reports.len() + failed.len() != total {
            return Err(SimError::ChannelClosed);
        }

        let mut stats = SweepStats {
            total_units: total,
            succeeded_units: reports.len(),
            failed_units: failed.len(),
            total_records: records,
            runtime_secs: start.elapsed().as_secs_f64(),
            ..Default::default()
        };
        stats.finalize();

        Ok(SweepResults {
            reports,
            failed,
            stats,
        })
    }

    /// Run the sweep and persist the result table (and manifest) at `output_path`.
    ///
    /// A write failure is returned to the caller; there is no partial result.
    pub async fn run(&self, output_path: &Path) -> Result<SweepStats> {
        let started_at = Utc::now();
        let results = self.execute().await?;

        let aggregator = results.aggregate();
        aggregator.persist(output_path)?;

        if self.config.output.write_manifest {
            let manifest = SweepManifest {
                sweep_id: Uuid::new_v4(),
                started_at,
                finished_at: Utc::now(),
                config: self.config.clone(),
                stats: results.stats.clone(),
                failed_units: results.failed_params(),
            };
            let manifest_path = crate::models::manifest_path_for(output_path);
            manifest.save(&manifest_path)?;
            debug!(path = %manifest_path.display(), "Manifest written");
        }

        info!(
            units = results.stats.total_units,
            failed = results.stats.failed_units,
            records = aggregator.len(),
            throughput = %format!("{:.0} records/s", results.stats.records_per_sec),
            output = %output_path.display(),
            "Sweep complete"
        );

        Ok(results.stats)
    }
}
