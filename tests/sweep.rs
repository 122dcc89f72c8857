//! End-to-end tests for the sweep pipeline.
//!
//! These exercise the public API the CLI uses: configuration, the worker
//! pool, aggregation and the persisted artifacts.

use rand::RngCore;
use sensorsweep::models::{ConfigError, Policy, Result, RunParams, SimError};
use sensorsweep::pipeline::{ResultAggregator, SweepManifest, SweepPipeline};
use sensorsweep::pool::WorkerPool;
use sensorsweep::sim::{
    placeholder_factory, PlaceholderQuality, PopulationSnapshot, QualityFactory, QualityMetric,
};
use sensorsweep::Config;
use std::sync::Arc;
use tempfile::TempDir;

/// Quality metric that reports an error instead of a value.
struct FaultyQuality;

impl QualityMetric for FaultyQuality {
    fn evaluate(&mut self, _snapshot: &PopulationSnapshot<'_>, _rng: &mut dyn RngCore) -> Result<f64> {
        Err(SimError::QualityMetric("division by zero in convergence metric".into()))
    }
}

fn small_config() -> Config {
    let mut config = Config::default();
    config.simulation.num_sensors = 25;
    config.simulation.query_subset_size = 5;
    config.simulation.horizon = 20.0;
    config.sweep.bandwidths = vec![200, 500];
    config.sweep.arrival_rates = vec![5, 20];
    config.sweep.trials = 2;
    config.sweep.workers = 4;
    config
}

fn faulty_tuple() -> RunParams {
    RunParams {
        policy: Policy::MinMin,
        bandwidth: 500,
        arrival_rate: 20,
        trial: 1,
    }
}

fn faulty_factory() -> QualityFactory {
    let target = faulty_tuple();
    Arc::new(move |params: &RunParams| -> Box<dyn QualityMetric> {
        if *params == target {
            Box::new(FaultyQuality)
        } else {
            Box::new(PlaceholderQuality)
        }
    })
}

/// One failing unit must not disturb any other unit's records.
#[tokio::test]
async fn test_sweep_isolates_failed_unit() {
    let config = small_config();
    let total = config.sweep.total_runs();

    let clean = SweepPipeline::new(config.clone())
        .unwrap()
        .with_progress(false)
        .execute()
        .await
        .unwrap();
    let faulty = SweepPipeline::new(config)
        .unwrap()
        .with_quality(faulty_factory())
        .with_progress(false)
        .execute()
        .await
        .unwrap();

    assert_eq!(clean.stats.failed_units, 0);
    assert_eq!(faulty.stats.failed_units, 1);
    assert_eq!(faulty.stats.succeeded_units, total - 1);
    assert_eq!(faulty.failed_params(), vec![faulty_tuple()]);
    assert!(matches!(faulty.failed[0].1, SimError::QualityMetric(_)));

    // Every surviving unit matches the clean sweep exactly.
    let expected: Vec<_> = clean
        .reports
        .iter()
        .filter(|r| r.params != faulty_tuple())
        .collect();
    assert_eq!(expected.len(), faulty.reports.len());
    for (want, got) in expected.iter().zip(&faulty.reports) {
        assert_eq!(want.params, got.params);
        assert_eq!(want.records, got.records);
    }
}

/// The persisted table and manifest reflect the failed unit.
#[tokio::test]
async fn test_sweep_writes_table_and_manifest() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("simulation_results.csv");

    let pipeline = SweepPipeline::new(small_config())
        .unwrap()
        .with_quality(faulty_factory())
        .with_progress(false);
    let stats = pipeline.run(&output).await.unwrap();

    let mut reader = csv::Reader::from_path(&output).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        vec!["policy", "bandwidth", "arrival_rate", "trial", "run_time", "quality", "avg_uncertainty"]
    );
    let rows = reader.records().count();
    assert_eq!(rows, stats.total_records);

    let manifest =
        SweepManifest::load(&temp_dir.path().join("simulation_results.csv.manifest.json")).unwrap();
    assert_eq!(manifest.failed_units, vec![faulty_tuple()]);
    assert_eq!(manifest.stats.failed_units, 1);
}

/// Identical tuples and seeds give byte-identical tables.
#[tokio::test]
async fn test_sweep_output_is_byte_identical() {
    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("a.csv");
    let second = temp_dir.path().join("b.csv");

    let mut config = small_config();
    config.output.write_manifest = false;

    SweepPipeline::new(config.clone())
        .unwrap()
        .with_progress(false)
        .run(&first)
        .await
        .unwrap();
    config.sweep.workers = 1;
    SweepPipeline::new(config)
        .unwrap()
        .with_progress(false)
        .run(&second)
        .await
        .unwrap();

    let a = std::fs::read(&first).unwrap();
    let b = std::fs::read(&second).unwrap();
    assert!(!a.is_empty());
    assert_eq!(a, b);
    assert!(!temp_dir.path().join("a.csv.manifest.json").exists());
}

/// A trivially satisfied target terminates every query on its first check.
#[test]
fn test_trivial_target_scenario() {
    let mut config = Config::default();
    config.simulation.num_sensors = 10;
    config.simulation.query_subset_size = 3;
    config.simulation.target_quality = 0.0;
    config.simulation.horizon = 100.0;
    config.validate().unwrap();

    let params = RunParams {
        policy: Policy::GlbRr,
        bandwidth: 500,
        arrival_rate: 5,
        trial: 0,
    };
    let report =
        WorkerPool::run_unit(&config.simulation, params, 0, &placeholder_factory()).unwrap();

    assert!(!report.records.is_empty());
    assert_eq!(report.stats.refreshes_issued, 0);
    assert!(report.records.iter().all(|r| r.run_time == 0.0));

    let mut buf = Vec::new();
    ResultAggregator::from_reports([&report]).write_csv(&mut buf).unwrap();
    let text = String::from_utf8(buf).unwrap();
    assert_eq!(text.lines().count(), report.records.len() + 1);
    assert!(text.lines().skip(1).all(|l| l.starts_with("Glb_RR,500,5,0,0.0,")));
}

/// Determinism of a single unit across repeated executions.
#[test]
fn test_unit_is_deterministic() {
    let config = small_config();
    let factory = placeholder_factory();
    for policy in Policy::ALL {
        let params = RunParams {
            policy,
            bandwidth: 200,
            arrival_rate: 20,
            trial: 1,
        };
        let a = WorkerPool::run_unit(&config.simulation, params, 9, &factory).unwrap();
        let b = WorkerPool::run_unit(&config.simulation, params, 9, &factory).unwrap();
        assert_eq!(a, b, "{params} diverged");
    }
}

/// Invalid rates are rejected with the offending field named.
#[test]
fn test_zero_bandwidth_rejected() {
    let mut config = small_config();
    config.sweep.bandwidths = vec![0];
    match SweepPipeline::new(config) {
        Err(SimError::Config(ConfigError::Invalid { field, .. })) => assert_eq!(field, "bandwidth"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("zero bandwidth must be rejected"),
    }
}
