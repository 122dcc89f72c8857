//! sensorsweep CLI - Sensor refresh policy simulation and parameter sweeps.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sensorsweep::pool::WorkerPool;
use sensorsweep::sim::placeholder_factory;
use sensorsweep::{Config, Policy, ResultAggregator, RunParams, SimulationConfig, SweepPipeline};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "sensorsweep")]
#[command(version)]
#[command(about = "Discrete-event simulation of sensor refresh policies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full parameter sweep and write the result table
    Sweep {
        /// Path to output CSV file (overrides [output].path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Trials per configuration (overrides [sweep].trials)
        #[arg(short, long)]
        trials: Option<u32>,

        /// Concurrent units (overrides [sweep].workers)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Base seed (overrides [sweep].seed)
        #[arg(long)]
        seed: Option<u64>,

        /// Skip writing the manifest
        #[arg(long)]
        no_manifest: bool,
    },

    /// Run a single (policy, bandwidth, arrival_rate, trial) unit
    Run {
        /// Refresh policy (Glb_RR, Loc_RR, MinMin, MaxUnc, MinExpEntropy)
        #[arg(short, long)]
        policy: Policy,

        /// Refreshes per simulated time unit
        #[arg(short, long)]
        bandwidth: u32,

        /// Queries per simulated time unit
        #[arg(short, long)]
        arrival_rate: u32,

        /// Trial index (selects the random stream)
        #[arg(short, long, default_value = "0")]
        trial: u32,

        /// Path to output CSV file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {path:?}")),
        None => Ok(Config::default()),
    }
}

fn print_example_config() {
    let example = r#"# sensorsweep configuration file

[simulation]
num_sensors = 1000
# Reserved: sensors do not yet drift between refreshes
uncertainty_rate = 0.1
query_subset_size = 100
target_quality = 0.9
horizon = 1000.0

[sweep]
policies = ["Glb_RR", "Loc_RR", "MinMin", "MaxUnc", "MinExpEntropy"]
bandwidths = [200, 350, 500]
arrival_rates = [5, 20, 45]
trials = 5
seed = 0
workers = 0  # 0 = available parallelism

[output]
path = "simulation_results.csv"
write_manifest = true
"#;
    println!("{example}");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Example => {
            print_example_config();
            return Ok(());
        }

        Commands::Validate => {
            let config = load_config(cli.config.as_deref())?;
            config.validate().context("Invalid configuration")?;

            info!("Configuration is valid");
            info!(
                "  Population: {} sensors, {} per query, target quality {:.2}",
                config.simulation.num_sensors,
                config.simulation.query_subset_size,
                config.simulation.target_quality
            );
            info!(
                "  Grid: {} policies x {} bandwidths x {} arrival rates x {} trials = {} units",
                config.sweep.policies.len(),
                config.sweep.bandwidths.len(),
                config.sweep.arrival_rates.len(),
                config.sweep.trials,
                config.sweep.total_runs()
            );
            info!("  Workers: {}", config.sweep.effective_workers());
            return Ok(());
        }

        Commands::Sweep {
            output,
            trials,
            workers,
            seed,
            no_manifest,
        } => {
            let mut config = load_config(cli.config.as_deref())?;

            // CLI overrides
            if let Some(output) = output {
                config.output.path = output;
            }
            if let Some(trials) = trials {
                config.sweep.trials = trials;
            }
            if let Some(workers) = workers {
                config.sweep.workers = workers;
            }
            if let Some(seed) = seed {
                config.sweep.seed = seed;
            }
            if no_manifest {
                config.output.write_manifest = false;
            }

            let output = config.output.path.clone();
            let pipeline = SweepPipeline::new(config).context("Invalid configuration")?;
            let stats = pipeline
                .run(&output)
                .await
                .with_context(|| format!("Failed to write results to {output:?}"))?;

            println!("\n=== Sweep Complete ===");
            println!("Units:       {}", stats.total_units);
            println!("Succeeded:   {}", stats.succeeded_units);
            println!("Failed:      {}", stats.failed_units);
            println!("Records:     {}", stats.total_records);
            println!("Throughput:  {:.0} records/s", stats.records_per_sec);
            println!("Runtime:     {:.1}s", stats.runtime_secs);
            println!("Output:      {output:?}");
        }

        Commands::Run {
            policy,
            bandwidth,
            arrival_rate,
            trial,
            output,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let params = RunParams {
                policy,
                bandwidth,
                arrival_rate,
                trial,
            };
            SimulationConfig::new(&config.simulation, params)
                .validate()
                .context("Invalid run parameters")?;

            let report = WorkerPool::run_unit(
                &config.simulation,
                params,
                config.sweep.seed,
                &placeholder_factory(),
            );
            let report = match report {
                Ok(report) => report,
                Err(e) => bail!("Run {params} failed: {e}"),
            };

            info!(
                run = %params,
                records = report.records.len(),
                refreshes = report.stats.refreshes_issued,
                abandoned = report.stats.queries_abandoned,
                "Run complete"
            );

            let aggregator = ResultAggregator::from_reports([&report]);
            match output {
                Some(path) => aggregator
                    .persist(&path)
                    .with_context(|| format!("Failed to write results to {path:?}"))?,
                None => aggregator
                    .write_csv(std::io::stdout().lock())
                    .context("Failed to write results to stdout")?,
            }
        }
    }

    Ok(())
}
