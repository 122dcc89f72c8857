//! Configuration models for sensorsweep.
//!
//! Every tunable of the simulation and the sweep lives here. The defaults
//! reproduce the reference parameter grid, so running without a config file
//! is meaningful.

use super::{Policy, RunParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum refinement iterations a single query may perform.
pub const MAX_REFINEMENTS: u32 = 5;

/// Top-level configuration for sensorsweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Population and query parameters shared by every run
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Parameter grid and pool settings
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Parameters shared by every run of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Number of sensors in the population
    #[serde(default = "default_num_sensors")]
    pub num_sensors: usize,

    /// Passive uncertainty growth rate.
    ///
    /// Validated and carried through, but sensors currently do not drift
    /// between refreshes.
    #[serde(default = "default_uncertainty_rate")]
    pub uncertainty_rate: f64,

    /// Sensors sampled per query
    #[serde(default = "default_query_subset_size")]
    pub query_subset_size: usize,

    /// Quality a query must reach to terminate early (0.0 - 1.0)
    #[serde(default = "default_target_quality")]
    pub target_quality: f64,

    /// Simulated time at which a run stops
    #[serde(default = "default_horizon")]
    pub horizon: f64,
}

fn default_num_sensors() -> usize {
    1000
}

fn default_uncertainty_rate() -> f64 {
    0.1
}

fn default_query_subset_size() -> usize {
    100
}

fn default_target_quality() -> f64 {
    0.9
}

fn default_horizon() -> f64 {
    1000.0
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            num_sensors: default_num_sensors(),
            uncertainty_rate: default_uncertainty_rate(),
            query_subset_size: default_query_subset_size(),
            target_quality: default_target_quality(),
            horizon: default_horizon(),
        }
    }
}

impl SimulationSettings {
    /// Check population and query parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_sensors == 0 {
            return Err(ConfigError::invalid(
                "simulation.num_sensors",
                "must be greater than 0",
            ));
        }
        if self.query_subset_size == 0 {
            return Err(ConfigError::invalid(
                "simulation.query_subset_size",
                "must be greater than 0",
            ));
        }
        if self.query_subset_size > self.num_sensors {
            return Err(ConfigError::invalid(
                "simulation.query_subset_size",
                format!(
                    "{} exceeds num_sensors ({})",
                    self.query_subset_size, self.num_sensors
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.target_quality) {
            return Err(ConfigError::invalid(
                "simulation.target_quality",
                format!("{} is outside [0, 1]", self.target_quality),
            ));
        }
        if !self.horizon.is_finite() || self.horizon <= 0.0 {
            return Err(ConfigError::invalid(
                "simulation.horizon",
                format!("{} must be a positive finite time", self.horizon),
            ));
        }
        if !self.uncertainty_rate.is_finite() || self.uncertainty_rate < 0.0 {
            return Err(ConfigError::invalid(
                "simulation.uncertainty_rate",
                format!("{} must be a non-negative finite rate", self.uncertainty_rate),
            ));
        }
        Ok(())
    }
}

/// Parameter grid for the sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Policies to compare
    #[serde(default = "default_policies")]
    pub policies: Vec<Policy>,

    /// Refresh bandwidths (refreshes per simulated time unit)
    #[serde(default = "default_bandwidths")]
    pub bandwidths: Vec<u32>,

    /// Query arrival rates (queries per simulated time unit)
    #[serde(default = "default_arrival_rates")]
    pub arrival_rates: Vec<u32>,

    /// Independent replicates per (policy, bandwidth, arrival_rate)
    #[serde(default = "default_trials")]
    pub trials: u32,

    /// Base seed every trial stream is derived from
    #[serde(default)]
    pub seed: u64,

    /// Concurrent units (0 = available hardware parallelism)
    #[serde(default)]
    pub workers: usize,
}

fn default_policies() -> Vec<Policy> {
    Policy::ALL.to_vec()
}

fn default_bandwidths() -> Vec<u32> {
    vec![200, 350, 500]
}

fn default_arrival_rates() -> Vec<u32> {
    vec![5, 20, 45]
}

fn default_trials() -> u32 {
    5
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            policies: default_policies(),
            bandwidths: default_bandwidths(),
            arrival_rates: default_arrival_rates(),
            trials: default_trials(),
            seed: 0,
            workers: 0,
        }
    }
}

impl SweepConfig {
    /// Check the grid is non-empty and every rate is positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policies.is_empty() {
            return Err(ConfigError::invalid("sweep.policies", "must not be empty"));
        }
        if self.bandwidths.is_empty() {
            return Err(ConfigError::invalid("sweep.bandwidths", "must not be empty"));
        }
        if self.arrival_rates.is_empty() {
            return Err(ConfigError::invalid(
                "sweep.arrival_rates",
                "must not be empty",
            ));
        }
        if self.trials == 0 {
            return Err(ConfigError::invalid("sweep.trials", "must be greater than 0"));
        }
        if self.bandwidths.contains(&0) {
            return Err(ConfigError::invalid("bandwidth", "must be greater than 0"));
        }
        if self.arrival_rates.contains(&0) {
            return Err(ConfigError::invalid(
                "arrival_rate",
                "must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Number of workers to run, resolving 0 to the hardware parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    /// Enumerate every tuple of the grid.
    ///
    /// Order: bandwidth, then arrival rate, then policy, then trial.
    pub fn runs(&self) -> Vec<RunParams> {
        let mut runs = Vec::with_capacity(self.total_runs());
        for &bandwidth in &self.bandwidths {
            for &arrival_rate in &self.arrival_rates {
                for &policy in &self.policies {
                    for trial in 0..self.trials {
                        runs.push(RunParams {
                            policy,
                            bandwidth,
                            arrival_rate,
                            trial,
                        });
                    }
                }
            }
        }
        runs
    }

    /// Size of the cartesian product.
    pub fn total_runs(&self) -> usize {
        self.policies.len() * self.bandwidths.len() * self.arrival_rates.len() * self.trials as usize
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Result table path
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Whether to write `<path>.manifest.json` next to the table
    #[serde(default = "default_true")]
    pub write_manifest: bool,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("simulation_results.csv")
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            write_manifest: true,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Toml(source) => ConfigError::Parse {
                path: path.to_owned(),
                source,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the whole configuration before any work is dispatched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        self.sweep.validate()
    }

    /// Path of the manifest written alongside the result table.
    pub fn manifest_path(&self) -> PathBuf {
        manifest_path_for(&self.output.path)
    }
}

/// Manifest path for a given result table path.
pub fn manifest_path_for(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".manifest.json");
    output.with_file_name(name)
}

/// Immutable configuration of a single run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub num_sensors: usize,
    pub uncertainty_rate: f64,
    pub query_subset_size: usize,
    pub target_quality: f64,
    pub bandwidth: u32,
    pub arrival_rate: u32,
    pub policy: Policy,
    pub trial_id: u32,
    pub horizon: f64,
}

impl SimulationConfig {
    /// Combine shared settings with one sweep tuple.
    pub fn new(settings: &SimulationSettings, params: RunParams) -> Self {
        Self {
            num_sensors: settings.num_sensors,
            uncertainty_rate: settings.uncertainty_rate,
            query_subset_size: settings.query_subset_size,
            target_quality: settings.target_quality,
            bandwidth: params.bandwidth,
            arrival_rate: params.arrival_rate,
            policy: params.policy,
            trial_id: params.trial,
            horizon: settings.horizon,
        }
    }

    /// The sweep tuple this run belongs to.
    pub fn params(&self) -> RunParams {
        RunParams {
            policy: self.policy,
            bandwidth: self.bandwidth,
            arrival_rate: self.arrival_rate,
            trial: self.trial_id,
        }
    }

    /// Delay between a refresh request and the query resuming.
    pub fn refresh_delay(&self) -> f64 {
        1.0 / f64::from(self.bandwidth)
    }

    /// Validate a standalone run (used when no sweep grid is involved).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bandwidth == 0 {
            return Err(ConfigError::invalid("bandwidth", "must be greater than 0"));
        }
        if self.arrival_rate == 0 {
            return Err(ConfigError::invalid(
                "arrival_rate",
                "must be greater than 0",
            ));
        }
        SimulationSettings {
            num_sensors: self.num_sensors,
            uncertainty_rate: self.uncertainty_rate,
            query_subset_size: self.query_subset_size,
            target_quality: self.target_quality,
            horizon: self.horizon,
        }
        .validate()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the offending field, for validation errors.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::Invalid { field, .. } => Some(field),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_grid() {
        let config = Config::default();
        assert_eq!(config.simulation.num_sensors, 1000);
        assert_eq!(config.simulation.query_subset_size, 100);
        assert_eq!(config.sweep.bandwidths, vec![200, 350, 500]);
        assert_eq!(config.sweep.arrival_rates, vec![5, 20, 45]);
        assert_eq!(config.sweep.total_runs(), 5 * 3 * 3 * 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [simulation]
            num_sensors = 10
            query_subset_size = 3

            [sweep]
            policies = ["MinMin", "Glb_RR"]
            trials = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.simulation.num_sensors, 10);
        assert_eq!(config.simulation.target_quality, 0.9);
        assert_eq!(config.sweep.policies, vec![Policy::MinMin, Policy::GlbRr]);
        assert_eq!(config.sweep.bandwidths, vec![200, 350, 500]);
        assert_eq!(config.output.path, PathBuf::from("simulation_results.csv"));
    }

    #[test]
    fn test_unknown_policy_rejected_at_parse() {
        let result = Config::from_toml(
            r#"
            [sweep]
            policies = ["Random"]
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_validation_names_offending_field() {
        let mut config = Config::default();
        config.sweep.bandwidths = vec![200, 0];
        assert_eq!(config.validate().unwrap_err().field(), Some("bandwidth"));

        let mut config = Config::default();
        config.sweep.arrival_rates = vec![0];
        assert_eq!(config.validate().unwrap_err().field(), Some("arrival_rate"));

        let mut config = Config::default();
        config.simulation.query_subset_size = 1001;
        assert_eq!(
            config.validate().unwrap_err().field(),
            Some("simulation.query_subset_size")
        );

        let mut config = Config::default();
        config.simulation.target_quality = 1.5;
        assert_eq!(
            config.validate().unwrap_err().field(),
            Some("simulation.target_quality")
        );

        let mut config = Config::default();
        config.simulation.horizon = f64::INFINITY;
        assert_eq!(
            config.validate().unwrap_err().field(),
            Some("simulation.horizon")
        );
    }

    #[test]
    fn test_run_enumeration_order() {
        let sweep = SweepConfig {
            policies: vec![Policy::GlbRr, Policy::MaxUnc],
            bandwidths: vec![10, 20],
            arrival_rates: vec![1],
            trials: 2,
            seed: 0,
            workers: 1,
        };
        let runs = sweep.runs();
        assert_eq!(runs.len(), sweep.total_runs());
        assert_eq!(runs.len(), 8);

        assert_eq!(runs[0].bandwidth, 10);
        assert_eq!(runs[0].policy, Policy::GlbRr);
        assert_eq!(runs[0].trial, 0);
        assert_eq!(runs[1].trial, 1);
        assert_eq!(runs[2].policy, Policy::MaxUnc);
        assert_eq!(runs[4].bandwidth, 20);
    }

    #[test]
    fn test_manifest_path() {
        let path = manifest_path_for(Path::new("out/results.csv"));
        assert_eq!(path, PathBuf::from("out/results.csv.manifest.json"));
    }

    #[test]
    fn test_single_run_validation() {
        let settings = SimulationSettings::default();
        let mut config = SimulationConfig::new(
            &settings,
            RunParams {
                policy: Policy::LocRr,
                bandwidth: 0,
                arrival_rate: 5,
                trial: 0,
            },
        );
        assert_eq!(config.validate().unwrap_err().field(), Some("bandwidth"));

        config.bandwidth = 500;
        assert!(config.validate().is_ok());
        assert_eq!(config.refresh_delay(), 0.002);
    }
}
