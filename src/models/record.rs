//! Sweep tuples, metric records and run statistics.

use super::SimError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Refresh policy of a run.
///
/// The serialized names are the ones that appear in config files and in the
/// `policy` column of the result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Policy {
    /// Global round-robin over the whole population
    #[serde(rename = "Glb_RR")]
    GlbRr,
    /// Round-robin over the query's own subset
    #[serde(rename = "Loc_RR")]
    LocRr,
    /// Smallest lower bound in the subset
    MinMin,
    /// Widest uncertainty interval in the subset
    MaxUnc,
    /// Uniform random pick from the subset
    MinExpEntropy,
}

impl Policy {
    /// Every policy, in reference order.
    pub const ALL: [Policy; 5] = [
        Policy::GlbRr,
        Policy::LocRr,
        Policy::MinMin,
        Policy::MaxUnc,
        Policy::MinExpEntropy,
    ];

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Policy::GlbRr => "Glb_RR",
            Policy::LocRr => "Loc_RR",
            Policy::MinMin => "MinMin",
            Policy::MaxUnc => "MaxUnc",
            Policy::MinExpEntropy => "MinExpEntropy",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Policy::ALL
            .iter()
            .copied()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SimError::UnknownPolicy(s.to_string()))
    }
}

/// One tuple of the parameter sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunParams {
    pub policy: Policy,
    pub bandwidth: u32,
    pub arrival_rate: u32,
    pub trial: u32,
}

impl fmt::Display for RunParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/bw={}/ar={}/trial={}",
            self.policy, self.bandwidth, self.arrival_rate, self.trial
        )
    }
}

/// Metrics emitted when a query terminates.
///
/// Field order is the column order of the result table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub policy: Policy,
    pub bandwidth: u32,
    pub arrival_rate: u32,
    pub trial: u32,
    /// Simulated time from arrival to termination
    pub run_time: f64,
    /// Quality observed at termination
    pub quality: f64,
    /// Mean interval width over the whole population at termination
    pub avg_uncertainty: f64,
}

/// Column order of the result table.
pub const RECORD_COLUMNS: [&str; 7] = [
    "policy",
    "bandwidth",
    "arrival_rate",
    "trial",
    "run_time",
    "quality",
    "avg_uncertainty",
];

/// Counters collected during one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Events dispatched by the scheduler
    pub events_processed: u64,
    /// Queries that arrived before the horizon
    pub arrivals: u64,
    /// Sensor refreshes issued across all queries
    pub refreshes_issued: u64,
    /// Queries that emitted a record
    pub queries_completed: u64,
    /// Queries still in flight when the horizon was reached
    pub queries_abandoned: u64,
    /// Events dropped because they fell at or past the horizon
    pub events_dropped: u64,
    /// Simulated time of the last dispatched event
    pub final_time: f64,
}

/// Statistics for a whole sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepStats {
    /// Units in the cartesian product
    pub total_units: usize,

    /// Units that returned records
    pub succeeded_units: usize,

    /// Units that faulted and were skipped
    pub failed_units: usize,

    /// Rows written to the result table
    pub total_records: usize,

    /// Wall-clock runtime in seconds
    pub runtime_secs: f64,

    /// Records per wall-clock second
    pub records_per_sec: f64,
}

impl SweepStats {
    /// Calculate derived stats.
    pub fn finalize(&mut self) {
        if self.runtime_secs > 0.0 {
            self.records_per_sec = self.total_records as f64 / self.runtime_secs;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_names_roundtrip_through_from_str() {
        for policy in Policy::ALL {
            assert_eq!(policy.as_str().parse::<Policy>().unwrap(), policy);
        }
        assert_eq!("glb_rr".parse::<Policy>().unwrap(), Policy::GlbRr);
        assert!(matches!(
            "Oracle".parse::<Policy>(),
            Err(SimError::UnknownPolicy(name)) if name == "Oracle"
        ));
    }

    #[test]
    fn test_policy_serializes_with_canonical_name() {
        let json = serde_json::to_string(&Policy::LocRr).unwrap();
        assert_eq!(json, "\"Loc_RR\"");
        let back: Policy = serde_json::from_str("\"MinExpEntropy\"").unwrap();
        assert_eq!(back, Policy::MinExpEntropy);
    }

    #[test]
    fn test_run_params_display() {
        let params = RunParams {
            policy: Policy::MaxUnc,
            bandwidth: 350,
            arrival_rate: 20,
            trial: 3,
        };
        assert_eq!(params.to_string(), "MaxUnc/bw=350/ar=20/trial=3");
    }

    #[test]
    fn test_sweep_stats_finalize() {
        let mut stats = SweepStats {
            total_records: 500,
            runtime_secs: 2.0,
            ..Default::default()
        };
        stats.finalize();
        assert_eq!(stats.records_per_sec, 250.0);
    }
}
