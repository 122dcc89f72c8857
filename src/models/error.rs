//! Error types for sensorsweep.
//!
//! Failure taxonomy:
//! - Rejected input: bad configuration, unparseable policy names
//! - Unit faults: a single simulation run broke (caught at the unit boundary)
//! - Artifact failures: the result table could not be persisted (fatal)
//! - Internal: invariants of the pool itself were violated

use thiserror::Error;

/// Top-level error type for sensorsweep.
#[derive(Debug, Error)]
pub enum SimError {
    // ═══════════════════════════════════════════════════════════════════
    // REJECTED INPUT: caught before any unit is dispatched
    // ═══════════════════════════════════════════════════════════════════

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Unknown policy: '{0}' (expected one of Glb_RR, Loc_RR, MinMin, MaxUnc, MinExpEntropy)")]
    UnknownPolicy(String),

    // ═══════════════════════════════════════════════════════════════════
    // UNIT FAULTS: one run failed, siblings keep going
    // ═══════════════════════════════════════════════════════════════════

    #[error("Quality metric returned {value} (must be finite and within [0, 1])")]
    InvalidQuality { value: f64 },

    #[error("Quality metric failed: {0}")]
    QualityMetric(String),

    #[error("Unit panicked: {0}")]
    Panicked(String),

    // ═══════════════════════════════════════════════════════════════════
    // ARTIFACT FAILURES: fatal for the sweep
    // ═══════════════════════════════════════════════════════════════════

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════
    // INTERNAL: should not happen
    // ═══════════════════════════════════════════════════════════════════

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

impl SimError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type alias for sensorsweep.
pub type Result<T> = std::result::Result<T, SimError>;
