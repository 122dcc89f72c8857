//! Sweep manifest written next to the result table.

use super::aggregate::write_atomically;
use crate::models::{Config, Result, RunParams, SweepStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Provenance of one sweep: what ran, when, and what failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepManifest {
    /// Unique sweep ID
    pub sweep_id: Uuid,
    /// When dispatch started
    pub started_at: DateTime<Utc>,
    /// When the result table was complete
    pub finished_at: DateTime<Utc>,
    /// Configuration the sweep ran with
    pub config: Config,
    /// Aggregate statistics
    pub stats: SweepStats,
    /// Tuples whose unit faulted
    pub failed_units: Vec<RunParams>,
}

impl SweepManifest {
    /// Save the manifest as pretty JSON (atomic write).
    pub fn save(&self, path: &Path) -> Result<()> {
        write_atomically(path, "manifest", |writer| {
            serde_json::to_writer_pretty(&mut *writer, self)?;
            Ok(())
        })
    }

    /// Load a manifest from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::models::SimError::io("reading manifest", e))?;
        Ok(serde_json::from_str(&content)?)
    }
}
