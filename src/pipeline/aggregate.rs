//! Result aggregation and persistence.
//!
//! Records are flattened per unit in the order they were emitted, units in
//! sweep enumeration order, and written as one CSV table. Files are written
//! to a temporary sibling and renamed into place so a failed write never
//! leaves a partial artifact behind.

use crate::models::{MetricRecord, Result, SimError, RECORD_COLUMNS};
use crate::sim::RunReport;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Flat table of every record produced by a sweep.
#[derive(Debug, Clone, Default)]
pub struct ResultAggregator {
    records: Vec<MetricRecord>,
}

impl ResultAggregator {
    /// Flatten run reports, preserving each run's record order.
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a RunReport>) -> Self {
        let records = reports
            .into_iter()
            .flat_map(|report| report.records.iter().cloned())
            .collect();
        Self { records }
    }

    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the table (header always included) to any writer.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        csv.write_record(RECORD_COLUMNS)?;
        for record in &self.records {
            csv.serialize(record)?;
        }
        csv.flush()
            .map_err(|e| SimError::io("flushing result table", e))?;
        Ok(())
    }

    /// Persist the table at `path`.
    pub fn persist(&self, path: &Path) -> Result<()> {
        write_atomically(path, "result table", |writer| self.write_csv(writer))?;
        debug!(path = %path.display(), rows = self.records.len(), "Result table written");
        Ok(())
    }
}

/// Write through a temporary sibling file, then rename over `path`.
pub(crate) fn write_atomically<F>(path: &Path, what: &str, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| SimError::io(format!("creating directory for {what}"), e))?;
    }

    let temp_path = temp_sibling(path);
    let result = (|| {
        let file = File::create(&temp_path)
            .map_err(|e| SimError::io(format!("creating temp {what}"), e))?;
        let mut writer = BufWriter::new(file);
        write(&mut writer)?;
        writer
            .flush()
            .map_err(|e| SimError::io(format!("flushing {what}"), e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| SimError::io(format!("syncing {what}"), e))?;
        fs::rename(&temp_path, path).map_err(|e| SimError::io(format!("renaming {what}"), e))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Policy, RunParams, RunStats};
    use tempfile::TempDir;

    fn record(policy: Policy, trial: u32, run_time: f64) -> MetricRecord {
        MetricRecord {
            policy,
            bandwidth: 200,
            arrival_rate: 5,
            trial,
            run_time,
            quality: 0.95,
            avg_uncertainty: 0.0,
        }
    }

    fn report(policy: Policy, records: Vec<MetricRecord>) -> RunReport {
        RunReport {
            params: RunParams {
                policy,
                bandwidth: 200,
                arrival_rate: 5,
                trial: 0,
            },
            records,
            stats: RunStats::default(),
            refresh_log: None,
        }
    }

    #[test]
    fn test_flatten_preserves_order() {
        let reports = vec![
            report(Policy::GlbRr, vec![record(Policy::GlbRr, 0, 0.2), record(Policy::GlbRr, 0, 0.1)]),
            report(Policy::MinMin, vec![]),
            report(Policy::MaxUnc, vec![record(Policy::MaxUnc, 0, 0.0)]),
        ];
        let aggregator = ResultAggregator::from_reports(&reports);
        let times: Vec<_> = aggregator.records().iter().map(|r| r.run_time).collect();
        assert_eq!(times, vec![0.2, 0.1, 0.0]);
        assert_eq!(aggregator.records()[2].policy, Policy::MaxUnc);
    }

    #[test]
    fn test_csv_column_order_and_policy_names() {
        let reports = vec![report(Policy::LocRr, vec![record(Policy::LocRr, 3, 0.004)])];
        let mut buf = Vec::new();
        ResultAggregator::from_reports(&reports)
            .write_csv(&mut buf)
            .unwrap();

        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("policy,bandwidth,arrival_rate,trial,run_time,quality,avg_uncertainty")
        );
        assert_eq!(lines.next(), Some("Loc_RR,200,5,3,0.004,0.95,0.0"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_empty_table_still_has_header() {
        let mut buf = Vec::new();
        ResultAggregator::default().write_csv(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "policy,bandwidth,arrival_rate,trial,run_time,quality,avg_uncertainty\n"
        );
    }

    #[test]
    fn test_persist_writes_and_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("results.csv");
        let reports = vec![report(Policy::MinMin, vec![record(Policy::MinMin, 0, 0.0)])];

        ResultAggregator::from_reports(&reports).persist(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(!temp_sibling(&path).exists());
    }

    #[test]
    fn test_persist_failure_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        // A directory where the file should go makes the final rename fail.
        let path = temp_dir.path().join("results.csv");
        fs::create_dir_all(path.join("occupied")).unwrap();

        let err = ResultAggregator::default().persist(&path).unwrap_err();
        assert!(matches!(err, SimError::Io { .. }));
        assert!(!temp_sibling(&path).exists());
    }
}
