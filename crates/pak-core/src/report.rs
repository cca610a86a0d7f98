//! Run-level diagnostics
//!
//! Collects what happened to every table during a patch run so the caller can
//! print it, persist it as JSON, and pick an exit status.

use crate::error::{Error, Result};
use crate::merger::MergeReport;
use crate::strings::StringMergeReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Which pass a table belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Data,
    Localization,
}

/// Merge counts for a patched table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStats {
    Data(MergeReport),
    Strings(StringMergeReport),
}

/// Result of processing one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TableOutcome {
    Patched { stats: TableStats },
    Skipped { reason: String },
    Failed { error: String },
}

/// One table's entry in the run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRecord {
    pub phase: Phase,
    /// Path relative to the project's Data or Localization directory
    pub table: String,
    /// Where the merged document was (or would have been) written
    pub output: PathBuf,
    #[serde(flatten)]
    pub outcome: TableOutcome,
}

/// Diagnostics for a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run started
    pub generated_at: DateTime<Utc>,
    pub tables: Vec<TableRecord>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    /// Create an empty report stamped with the current time
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            tables: Vec::new(),
        }
    }

    pub fn record(&mut self, record: TableRecord) {
        self.tables.push(record);
    }

    pub fn patched_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, TableOutcome::Patched { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, TableOutcome::Skipped { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, TableOutcome::Failed { .. }))
    }

    /// Whether every table was patched or deliberately skipped
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0
    }

    /// Summed data-table merge counts
    pub fn data_totals(&self) -> MergeReport {
        let mut totals = MergeReport::default();
        for record in &self.tables {
            if let TableOutcome::Patched {
                stats: TableStats::Data(report),
            } = &record.outcome
            {
                totals.absorb(report);
            }
        }
        totals
    }

    /// Summed string-table merge counts
    pub fn string_totals(&self) -> StringMergeReport {
        let mut totals = StringMergeReport::default();
        for record in &self.tables {
            if let TableOutcome::Patched {
                stats: TableStats::Strings(report),
            } = &record.outcome
            {
                totals.project_rows += report.project_rows;
                totals.expanded += report.expanded;
                totals.baseline_kept += report.baseline_kept;
                totals.baseline_overridden += report.baseline_overridden;
            }
        }
        totals
    }

    /// Load a report from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the report as JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| Error::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })
    }

    fn count(&self, predicate: impl Fn(&TableOutcome) -> bool) -> usize {
        self.tables.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(table: &str, outcome: TableOutcome) -> TableRecord {
        TableRecord {
            phase: Phase::Data,
            table: table.to_string(),
            output: PathBuf::from("out").join(table),
            outcome,
        }
    }

    fn patched(added: usize, replaced: usize) -> TableOutcome {
        TableOutcome::Patched {
            stats: TableStats::Data(MergeReport {
                added,
                replaced,
                ..MergeReport::default()
            }),
        }
    }

    #[test]
    fn test_counts_and_totals() {
        let mut report = RunReport::new();
        report.record(record("a.xml", patched(1, 2)));
        report.record(record("b.xml", patched(3, 0)));
        report.record(record(
            "c.xml",
            TableOutcome::Skipped {
                reason: "no baseline".into(),
            },
        ));
        assert!(report.is_success());

        report.record(record(
            "d.xml",
            TableOutcome::Failed {
                error: "boom".into(),
            },
        ));

        assert_eq!(report.patched_count(), 2);
        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(!report.is_success());

        let totals = report.data_totals();
        assert_eq!(totals.added, 4);
        assert_eq!(totals.replaced, 2);
        assert_eq!(report.string_totals(), StringMergeReport::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let mut report = RunReport::new();
        report.record(record("a.xml", patched(1, 0)));
        report.save(&path).unwrap();

        let json = fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"status\": \"patched\""));

        let loaded = RunReport::load(&path).unwrap();
        assert_eq!(loaded.generated_at, report.generated_at);
        assert_eq!(loaded.tables.len(), 1);
        assert_eq!(loaded.tables[0].outcome, report.tables[0].outcome);
    }
}
