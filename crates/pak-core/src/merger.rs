//! Merge engine for patching data tables against their baseline
//!
//! Baseline rows survive unless a project row with the same signature values
//! exists. Matched rows are replaced in place, identical rows are dropped as
//! no-op duplicates, and unmatched project rows are appended.

use crate::catalog::{ColumnKind, TableSignature, WorkaroundConfig};
use crate::error::{Error, Result};
use crate::table::{Entry, Row, TabularDocument};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::{self, HashMap};
use tracing::{debug, info};

/// Per-table merge diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Project rows with no baseline counterpart
    pub added: usize,
    /// Baseline rows substituted by a differing project row
    pub replaced: usize,
    /// Project rows identical to their baseline row (both dropped)
    pub duplicates_removed: usize,
    /// Sentinel-patched rows inserted ahead of a replacement
    pub workarounds_inserted: usize,
}

impl MergeReport {
    /// Fold another report into this one
    pub fn absorb(&mut self, other: &MergeReport) {
        self.added += other.added;
        self.replaced += other.replaced;
        self.duplicates_removed += other.duplicates_removed;
        self.workarounds_inserted += other.workarounds_inserted;
    }
}

/// A merged document with its diagnostics
#[derive(Debug, Clone)]
pub struct MergedTable {
    pub document: TabularDocument,
    pub report: MergeReport,
}

/// Merge the rows of a parsed project document into its baseline
pub fn merge_documents(
    mut project: TabularDocument,
    baseline: TabularDocument,
    table: &TableSignature,
    workaround: &WorkaroundConfig,
) -> Result<MergedTable> {
    let rows = project.take_rows();
    if rows.is_empty() {
        return Err(Error::NoRows(project.source_name));
    }
    merge_rows(rows, baseline, table, workaround)
}

/// Merge project rows into a baseline document
///
/// Project rows sharing signature values are collapsed first (the last one wins,
/// at the first one's position), so every remaining project row can only match
/// rows that came from the baseline. Fails with [`Error::AmbiguousSignature`] as
/// soon as a project row matches more than one baseline row.
pub fn merge_rows(
    project_rows: Vec<Row>,
    mut baseline: TabularDocument,
    table: &TableSignature,
    workaround: &WorkaroundConfig,
) -> Result<MergedTable> {
    let columns = table.attributes.columns();
    let mut report = MergeReport::default();

    for project_row in collapse_repeats(project_rows, &columns) {
        let matches: Vec<usize> = baseline
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                entry
                    .row()
                    .is_some_and(|row| signature_matches(&project_row, row, &columns))
            })
            .map(|(index, _)| index)
            .collect();

        let index = match matches.as_slice() {
            [] => {
                debug!(key = %describe_key(&project_row, &columns), "adding new row");
                baseline.entries.push(Entry::Row(project_row));
                report.added += 1;
                continue;
            }
            [index] => *index,
            _ => {
                return Err(Error::AmbiguousSignature {
                    table: baseline.source_name.clone(),
                    key: describe_key(&project_row, &columns),
                    count: matches.len(),
                })
            }
        };

        let differing: Vec<String> = match baseline.entries[index].row() {
            Some(existing) => project_row
                .attributes
                .diff(&existing.attributes)
                .into_iter()
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        if differing.is_empty() {
            debug!(key = %describe_key(&project_row, &columns), "dropping no-op duplicate row");
            baseline.entries.remove(index);
            report.duplicates_removed += 1;
            continue;
        }

        let offending = workaround_columns(&project_row, &differing, table, workaround);
        if offending.is_empty() {
            baseline.entries[index] = Entry::Row(project_row);
            report.replaced += 1;
            continue;
        }

        let key = describe_key(&project_row, &columns);
        let mut patched = project_row.clone();
        for column in &offending {
            patched.attributes.set(column.as_str(), workaround.sentinel.as_str());
        }
        let marker = comment_safe(&format!(
            " workaround: [{}] duplicated with {} set to {} ",
            key,
            offending.join(", "),
            workaround.sentinel
        ));
        info!(table = %baseline.source_name, key = %key, columns = ?offending, "inserting workaround row");

        baseline.entries[index] = Entry::Row(project_row);
        baseline.entries.insert(
            index,
            Entry::Workaround {
                marker,
                row: patched,
            },
        );
        report.replaced += 1;
        report.workarounds_inserted += 1;
    }

    if report.duplicates_removed > 0 {
        info!(
            table = %baseline.source_name,
            count = report.duplicates_removed,
            "removed no-op duplicate rows"
        );
    }

    Ok(MergedTable {
        document: baseline,
        report,
    })
}

/// Keep one project row per signature, the last one given
///
/// Rows missing a signature column are never collapsed.
fn collapse_repeats(rows: Vec<Row>, columns: &[&str]) -> Vec<Row> {
    let mut collapsed: Vec<Row> = Vec::with_capacity(rows.len());
    let mut seen: HashMap<Vec<String>, usize> = HashMap::new();

    for row in rows {
        let key: Option<Vec<String>> = columns
            .iter()
            .map(|column| row.attribute(column).map(str::to_string))
            .collect();
        let Some(key) = key else {
            collapsed.push(row);
            continue;
        };
        match seen.entry(key) {
            hash_map::Entry::Occupied(slot) => {
                debug!(key = %describe_key(&row, columns), "project row repeated, keeping the last");
                collapsed[*slot.get()] = row;
            }
            hash_map::Entry::Vacant(slot) => {
                slot.insert(collapsed.len());
                collapsed.push(row);
            }
        }
    }
    collapsed
}

/// All signature columns must be present on the project row and equal on both rows
fn signature_matches(project: &Row, baseline: &Row, columns: &[&str]) -> bool {
    columns.iter().all(|column| match project.attribute(column) {
        Some(value) => baseline.attribute(column) == Some(value),
        None => false,
    })
}

/// Differing float columns whose project value falls below the threshold
fn workaround_columns(
    project: &Row,
    differing: &[String],
    table: &TableSignature,
    workaround: &WorkaroundConfig,
) -> Vec<String> {
    if !workaround.enabled {
        return Vec::new();
    }
    differing
        .iter()
        .filter(|column| table.column_kind(column) == ColumnKind::Float)
        .filter(|column| {
            project
                .attribute(column)
                .and_then(|value| value.trim().parse::<f64>().ok())
                .is_some_and(|value| value < workaround.threshold)
        })
        .cloned()
        .collect()
}

fn describe_key(row: &Row, columns: &[&str]) -> String {
    columns
        .iter()
        .map(|column| format!("{}={}", column, row.attribute(column).unwrap_or("<missing>")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// XML comments may not contain `--`
fn comment_safe(text: &str) -> String {
    let mut safe = text.to_string();
    while safe.contains("--") {
        safe = safe.replace("--", "- -");
    }
    safe
}
