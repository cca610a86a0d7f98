//! Merge engine for localization string tables
//!
//! Rows are `(key, source text, translated text)` cells. Project rows replace
//! baseline rows by key, and the result is sorted by cell text so output is
//! deterministic.

use crate::error::{Error, Result};
use crate::table::{Entry, Node, Row, TabularDocument};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Per-table string merge diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringMergeReport {
    /// Rows supplied by the project
    pub project_rows: usize,
    /// Project rows that only had key and source text
    pub expanded: usize,
    /// Baseline rows carried over
    pub baseline_kept: usize,
    /// Baseline rows dropped because the project defines the key
    pub baseline_overridden: usize,
}

/// A merged string table with its diagnostics
#[derive(Debug, Clone)]
pub struct MergedStrings {
    pub document: TabularDocument,
    pub report: StringMergeReport,
}

/// Merge a project string table into its baseline document
///
/// The baseline document supplies the wrapper elements; its rows container
/// ends up holding only the sorted rows.
pub fn merge_string_documents(
    mut project: TabularDocument,
    mut baseline: TabularDocument,
) -> Result<MergedStrings> {
    let project_rows = project.take_rows();
    if project_rows.is_empty() {
        return Err(Error::NoRows(project.source_name));
    }
    let baseline_rows = baseline.take_rows();
    let merged = merge_string_rows(project_rows, baseline_rows, &baseline.source_name)?;

    baseline.entries = merged.rows.into_iter().map(Entry::Row).collect();
    Ok(MergedStrings {
        document: baseline,
        report: merged.report,
    })
}

/// Sorted rows produced by [`merge_string_rows`]
#[derive(Debug, Clone)]
pub struct StringRows {
    pub rows: Vec<Row>,
    pub report: StringMergeReport,
}

/// Merge project string rows over baseline rows
pub fn merge_string_rows(
    project_rows: Vec<Row>,
    baseline_rows: Vec<Row>,
    table: &str,
) -> Result<StringRows> {
    let mut report = StringMergeReport {
        project_rows: project_rows.len(),
        ..StringMergeReport::default()
    };

    let mut rows = Vec::with_capacity(project_rows.len() + baseline_rows.len());
    for row in project_rows {
        let (row, expanded) = normalize_row(row, table)?;
        if expanded {
            report.expanded += 1;
        }
        rows.push(row);
    }

    let keys: HashSet<String> = rows.iter().map(|row| canonical(&row_key(row))).collect();

    for row in baseline_rows {
        let (mut row, _) = normalize_row(row, table)?;
        for cell in row.child_elements_mut() {
            let text = canonical(&cell.text());
            cell.set_text(&text);
        }
        if keys.contains(&row_key(&row)) {
            report.baseline_overridden += 1;
            continue;
        }
        report.baseline_kept += 1;
        rows.push(row);
    }

    rows.sort_by_cached_key(cell_texts);

    debug!(
        table = %table,
        project = report.project_rows,
        kept = report.baseline_kept,
        overridden = report.baseline_overridden,
        "merged string table"
    );
    Ok(StringRows { rows, report })
}

/// Bring a row to exactly three cells, cloning the source text when the
/// translation is missing
fn normalize_row(mut row: Row, table: &str) -> Result<(Row, bool)> {
    let cells = row.child_elements().count();
    match cells {
        3 => Ok((row, false)),
        2 => {
            let source = row.child_elements().nth(1).cloned();
            if let Some(source) = source {
                row.children.push(Node::Element(source));
            }
            Ok((row, true))
        }
        _ => Err(Error::MalformedStringRow {
            table: table.to_string(),
            key: row_key(&row),
            cells,
        }),
    }
}

fn row_key(row: &Row) -> String {
    row.child_elements().next().map(|cell| cell.text()).unwrap_or_default()
}

fn cell_texts(row: &Row) -> Vec<String> {
    row.child_elements().map(|cell| cell.text()).collect()
}

/// Collapse whitespace runs to one space and trim
fn canonical(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_table_str;
    use pretty_assertions::assert_eq;

    fn doc(rows: &str) -> TabularDocument {
        parse_table_str(&format!("<Table>{}</Table>", rows), "text_ui_items.xml", "Row").unwrap()
    }

    fn texts(document: &TabularDocument) -> Vec<Vec<String>> {
        document.rows().map(cell_texts).collect()
    }

    fn row(cells: &[&str]) -> String {
        let cells: String = cells.iter().map(|c| format!("<Cell>{}</Cell>", c)).collect();
        format!("<Row>{}</Row>", cells)
    }

    #[test]
    fn test_project_text_wins() {
        let project = doc(&row(&["K1", "New", "Nove"]));
        let baseline = doc(&format!("{}{}", row(&["K1", "Old", "Stare"]), row(&["K0", "Keep", "Drz"])));

        let merged = merge_string_documents(project, baseline).unwrap();

        assert_eq!(
            texts(&merged.document),
            vec![vec!["K0", "Keep", "Drz"], vec!["K1", "New", "Nove"]]
        );
        assert_eq!(
            merged.report,
            StringMergeReport {
                project_rows: 1,
                expanded: 0,
                baseline_kept: 1,
                baseline_overridden: 1,
            }
        );
    }

    #[test]
    fn test_two_cell_row_is_expanded() {
        let merged = merge_string_documents(doc(&row(&["K2", "Hello"])), doc("")).unwrap();

        assert_eq!(texts(&merged.document), vec![vec!["K2", "Hello", "Hello"]]);
        assert_eq!(merged.report.expanded, 1);
    }

    #[test]
    fn test_output_is_sorted_by_cells() {
        let project = doc(&format!(
            "{}{}",
            row(&["b", "2", "2"]),
            row(&["B", "1", "1"])
        ));
        let baseline = doc(&format!(
            "{}{}{}",
            row(&["a", "z", "z"]),
            row(&["a", "y", "y"]),
            row(&["c", "0", "0"])
        ));

        let merged = merge_string_documents(project, baseline).unwrap();
        let rows = texts(&merged.document);

        assert!(rows.windows(2).all(|pair| pair[0] <= pair[1]));
        // ordinal comparison puts upper case first
        assert_eq!(rows[0][0], "B");
        assert_eq!(rows.len(), 5);
    }

    #[test]
    fn test_baseline_whitespace_is_collapsed() {
        let baseline = doc(&row(&["  K3 ", "two   words\n here", "\tx "]));
        let merged = merge_string_documents(doc(&row(&["K9", "a", "a"])), baseline).unwrap();

        assert_eq!(texts(&merged.document)[0], vec!["K3", "two words here", "x"]);
    }

    #[test]
    fn test_override_matches_canonical_key() {
        let baseline = doc(&row(&[" K1 ", "Old", "Old"]));
        let merged = merge_string_documents(doc(&row(&["K1", "New", "New"])), baseline).unwrap();

        assert_eq!(texts(&merged.document), vec![vec!["K1", "New", "New"]]);
    }

    #[test]
    fn test_malformed_row() {
        let err = merge_string_documents(doc(&row(&["only"])), doc("")).unwrap_err();
        assert!(matches!(err, Error::MalformedStringRow { cells: 1, ref key, .. } if key == "only"));

        let err = merge_string_documents(doc(&row(&["K", "1", "2", "3"])), doc("")).unwrap_err();
        assert!(matches!(err, Error::MalformedStringRow { cells: 4, .. }));
    }

    #[test]
    fn test_canonical() {
        assert_eq!(canonical("  a \n\t b  "), "a b");
        assert_eq!(canonical("   "), "");
    }
}
