//! Batch driver: resolve, read, merge and write one table at a time
//!
//! Configuration gaps and ambiguous baselines stop the batch. Any other
//! failure is recorded against its table and the next table is processed.

use crate::archive::ArchiveCache;
use crate::catalog::{fix_slashes, SignatureCatalog};
use crate::error::{Error, Result};
use crate::merger::{merge_documents, MergeReport};
use crate::parser::{parse_table, parse_table_bytes};
use crate::report::{Phase, RunReport, TableOutcome, TableRecord, TableStats};
use crate::strings::{merge_string_documents, StringMergeReport};
use crate::writer::{write_document, WriteMode};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Row element of localization string tables
pub const LOCALIZATION_ROW: &str = "Row";

/// One project table to patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableJob {
    /// The project's copy of the table
    pub project_path: PathBuf,
    /// Path relative to the project's Data directory, or `<folder>/<file>` for
    /// localization tables
    pub relative_path: String,
    /// Where the merged document goes
    pub output_path: PathBuf,
}

impl TableJob {
    pub fn new(
        project_path: impl Into<PathBuf>,
        relative_path: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_path: project_path.into(),
            relative_path: fix_slashes(&relative_path.into()),
            output_path: output_path.into(),
        }
    }
}

/// Locations of the shipped archives inside a game installation
#[derive(Debug, Clone)]
pub struct GameLayout {
    root: PathBuf,
}

impl GameLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<game>/Data/<archive>`
    pub fn data_archive(&self, archive: &str) -> PathBuf {
        self.root.join("Data").join(archive)
    }

    /// `<game>/Localization/<folder>.pak`
    pub fn localization_archive(&self, folder: &str) -> PathBuf {
        self.root.join("Localization").join(format!("{}.pak", folder))
    }
}

/// Patches project tables against the baseline archives of a game
pub struct Patcher {
    catalog: SignatureCatalog,
    layout: GameLayout,
    cache: ArchiveCache,
}

impl Patcher {
    pub fn new(catalog: SignatureCatalog, layout: GameLayout) -> Self {
        Self {
            catalog,
            layout,
            cache: ArchiveCache::new(),
        }
    }

    pub fn catalog(&self) -> &SignatureCatalog {
        &self.catalog
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    /// Merge every data table job, recording outcomes in `report`
    ///
    /// Returns early with the error when it halts the run.
    pub fn patch_data(&mut self, jobs: &[TableJob], report: &mut RunReport) -> Result<()> {
        let result = self.run_phase(Phase::Data, jobs, report);
        self.cache.close_all();
        result
    }

    /// Merge every localization job, recording outcomes in `report`
    pub fn patch_localization(&mut self, jobs: &[TableJob], report: &mut RunReport) -> Result<()> {
        let result = self.run_phase(Phase::Localization, jobs, report);
        self.cache.close_all();
        result
    }

    fn run_phase(&mut self, phase: Phase, jobs: &[TableJob], report: &mut RunReport) -> Result<()> {
        for job in jobs {
            let result = match phase {
                Phase::Data => self.patch_data_table(job),
                Phase::Localization => self.patch_localization_table(job),
            };

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) if e.halts_run() => {
                    error!(table = %job.relative_path, "{}", e);
                    return Err(e);
                }
                Err(e) => {
                    error!(table = %job.relative_path, "{}", e);
                    TableOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };

            report.record(TableRecord {
                phase,
                table: job.relative_path.clone(),
                output: job.output_path.clone(),
                outcome,
            });
        }
        Ok(())
    }

    fn patch_data_table(&mut self, job: &TableJob) -> Result<TableOutcome> {
        let table = self.catalog.resolve_signature(&job.relative_path)?;
        let source = self.catalog.resolve_baseline_source(&job.relative_path)?;
        let archive = self.layout.data_archive(&source.archive);

        info!(table = %job.relative_path, archive = %source.archive, "patching data table");

        let bytes = self.cache.read_member(&archive, &source.member)?;
        let baseline = parse_table_bytes(&bytes, &source.member, &table.element)?;
        let project = parse_table(&job.project_path, &table.element)?;

        let merged = merge_documents(project, baseline, table, self.catalog.workaround())?;
        write_document(&merged.document, &job.output_path, WriteMode::Data)?;

        log_data_report(&job.relative_path, &merged.report);
        Ok(TableOutcome::Patched {
            stats: TableStats::Data(merged.report),
        })
    }

    fn patch_localization_table(&mut self, job: &TableJob) -> Result<TableOutcome> {
        let (folder, file_name) = match job.relative_path.split_once('/') {
            Some((folder, rest)) => (folder, rest.rsplit('/').next().unwrap_or(rest)),
            None => {
                return Ok(skipped(
                    &job.relative_path,
                    "localization tables must live in a language folder".to_string(),
                ))
            }
        };

        if !self.catalog.is_localization_table(file_name) {
            return Ok(skipped(
                &job.relative_path,
                format!("'{}' is not a configured localization table", file_name),
            ));
        }

        let archive = self.layout.localization_archive(folder);
        if !archive.is_file() {
            return Ok(skipped(
                &job.relative_path,
                format!("cannot find localization archive '{}'", archive.display()),
            ));
        }

        info!(table = %job.relative_path, archive = %archive.display(), "patching localization table");

        let bytes = match self.cache.read_member(&archive, file_name) {
            Ok(bytes) => bytes,
            Err(e @ Error::MemberNotFound { .. }) => return Ok(skipped(&job.relative_path, e.to_string())),
            Err(e) => return Err(e),
        };
        let baseline = parse_table_bytes(&bytes, file_name, LOCALIZATION_ROW)?;
        let project = parse_table(&job.project_path, LOCALIZATION_ROW)?;

        let merged = merge_string_documents(project, baseline)?;
        write_document(&merged.document, &job.output_path, WriteMode::Localization)?;

        log_string_report(&job.relative_path, &merged.report);
        Ok(TableOutcome::Patched {
            stats: TableStats::Strings(merged.report),
        })
    }
}

fn skipped(table: &str, reason: String) -> TableOutcome {
    warn!(table = %table, "skipping: {}", reason);
    TableOutcome::Skipped { reason }
}

fn log_data_report(table: &str, report: &MergeReport) {
    info!(
        table = %table,
        added = report.added,
        replaced = report.replaced,
        duplicates = report.duplicates_removed,
        workarounds = report.workarounds_inserted,
        "patched"
    );
}

fn log_string_report(table: &str, report: &StringMergeReport) {
    info!(
        table = %table,
        rows = report.project_rows,
        kept = report.baseline_kept,
        overridden = report.baseline_overridden,
        "patched"
    );
}
