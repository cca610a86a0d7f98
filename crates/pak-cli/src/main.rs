//! PAK Patcher CLI
//!
//! Command-line tool for merging mod data tables and localization string tables
//! against the baseline copies shipped in game PAK archives.

use clap::{Parser, Subcommand};
use pak_core::catalog::fix_slashes;
use pak_core::{
    merge_documents, parse_table, write_document, CatalogConfig, GameLayout, Patcher, RunReport,
    SignatureCatalog, TableJob, TableOutcome, TableStats, WriteMode,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "pak-cli")]
#[command(about = "Patch mod tables against game PAK archives", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch every data and localization table of a project
    Patch {
        /// Project directory (holds Data/ and Localization/)
        #[arg(short, long)]
        project: PathBuf,

        /// Game installation directory
        #[arg(short, long)]
        game: PathBuf,

        /// Catalog configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Output directory for merged tables
        #[arg(short, long)]
        output: PathBuf,

        /// Write a JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Merge one data table against a loose baseline file
    Merge {
        /// Project copy of the table
        #[arg(short, long)]
        project: PathBuf,

        /// Baseline copy of the table
        #[arg(short, long)]
        baseline: PathBuf,

        /// Catalog configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Table path used for the signature lookup (e.g. Libs/Tables/rpg/buff.xml)
        #[arg(short, long)]
        table: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show how the catalog resolves a table path
    Resolve {
        /// Catalog configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Path relative to the data root
        #[arg(short, long)]
        path: String,
    },

    /// Parse and display a single table file
    Parse {
        /// Path to the XML file
        #[arg(short, long)]
        file: PathBuf,

        /// Row element name
        #[arg(short, long, default_value = "row")]
        element: String,

        /// Maximum number of rows to display
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Create a catalog configuration template
    CreateConfig {
        /// Output path for the configuration file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over `--verbose` when set
fn init_logging(verbose: bool) {
    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    match EnvFilter::try_from_default_env() {
        Ok(filter) => builder.with_env_filter(filter).init(),
        Err(_) => {
            let level = if verbose { Level::DEBUG } else { Level::INFO };
            builder.with_max_level(level).init()
        }
    }
}

fn run(command: Commands) -> pak_core::Result<()> {
    match command {
        Commands::Patch {
            project,
            game,
            config,
            output,
            report,
        } => cmd_patch(&project, &game, &config, &output, report.as_deref()),
        Commands::Merge {
            project,
            baseline,
            config,
            table,
            output,
        } => cmd_merge(&project, &baseline, &config, &table, &output),
        Commands::Resolve { config, path } => cmd_resolve(&config, &path),
        Commands::Parse { file, element, limit } => cmd_parse(&file, &element, limit),
        Commands::CreateConfig { output } => cmd_create_config(&output),
    }
}

fn cmd_patch(
    project: &Path,
    game: &Path,
    config: &Path,
    output: &Path,
    report_path: Option<&Path>,
) -> pak_core::Result<()> {
    let catalog = SignatureCatalog::load(config)?;
    info!(
        signatures = catalog.config().signatures.len(),
        packages = catalog.config().packages.len(),
        "loaded catalog"
    );

    let data_jobs = discover_data_jobs(project, output, &catalog);
    let localization_jobs = discover_localization_jobs(project, output, &catalog);
    println!(
        "Found {} data table(s) and {} localization table(s)",
        data_jobs.len(),
        localization_jobs.len()
    );

    let mut patcher = Patcher::new(catalog, GameLayout::new(game));
    let mut report = RunReport::new();
    patcher.patch_data(&data_jobs, &mut report)?;
    patcher.patch_localization(&localization_jobs, &mut report)?;

    print_report(&report);

    if let Some(path) = report_path {
        report.save(path)?;
        println!("Report written to {}", path.display());
    }

    if !report.is_success() {
        eprintln!("{} table(s) failed", report.failed_count());
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_merge(project: &Path, baseline: &Path, config: &Path, table: &str, output: &Path) -> pak_core::Result<()> {
    let catalog = SignatureCatalog::load(config)?;
    let signature = catalog.resolve_signature(table)?;

    let project_doc = parse_table(project, &signature.element)?;
    let baseline_doc = parse_table(baseline, &signature.element)?;
    let merged = merge_documents(project_doc, baseline_doc, signature, catalog.workaround())?;

    write_document(&merged.document, output, WriteMode::Data)?;

    println!("Merged {} rows into {}", merged.document.row_count(), output.display());
    println!("{}", serde_json::to_string_pretty(&merged.report)?);
    Ok(())
}

fn cmd_resolve(config: &Path, path: &str) -> pak_core::Result<()> {
    let catalog = SignatureCatalog::load(config)?;

    println!("Path: {}", fix_slashes(path));
    if catalog.is_excluded(path) {
        println!("Excluded: yes");
    }

    let signature = catalog.resolve_signature(path)?;
    println!("Signature entry: {}", signature.path);
    println!("Key columns: {}", signature.attributes.columns().join(", "));
    println!("Row element: {}", signature.element);
    for (column, kind) in &signature.columns {
        println!("  {}: {:?}", column, kind);
    }

    match catalog.resolve_baseline_source(path) {
        Ok(source) => {
            println!("Archive: {}", source.archive);
            println!("Member: {}", source.member);
        }
        Err(e) => println!("Archive: {}", e),
    }

    Ok(())
}

fn cmd_parse(file: &Path, element: &str, limit: usize) -> pak_core::Result<()> {
    let document = parse_table(file, element)?;

    println!("File: {}", file.display());
    println!("Root: <{}>", document.root.name);
    println!("Rows: {}", document.row_count());
    println!();

    for row in document.rows().take(limit) {
        let values: Vec<String> = if row.attributes.is_empty() {
            row.child_elements().map(|cell| cell.text()).collect()
        } else {
            row.attributes
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect()
        };
        println!("{}", values.join("\t"));
    }

    if document.row_count() > limit {
        println!("... ({} more rows)", document.row_count() - limit);
    }

    Ok(())
}

fn cmd_create_config(output: &Path) -> pak_core::Result<()> {
    let config = CatalogConfig::template();
    config.save(output)?;

    println!("Created catalog configuration: {}", output.display());
    println!("Signatures: {}", config.signatures.len());
    println!("Packages: {}", config.packages.len());
    println!();
    println!("Edit the file to describe your tables, then run:");
    println!(
        "  pak-cli patch --project <dir> --game <dir> --config {} --output <dir>",
        output.display()
    );

    Ok(())
}

/// XML files under `<project>/Data` that are not excluded, in path order
fn discover_data_jobs(project: &Path, output: &Path, catalog: &SignatureCatalog) -> Vec<TableJob> {
    let data_dir = project.join("Data");
    if !data_dir.is_dir() {
        warn!(path = %data_dir.display(), "project has no Data directory");
        return Vec::new();
    }

    let mut jobs = Vec::new();
    for entry in WalkDir::new(&data_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_xml(path) {
            continue;
        }
        let Some(relative) = relative_path(&data_dir, path) else {
            continue;
        };
        if catalog.is_excluded(&relative) {
            info!(table = %relative, "excluded");
            continue;
        }
        jobs.push(TableJob::new(path, relative.as_str(), output.join("Data").join(&relative)));
    }
    jobs
}

/// Configured string tables under `<project>/Localization/<folder>/`
fn discover_localization_jobs(project: &Path, output: &Path, catalog: &SignatureCatalog) -> Vec<TableJob> {
    let root = project.join("Localization");
    if !root.is_dir() {
        return Vec::new();
    }

    let mut jobs = Vec::new();
    for entry in WalkDir::new(&root)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let is_table = entry.file_type().is_file()
            && path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| catalog.is_localization_table(name));
        if !is_table {
            continue;
        }
        if let Some(relative) = relative_path(&root, path) {
            jobs.push(TableJob::new(path, relative.as_str(), output.join("Localization").join(&relative)));
        }
    }
    jobs
}

fn is_xml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(root)
        .ok()
        .map(|p| fix_slashes(&p.to_string_lossy()))
}

fn print_report(report: &RunReport) {
    println!();
    for record in &report.tables {
        match &record.outcome {
            TableOutcome::Patched {
                stats: TableStats::Data(stats),
            } => println!(
                "  patched  {} (+{} added, {} replaced, {} duplicates, {} workarounds)",
                record.table, stats.added, stats.replaced, stats.duplicates_removed, stats.workarounds_inserted
            ),
            TableOutcome::Patched {
                stats: TableStats::Strings(stats),
            } => println!(
                "  patched  {} ({} project rows, {} kept, {} overridden)",
                record.table, stats.project_rows, stats.baseline_kept, stats.baseline_overridden
            ),
            TableOutcome::Skipped { reason } => println!("  skipped  {}: {}", record.table, reason),
            TableOutcome::Failed { error } => println!("  FAILED   {}: {}", record.table, error),
        }
    }

    let data = report.data_totals();
    println!();
    println!("Run complete:");
    println!("  {} patched, {} skipped, {} failed", report.patched_count(), report.skipped_count(), report.failed_count());
    println!(
        "  {} rows added, {} replaced, {} duplicates removed, {} workaround rows",
        data.added, data.replaced, data.duplicates_removed, data.workarounds_inserted
    );
    let strings = report.string_totals();
    if strings.project_rows > 0 {
        println!("  {} string rows merged", strings.project_rows);
    }
}
