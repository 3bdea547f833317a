//! Ironbackup command line.
//!
//! Without a subcommand, runs the backup pipeline over the configured tables.
//! Settings come from the environment (and an optional `.env`), with flags on
//! top.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ironbackup::config::{BackupConfig, split_list};
use ironbackup::inventory::{self, DEFAULT_LIST_LIMIT, Inspection};
use ironbackup::logging::init_logging;
use ironbackup::pipeline::{Pipeline, RestoreOutcome, RunReport, RunRequest};
use ironbackup::source::sqlite::SqliteSource;
use ironbackup::BackupFormat;
use std::path::PathBuf;

/// Back up relational tables to Parquet or Avro.
#[derive(Parser, Debug)]
#[command(name = "ironbackup")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Artifact format
    #[arg(long, value_enum)]
    format: Option<BackupFormat>,

    /// Comma-separated tables, backed up in order
    #[arg(long)]
    tables: Option<String>,

    /// Restore the first table's newest artifact to CSV after the backup
    #[arg(long)]
    with_restore_check: bool,

    /// Rows per batch
    #[arg(long)]
    chunksize: Option<usize>,

    /// Backup root directory
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Write artifacts directly under {out}/{format}
    #[arg(long)]
    no_date_folder: bool,

    /// Read every table as one batch
    #[arg(long)]
    single_batch: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the most recent artifacts
    List {
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: usize,
    },

    /// Check columnar artifacts and preview their first rows
    Inspect {
        /// One artifact; all columnar artifacts under the backup root if omitted
        file: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = BackupConfig::from_env().context("reading configuration")?;
    if let Some(out) = &cli.out {
        config = config.with_backup_root(out);
    }
    init_logging(&config.log_dir).context("setting up logging")?;

    match &cli.command {
        Some(Command::List { limit }) => list(&config, *limit),
        Some(Command::Inspect { file }) => inspect(&config, file.as_deref()),
        None => backup(&cli, config),
    }
}

fn backup(cli: &Cli, mut config: BackupConfig) -> Result<()> {
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(tables) = &cli.tables {
        config.tables = split_list(tables);
    }
    if let Some(n) = cli.chunksize {
        config.chunk_size = n;
    }
    if cli.no_date_folder {
        config.date_folder = false;
    }
    if cli.single_batch {
        config.single_batch_tables = config.tables.clone();
    }
    config.validate()?;

    let source = SqliteSource::open(&config.database)
        .with_context(|| format!("opening database {}", config.database.display()))?;
    let request = RunRequest::from_config(&config).with_restore_check(cli.with_restore_check);
    let report = Pipeline::new(&config)
        .run(&source, &request)
        .context("backup run aborted")?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("Backup run ({})", report.format);
    for t in &report.tables {
        match &t.result {
            Ok(job) => println!(
                "  ok    {:<20} {} rows, {} batches -> {}",
                t.table,
                job.rows,
                job.batches,
                job.path.display()
            ),
            Err(e) => println!("  FAIL  {:<20} {e}", t.table),
        }
    }
    match &report.restore {
        Some(RestoreOutcome::Restored { table, report }) => println!(
            "Restore check {table}: {} rows, columns {:?} -> {}",
            report.rows,
            report.columns,
            report.output.display()
        ),
        Some(RestoreOutcome::Skipped { table, reason }) => {
            println!("Restore check {table}: skipped ({reason})");
        }
        Some(RestoreOutcome::Failed { table, error }) => {
            println!("Restore check {table}: failed ({error})");
        }
        None => {}
    }
    match &report.manifest {
        Ok(path) => println!("Manifest: {}", path.display()),
        Err(e) => println!("Manifest: not written ({e})"),
    }
}

fn list(config: &BackupConfig, limit: usize) -> Result<()> {
    let entries = inventory::list_backups(&config.backup_root, limit)?;
    if entries.is_empty() {
        println!("No backups under {}", config.backup_root.display());
        return Ok(());
    }
    println!("Recent backups");
    println!("{}", "=".repeat(50));
    for e in entries {
        println!("{}", e.name);
        println!("   path:     {}", e.path.display());
        println!("   modified: {}", e.modified.format("%Y-%m-%d %H:%M:%S"));
        println!("   size:     {:.2} KB", e.size_kb);
        println!("   format:   {}", e.format.extension().to_uppercase());
        println!("{}", "-".repeat(50));
    }
    Ok(())
}

fn inspect(config: &BackupConfig, file: Option<&std::path::Path>) -> Result<()> {
    let found = match file {
        Some(f) => vec![inventory::inspect_artifact(f)],
        None => inventory::inspect_all(&config.backup_root)?,
    };
    if found.is_empty() {
        println!("No columnar artifacts under {}", config.backup_root.display());
    }
    for i in &found {
        print_inspection(i);
    }
    Ok(())
}

fn print_inspection(i: &Inspection) {
    println!("\n{}", i.path.display());
    match &i.result {
        Ok(s) => {
            println!("   valid");
            println!("   rows:    {} in {} row groups", s.rows, s.row_groups);
            println!("   columns: {:?}", s.columns);
            println!("   {}", s.columns.join(" | "));
            for row in s.preview.rows() {
                let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                println!("   {}", cells.join(" | "));
            }
        }
        Err(e) => println!("   unreadable: {e}"),
    }
}
