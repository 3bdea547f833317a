//! # Ironbackup
//!
//! A **table backup pipeline** for Rust. Ironbackup pulls relational tables in
//! bounded-memory chunks, writes each one to a timestamped artifact in a
//! columnar (Parquet) or row-oriented (Avro) format, optionally restores one
//! artifact to CSV to check round-trip fidelity, and records every run in a
//! JSON manifest.
//!
//! ## Key Features
//!
//! - **Streaming backups** - tables travel as [`RowBatch`]es of at most N rows;
//!   a table is never held in memory whole unless asked for
//! - **Two formats** - Parquet with one row group per batch, or Avro with an
//!   inferred nullable schema
//! - **Per-table isolation** - one table failing, or panicking, never stops the run
//! - **Restore check** - re-read the newest columnar artifact and emit CSV
//! - **Manifests** - one JSON summary per day
//! - **Pluggable sources** - implement [`DataSource`]; SQLite ships behind the
//!   `sqlite` feature
//!
//! ## Quick Start
//!
//! ```no_run
//! use ironbackup::config::BackupConfig;
//! use ironbackup::pipeline::{Pipeline, RunRequest};
//! use ironbackup::source::sqlite::SqliteSource;
//! use ironbackup::BackupFormat;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = BackupConfig::new("backups").with_database("hr.sqlite");
//! let source = SqliteSource::open(&config.database)?;
//!
//! let request = RunRequest::from_config(&config)
//!     .with_format(BackupFormat::Row)
//!     .with_tables(["departments", "jobs"])
//!     .with_restore_check(true);
//! let report = Pipeline::new(&config).run(&source, &request)?;
//!
//! for (table, error) in report.failed() {
//!     eprintln!("{table}: {error}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Sources and sinks
//!
//! A [`DataSource`] scans one table and pushes batches into a [`BatchSink`].
//! Every existing table yields at least one batch; an empty table yields one
//! empty batch that still carries its column layout. Row order is not
//! guaranteed.
//!
//! ### Artifacts
//!
//! Artifacts live at `{root}/{format}/{YYYYMMDD}/{table}_{YYYYMMDDHHMMSS}.{ext}`.
//! Writers create the file on the first batch; a failed job removes what it
//! started.
//!
//! ### Runs
//!
//! [`Pipeline::run`](pipeline::Pipeline::run) walks
//! `START -> BACKUP_ALL_TABLES -> [RESTORE_CHECK] -> WRITE_MANIFEST -> DONE`.
//! Only an unreachable data source ends a run early.
//!
//! ## Feature Flags
//!
//! - `io-parquet` - columnar writer, restore check and inspection
//! - `io-avro` - row-format writer
//! - `io-csv` - CSV output of the restore check
//! - `sqlite` - bundled SQLite source
//!
//! All are enabled by default.

pub mod artifact;
pub mod batch;
pub mod config;
pub mod error;
pub mod format;
pub mod inventory;
pub mod io;
pub mod job;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod restore;
pub mod schema;
pub mod source;
pub mod testing;

pub use artifact::{ArtifactName, Clock, SystemClock};
pub use batch::{Column, ColumnType, RowBatch, Value};
pub use config::BackupConfig;
pub use error::{BackupError, Result};
pub use format::BackupFormat;
pub use job::{BackupJob, JobOutcome};
pub use manifest::{Manifest, RestoreCheck};
pub use pipeline::{Pipeline, RunReport, RunRequest, RunStage};
pub use restore::{RestoreReport, restore_artifact};
pub use source::{BatchSink, DataSource, ReadMode};

#[cfg(feature = "io-parquet")]
pub use io::parquet::{ParquetSink, read_parquet_batches};

#[cfg(feature = "io-avro")]
pub use io::avro::AvroSink;
