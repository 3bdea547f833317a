//! Backup Job Runner: one table, source to artifact.
//!
//! A job allocates the artifact path, streams the table from the
//! [`DataSource`] straight into the format's [`ArtifactWriter`], and closes the
//! file. Any failure along the way aborts only this table; the partially
//! written file, if one was created, is removed before the error is returned.

use crate::artifact::{Clock, artifact_dir, artifact_path};
use crate::config::{BackupConfig, validate_table_name};
use crate::error::{BackupError, Result};
use crate::format::BackupFormat;
use crate::io::ArtifactWriter;
use crate::source::{DataSource, ReadMode};
use std::fs;
use std::path::{Path, PathBuf};

/// A finished artifact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobOutcome {
    pub table: String,
    pub format: BackupFormat,
    pub path: PathBuf,
    pub rows: u64,
    pub batches: u64,
}

/// Runs table backups under one configuration.
pub struct BackupJob<'a> {
    config: &'a BackupConfig,
    clock: &'a dyn Clock,
}

impl<'a> BackupJob<'a> {
    pub fn new(config: &'a BackupConfig, clock: &'a dyn Clock) -> Self {
        Self { config, clock }
    }

    /// Back up `table` in `format` and return the artifact.
    ///
    /// # Errors
    /// Returns the source, schema, or write error that stopped the job. No
    /// artifact is left on disk in that case. A table name that is not a
    /// single path component is a [`BackupError::Config`].
    pub fn run(
        &self,
        source: &dyn DataSource,
        table: &str,
        format: BackupFormat,
    ) -> Result<JobOutcome> {
        validate_table_name(table)?;
        let mode = self.config.read_mode(table)?;
        let dir = artifact_dir(
            &self.config.backup_root,
            format,
            self.clock.today(),
            self.config.date_folder,
        );
        fs::create_dir_all(&dir)?;
        let (path, _) = artifact_path(&dir, table, format, self.clock.now());
        tracing::info!(table, %format, path = %path.display(), ?mode, "backup started");

        match format {
            #[cfg(feature = "io-parquet")]
            BackupFormat::Columnar => {
                let writer = crate::io::parquet::ParquetSink::new(path);
                run_with(source, table, format, mode, writer)
            }
            #[cfg(feature = "io-avro")]
            BackupFormat::Row => {
                let writer = crate::io::avro::AvroSink::new(table, path);
                run_with(source, table, format, mode, writer)
            }
            #[allow(unreachable_patterns)]
            other => Err(BackupError::Config(format!(
                "{other} backups need the crate feature for {}",
                other.extension()
            ))),
        }
    }
}

/// Drive `source` into `writer`, cleaning up the artifact on failure.
///
/// The partial file is also removed when the source or writer panics, so a
/// caller that catches the unwind never finds a truncated artifact.
pub fn run_with<W: ArtifactWriter>(
    source: &dyn DataSource,
    table: &str,
    format: BackupFormat,
    mode: ReadMode,
    writer: W,
) -> Result<JobOutcome> {
    let mut partial = PartialArtifact::new(writer.path());
    // declared after the guard so the file is closed before it is removed
    let mut writer = writer;
    let scan = source.scan(table, mode, &mut writer)?;
    let stats = writer.finish()?;
    let path = partial.keep();

    tracing::info!(
        table,
        %format,
        path = %path.display(),
        rows = stats.rows,
        batches = scan.batches,
        "artifact written"
    );
    Ok(JobOutcome {
        table: table.to_string(),
        format,
        path,
        rows: stats.rows,
        batches: scan.batches,
    })
}

/// Removes the artifact on drop unless the job completed.
struct PartialArtifact {
    path: PathBuf,
    done: bool,
}

impl PartialArtifact {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            done: false,
        }
    }

    fn keep(&mut self) -> PathBuf {
        self.done = true;
        self.path.clone()
    }
}

impl Drop for PartialArtifact {
    fn drop(&mut self) {
        if !self.done {
            discard(&self.path);
        }
    }
}

fn discard(path: &Path) {
    if !path.exists() {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial artifact"),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "could not remove partial artifact");
        }
    }
}
