//! Pipeline Orchestrator.
//!
//! One run walks a fixed, linear sequence of stages:
//!
//! ```text
//! START -> BACKUP_ALL_TABLES -> [RESTORE_CHECK] -> WRITE_MANIFEST -> DONE
//!   \-> FAILED   (data source unreachable; nothing written)
//! ```
//!
//! Tables are backed up one at a time, in the requested order. Each table's job
//! is an isolated unit of work: its error (or panic) is captured as a value in
//! the [`RunReport`] and the run moves on. The only run-aborting condition is a
//! failed connection probe before the first table.
//!
//! The manifest is always attempted once the backup stage has run, even when
//! every table failed or the restore check was skipped. A manifest write
//! failure is logged and reported; artifacts already on disk stay there.

use crate::artifact::{Clock, SystemClock};
use crate::config::BackupConfig;
use crate::error::{BackupError, Result};
use crate::format::BackupFormat;
use crate::io::glob::latest_artifact;
use crate::job::{BackupJob, JobOutcome};
use crate::manifest::{Manifest, RestoreCheck, write_manifest};
use crate::restore::{RestoreReport, restore_artifact};
use crate::source::DataSource;
use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;

/// Orchestrator stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStage {
    Start,
    BackupAllTables,
    RestoreCheck,
    WriteManifest,
    Done,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStage::Start => "START",
            RunStage::BackupAllTables => "BACKUP_ALL_TABLES",
            RunStage::RestoreCheck => "RESTORE_CHECK",
            RunStage::WriteManifest => "WRITE_MANIFEST",
            RunStage::Done => "DONE",
            RunStage::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// What one run should do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRequest {
    pub format: BackupFormat,
    pub tables: Vec<String>,
    pub with_restore_check: bool,
    pub chunk_size: usize,
}

impl RunRequest {
    /// Format, tables and chunk size from `config`; no restore check.
    #[must_use]
    pub fn from_config(config: &BackupConfig) -> Self {
        Self {
            format: config.format,
            tables: config.tables.clone(),
            with_restore_check: false,
            chunk_size: config.chunk_size,
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: BackupFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables = tables.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_restore_check(mut self, enabled: bool) -> Self {
        self.with_restore_check = enabled;
        self
    }

    #[must_use]
    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n;
        self
    }
}

/// Result of one table's job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableOutcome {
    pub table: String,
    pub result: std::result::Result<JobOutcome, String>,
}

impl TableOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of the optional restore check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored { table: String, report: RestoreReport },
    Skipped { table: String, reason: String },
    Failed { table: String, error: String },
}

impl RestoreOutcome {
    /// Manifest entry; only a successful restore is recorded.
    #[must_use]
    pub fn to_check(&self) -> Option<RestoreCheck> {
        match self {
            RestoreOutcome::Restored { table, report } => Some(RestoreCheck {
                table: table.clone(),
                backup_file: report.artifact.clone(),
                restored_files: vec![report.output.clone()],
            }),
            _ => None,
        }
    }
}

/// Everything a finished run did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub format: BackupFormat,
    pub tables: Vec<TableOutcome>,
    pub restore: Option<RestoreOutcome>,
    pub manifest: std::result::Result<PathBuf, String>,
}

impl RunReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &JobOutcome> {
        self.tables.iter().filter_map(|t| t.result.as_ref().ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tables
            .iter()
            .filter_map(|t| t.result.as_ref().err().map(|e| (t.table.as_str(), e.as_str())))
    }

    /// Every table backed up and the manifest written.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.tables.iter().all(TableOutcome::is_ok) && self.manifest.is_ok()
    }
}

/// Runs backups under one immutable configuration.
pub struct Pipeline<'a> {
    config: &'a BackupConfig,
    clock: &'a dyn Clock,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a BackupConfig) -> Self {
        Self {
            config,
            clock: &SystemClock,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: &'a dyn Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Run the full stage sequence against `source`.
    ///
    /// # Errors
    /// Only run-aborting conditions are errors: an invalid request, or a data
    /// source that fails its connection probe. Per-table, restore and manifest
    /// failures are reported inside the [`RunReport`].
    pub fn run(&self, source: &dyn DataSource, req: &RunRequest) -> Result<RunReport> {
        enter(RunStage::Start);
        if req.tables.is_empty() {
            return Err(BackupError::Config("no tables to back up".into()));
        }
        let config = BackupConfig {
            format: req.format,
            tables: req.tables.clone(),
            chunk_size: req.chunk_size,
            ..self.config.clone()
        };
        config.validate()?;

        tracing::info!(
            source = %source.describe(),
            tables = ?req.tables,
            format = %req.format,
            chunk_size = req.chunk_size,
            "pipeline started"
        );
        match source.probe() {
            Ok(version) => tracing::info!(server = %version, "connected"),
            Err(e) => {
                enter(RunStage::Failed);
                tracing::error!(error = %e, "cannot reach data source; aborting run");
                return Err(e);
            }
        }

        enter(RunStage::BackupAllTables);
        let job = BackupJob::new(&config, self.clock);
        let tables: Vec<TableOutcome> = req
            .tables
            .iter()
            .map(|table| run_isolated(&job, source, table, req.format))
            .collect();

        let restore = if req.with_restore_check {
            enter(RunStage::RestoreCheck);
            Some(self.restore_check(&config, &req.tables[0], req.format))
        } else {
            None
        };

        enter(RunStage::WriteManifest);
        let manifest = Manifest::new(
            self.clock.now(),
            req.format,
            req.tables.clone(),
            config.format_dir(req.format),
            restore.as_ref().and_then(RestoreOutcome::to_check),
        );
        let manifest = write_manifest(&config.manifest_dir(), &manifest).map_err(|e| {
            tracing::error!(error = %e, "manifest not written");
            e.to_string()
        });

        enter(RunStage::Done);
        let report = RunReport {
            format: req.format,
            tables,
            restore,
            manifest,
        };
        tracing::info!(
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            "pipeline finished"
        );
        Ok(report)
    }

    /// Restore the newest artifact of `table` in `format`.
    fn restore_check(&self, config: &BackupConfig, table: &str, format: BackupFormat) -> RestoreOutcome {
        let latest = match latest_artifact(&config.format_dir(format), table, format) {
            Ok(Some(path)) => path,
            Ok(None) => {
                let reason = BackupError::ArtifactNotFound {
                    table: table.to_string(),
                    format: format.to_string(),
                }
                .to_string();
                tracing::warn!(table, %reason, "restore check skipped");
                return RestoreOutcome::Skipped {
                    table: table.to_string(),
                    reason,
                };
            }
            Err(e) => {
                tracing::warn!(table, error = %e, "restore check skipped");
                return RestoreOutcome::Skipped {
                    table: table.to_string(),
                    reason: e.to_string(),
                };
            }
        };
        match restore_artifact(&latest, &config.restore_dir) {
            Ok(report) => RestoreOutcome::Restored {
                table: table.to_string(),
                report,
            },
            Err(e) => {
                tracing::warn!(table, artifact = %latest.display(), error = %e, "restore check failed");
                RestoreOutcome::Failed {
                    table: table.to_string(),
                    error: e.to_string(),
                }
            }
        }
    }
}

fn enter(stage: RunStage) {
    tracing::info!(%stage, "stage");
}

/// Run one table's job, turning errors and panics into a failed outcome.
fn run_isolated(
    job: &BackupJob<'_>,
    source: &dyn DataSource,
    table: &str,
    format: BackupFormat,
) -> TableOutcome {
    let result = match catch_unwind(AssertUnwindSafe(|| job.run(source, table, format))) {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(e)) => {
            tracing::warn!(table, error = %e, "table backup failed; continuing");
            Err(e.to_string())
        }
        Err(payload) => {
            let msg = format!("backup job panicked: {}", panic_message(payload.as_ref()));
            tracing::warn!(table, error = %msg, "table backup failed; continuing");
            Err(msg)
        }
    };
    TableOutcome {
        table: table.to_string(),
        result,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_labels() {
        assert_eq!(RunStage::BackupAllTables.to_string(), "BACKUP_ALL_TABLES");
        assert_eq!(RunStage::Failed.to_string(), "FAILED");
    }

    #[test]
    fn panic_messages_are_extracted() {
        let p = std::panic::catch_unwind(|| panic!("boom {}", 1)).unwrap_err();
        assert_eq!(panic_message(p.as_ref()), "boom 1");
        let p = std::panic::catch_unwind(|| std::panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_message(p.as_ref()), "unknown panic");
    }

    #[test]
    fn only_successful_restore_reaches_manifest() {
        let skipped = RestoreOutcome::Skipped {
            table: "jobs".into(),
            reason: "none".into(),
        };
        assert!(skipped.to_check().is_none());
        let restored = RestoreOutcome::Restored {
            table: "jobs".into(),
            report: RestoreReport {
                artifact: "a.parquet".into(),
                output: "restored_a.csv".into(),
                rows: 3,
                columns: vec!["id".into()],
            },
        };
        let check = restored.to_check().unwrap();
        assert_eq!(check.restored_files, vec![PathBuf::from("restored_a.csv")]);
    }
}
