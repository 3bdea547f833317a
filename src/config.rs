//! Immutable run configuration.
//!
//! A [`BackupConfig`] is built once, either directly by library callers or
//! from the process environment by the binary, and then handed by reference to
//! the [`Pipeline`](crate::pipeline::Pipeline) and each
//! [`BackupJob`](crate::job::BackupJob). Nothing reads the environment after
//! that point.
//!
//! # Environment
//!
//! | variable              | field                  | default                              |
//! |-----------------------|------------------------|--------------------------------------|
//! | `BACKUP_DATABASE`     | `database`             | `hr.sqlite`                          |
//! | `BACKUP_ROOT`         | `backup_root`          | `backups`                            |
//! | `RESTORE_DIR`         | `restore_dir`          | `{backup_root}/restored`             |
//! | `LOG_DIR`             | `log_dir`              | `logs`                               |
//! | `BACKUP_FORMAT`       | `format`               | `columnar`                           |
//! | `BACKUP_TABLES`       | `tables`               | `departments,jobs,hired_employees`   |
//! | `BACKUP_CHUNKSIZE`    | `chunk_size`           | `1000`                               |
//! | `BACKUP_DATE_FOLDER`  | `date_folder`          | `true`                               |
//! | `BACKUP_SINGLE_BATCH` | `single_batch_tables`  | empty                                |

use crate::error::{BackupError, Result};
use crate::format::BackupFormat;
use crate::source::ReadMode;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_TABLES: [&str; 3] = ["departments", "jobs", "hired_employees"];
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackupConfig {
    pub database: PathBuf,
    pub backup_root: PathBuf,
    pub restore_dir: PathBuf,
    pub log_dir: PathBuf,
    pub format: BackupFormat,
    pub tables: Vec<String>,
    pub chunk_size: usize,
    pub date_folder: bool,
    pub single_batch_tables: Vec<String>,
}

impl BackupConfig {
    /// Defaults rooted at `backup_root`; restored files go to
    /// `{backup_root}/restored` and logs to `{backup_root}/logs`.
    pub fn new(backup_root: impl Into<PathBuf>) -> Self {
        let backup_root = backup_root.into();
        Self {
            database: PathBuf::from("hr.sqlite"),
            restore_dir: backup_root.join("restored"),
            log_dir: backup_root.join("logs"),
            backup_root,
            format: BackupFormat::Columnar,
            tables: DEFAULT_TABLES.iter().map(|t| t.to_string()).collect(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            date_folder: true,
            single_batch_tables: Vec::new(),
        }
    }

    /// Load an optional `.env` file, then read the `BACKUP_*` variables.
    ///
    /// # Errors
    /// Returns [`BackupError::Config`] for a `.env` file that exists but cannot
    /// be read or parsed, and for unparseable or out-of-range values.
    pub fn from_env() -> Result<Self> {
        allow_missing_env_file(dotenvy::dotenv())?;

        let root = var("BACKUP_ROOT").map_or_else(|| PathBuf::from("backups"), PathBuf::from);
        let mut cfg = Self::new(root);
        cfg.log_dir = PathBuf::from("logs");
        if let Some(db) = var("BACKUP_DATABASE") {
            cfg.database = db.into();
        }
        if let Some(dir) = var("RESTORE_DIR") {
            cfg.restore_dir = dir.into();
        }
        if let Some(dir) = var("LOG_DIR") {
            cfg.log_dir = dir.into();
        }
        if let Some(f) = var("BACKUP_FORMAT") {
            cfg.format = f.parse()?;
        }
        if let Some(t) = var("BACKUP_TABLES") {
            cfg.tables = split_list(&t);
        }
        if let Some(n) = var("BACKUP_CHUNKSIZE") {
            cfg.chunk_size = n
                .trim()
                .parse()
                .map_err(|e| BackupError::Config(format!("BACKUP_CHUNKSIZE={n:?}: {e}")))?;
        }
        if let Some(flag) = var("BACKUP_DATE_FOLDER") {
            cfg.date_folder = parse_bool("BACKUP_DATE_FOLDER", &flag)?;
        }
        if let Some(t) = var("BACKUP_SINGLE_BATCH") {
            cfg.single_batch_tables = split_list(&t);
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Move the backup root. Restore and log directories still at their
    /// default locations under the old root move along with it.
    #[must_use]
    pub fn with_backup_root(mut self, root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        if self.restore_dir == self.backup_root.join("restored") {
            self.restore_dir = root.join("restored");
        }
        if self.log_dir == self.backup_root.join("logs") {
            self.log_dir = root.join("logs");
        }
        self.backup_root = root;
        self
    }

    #[must_use]
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database = path.into();
        self
    }

    #[must_use]
    pub fn with_restore_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.restore_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
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
    pub fn with_chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n;
        self
    }

    #[must_use]
    pub fn with_date_folder(mut self, enabled: bool) -> Self {
        self.date_folder = enabled;
        self
    }

    #[must_use]
    pub fn with_single_batch<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.single_batch_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Check invariants that the type system does not.
    ///
    /// # Errors
    /// Returns [`BackupError::Config`] for a zero chunk size or a table name
    /// rejected by [`validate_table_name`].
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(BackupError::Config("chunk size must be at least 1".into()));
        }
        self.tables.iter().try_for_each(|t| validate_table_name(t))
    }

    /// Read mode for `table`: whole-table for single-batch tables, chunked otherwise.
    ///
    /// # Errors
    /// Returns [`BackupError::Config`] when the chunk size is zero.
    pub fn read_mode(&self, table: &str) -> Result<ReadMode> {
        if self.single_batch_tables.iter().any(|t| t == table) {
            Ok(ReadMode::Whole)
        } else {
            ReadMode::chunked(self.chunk_size)
        }
    }

    /// `{backup_root}/{format}`, the directory recorded in the manifest.
    #[must_use]
    pub fn format_dir(&self, format: BackupFormat) -> PathBuf {
        self.backup_root.join(format.as_str())
    }

    #[must_use]
    pub fn manifest_dir(&self) -> PathBuf {
        self.backup_root.join("manifest")
    }
}

/// Table names become artifact file names, so they must be a single path
/// component.
///
/// # Errors
/// Returns [`BackupError::Config`] for a blank name, a path separator, a NUL
/// byte, or a name of `.` or `..`.
pub fn validate_table_name(table: &str) -> Result<()> {
    let reason = if table.trim().is_empty() {
        "must not be blank"
    } else if table.contains(['/', '\\', '\0']) {
        "must not contain path separators or NUL"
    } else if table == "." || table == ".." {
        "must not be a relative directory"
    } else {
        return Ok(());
    };
    Err(BackupError::Config(format!("table name {table:?} {reason}")))
}

/// Accept a `.env` load result, tolerating only a missing file.
fn allow_missing_env_file<T>(loaded: std::result::Result<T, dotenvy::Error>) -> Result<()> {
    match loaded {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(BackupError::Config(format!("cannot load .env: {e}"))),
    }
}

/// Split a comma-separated list, dropping blanks.
#[must_use]
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &str, v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(BackupError::Config(format!("{key}={other:?} is not a boolean"))),
    }
}
