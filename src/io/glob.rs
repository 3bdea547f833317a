//! Artifact discovery on disk.
//!
//! # Examples
//!
//! ```no_run
//! use ironbackup::io::glob::{expand_glob, newest_first};
//!
//! // Every columnar artifact under a backup root, dated folders included
//! let files = expand_glob("backups/columnar/**/*.parquet")?;
//! let recent = newest_first(files);
//! # Ok::<(), ironbackup::BackupError>(())
//! ```

use crate::artifact::ArtifactName;
use crate::error::{BackupError, Result};
use crate::format::BackupFormat;
use glob::{Pattern, glob};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Expand a glob pattern into a sorted vector of matching file paths.
///
/// Supports standard glob patterns:
/// - `*` matches any sequence of characters within a path component
/// - `?` matches any single character
/// - `**` matches zero or more directories
/// - `[abc]` matches any character in the set
///
/// Directories are skipped. Zero matches is an empty vector, not an error.
///
/// # Errors
///
/// Returns an error if the pattern is invalid or a matched entry cannot be
/// read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern)
        .map_err(|e| BackupError::Config(format!("invalid glob pattern {pattern}: {e}")))?;

    let mut result = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| BackupError::Io(e.into_error()))?;
        if path.is_file() {
            result.push(path);
        }
    }

    // Sort for deterministic order
    result.sort();

    Ok(result)
}

/// Sort paths by modification time, newest first. On equal times the
/// lexically greater path wins, which for artifacts is the later stamp.
#[must_use]
pub fn newest_first(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut stamped: Vec<(SystemTime, PathBuf)> = paths
        .into_iter()
        .map(|p| {
            let modified = p
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, p)
        })
        .collect();
    stamped.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    stamped.into_iter().map(|(_, p)| p).collect()
}

/// All artifacts of `table` in `format` under `dir`, at any depth, newest first.
///
/// Only files whose name parses as `{table}_{YYYYMMDDHHMMSS}.{ext}` count, so
/// a table named `jobs` does not pick up `jobs_archive_*` artifacts.
///
/// # Errors
///
/// Returns an error if the directory cannot be walked.
pub fn artifacts_for(dir: &Path, table: &str, format: BackupFormat) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/**/{}_*.{}",
        Pattern::escape(&dir.display().to_string()),
        Pattern::escape(table),
        format.extension()
    );
    let matches = expand_glob(&pattern)?
        .into_iter()
        .filter(|p| ArtifactName::parse(p).is_some_and(|n| n.table == table && n.format == format))
        .collect();
    Ok(newest_first(matches))
}

/// The most recently modified artifact of `table` in `format` under `dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be walked.
pub fn latest_artifact(dir: &Path, table: &str, format: BackupFormat) -> Result<Option<PathBuf>> {
    Ok(artifacts_for(dir, table, format)?.into_iter().next())
}
