//! Artifact naming and placement.
//!
//! Layout: `{root}/{format}/{YYYYMMDD}/{table}_{YYYYMMDDHHMMSS}.{ext}`; the dated
//! folder is optional. Names are unique per table: when the name for the
//! current second is already taken, the stamp moves forward one second at a
//! time until a free name is found, so two backups of one table started within
//! the same second never overwrite each other.

use crate::format::BackupFormat;
use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Stamp format embedded in artifact file names.
pub const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";
/// Day format used for dated folders and manifest names.
pub const DAY_FORMAT: &str = "%Y%m%d";

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<table>.+)_(?P<stamp>[0-9]{14})$").unwrap_or_else(|e| panic!("{e}"))
});

/// Source of "now" for naming; replaceable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// Local wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Parsed form of an artifact file name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactName {
    pub table: String,
    pub stamp: NaiveDateTime,
    pub format: BackupFormat,
}

impl ArtifactName {
    pub fn new(table: impl Into<String>, stamp: NaiveDateTime, format: BackupFormat) -> Self {
        Self {
            table: table.into(),
            stamp,
            format,
        }
    }

    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.{}",
            self.table,
            self.stamp.format(STAMP_FORMAT),
            self.format.extension()
        )
    }

    /// Parse `{table}_{YYYYMMDDHHMMSS}.{ext}`; `None` for anything else.
    #[must_use]
    pub fn parse(path: &Path) -> Option<Self> {
        let format = BackupFormat::from_extension(path.extension()?.to_str()?)?;
        let caps = NAME_RE.captures(path.file_stem()?.to_str()?)?;
        let stamp = NaiveDateTime::parse_from_str(&caps["stamp"], STAMP_FORMAT).ok()?;
        Some(Self::new(&caps["table"], stamp, format))
    }
}

/// Directory receiving artifacts of `format` for `day`.
#[must_use]
pub fn artifact_dir(root: &Path, format: BackupFormat, day: NaiveDate, date_folder: bool) -> PathBuf {
    let base = root.join(format.as_str());
    if date_folder {
        base.join(day.format(DAY_FORMAT).to_string())
    } else {
        base
    }
}

/// Choose a path in `dir` for a new artifact of `table`, starting at `now`.
///
/// The file is not created; callers create it when the first batch arrives.
#[must_use]
pub fn artifact_path(
    dir: &Path,
    table: &str,
    format: BackupFormat,
    now: NaiveDateTime,
) -> (PathBuf, ArtifactName) {
    // drop sub-second precision so the stamp round-trips through the name
    let mut stamp = now.with_nanosecond(0).unwrap_or(now);
    loop {
        let name = ArtifactName::new(table, stamp, format);
        let path = dir.join(name.file_name());
        if !path.exists() {
            return (path, name);
        }
        stamp += TimeDelta::seconds(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .unwrap()
    }

    #[test]
    fn file_name_round_trips() {
        let name = ArtifactName::new("hired_employees", at(7, 5, 9), BackupFormat::Row);
        assert_eq!(name.file_name(), "hired_employees_20240309070509.avro");
        let parsed = ArtifactName::parse(Path::new(&name.file_name())).unwrap();
        assert_eq!(parsed, name);
    }

    #[test]
    fn parse_rejects_foreign_names() {
        for bad in [
            "jobs.parquet",
            "jobs_2024.parquet",
            "jobs_20240309070509.csv",
            "_20240309070509.parquet",
            "jobs_2024030907050x.parquet",
        ] {
            assert!(ArtifactName::parse(Path::new(bad)).is_none(), "{bad}");
        }
    }

    #[test]
    fn dated_and_flat_directories() {
        let root = Path::new("/backups");
        let day = at(0, 0, 0).date();
        assert_eq!(
            artifact_dir(root, BackupFormat::Columnar, day, true),
            Path::new("/backups/columnar/20240309")
        );
        assert_eq!(
            artifact_dir(root, BackupFormat::Row, day, false),
            Path::new("/backups/row")
        );
    }

    #[test]
    fn artifact_path_skips_taken_names() {
        let tmp = tempfile::tempdir().unwrap();
        let (first, _) = artifact_path(tmp.path(), "jobs", BackupFormat::Columnar, at(10, 0, 0));
        fs::write(&first, b"taken").unwrap();
        let (second, name) =
            artifact_path(tmp.path(), "jobs", BackupFormat::Columnar, at(10, 0, 0));
        assert_ne!(first, second);
        assert_eq!(name.stamp, at(10, 0, 1));
    }
}
