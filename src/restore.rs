//! Restore Verifier: read a columnar artifact back and re-emit it as CSV.
//!
//! This exists to prove a backup is structurally sound, not as a general
//! restore tool. Only columnar artifacts are readable; a row-format artifact
//! yields [`BackupError::UnsupportedRestoreFormat`].

use crate::error::{BackupError, Result};
use crate::format::BackupFormat;
use std::path::{Path, PathBuf};

/// What a restore check produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoreReport {
    pub artifact: PathBuf,
    pub output: PathBuf,
    pub rows: u64,
    pub columns: Vec<String>,
}

/// `restored_{stem}.csv` inside `out_dir`.
#[must_use]
pub fn restored_path(artifact: &Path, out_dir: &Path) -> PathBuf {
    let stem = artifact
        .file_stem()
        .map_or_else(|| "artifact".into(), |s| s.to_string_lossy());
    out_dir.join(format!("restored_{stem}.csv"))
}

/// Restore `artifact` into `out_dir` as `restored_{stem}.csv`.
///
/// # Errors
/// - [`BackupError::UnsupportedRestoreFormat`] for row-format artifacts and
///   unknown extensions.
/// - [`BackupError::Io`] when the artifact does not exist or the CSV cannot be
///   written.
/// - Parquet errors when the artifact is truncated or corrupt. No CSV is left
///   behind in that case.
pub fn restore_artifact(artifact: &Path, out_dir: &Path) -> Result<RestoreReport> {
    let ext = artifact
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    match BackupFormat::from_extension(ext) {
        Some(BackupFormat::Columnar) => restore_columnar(artifact, out_dir),
        Some(BackupFormat::Row) => Err(BackupError::UnsupportedRestoreFormat {
            format: BackupFormat::Row.to_string(),
        }),
        None => Err(BackupError::UnsupportedRestoreFormat {
            format: if ext.is_empty() {
                "<none>".to_string()
            } else {
                format!(".{ext}")
            },
        }),
    }
}

#[cfg(all(feature = "io-parquet", feature = "io-csv"))]
fn restore_columnar(artifact: &Path, out_dir: &Path) -> Result<RestoreReport> {
    use crate::batch::RowBatch;
    use crate::io::csv::CsvSink;
    use crate::io::parquet::read_parquet_into;
    use crate::source::BatchSink;
    use std::fs;

    /// Forwards batches to the CSV writer, remembering the column list.
    struct Recorder {
        csv: CsvSink<fs::File>,
        columns: Option<Vec<String>>,
    }

    impl BatchSink for Recorder {
        fn write_batch(&mut self, batch: RowBatch) -> Result<()> {
            if self.columns.is_none() {
                self.columns = Some(batch.column_names().map(str::to_string).collect());
            }
            self.csv.write_batch(batch)
        }
    }

    if !artifact.is_file() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("backup artifact not found: {}", artifact.display()),
        )
        .into());
    }
    let output = restored_path(artifact, out_dir);
    tracing::info!(artifact = %artifact.display(), output = %output.display(), "restoring");

    let mut recorder = Recorder {
        csv: CsvSink::create(&output)?,
        columns: None,
    };
    let restored = read_parquet_into(artifact, &mut recorder)
        .and_then(|_| recorder.csv.finish().map(|rows| (rows, recorder.columns)));

    match restored {
        Ok((rows, columns)) => {
            let columns = columns.unwrap_or_default();
            tracing::info!(rows, columns = ?columns, output = %output.display(), "restore succeeded");
            Ok(RestoreReport {
                artifact: artifact.to_path_buf(),
                output,
                rows,
                columns,
            })
        }
        Err(e) => {
            let _ = fs::remove_file(&output);
            Err(e)
        }
    }
}

#[cfg(not(all(feature = "io-parquet", feature = "io-csv")))]
fn restore_columnar(_artifact: &Path, _out_dir: &Path) -> Result<RestoreReport> {
    Err(BackupError::UnsupportedRestoreFormat {
        format: BackupFormat::Columnar.to_string(),
    })
}
