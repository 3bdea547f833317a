//! Delimited-text output for row batches.
//!
//! [`CsvSink`] writes a header row with the column names of the first batch
//! it receives, then one line per row. Cells use [`Value`]'s `Display`
//! rendering: nulls become empty fields and timestamps use ISO-8601.
//!
//! [`Value`]: crate::batch::Value

use crate::batch::RowBatch;
use crate::error::Result;
use crate::source::BatchSink;
use csv::WriterBuilder;
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::Path;

/// Streaming CSV writer over any `Write`.
pub struct CsvSink<W: Write> {
    wtr: csv::Writer<W>,
    header_written: bool,
    rows: u64,
}

impl CsvSink<File> {
    /// Create (or truncate) `path`, creating parent directories if needed.
    ///
    /// # Errors
    /// Returns an error if the directories or the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent)?;
        }
        Ok(Self::from_writer(File::create(path)?))
    }
}

impl<W: Write> CsvSink<W> {
    pub fn from_writer(w: W) -> Self {
        Self {
            wtr: WriterBuilder::new().has_headers(false).from_writer(w),
            header_written: false,
            rows: 0,
        }
    }

    /// Flush and return the number of data rows written.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn finish(mut self) -> Result<u64> {
        self.wtr.flush()?;
        Ok(self.rows)
    }

    /// Flush and hand back the underlying writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn into_inner(self) -> Result<W> {
        self.wtr
            .into_inner()
            .map_err(|e| std::io::Error::other(e.to_string()).into())
    }
}

impl<W: Write> BatchSink for CsvSink<W> {
    fn write_batch(&mut self, batch: RowBatch) -> Result<()> {
        if !self.header_written {
            self.wtr.write_record(batch.column_names())?;
            self.header_written = true;
        }
        for row in batch.rows() {
            self.wtr.write_record(row.iter().map(ToString::to_string))?;
        }
        self.rows += batch.len() as u64;
        Ok(())
    }
}
