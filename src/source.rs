//! Data-source boundary: table scans delivered as bounded row batches.
//!
//! A [`DataSource`] runs an unqualified "select every row of T" scan and pushes
//! the result into a [`BatchSink`] one [`RowBatch`] at a time. Push-style
//! delivery keeps the source's cursor (and whatever it borrows) on the source's
//! side of the boundary while still giving the sink a lazy, finite,
//! non-restartable sequence.
//!
//! # Guarantees
//! - Every row of the table is delivered exactly once.
//! - Batches hold at most `n` rows in [`ReadMode::Chunked`]; only the last one
//!   may be smaller.
//! - An existing table always yields at least one batch. A table with zero rows
//!   yields exactly one empty batch that still carries the column layout.
//! - Row order is **not** guaranteed. No ordering clause is issued; whatever
//!   order the engine returns is passed through.
//!
//! [`Chunker`] implements the batching rules so individual sources only need to
//! feed it rows.

#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::batch::{Column, RowBatch, Value};
use crate::error::{BackupError, Result};

/// How a table is pulled from the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// Batches of at most `n` rows (`n >= 1`).
    Chunked(usize),
    /// The whole table as a single batch; meant for small reference tables.
    Whole,
}

impl ReadMode {
    /// Chunked mode, rejecting a zero chunk size.
    ///
    /// # Errors
    /// Returns [`BackupError::Config`] when `n == 0`.
    pub fn chunked(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(BackupError::Config("chunk size must be at least 1".into()));
        }
        Ok(ReadMode::Chunked(n))
    }

    fn limit(self) -> Option<usize> {
        match self {
            ReadMode::Chunked(n) => Some(n.max(1)),
            ReadMode::Whole => None,
        }
    }
}

/// Totals reported by a finished scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub rows: u64,
    pub batches: u64,
}

/// Consumer of a batch stream.
pub trait BatchSink {
    /// Receive the next batch of the stream.
    ///
    /// # Errors
    /// An error stops the scan; the source propagates it unchanged.
    fn write_batch(&mut self, batch: RowBatch) -> Result<()>;
}

/// Collects every batch in memory. Intended for tests and small tables.
impl BatchSink for Vec<RowBatch> {
    fn write_batch(&mut self, batch: RowBatch) -> Result<()> {
        self.push(batch);
        Ok(())
    }
}

/// A relational data source that can scan whole tables.
pub trait DataSource {
    /// Human-readable location of the source, used in logs and errors.
    fn describe(&self) -> String;

    /// Check connectivity and return a version or banner string.
    ///
    /// # Errors
    /// Returns [`BackupError::Connection`] when the source cannot be reached.
    fn probe(&self) -> Result<String>;

    /// Scan every row of `table`, delivering batches to `sink`.
    ///
    /// # Errors
    /// Returns [`BackupError::Source`] when the table does not exist or the
    /// scan fails, or whatever error `sink` returned.
    fn scan(&self, table: &str, mode: ReadMode, sink: &mut dyn BatchSink) -> Result<ScanStats>;
}

/// Splits a row stream into batches according to a [`ReadMode`].
pub struct Chunker<'a, S: BatchSink + ?Sized> {
    table: &'a str,
    limit: Option<usize>,
    current: RowBatch,
    sink: &'a mut S,
    stats: ScanStats,
}

impl<'a, S: BatchSink + ?Sized> Chunker<'a, S> {
    pub fn new(table: &'a str, columns: Vec<Column>, mode: ReadMode, sink: &'a mut S) -> Self {
        Self {
            table,
            limit: mode.limit(),
            current: RowBatch::new(columns),
            sink,
            stats: ScanStats::default(),
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        self.current.columns()
    }

    /// Add one row, emitting a batch once the chunk is full.
    ///
    /// # Errors
    /// Fails on a row whose width differs from the column layout, or when the
    /// sink rejects a batch.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        let width = self.current.columns().len();
        self.current.push_row(row).map_err(|r| {
            BackupError::on_table(
                self.table,
                format!("row has {} values for {width} columns", r.len()),
            )
        })?;
        if self.limit.is_some_and(|n| self.current.len() >= n) {
            self.emit()?;
        }
        Ok(())
    }

    fn emit(&mut self) -> Result<()> {
        let next = RowBatch::new(self.current.columns().to_vec());
        let full = std::mem::replace(&mut self.current, next);
        self.stats.rows += full.len() as u64;
        self.stats.batches += 1;
        tracing::debug!(
            table = self.table,
            batch = self.stats.batches,
            rows = full.len(),
            "batch read"
        );
        self.sink.write_batch(full)
    }

    /// Emit the trailing partial batch, or the single empty batch of an empty
    /// table.
    ///
    /// # Errors
    /// Propagates sink errors.
    pub fn finish(mut self) -> Result<ScanStats> {
        if !self.current.is_empty() || self.stats.batches == 0 {
            self.emit()?;
        }
        Ok(self.stats)
    }
}
