//! In-memory data source with injectable failures.

use crate::batch::RowBatch;
use crate::error::{BackupError, Result};
use crate::source::{BatchSink, Chunker, DataSource, ReadMode, ScanStats};
use std::collections::BTreeMap;

/// Tables held in memory, scanned through the same [`Chunker`] as real sources.
///
/// # Example
///
/// ```
/// use ironbackup::batch::RowBatch;
/// use ironbackup::source::{DataSource, ReadMode};
/// use ironbackup::testing::{MemorySource, jobs_batch};
///
/// let source = MemorySource::new().with_table("jobs", jobs_batch());
/// let mut batches: Vec<RowBatch> = Vec::new();
/// let stats = source.scan("jobs", ReadMode::Chunked(2), &mut batches).unwrap();
/// assert_eq!(stats.batches, 2);
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    tables: BTreeMap<String, RowBatch>,
    unreachable: bool,
    fail_after: BTreeMap<String, usize>,
    panic_after: BTreeMap<String, usize>,
}

impl MemorySource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A source holding every fixture HR table.
    #[must_use]
    pub fn hr() -> Self {
        super::hr_tables()
            .into_iter()
            .fold(Self::new(), |s, (name, batch)| s.with_table(name, batch))
    }

    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>, batch: RowBatch) -> Self {
        self.tables.insert(name.into(), batch);
        self
    }

    #[must_use]
    pub fn without_table(mut self, name: &str) -> Self {
        self.tables.remove(name);
        self
    }

    /// Every probe and scan fails with a connection error.
    #[must_use]
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Scans of `table` fail with a source error after `rows` rows.
    #[must_use]
    pub fn failing_after(mut self, table: impl Into<String>, rows: usize) -> Self {
        self.fail_after.insert(table.into(), rows);
        self
    }

    /// Scans of `table` panic before delivering any row.
    #[must_use]
    pub fn panicking(self, table: impl Into<String>) -> Self {
        self.panicking_after(table, 0)
    }

    /// Scans of `table` panic after `rows` rows have been pushed. A count at or
    /// past the table length panics just before the final flush.
    #[must_use]
    pub fn panicking_after(mut self, table: impl Into<String>, rows: usize) -> Self {
        self.panic_after.insert(table.into(), rows);
        self
    }

    fn connection_error(&self) -> BackupError {
        BackupError::Connection {
            target: self.describe(),
            reason: "connection refused".into(),
        }
    }
}

impl DataSource for MemorySource {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn probe(&self) -> Result<String> {
        if self.unreachable {
            return Err(self.connection_error());
        }
        Ok(format!("in-memory source with {} tables", self.tables.len()))
    }

    fn scan(&self, table: &str, mode: ReadMode, sink: &mut dyn BatchSink) -> Result<ScanStats> {
        if self.unreachable {
            return Err(self.connection_error());
        }
        let batch = self
            .tables
            .get(table)
            .ok_or_else(|| BackupError::on_table(table, format!("no such table: {table}")))?;
        let limit = self.fail_after.get(table).copied();
        let panic_at = self.panic_after.get(table).copied();

        let mut chunker = Chunker::new(table, batch.columns().to_vec(), mode, sink);
        for (i, row) in batch.rows().iter().enumerate() {
            assert!(panic_at != Some(i), "scan of {table} panicked");
            if limit == Some(i) {
                return Err(BackupError::on_table(table, "simulated read failure"));
            }
            chunker.push_row(row.clone())?;
        }
        assert!(
            !panic_at.is_some_and(|n| n >= batch.len()),
            "scan of {table} panicked"
        );
        chunker.finish()
    }
}
