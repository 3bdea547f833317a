//! Artifact file formats.
//!
//! - [`parquet`] (feature `io-parquet`): the columnar writer and reader.
//! - [`avro`] (feature `io-avro`): the row-oriented, self-describing writer.
//! - [`csv`] (feature `io-csv`): delimited text output for restore checks.
//! - [`glob`]: artifact discovery on disk.
//!
//! Writers implement [`ArtifactWriter`]: they receive batches through
//! [`BatchSink`] and create their file lazily on the first batch, so a scan
//! that fails before producing anything leaves no file behind.

use crate::error::Result;
use crate::source::BatchSink;
use std::path::Path;

#[cfg_attr(docsrs, doc(cfg(feature = "io-parquet")))]
#[cfg(feature = "io-parquet")]
pub mod parquet;

#[cfg_attr(docsrs, doc(cfg(feature = "io-avro")))]
#[cfg(feature = "io-avro")]
pub mod avro;

#[cfg_attr(docsrs, doc(cfg(feature = "io-csv")))]
#[cfg(feature = "io-csv")]
pub mod csv;

pub mod glob;

/// Totals reported by a finished writer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub rows: u64,
    pub batches: u64,
}

/// A batch consumer that produces one artifact file.
pub trait ArtifactWriter: BatchSink {
    /// Destination file.
    fn path(&self) -> &Path;

    /// Whether the destination file has been created yet.
    fn is_open(&self) -> bool;

    /// Flush and close the artifact. Also called when the batch stream was
    /// empty, in which case a valid zero-row artifact is written.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created, flushed, or closed.
    fn finish(self) -> Result<WriteStats>
    where
        Self: Sized;
}
