//! Assertions over row batches.
//!
//! Sources make no row-order promise, so comparisons here are order-independent
//! unless the name says otherwise.

use crate::batch::{RowBatch, Value};

/// Render every row of `batches` as text cells, sorted.
fn sorted_cells(batches: &[RowBatch]) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = batches
        .iter()
        .flat_map(|b| b.rows().iter())
        .map(|r| r.iter().map(Value::to_string).collect())
        .collect();
    rows.sort();
    rows
}

/// Assert that `actual` holds exactly the rows of `expected`, in any order
/// and in any batching.
///
/// # Panics
///
/// Panics if the column layouts or the row multisets differ.
///
/// # Example
///
/// ```
/// use ironbackup::batch::RowBatch;
/// use ironbackup::source::{DataSource, ReadMode};
/// use ironbackup::testing::{MemorySource, assert_same_rows, jobs_batch};
///
/// let source = MemorySource::new().with_table("jobs", jobs_batch());
/// let mut batches: Vec<RowBatch> = Vec::new();
/// source.scan("jobs", ReadMode::Chunked(1), &mut batches).unwrap();
/// assert_same_rows(&batches, &jobs_batch());
/// ```
pub fn assert_same_rows(actual: &[RowBatch], expected: &RowBatch) {
    for (i, b) in actual.iter().enumerate() {
        assert!(
            b.same_layout(expected),
            "batch {i} layout mismatch:\n  Expected: {:?}\n  Actual: {:?}",
            expected.column_names().collect::<Vec<_>>(),
            b.column_names().collect::<Vec<_>>()
        );
    }
    let actual = sorted_cells(actual);
    let expected = sorted_cells(std::slice::from_ref(expected));
    assert_eq!(
        actual.len(),
        expected.len(),
        "Row count mismatch:\n  Expected: {}\n  Actual: {}",
        expected.len(),
        actual.len()
    );
    assert_eq!(actual, expected, "Row content mismatch");
}

/// Assert that every batch holds at most `n` rows and only the last is short.
///
/// # Panics
///
/// Panics if a batch is oversized or a short batch is followed by another.
pub fn assert_chunked(batches: &[RowBatch], n: usize) {
    assert!(!batches.is_empty(), "expected at least one batch");
    for (i, b) in batches.iter().enumerate() {
        assert!(b.len() <= n, "batch {i} has {} rows, limit {n}", b.len());
        if i + 1 < batches.len() {
            assert_eq!(b.len(), n, "only the last batch may be short (batch {i})");
        }
    }
}
