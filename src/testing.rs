//! Testing utilities for backup pipelines.
//!
//! Shipped with the library so downstream crates can test their own sources
//! and pipelines the same way this crate does:
//!
//! - **Mock source**: [`MemorySource`] serves in-memory tables and can be told
//!   to refuse connections, fail mid-scan, or panic.
//! - **Fixtures**: the HR tables (`departments`, `jobs`, `hired_employees`), a
//!   batch with every column type, and [`seed_sqlite`] for an on-disk database.
//! - **Assertions**: order-independent row comparison.
//! - **Clock**: [`FixedClock`] pins artifact timestamps.
//!
//! # Quick Start
//!
//! ```no_run
//! use ironbackup::config::BackupConfig;
//! use ironbackup::pipeline::{Pipeline, RunRequest};
//! use ironbackup::testing::{FixedClock, MemorySource};
//!
//! # fn main() -> anyhow::Result<()> {
//! let tmp = tempfile::tempdir()?;
//! let config = BackupConfig::new(tmp.path());
//! let clock = FixedClock::ymd_hms(2024, 1, 1, 12, 0, 0);
//! let report = Pipeline::new(&config)
//!     .with_clock(&clock)
//!     .run(&MemorySource::hr(), &RunRequest::from_config(&config))?;
//! assert!(report.all_succeeded());
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod mock_source;

pub use assertions::*;
pub use fixtures::*;
pub use mock_source::*;

use crate::artifact::Clock;
use chrono::{NaiveDate, NaiveDateTime};

/// A clock frozen at one instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// # Panics
    ///
    /// Panics on an invalid date or time.
    #[must_use]
    pub fn ymd_hms(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Self {
        let at = NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|date| date.and_hms_opt(h, min, s))
            .unwrap_or_else(|| panic!("invalid fixed time {y}-{m}-{d} {h}:{min}:{s}"));
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
