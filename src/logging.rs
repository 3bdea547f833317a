//! Tracing subscriber setup for the binary.
//!
//! Events go to stdout and are appended to `{log_dir}/pipeline.log`. The filter
//! defaults to `ironbackup=info` and honours `RUST_LOG`.

use crate::error::Result;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const DEFAULT_FILTER: &str = "ironbackup=info";
pub const LOG_FILE_NAME: &str = "pipeline.log";

fn open_log(log_dir: &Path) -> Result<(PathBuf, File)> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Install the global subscriber. Returns the log file path.
///
/// Calling this twice in one process keeps the first subscriber.
///
/// # Errors
/// Returns an error if the log directory or file cannot be created.
pub fn init_logging(log_dir: &Path) -> Result<PathBuf> {
    let (path, file) = open_log(log_dir)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init();
    Ok(path)
}
