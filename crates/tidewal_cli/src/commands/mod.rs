//! CLI command implementations.

pub mod dump_log;
pub mod inspect;
pub mod plan;
pub mod verify;

use std::path::Path;
use tidewal_core::{LogConfig, LogFiles};

/// Opens an existing log directory without creating anything.
pub fn open_log(path: &Path) -> Result<LogFiles, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No log directory found at {}", path.display()).into());
    }
    let files = LogFiles::open(path, LogConfig::new().create_if_missing(false))?;
    tracing::debug!(path = %path.display(), segments = files.versions().len(), "opened log");
    Ok(files)
}

/// Prints `value` as pretty JSON.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
