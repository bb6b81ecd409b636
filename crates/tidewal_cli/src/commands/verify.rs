//! Verify command implementation.

use crate::commands::open_log;
use std::path::Path;
use tidewal_core::{LogFiles, LogPosition, LogReader, TransactionCursor};

/// Verification result.
#[derive(Debug)]
pub struct VerifyResult {
    /// Number of segments checked.
    pub segments_checked: usize,
    /// Number of entries that decoded cleanly.
    pub valid_entries: usize,
    /// Number of complete transactions.
    pub transactions: u64,
    /// Where usable history ends, if the log has an unreadable tail.
    pub unreadable_tail: Option<LogPosition>,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn new() -> Self {
        Self {
            segments_checked: 0,
            valid_entries: 0,
            transactions: 0,
            unreadable_tail: None,
            errors: Vec::new(),
        }
    }

    /// Returns `true` if nothing was found wrong.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.unreadable_tail.is_none()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying log at {}", path.display());
    println!();

    let files = open_log(path)?;
    let result = verify(&files)?;

    println!("  Segments checked: {}", result.segments_checked);
    println!("  Valid entries:    {}", result.valid_entries);
    println!("  Transactions:     {}", result.transactions);
    for err in &result.errors {
        println!("  Error: {err}");
    }
    if let Some(tail) = result.unreadable_tail {
        println!("  Usable history ends at {tail}; recovery will cut the log there");
    }

    println!();
    if result.is_ok() {
        println!("✓ Log verification passed");
        Ok(())
    } else {
        println!("✗ Log verification failed");
        Err("Verification failed".into())
    }
}

/// Checks every entry of every segment, then the transaction structure.
pub fn verify(files: &LogFiles) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::new();

    for version in files.versions() {
        result.segments_checked += 1;
        let mut reader = files.entries(files.start_of_segment(version))?;
        let mut failed = false;
        for item in reader.by_ref() {
            match item {
                Ok(_) => result.valid_entries += 1,
                Err(err) => {
                    result.errors.push(format!("segment {version}: {err}"));
                    failed = true;
                }
            }
        }
        if reader.has_unread_bytes() && !failed {
            result.errors.push(format!(
                "segment {version}: partial entry at {}",
                reader.position()
            ));
        }
    }

    let Some(lowest) = files.lowest_version() else {
        return Ok(result);
    };
    let mut cursor = LogReader::open(files, files.start_of_segment(lowest))?;
    for tx in cursor.by_ref() {
        match tx {
            Ok(_) => result.transactions += 1,
            Err(err) => {
                tracing::debug!(error = %err, "transaction scan stopped");
                break;
            }
        }
    }
    result.unreadable_tail = cursor.unreadable_tail();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewal_core::TransactionId;
    use tidewal_testkit::TestLog;

    #[test]
    fn clean_log_passes() {
        let log = TestLog::with_transactions(TransactionId::new(100), 3);
        log.rotate();
        log.append_transactions(2);

        let result = verify(log.files()).unwrap();
        assert!(result.is_ok());
        assert_eq!(result.segments_checked, 2);
        assert_eq!(result.valid_entries, 15);
        assert_eq!(result.transactions, 5);
    }

    #[test]
    fn garbage_tail_fails() {
        let log = TestLog::with_transactions(TransactionId::new(100), 2);
        let end = log.writer().position();
        log.tear(&[0xEE; 20]);

        let result = verify(log.files()).unwrap();
        assert!(!result.is_ok());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.transactions, 2);
        assert_eq!(result.unreadable_tail, Some(end));
    }
}
