//! Inspect command implementation.

use crate::commands::{format_size, open_log, print_json};
use serde::Serialize;
use std::path::Path;
use tidewal_core::txid_store::TXID_FILE;
use tidewal_core::{
    CheckpointSource, FileTransactionIdStore, LatestCheckpointFinder, LogFiles,
    TransactionIdStore,
};

/// Log inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Log directory path.
    pub path: String,
    /// Segments in ascending version order.
    pub segments: Vec<SegmentInfo>,
    /// Total size of all segments in bytes.
    pub total_size: u64,
    /// Target of the latest readable checkpoint.
    pub latest_checkpoint: Option<String>,
    /// Why the latest checkpoint couldn't be read, if it couldn't.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_error: Option<String>,
    /// Last closed transaction recorded by a previous recovery.
    pub last_closed: Option<ClosedInfo>,
}

/// One log segment.
#[derive(Debug, Serialize)]
pub struct SegmentInfo {
    /// Segment version.
    pub version: u64,
    /// Size in bytes, header included.
    pub size: u64,
    /// Last transaction committed before the segment.
    pub last_committed_tx: u64,
    /// Checksum of that transaction.
    pub last_checksum: String,
}

/// The recorded last closed transaction.
#[derive(Debug, Serialize)]
pub struct ClosedInfo {
    /// Transaction id.
    pub tx_id: u64,
    /// Log position just after it.
    pub position: String,
    /// Commit time in milliseconds since the Unix epoch.
    pub commit_time: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let files = open_log(path)?;
    let result = inspect(path, &files)?;

    match format {
        "json" => print_json(&result)?,
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Collects segment, checkpoint and bookkeeping information.
pub fn inspect(path: &Path, files: &LogFiles) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut segments = Vec::new();
    for version in files.versions() {
        let (Some(size), Some(header)) =
            (files.segment_size(version)?, files.segment_header(version)?)
        else {
            continue;
        };
        segments.push(SegmentInfo {
            version: version.as_u64(),
            size,
            last_committed_tx: header.last_committed_tx.as_u64(),
            last_checksum: format!("{:016x}", header.last_checksum),
        });
    }
    let total_size = segments.iter().map(|s| s.size).sum();

    let (latest_checkpoint, checkpoint_error) =
        match LatestCheckpointFinder::new(files).latest_checkpoint() {
            Ok(checkpoint) => (checkpoint.map(|p| p.to_string()), None),
            Err(err) => (None, Some(err.to_string())),
        };

    let last_closed = if path.join(TXID_FILE).exists() {
        let closed = FileTransactionIdStore::open(path)?.last_closed_transaction();
        Some(ClosedInfo {
            tx_id: closed.tx_id.as_u64(),
            position: closed.log_position.to_string(),
            commit_time: closed.commit_time,
        })
    } else {
        None
    };

    Ok(InspectResult {
        path: path.display().to_string(),
        segments,
        total_size,
        latest_checkpoint,
        checkpoint_error,
        last_closed,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("TideWAL Log Inspection");
    println!("======================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Segments:");
    if result.segments.is_empty() {
        println!("  (none)");
    }
    for segment in &result.segments {
        println!(
            "  v{:<6} {:>10}  after tx:{} ({})",
            segment.version,
            format_size(segment.size),
            segment.last_committed_tx,
            segment.last_checksum
        );
    }
    println!("  Total size: {}", format_size(result.total_size));
    println!();
    match (&result.latest_checkpoint, &result.checkpoint_error) {
        (_, Some(err)) => println!("Latest checkpoint: unreadable ({err})"),
        (Some(checkpoint), None) => println!("Latest checkpoint: {checkpoint}"),
        (None, None) => println!("Latest checkpoint: none"),
    }
    match &result.last_closed {
        Some(closed) => println!(
            "Last closed transaction: tx:{} ending at {}",
            closed.tx_id, closed.position
        ),
        None => println!("Last closed transaction: not recorded"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewal_core::TransactionId;
    use tidewal_testkit::TestLog;

    #[test]
    fn reports_segments_and_checkpoint() {
        let log = TestLog::on_disk();
        log.start_after(TransactionId::new(100));
        let ends = log.append_transactions(2);
        log.checkpoint(ends[1]);
        log.rotate();

        let result = inspect(log.dir().unwrap(), log.files()).unwrap();
        assert_eq!(result.segments.len(), 2);
        assert_eq!(result.segments[0].last_committed_tx, 100);
        assert_eq!(result.segments[1].last_committed_tx, 102);
        assert_eq!(result.latest_checkpoint, Some(ends[1].to_string()));
        assert!(result.last_closed.is_none());
    }
}
