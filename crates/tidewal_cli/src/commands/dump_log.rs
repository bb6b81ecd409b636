//! Dump log command implementation.

use crate::commands::{open_log, print_json};
use serde::Serialize;
use std::path::Path;
use tidewal_core::log::SEGMENT_HEADER_SIZE;
use tidewal_core::{LogEntry, LogFiles, LogPosition, LogVersion};

/// Log entry representation for output.
#[derive(Debug, Serialize)]
pub struct EntryInfo {
    /// Segment version.
    pub version: u64,
    /// Offset of the entry in its segment.
    pub offset: u64,
    /// Entry type.
    pub entry_type: String,
    /// Transaction id (commit entries).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<u64>,
    /// Last committed transaction when started (start entries).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_committed_when_started: Option<u64>,
    /// Start-entry checksum (start entries).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    /// Time written in milliseconds since the Unix epoch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_written: Option<u64>,
    /// Payload size in bytes (command entries).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_size: Option<usize>,
    /// Recovery start recorded by a checkpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_target: Option<String>,
}

/// Result of a dump: the entries read and where reading stopped early.
#[derive(Debug, Serialize)]
pub struct DumpResult {
    /// Entries in log order.
    pub entries: Vec<EntryInfo>,
    /// Error that stopped the dump, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the dump-log command.
pub fn run(
    path: &Path,
    version: Option<u64>,
    offset: Option<u64>,
    limit: Option<usize>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = open_log(path)?;
    let Some(version) = version
        .map(LogVersion::new)
        .or_else(|| files.lowest_version())
    else {
        println!("Log is empty");
        return Ok(());
    };
    let start = LogPosition::new(version, offset.unwrap_or(SEGMENT_HEADER_SIZE));
    let result = dump(&files, start, limit.unwrap_or(usize::MAX))?;

    match format {
        "json" => print_json(&result)?,
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Reads up to `limit` entries from `start` on, continuing into later
/// segments.
pub fn dump(
    files: &LogFiles,
    start: LogPosition,
    limit: usize,
) -> Result<DumpResult, Box<dyn std::error::Error>> {
    let mut entries = Vec::new();
    let mut error = None;

    let versions: Vec<LogVersion> = files
        .versions()
        .into_iter()
        .filter(|v| *v >= start.version())
        .collect();
    if versions.first() != Some(&start.version()) {
        return Err(format!("log segment {} does not exist", start.version()).into());
    }

    'segments: for version in versions {
        let position = if version == start.version() {
            start
        } else {
            files.start_of_segment(version)
        };
        let mut reader = files.entries(position)?;
        for item in reader.by_ref() {
            if entries.len() >= limit {
                break 'segments;
            }
            match item {
                Ok((position, entry)) => entries.push(describe(position, &entry)),
                Err(err) => {
                    error = Some(err.to_string());
                    break 'segments;
                }
            }
        }
        if reader.has_unread_bytes() {
            error = Some(format!(
                "segment {version} ends in a partial entry at {}",
                reader.position()
            ));
            break;
        }
    }

    Ok(DumpResult { entries, error })
}

fn describe(position: LogPosition, entry: &LogEntry) -> EntryInfo {
    let mut info = EntryInfo {
        version: position.version().as_u64(),
        offset: position.byte_offset(),
        entry_type: format!("{:?}", entry.entry_type()).to_uppercase(),
        tx_id: None,
        last_committed_when_started: None,
        checksum: None,
        time_written: None,
        payload_size: None,
        checkpoint_target: None,
    };

    match entry {
        LogEntry::Start(start) => {
            info.last_committed_when_started = Some(start.last_committed_tx_when_started.as_u64());
            info.checksum = Some(format!("{:016x}", start.checksum()));
            info.time_written = Some(start.time_written);
        }
        LogEntry::Command(command) => info.payload_size = Some(command.len()),
        LogEntry::Commit(commit) => {
            info.tx_id = Some(commit.tx_id.as_u64());
            info.time_written = Some(commit.time_written);
        }
        LogEntry::CheckPoint { position } => info.checkpoint_target = Some(position.to_string()),
    }
    info
}

fn print_text_output(result: &DumpResult) {
    for entry in &result.entries {
        let mut line = format!("v{}@{:<10} {:<10}", entry.version, entry.offset, entry.entry_type);
        if let Some(tx_id) = entry.tx_id {
            line.push_str(&format!(" tx:{tx_id}"));
        }
        if let Some(last) = entry.last_committed_when_started {
            line.push_str(&format!(" after tx:{last}"));
        }
        if let Some(checksum) = &entry.checksum {
            line.push_str(&format!(" checksum={checksum}"));
        }
        if let Some(size) = entry.payload_size {
            line.push_str(&format!(" {size} bytes"));
        }
        if let Some(target) = &entry.checkpoint_target {
            line.push_str(&format!(" -> {target}"));
        }
        println!("{line}");
    }
    println!();
    println!("{} entries", result.entries.len());
    if let Some(err) = &result.error {
        println!("Stopped: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewal_core::TransactionId;
    use tidewal_testkit::TestLog;

    #[test]
    fn dumps_entries_across_segments() {
        let log = TestLog::with_transactions(TransactionId::new(100), 1);
        log.rotate();
        log.append_transactions(1);

        let result = dump(log.files(), log.start_of_segment(LogVersion::INITIAL), usize::MAX).unwrap();
        let types: Vec<&str> = result.entries.iter().map(|e| e.entry_type.as_str()).collect();
        assert_eq!(
            types,
            vec!["START", "COMMAND", "COMMIT", "START", "COMMAND", "COMMIT"]
        );
        assert_eq!(result.entries[2].tx_id, Some(101));
        assert_eq!(result.entries[5].version, 1);
        assert!(result.error.is_none());
    }

    #[test]
    fn limit_and_torn_tail() {
        let log = TestLog::with_transactions(TransactionId::new(100), 2);
        log.tear(b"TWLE");
        let start = log.start_of_segment(LogVersion::INITIAL);

        let limited = dump(log.files(), start, 4).unwrap();
        assert_eq!(limited.entries.len(), 4);
        assert!(limited.error.is_none());

        let full = dump(log.files(), start, usize::MAX).unwrap();
        assert_eq!(full.entries.len(), 6);
        assert!(full.error.unwrap().contains("partial entry"));
    }
}
