//! Locating the most recent checkpoint.

use crate::error::{CoreError, CoreResult};
use crate::log::{LogEntry, LogFiles, LogPosition};

/// Source of the most recent checkpoint.
pub trait CheckpointSource {
    /// Returns the position recorded by the latest checkpoint, or `None` if
    /// no checkpoint has ever been written.
    ///
    /// The returned position is where recovery may start: everything before
    /// it is already reflected in the store.
    fn latest_checkpoint(&self) -> CoreResult<Option<LogPosition>>;
}

/// Finds the latest checkpoint by scanning the log itself.
///
/// Segments are scanned newest first; the first segment holding a readable
/// checkpoint entry answers. Within a segment the scan stops at the first
/// unreadable entry, so a checkpoint in a corrupt tail is never used.
pub struct LatestCheckpointFinder<'a> {
    files: &'a LogFiles,
}

impl<'a> LatestCheckpointFinder<'a> {
    /// Creates a finder over `files`.
    #[must_use]
    pub fn new(files: &'a LogFiles) -> Self {
        Self { files }
    }
}

impl CheckpointSource for LatestCheckpointFinder<'_> {
    fn latest_checkpoint(&self) -> CoreResult<Option<LogPosition>> {
        for version in self.files.versions().into_iter().rev() {
            let mut latest = None;

            for item in self.files.entries(self.files.start_of_segment(version))? {
                match item {
                    Ok((at, LogEntry::CheckPoint { position })) => {
                        if position > at {
                            return Err(CoreError::invalid_format(format!(
                                "checkpoint at {at} points forward to {position}"
                            )));
                        }
                        latest = Some(position);
                    }
                    Ok(_) => {}
                    Err(err) if err.is_corruption() => break,
                    Err(err) => return Err(err),
                }
            }

            if latest.is_some() {
                tracing::debug!(%version, checkpoint = ?latest, "found latest checkpoint");
                return Ok(latest);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{LogWriter, SEGMENT_HEADER_SIZE};
    use crate::types::{LogVersion, TransactionId};

    #[test]
    fn no_checkpoint_in_fresh_log() {
        let files = LogFiles::in_memory();
        let mut writer = LogWriter::new(&files).unwrap();
        writer.append_transaction(&[], &[]).unwrap();

        assert_eq!(LatestCheckpointFinder::new(&files).latest_checkpoint().unwrap(), None);
    }

    #[test]
    fn newest_checkpoint_wins() {
        let files = LogFiles::in_memory();
        let mut writer = LogWriter::new(&files).unwrap();
        let (_, first) = writer.append_transaction(&[], &[]).unwrap();
        writer.append_checkpoint(first).unwrap();
        writer.rotate().unwrap();
        let (_, second) = writer.append_transaction(&[], &[]).unwrap();
        writer.append_checkpoint(second).unwrap();
        writer.append_transaction(&[], &[]).unwrap();

        assert_eq!(
            LatestCheckpointFinder::new(&files).latest_checkpoint().unwrap(),
            Some(second)
        );
    }

    #[test]
    fn falls_back_to_older_segment() {
        let files = LogFiles::in_memory();
        let mut writer = LogWriter::new(&files).unwrap();
        let (_, first) = writer.append_transaction(&[], &[]).unwrap();
        writer.append_checkpoint(first).unwrap();
        writer.rotate().unwrap();
        writer.append_transaction(&[], &[]).unwrap();

        assert_eq!(
            LatestCheckpointFinder::new(&files).latest_checkpoint().unwrap(),
            Some(first)
        );
    }

    #[test]
    fn checkpoint_behind_corruption_is_ignored() {
        let files = LogFiles::in_memory();
        let mut writer = LogWriter::new(&files).unwrap();
        let (_, first) = writer.append_transaction(&[], &[]).unwrap();
        writer.append_checkpoint(first).unwrap();
        files.append_raw(LogVersion::INITIAL, &[0xFF; 16]).unwrap();
        let late = LogEntry::CheckPoint {
            position: LogPosition::new(LogVersion::INITIAL, SEGMENT_HEADER_SIZE),
        };
        files
            .append_raw(LogVersion::INITIAL, &late.encode().unwrap())
            .unwrap();

        assert_eq!(
            LatestCheckpointFinder::new(&files).latest_checkpoint().unwrap(),
            Some(first)
        );
    }

    #[test]
    fn forward_pointing_checkpoint_is_rejected() {
        let files = LogFiles::in_memory();
        files
            .create_segment(LogVersion::INITIAL, TransactionId::BASE, 0)
            .unwrap();
        let bogus = LogEntry::CheckPoint {
            position: LogPosition::new(LogVersion::new(5), SEGMENT_HEADER_SIZE),
        };
        files
            .append_raw(LogVersion::INITIAL, &bogus.encode().unwrap())
            .unwrap();

        assert!(matches!(
            LatestCheckpointFinder::new(&files).latest_checkpoint(),
            Err(CoreError::InvalidFormat { .. })
        ));
    }
}
