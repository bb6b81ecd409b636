//! Finding where replay starts.

use crate::checkpoint::CheckpointSource;
use crate::error::CoreError;
use crate::log::{LogPosition, LogReader, SEGMENT_HEADER_SIZE};
use crate::types::LogVersion;
use thiserror::Error;

/// Where a recovery pass starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStart {
    /// The log holds no transactions at or after the position.
    NothingToRecover(LogPosition),
    /// Transactions from the position on must be replayed.
    ReplayFrom(LogPosition),
}

impl RecoveryStart {
    /// Returns the located position.
    #[must_use]
    pub fn position(&self) -> LogPosition {
        match self {
            Self::NothingToRecover(position) | Self::ReplayFrom(position) => *position,
        }
    }

    /// Returns `true` if replay is needed.
    #[must_use]
    pub fn is_recovery_required(&self) -> bool {
        matches!(self, Self::ReplayFrom(_))
    }
}

/// No valid starting position could be determined.
#[derive(Debug, Error)]
pub enum PositionError {
    /// The checkpoint record could not be read.
    #[error("unreadable checkpoint: {0}")]
    UnreadableCheckpoint(#[source] CoreError),

    /// The checkpoint names a segment newer than the log.
    #[error("checkpoint {checkpoint} is after the current log version {current}")]
    CheckpointAfterCurrentVersion {
        /// Checkpointed position.
        checkpoint: LogPosition,
        /// Newest segment version.
        current: LogVersion,
    },

    /// The checkpointed segment has been removed.
    #[error("log segment {} of checkpoint {checkpoint} is missing", .checkpoint.version())]
    MissingSegment {
        /// Checkpointed position.
        checkpoint: LogPosition,
    },

    /// The checkpoint offset lies outside its segment.
    #[error("checkpoint {checkpoint} is outside its segment ({segment_end} bytes)")]
    CheckpointOutOfBounds {
        /// Checkpointed position.
        checkpoint: LogPosition,
        /// Size of the segment.
        segment_end: u64,
    },

    /// No checkpoint exists and the log no longer starts at the first
    /// segment.
    #[error("no checkpoint and log history before {oldest} is missing")]
    MissingHistory {
        /// Oldest retained segment.
        oldest: LogVersion,
    },

    /// The log inventory could not be read.
    #[error("cannot read log inventory: {0}")]
    LogInventory(#[source] CoreError),
}

/// Determines the first log position a recovery pass must read.
pub struct PositionLocator<'a> {
    checkpoints: &'a dyn CheckpointSource,
    log: &'a dyn LogReader,
}

impl<'a> PositionLocator<'a> {
    /// Creates a locator.
    #[must_use]
    pub fn new(checkpoints: &'a dyn CheckpointSource, log: &'a dyn LogReader) -> Self {
        Self { checkpoints, log }
    }

    /// Locates the replay start for a log whose newest segment is `current`.
    ///
    /// With a checkpoint, replay starts at the checkpointed position, which
    /// excludes the checkpointed transactions. Without one it starts at the
    /// first entry of the initial segment.
    ///
    /// # Errors
    ///
    /// Returns a [`PositionError`] if the checkpoint is unreadable or points
    /// to history the log no longer has.
    pub fn locate(&self, current: Option<LogVersion>) -> Result<RecoveryStart, PositionError> {
        let checkpoint = self
            .checkpoints
            .latest_checkpoint()
            .map_err(PositionError::UnreadableCheckpoint)?;

        let position = match checkpoint {
            Some(checkpoint) => self.validate_checkpoint(checkpoint, current)?,
            None => {
                let oldest = self
                    .log
                    .lowest_version()
                    .map_err(PositionError::LogInventory)?;
                match oldest {
                    None => {
                        return Ok(RecoveryStart::NothingToRecover(
                            self.log.start_of(LogVersion::INITIAL),
                        ))
                    }
                    Some(oldest) if oldest != LogVersion::INITIAL => {
                        return Err(PositionError::MissingHistory { oldest })
                    }
                    Some(oldest) => self.log.start_of(oldest),
                }
            }
        };

        let pending = self
            .log
            .has_transactions_after(position)
            .map_err(PositionError::LogInventory)?;

        Ok(if pending {
            RecoveryStart::ReplayFrom(position)
        } else {
            RecoveryStart::NothingToRecover(position)
        })
    }

    fn validate_checkpoint(
        &self,
        checkpoint: LogPosition,
        current: Option<LogVersion>,
    ) -> Result<LogPosition, PositionError> {
        let Some(current) = current else {
            return Err(PositionError::MissingSegment { checkpoint });
        };
        if checkpoint.version() > current {
            return Err(PositionError::CheckpointAfterCurrentVersion {
                checkpoint,
                current,
            });
        }

        let segment_end = self
            .log
            .segment_end(checkpoint.version())
            .map_err(PositionError::LogInventory)?
            .ok_or(PositionError::MissingSegment { checkpoint })?;

        let offset = checkpoint.byte_offset();
        if offset < SEGMENT_HEADER_SIZE || offset > segment_end {
            return Err(PositionError::CheckpointOutOfBounds {
                checkpoint,
                segment_end,
            });
        }
        Ok(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreResult;
    use crate::log::{LogFiles, LogWriter};
    use crate::types::TransactionId;

    struct Fixed(Option<LogPosition>);

    impl CheckpointSource for Fixed {
        fn latest_checkpoint(&self) -> CoreResult<Option<LogPosition>> {
            Ok(self.0)
        }
    }

    struct Broken;

    impl CheckpointSource for Broken {
        fn latest_checkpoint(&self) -> CoreResult<Option<LogPosition>> {
            Err(CoreError::invalid_format("checkpoint entry garbled"))
        }
    }

    fn log_with(count: usize) -> (LogFiles, Vec<LogPosition>) {
        let files = LogFiles::in_memory();
        let mut writer = LogWriter::with_base(&files, TransactionId::new(100)).unwrap();
        let ends = (0..count)
            .map(|_| writer.append_transaction(&[], &[]).unwrap().1)
            .collect();
        (files, ends)
    }

    #[test]
    fn empty_log_has_nothing_to_recover() {
        let files = LogFiles::in_memory();
        let start = PositionLocator::new(&Fixed(None), &files).locate(None).unwrap();
        assert!(!start.is_recovery_required());
    }

    #[test]
    fn no_checkpoint_starts_at_first_segment() {
        let (files, _) = log_with(2);
        let start = PositionLocator::new(&Fixed(None), &files)
            .locate(files.highest_version())
            .unwrap();
        assert_eq!(
            start,
            RecoveryStart::ReplayFrom(files.start_of_segment(LogVersion::INITIAL))
        );
    }

    #[test]
    fn checkpoint_at_end_is_fast_path() {
        let (files, ends) = log_with(3);
        let start = PositionLocator::new(&Fixed(Some(ends[2])), &files)
            .locate(files.highest_version())
            .unwrap();
        assert_eq!(start, RecoveryStart::NothingToRecover(ends[2]));
    }

    #[test]
    fn checkpoint_mid_log_replays_from_it() {
        let (files, ends) = log_with(3);
        let start = PositionLocator::new(&Fixed(Some(ends[0])), &files)
            .locate(files.highest_version())
            .unwrap();
        assert_eq!(start, RecoveryStart::ReplayFrom(ends[0]));
    }

    #[test]
    fn unreadable_checkpoint_fails() {
        let (files, _) = log_with(1);
        let err = PositionLocator::new(&Broken, &files)
            .locate(files.highest_version())
            .unwrap_err();
        assert!(matches!(err, PositionError::UnreadableCheckpoint(_)));
    }

    #[test]
    fn checkpoint_validation() {
        let (files, ends) = log_with(1);
        let current = files.highest_version();

        let ahead = LogPosition::new(LogVersion::new(4), SEGMENT_HEADER_SIZE);
        assert!(matches!(
            PositionLocator::new(&Fixed(Some(ahead)), &files).locate(current),
            Err(PositionError::CheckpointAfterCurrentVersion { .. })
        ));

        let beyond = LogPosition::new(LogVersion::INITIAL, ends[0].byte_offset() + 1);
        assert!(matches!(
            PositionLocator::new(&Fixed(Some(beyond)), &files).locate(current),
            Err(PositionError::CheckpointOutOfBounds { .. })
        ));

        let in_header = LogPosition::new(LogVersion::INITIAL, 3);
        assert!(matches!(
            PositionLocator::new(&Fixed(Some(in_header)), &files).locate(current),
            Err(PositionError::CheckpointOutOfBounds { .. })
        ));
    }

    #[test]
    fn truncated_history_without_checkpoint_fails() {
        let files = LogFiles::in_memory();
        files
            .create_segment(LogVersion::new(3), TransactionId::new(50), 0)
            .unwrap();
        assert!(matches!(
            PositionLocator::new(&Fixed(None), &files).locate(files.highest_version()),
            Err(PositionError::MissingHistory { oldest }) if oldest == LogVersion::new(3)
        ));
    }

    #[test]
    fn missing_checkpoint_segment_fails() {
        let (files, _) = log_with(1);
        let checkpoint = LogPosition::new(LogVersion::INITIAL, SEGMENT_HEADER_SIZE);
        assert!(matches!(
            PositionLocator::new(&Fixed(Some(checkpoint)), &files).locate(None),
            Err(PositionError::MissingSegment { .. })
        ));
    }
}
