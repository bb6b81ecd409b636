//! Recovery failures.

use crate::error::CoreError;
use crate::log::LogPosition;
use crate::recovery::PositionError;
use crate::types::{LogVersion, TransactionId};
use thiserror::Error;

/// Result type for recovery passes.
pub type RecoveryResult<T> = Result<T, RecoveryError>;

/// A fatal recovery failure.
///
/// None of these are retried. Bookkeeping is only written after every batch
/// was applied, so a failed pass can be rerun from scratch.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// No valid starting position.
    #[error("cannot determine recovery start: {0}")]
    Position(#[from] PositionError),

    /// The log could not be read (other than corruption at its tail).
    #[error("failed to read log at {position}: {source}")]
    LogRead {
        /// Last good position.
        position: LogPosition,
        /// Underlying failure.
        #[source]
        source: CoreError,
    },

    /// The log is unreadable before its newest segment. Later segments hold
    /// committed history that can't be replayed past the damage, so the log
    /// is left as it is.
    #[error("log damaged at {position} but segment {newest} follows: {source}")]
    CorruptionBeforeEnd {
        /// End of the last good transaction.
        position: LogPosition,
        /// Newest segment of the log.
        newest: LogVersion,
        /// Underlying failure.
        #[source]
        source: CoreError,
    },

    /// The storage engine failed to apply a batch.
    #[error("storage engine failed to apply {count} transactions {first}..={last}: {source}")]
    Apply {
        /// First transaction of the batch.
        first: TransactionId,
        /// Last transaction of the batch.
        last: TransactionId,
        /// Batch size.
        count: usize,
        /// Underlying failure.
        #[source]
        source: CoreError,
    },

    /// The last closed transaction could not be recorded.
    #[error("failed to record {tx_id} as last closed transaction: {source}")]
    Bookkeeping {
        /// Transaction being recorded.
        tx_id: TransactionId,
        /// Underlying failure.
        #[source]
        source: CoreError,
    },

    /// The storage engine failed to force its state to disk.
    #[error("storage engine failed to force state to disk: {source}")]
    DurabilityForce {
        /// Underlying failure.
        #[source]
        source: CoreError,
    },

    /// The corrupt log tail could not be truncated.
    #[error("failed to truncate log after {position}: {source}")]
    TailTruncation {
        /// Truncation point.
        position: LogPosition,
        /// Underlying failure.
        #[source]
        source: CoreError,
    },
}
