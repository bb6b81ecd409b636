//! Error types for TideWAL core.

use crate::log::LogPosition;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in TideWAL core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Byte store error.
    #[error("store error: {0}")]
    Store(#[from] tidewal_store::StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A log entry could not be decoded.
    #[error("log corruption at {position}: {message}")]
    LogCorruption {
        /// Position of the first byte of the offending entry.
        position: LogPosition,
        /// Description of the corruption.
        message: String,
    },

    /// Stored checksum of a log entry doesn't match its contents.
    #[error("checksum mismatch at {position}: stored {expected:08x}, computed {actual:08x}")]
    ChecksumMismatch {
        /// Position of the first byte of the offending entry.
        position: LogPosition,
        /// Stored checksum.
        expected: u32,
        /// Computed checksum.
        actual: u32,
    },

    /// A segment header or metadata file has an invalid format.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Another process holds the log directory lock.
    #[error("log directory locked: another process has exclusive access")]
    LogLocked,

    /// The storage engine failed an operation.
    #[error("storage engine error: {message}")]
    Engine {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a log corruption error.
    pub fn log_corruption(position: LogPosition, message: impl Into<String>) -> Self {
        Self::LogCorruption {
            position,
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a storage engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Returns `true` if this error means the log contents are unreadable
    /// past some point, as opposed to the log being unreachable.
    ///
    /// Recovery treats these as the end of usable history.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::LogCorruption { .. } | Self::ChecksumMismatch { .. }
        )
    }

    /// Returns the log position a corruption error refers to.
    #[must_use]
    pub fn corruption_position(&self) -> Option<LogPosition> {
        match self {
            Self::LogCorruption { position, .. } | Self::ChecksumMismatch { position, .. } => {
                Some(*position)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LogVersion;

    #[test]
    fn corruption_is_classified() {
        let position = LogPosition::new(LogVersion::new(2), 512);
        let err = CoreError::log_corruption(position, "bad magic");
        assert!(err.is_corruption());
        assert_eq!(err.corruption_position(), Some(position));

        let err = CoreError::ChecksumMismatch {
            position,
            expected: 1,
            actual: 2,
        };
        assert!(err.is_corruption());
    }

    #[test]
    fn io_is_not_corruption() {
        let err = CoreError::from(io::Error::new(io::ErrorKind::Other, "disk gone"));
        assert!(!err.is_corruption());
        assert_eq!(err.corruption_position(), None);
        assert!(!CoreError::engine("boom").is_corruption());
    }

    #[test]
    fn messages_name_the_position() {
        let err = CoreError::log_corruption(LogPosition::new(LogVersion::new(1), 40), "short");
        assert_eq!(err.to_string(), "log corruption at v1@40: short");
    }
}
