//! Positions in the transaction log.

use crate::types::LogVersion;
use std::fmt;

/// A point in the log stream: a segment version plus a byte offset within
/// that segment.
///
/// Positions are totally ordered by `(version, byte_offset)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogPosition {
    version: LogVersion,
    byte_offset: u64,
}

impl LogPosition {
    /// Creates a new position.
    #[must_use]
    pub const fn new(version: LogVersion, byte_offset: u64) -> Self {
        Self {
            version,
            byte_offset,
        }
    }

    /// Returns the segment version.
    #[must_use]
    pub const fn version(self) -> LogVersion {
        self.version
    }

    /// Returns the byte offset within the segment.
    #[must_use]
    pub const fn byte_offset(self) -> u64 {
        self.byte_offset
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.version, self.byte_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_by_version_then_offset() {
        let early = LogPosition::new(LogVersion::new(1), 9_000);
        let later = LogPosition::new(LogVersion::new(2), 32);
        let latest = LogPosition::new(LogVersion::new(2), 64);

        assert!(early < later);
        assert!(later < latest);
        assert_eq!(later.max(early), later);
    }

    #[test]
    fn display() {
        let position = LogPosition::new(LogVersion::new(4), 128);
        assert_eq!(position.to_string(), "v4@128");
        assert_eq!(position.version(), LogVersion::new(4));
        assert_eq!(position.byte_offset(), 128);
    }
}
