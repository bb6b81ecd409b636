//! Core identifiers shared by the log and the recovery engine.

use std::fmt;

/// Identifier of a committed transaction.
///
/// Transaction ids follow commit order: a larger id was committed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Id of the implicit transaction that created an empty store.
    pub const BASE: Self = Self(1);

    /// Creates a new transaction id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the id that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx:{}", self.0)
    }
}

/// Version number of a log segment.
///
/// Segments are numbered from [`LogVersion::INITIAL`] upward, one per
/// rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LogVersion(pub u64);

impl LogVersion {
    /// Version of the first segment ever written.
    pub const INITIAL: Self = Self(0);

    /// Creates a new log version.
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// Returns the raw version value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the version of the segment after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for LogVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_ids_follow_commit_order() {
        let first = TransactionId::new(101);
        assert!(first < first.next());
        assert_eq!(first.next().as_u64(), 102);
    }

    #[test]
    fn display_formats() {
        assert_eq!(TransactionId::new(7).to_string(), "tx:7");
        assert_eq!(LogVersion::new(3).to_string(), "v3");
    }

    #[test]
    fn log_version_next() {
        assert_eq!(LogVersion::INITIAL.next(), LogVersion::new(1));
    }
}
