//! Transaction log: segment format, reading and writing.
//!
//! The log is a sequence of segments numbered by [`LogVersion`]. Each segment
//! starts with a [`SegmentHeader`] followed by framed [`LogEntry`] values. A
//! transaction is a `Start` entry, any number of `Command` entries and a
//! `Commit` entry, always within one segment.
//!
//! Recovery reads the log only through the [`LogReader`] and
//! [`TransactionCursor`] traits; [`LogFiles`] is the on-disk implementation.

mod cursor;
mod entry;
mod files;
mod header;
mod position;
mod reader;
mod writer;

pub use cursor::PhysicalTransactionCursor;
pub use entry::{
    CommitEntry, LogEntry, LogEntryType, StartEntry, ENTRY_CRC_SIZE, ENTRY_FORMAT_VERSION,
    ENTRY_HEADER_SIZE, ENTRY_MAGIC,
};
pub use files::LogFiles;
pub(crate) use files::sync_directory;
pub use header::{SegmentHeader, SEGMENT_FORMAT_VERSION, SEGMENT_HEADER_SIZE, SEGMENT_MAGIC};
pub use position::LogPosition;
pub use reader::LogEntryReader;
pub use writer::LogWriter;

use crate::error::CoreResult;
use crate::transaction::CommittedTransaction;
use crate::types::LogVersion;
use parking_lot::Mutex;
use std::sync::Arc;
use tidewal_store::ByteStore;

/// A segment's byte store, shared between readers and the writer.
pub type SharedStore = Arc<Mutex<Box<dyn ByteStore>>>;

/// Read access to the transaction log.
pub trait LogReader {
    /// Returns the highest segment version, or `None` for an empty log.
    fn current_version(&self) -> CoreResult<Option<LogVersion>>;

    /// Returns the lowest segment version still present.
    fn lowest_version(&self) -> CoreResult<Option<LogVersion>>;

    /// Returns the size of a segment, or `None` if it doesn't exist.
    fn segment_end(&self, version: LogVersion) -> CoreResult<Option<u64>>;

    /// Returns `true` if any transaction begins at or after `position`.
    ///
    /// Unreadable entries count as a transaction: the caller must look at
    /// them.
    fn has_transactions_after(&self, position: LogPosition) -> CoreResult<bool>;

    /// Opens a cursor over the committed transactions from `position` on.
    fn open(&self, position: LogPosition) -> CoreResult<Box<dyn TransactionCursor + '_>>;

    /// Discards everything after `position`, including later segments.
    fn truncate_after(&self, position: LogPosition) -> CoreResult<()>;

    /// Returns the position of the first entry of a segment.
    fn start_of(&self, version: LogVersion) -> LogPosition {
        LogPosition::new(version, SEGMENT_HEADER_SIZE)
    }
}

/// Forward iteration over committed transactions.
///
/// Yields each complete transaction exactly once in log order. After an
/// error the cursor yields nothing more.
pub trait TransactionCursor: Iterator<Item = CoreResult<CommittedTransaction>> {
    /// Returns the position just after the last yielded transaction.
    fn position(&self) -> LogPosition;

    /// Returns where usable history ends, if the log ends in bytes that
    /// don't form complete transactions.
    fn unreadable_tail(&self) -> Option<LogPosition> {
        None
    }
}

impl<C: TransactionCursor + ?Sized> TransactionCursor for Box<C> {
    fn position(&self) -> LogPosition {
        (**self).position()
    }

    fn unreadable_tail(&self) -> Option<LogPosition> {
        (**self).unreadable_tail()
    }
}
