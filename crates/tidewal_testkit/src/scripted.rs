//! A log reader that yields a scripted sequence of transactions.
//!
//! [`ScriptedLog`] lays out `count` synthetic transactions in segment
//! [`LogVersion::INITIAL`], each [`SCRIPTED_TX_SIZE`] bytes long, optionally
//! followed by a corrupt entry or a read failure. Transactions are built on
//! demand, so scripts of any length are cheap.

use parking_lot::Mutex;
use tidewal_core::log::{CommitEntry, StartEntry, SEGMENT_HEADER_SIZE};
use tidewal_core::{
    Command, CommittedTransaction, CoreError, CoreResult, LogPosition, LogReader, LogVersion,
    TransactionCursor, TransactionId,
};

/// Bytes each scripted transaction occupies.
pub const SCRIPTED_TX_SIZE: u64 = 64;

/// What the log holds after the scripted transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedEnd {
    /// Nothing: the log ends cleanly.
    Clean,
    /// An entry that fails to decode.
    Corruption,
    /// An I/O failure while reading.
    ReadFailure,
}

/// Scripted [`LogReader`] over synthetic transactions.
#[derive(Debug)]
pub struct ScriptedLog {
    base: TransactionId,
    count: u64,
    end: ScriptedEnd,
    opened: Mutex<Vec<LogPosition>>,
    truncated: Mutex<Vec<LogPosition>>,
}

impl ScriptedLog {
    /// A log holding transactions `base + 1 ..= base + count`.
    pub fn new(base: TransactionId, count: u64) -> Self {
        Self {
            base,
            count,
            end: ScriptedEnd::Clean,
            opened: Mutex::new(Vec::new()),
            truncated: Mutex::new(Vec::new()),
        }
    }

    /// Sets what follows the scripted transactions.
    #[must_use]
    pub fn ending_with(mut self, end: ScriptedEnd) -> Self {
        self.end = end;
        self
    }

    /// Position just after the `index`-th transaction (zero based).
    pub fn end_of(&self, index: u64) -> LogPosition {
        LogPosition::new(
            LogVersion::INITIAL,
            SEGMENT_HEADER_SIZE + (index + 1) * SCRIPTED_TX_SIZE,
        )
    }

    /// Position of the first transaction.
    pub fn start(&self) -> LogPosition {
        LogPosition::new(LogVersion::INITIAL, SEGMENT_HEADER_SIZE)
    }

    /// Position just after the last scripted transaction.
    pub fn end_of_transactions(&self) -> LogPosition {
        LogPosition::new(
            LogVersion::INITIAL,
            SEGMENT_HEADER_SIZE + self.count * SCRIPTED_TX_SIZE,
        )
    }

    /// Positions passed to [`LogReader::open`], in call order.
    pub fn opened(&self) -> Vec<LogPosition> {
        self.opened.lock().clone()
    }

    /// Positions passed to [`LogReader::truncate_after`], in call order.
    pub fn truncated(&self) -> Vec<LogPosition> {
        self.truncated.lock().clone()
    }

    /// Builds the `index`-th scripted transaction.
    pub fn transaction(&self, index: u64) -> CommittedTransaction {
        let tx_id = TransactionId::new(self.base.as_u64() + index + 1);
        let start = StartEntry {
            time_written: 1_000 + index,
            last_committed_tx_when_started: TransactionId::new(tx_id.as_u64() - 1),
            previous_checksum: index,
            additional_header: Vec::new(),
        };
        let commit = CommitEntry {
            tx_id,
            time_written: 2_000 + index,
        };
        CommittedTransaction::new(start, vec![Command::new(index.to_le_bytes().to_vec())], commit)
    }

    fn index_at(&self, position: LogPosition) -> CoreResult<u64> {
        let offset = position.byte_offset();
        if position.version() != LogVersion::INITIAL || offset < SEGMENT_HEADER_SIZE {
            return Err(CoreError::invalid_operation(format!(
                "scripted log has no position {position}"
            )));
        }
        let relative = offset - SEGMENT_HEADER_SIZE;
        if relative % SCRIPTED_TX_SIZE != 0 || relative / SCRIPTED_TX_SIZE > self.count {
            return Err(CoreError::invalid_operation(format!(
                "{position} is not a transaction boundary"
            )));
        }
        Ok(relative / SCRIPTED_TX_SIZE)
    }
}

impl LogReader for ScriptedLog {
    fn current_version(&self) -> CoreResult<Option<LogVersion>> {
        Ok(Some(LogVersion::INITIAL))
    }

    fn lowest_version(&self) -> CoreResult<Option<LogVersion>> {
        Ok(Some(LogVersion::INITIAL))
    }

    fn segment_end(&self, version: LogVersion) -> CoreResult<Option<u64>> {
        if version != LogVersion::INITIAL {
            return Ok(None);
        }
        let garbage = match self.end {
            ScriptedEnd::Corruption => SCRIPTED_TX_SIZE,
            ScriptedEnd::Clean | ScriptedEnd::ReadFailure => 0,
        };
        Ok(Some(self.end_of_transactions().byte_offset() + garbage))
    }

    fn has_transactions_after(&self, position: LogPosition) -> CoreResult<bool> {
        Ok(self.index_at(position)? < self.count || self.end != ScriptedEnd::Clean)
    }

    fn open(&self, position: LogPosition) -> CoreResult<Box<dyn TransactionCursor + '_>> {
        let next = self.index_at(position)?;
        self.opened.lock().push(position);
        Ok(Box::new(ScriptedCursor {
            log: self,
            next,
            position,
            failed: false,
        }))
    }

    fn truncate_after(&self, position: LogPosition) -> CoreResult<()> {
        self.truncated.lock().push(position);
        Ok(())
    }
}

struct ScriptedCursor<'a> {
    log: &'a ScriptedLog,
    next: u64,
    position: LogPosition,
    failed: bool,
}

impl Iterator for ScriptedCursor<'_> {
    type Item = CoreResult<CommittedTransaction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.next < self.log.count {
            let tx = self.log.transaction(self.next);
            self.position = self.log.end_of(self.next);
            self.next += 1;
            return Some(Ok(tx));
        }

        let err = match self.log.end {
            ScriptedEnd::Clean => return None,
            ScriptedEnd::Corruption => {
                CoreError::log_corruption(self.position, "scripted corrupt entry")
            }
            ScriptedEnd::ReadFailure => CoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "scripted read failure",
            )),
        };
        self.failed = true;
        Some(Err(err))
    }
}

impl TransactionCursor for ScriptedCursor<'_> {
    fn position(&self) -> LogPosition {
        self.position
    }
}
