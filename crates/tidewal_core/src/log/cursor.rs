//! Assembles log entries into committed transactions.

use crate::error::{CoreError, CoreResult};
use crate::log::{LogEntry, LogEntryReader, LogFiles, LogPosition, StartEntry, TransactionCursor};
use crate::transaction::{Command, CommittedTransaction};

/// Cursor over the committed transactions of a [`LogFiles`] log.
///
/// Reads `Start`, `Command` and `Commit` entries and yields one
/// [`CommittedTransaction`] per commit, moving on to the next segment when
/// one ends. Checkpoint entries between transactions are skipped.
///
/// Where the log stops forming complete transactions (a torn entry, an
/// unreadable entry or a transaction without commit) the cursor records the
/// end of the last good transaction as the
/// [`unreadable_tail`](TransactionCursor::unreadable_tail). A torn or
/// incomplete segment followed by another segment is reported as
/// corruption, since that history can't be skipped.
pub struct PhysicalTransactionCursor<'a> {
    files: &'a LogFiles,
    reader: LogEntryReader,
    pending: Option<(StartEntry, Vec<Command>)>,
    /// End of the last complete transaction or skipped checkpoint.
    valid_end: LogPosition,
    unreadable_tail: Option<LogPosition>,
    finished: bool,
}

impl<'a> PhysicalTransactionCursor<'a> {
    /// Opens a cursor at `position`.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment doesn't exist or the position is
    /// outside it.
    pub fn new(files: &'a LogFiles, position: LogPosition) -> CoreResult<Self> {
        let reader = files.entries(position)?;
        Ok(Self {
            files,
            reader,
            pending: None,
            valid_end: position,
            unreadable_tail: None,
            finished: false,
        })
    }

    fn read_next(&mut self) -> CoreResult<Option<CommittedTransaction>> {
        loop {
            let Some(item) = self.reader.next() else {
                if self.advance_segment()? {
                    continue;
                }
                return Ok(None);
            };

            let (position, entry) = item.map_err(|err| {
                if err.is_corruption() {
                    self.unreadable_tail = Some(self.valid_end);
                }
                err
            })?;

            match entry {
                LogEntry::Start(start) => {
                    if self.pending.is_some() {
                        return Err(self.out_of_order(position, "start entry inside open transaction"));
                    }
                    self.pending = Some((start, Vec::new()));
                }
                LogEntry::Command(command) => match self.pending.as_mut() {
                    Some((_, commands)) => commands.push(command),
                    None => {
                        return Err(self.out_of_order(position, "command entry outside transaction"))
                    }
                },
                LogEntry::Commit(commit) => {
                    let Some((start, commands)) = self.pending.take() else {
                        return Err(self.out_of_order(position, "commit entry without start"));
                    };
                    self.valid_end = self.reader.position();
                    return Ok(Some(CommittedTransaction::new(start, commands, commit)));
                }
                LogEntry::CheckPoint { .. } => {
                    if self.pending.is_some() {
                        return Err(self.out_of_order(position, "checkpoint inside open transaction"));
                    }
                    self.valid_end = self.reader.position();
                }
            }
        }
    }

    /// Handles the end of the current segment.
    ///
    /// Returns `true` if reading continues in the next segment.
    fn advance_segment(&mut self) -> CoreResult<bool> {
        let incomplete = self.reader.has_unread_bytes() || self.pending.is_some();
        let next = self.reader.version().next();

        if !self.files.has_version(next) {
            if incomplete {
                self.unreadable_tail = Some(self.valid_end);
            }
            return Ok(false);
        }

        if incomplete {
            let position = self.reader.position();
            return Err(self.out_of_order(
                position,
                format!("segment ends inside a transaction but {next} follows"),
            ));
        }

        let start = self.files.start_of_segment(next);
        self.reader = self.files.entries(start)?;
        self.valid_end = start;
        Ok(true)
    }

    fn out_of_order(&mut self, position: LogPosition, message: impl Into<String>) -> CoreError {
        self.unreadable_tail = Some(self.valid_end);
        CoreError::log_corruption(position, message)
    }
}

impl Iterator for PhysicalTransactionCursor<'_> {
    type Item = CoreResult<CommittedTransaction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(tx)) => Some(Ok(tx)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl TransactionCursor for PhysicalTransactionCursor<'_> {
    fn position(&self) -> LogPosition {
        self.valid_end
    }

    fn unreadable_tail(&self) -> Option<LogPosition> {
        self.unreadable_tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{CommitEntry, LogWriter, SEGMENT_HEADER_SIZE};
    use crate::types::{LogVersion, TransactionId};

    fn command(byte: u8) -> Command {
        Command::new(vec![byte; 4])
    }

    fn written_log(count: usize) -> (LogFiles, Vec<LogPosition>) {
        let files = LogFiles::in_memory();
        let mut writer = LogWriter::with_base(&files, TransactionId::new(100)).unwrap();
        let ends = (0..count)
            .map(|i| writer.append_transaction(&[], &[command(i as u8)]).unwrap().1)
            .collect();
        (files, ends)
    }

    fn ids(cursor: PhysicalTransactionCursor<'_>) -> Vec<u64> {
        cursor.map(|tx| tx.unwrap().tx_id().as_u64()).collect()
    }

    #[test]
    fn yields_transactions_in_order() {
        let (files, ends) = written_log(3);
        let mut cursor =
            PhysicalTransactionCursor::new(&files, files.start_of_segment(LogVersion::INITIAL))
                .unwrap();

        let first = cursor.next().unwrap().unwrap();
        assert_eq!(first.tx_id(), TransactionId::new(101));
        assert_eq!(first.representation().commands(), &[command(0)]);
        assert_eq!(cursor.position(), ends[0]);

        assert_eq!(ids(cursor), vec![102, 103]);
    }

    #[test]
    fn starts_after_a_given_transaction() {
        let (files, ends) = written_log(3);
        let cursor = PhysicalTransactionCursor::new(&files, ends[0]).unwrap();
        assert_eq!(ids(cursor), vec![102, 103]);
    }

    #[test]
    fn crosses_segments_and_skips_checkpoints() {
        let files = LogFiles::in_memory();
        let mut writer = LogWriter::with_base(&files, TransactionId::new(100)).unwrap();
        writer.append_transaction(&[], &[command(1)]).unwrap();
        writer.rotate().unwrap();
        let at = writer.position();
        writer.append_checkpoint(at).unwrap();
        writer.append_transaction(&[], &[command(2)]).unwrap();

        let cursor =
            PhysicalTransactionCursor::new(&files, files.start_of_segment(LogVersion::INITIAL))
                .unwrap();
        assert_eq!(ids(cursor), vec![101, 102]);
    }

    #[test]
    fn torn_last_entry_marks_tail() {
        let (files, ends) = written_log(2);
        let torn = ends[1].byte_offset() - 3;
        files
            .segment(LogVersion::INITIAL)
            .unwrap()
            .lock()
            .truncate(torn)
            .unwrap();

        let mut cursor =
            PhysicalTransactionCursor::new(&files, files.start_of_segment(LogVersion::INITIAL))
                .unwrap();
        assert_eq!(cursor.next().unwrap().unwrap().tx_id(), TransactionId::new(101));
        assert!(cursor.next().is_none());
        assert_eq!(cursor.unreadable_tail(), Some(ends[0]));
    }

    #[test]
    fn start_without_commit_marks_tail() {
        let (files, ends) = written_log(1);
        let start = LogEntry::Start(StartEntry {
            time_written: 0,
            last_committed_tx_when_started: TransactionId::new(101),
            previous_checksum: 0,
            additional_header: Vec::new(),
        });
        files
            .append_raw(LogVersion::INITIAL, &start.encode().unwrap())
            .unwrap();

        let mut cursor = PhysicalTransactionCursor::new(&files, ends[0]).unwrap();
        assert!(cursor.next().is_none());
        assert_eq!(cursor.unreadable_tail(), Some(ends[0]));
    }

    #[test]
    fn commit_without_start_is_corruption() {
        let (files, ends) = written_log(1);
        let commit = LogEntry::Commit(CommitEntry {
            tx_id: TransactionId::new(500),
            time_written: 0,
        });
        files
            .append_raw(LogVersion::INITIAL, &commit.encode().unwrap())
            .unwrap();

        let mut cursor = PhysicalTransactionCursor::new(&files, ends[0]).unwrap();
        let err = cursor.next().unwrap().unwrap_err();
        assert!(err.is_corruption());
        assert_eq!(cursor.unreadable_tail(), Some(ends[0]));
        assert!(cursor.next().is_none());
    }

    #[test]
    fn garbage_marks_tail_at_last_commit() {
        let (files, ends) = written_log(2);
        files
            .append_raw(LogVersion::INITIAL, &[0x5A; 40])
            .unwrap();

        let mut cursor = PhysicalTransactionCursor::new(&files, ends[0]).unwrap();
        assert_eq!(cursor.next().unwrap().unwrap().tx_id(), TransactionId::new(102));
        assert!(cursor.next().unwrap().is_err());
        assert_eq!(cursor.unreadable_tail(), Some(ends[1]));
    }

    #[test]
    fn empty_segment_yields_nothing() {
        let files = LogFiles::in_memory();
        files
            .create_segment(LogVersion::INITIAL, TransactionId::BASE, 0)
            .unwrap();
        let start = LogPosition::new(LogVersion::INITIAL, SEGMENT_HEADER_SIZE);

        let mut cursor = PhysicalTransactionCursor::new(&files, start).unwrap();
        assert!(cursor.next().is_none());
        assert_eq!(cursor.position(), start);
        assert_eq!(cursor.unreadable_tail(), None);
    }
}
