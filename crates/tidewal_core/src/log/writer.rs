//! Appends transactions to the log.

use crate::error::{CoreError, CoreResult};
use crate::log::cursor::PhysicalTransactionCursor;
use crate::log::{CommitEntry, LogEntry, LogFiles, LogPosition, StartEntry, TransactionCursor};
use crate::transaction::Command;
use crate::types::{LogVersion, TransactionId};
use std::time::{SystemTime, UNIX_EPOCH};

/// Appends committed transactions to the newest segment of a log.
///
/// Each transaction (start, commands, commit) is written with a single
/// append, so a crash leaves at most one torn transaction at the end of the
/// segment.
pub struct LogWriter<'a> {
    files: &'a LogFiles,
    version: LogVersion,
    /// End of the newest segment.
    offset: u64,
    last_tx: TransactionId,
    last_checksum: u64,
}

impl<'a> LogWriter<'a> {
    /// Opens a writer that continues after the last transaction in the log.
    ///
    /// An empty log gets its first segment with [`TransactionId::BASE`] as
    /// the last committed transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] if the newest segment ends in
    /// an unreadable tail; recovery has to truncate it first.
    pub fn new(files: &'a LogFiles) -> CoreResult<Self> {
        let Some(version) = files.highest_version() else {
            return Self::with_base(files, TransactionId::BASE);
        };

        let header = files
            .segment_header(version)?
            .ok_or_else(|| CoreError::invalid_operation(format!("segment {version} vanished")))?;
        let mut last_tx = header.last_committed_tx;
        let mut last_checksum = header.last_checksum;

        let mut cursor = PhysicalTransactionCursor::new(files, files.start_of_segment(version))?;
        for tx in cursor.by_ref() {
            let tx = tx.map_err(|err| {
                CoreError::invalid_operation(format!(
                    "log is not writable until recovered: {err}"
                ))
            })?;
            last_tx = tx.tx_id();
            last_checksum = tx.checksum();
        }
        if let Some(tail) = cursor.unreadable_tail() {
            return Err(CoreError::invalid_operation(format!(
                "log ends in an unreadable tail at {tail}; run recovery first"
            )));
        }
        let offset = cursor.position().byte_offset();

        Ok(Self {
            files,
            version,
            offset,
            last_tx,
            last_checksum,
        })
    }

    /// Creates the first segment of an empty log, treating `base` as the
    /// last committed transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the log already has segments.
    pub fn with_base(files: &'a LogFiles, base: TransactionId) -> CoreResult<Self> {
        if files.highest_version().is_some() {
            return Err(CoreError::invalid_operation(
                "log already has segments; use LogWriter::new",
            ));
        }

        let version = LogVersion::INITIAL;
        files.create_segment(version, base, 0)?;
        Ok(Self {
            files,
            version,
            offset: files.start_of_segment(version).byte_offset(),
            last_tx: base,
            last_checksum: 0,
        })
    }

    /// Appends a transaction and returns its id and the position just after
    /// it.
    ///
    /// # Errors
    ///
    /// Returns an error if an entry is too large or on I/O failure.
    pub fn append_transaction(
        &mut self,
        additional_header: &[u8],
        commands: &[Command],
    ) -> CoreResult<(TransactionId, LogPosition)> {
        let tx_id = self.last_tx.next();
        let start = StartEntry {
            time_written: now_millis(),
            last_committed_tx_when_started: self.last_tx,
            previous_checksum: self.last_checksum,
            additional_header: additional_header.to_vec(),
        };
        let checksum = start.checksum();
        let commit = LogEntry::Commit(CommitEntry {
            tx_id,
            time_written: now_millis(),
        });

        let mut data = LogEntry::Start(start).encode()?;
        for command in commands {
            data.extend(LogEntry::Command(command.clone()).encode()?);
        }
        data.extend(commit.encode()?);

        let offset = self.files.append_raw(self.version, &data)?;
        self.offset = offset + data.len() as u64;
        self.last_tx = tx_id;
        self.last_checksum = checksum;

        Ok((tx_id, self.position()))
    }

    /// Appends a checkpoint recording `target` as the recovery starting
    /// point. Returns the position just after the checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` lies after the current end of the log
    /// or on I/O failure.
    pub fn append_checkpoint(&mut self, target: LogPosition) -> CoreResult<LogPosition> {
        if target > self.position() {
            return Err(CoreError::invalid_operation(format!(
                "checkpoint target {target} lies after the end of the log"
            )));
        }

        let data = LogEntry::CheckPoint { position: target }.encode()?;
        let offset = self.files.append_raw(self.version, &data)?;
        self.offset = offset + data.len() as u64;
        tracing::debug!(%target, "appended checkpoint");
        Ok(self.position())
    }

    /// Starts a new segment. Returns its version.
    pub fn rotate(&mut self) -> CoreResult<LogVersion> {
        let next = self.version.next();
        self.files
            .create_segment(next, self.last_tx, self.last_checksum)?;
        self.version = next;
        self.offset = self.files.start_of_segment(next).byte_offset();
        tracing::debug!(version = %next, last_tx = %self.last_tx, "rotated log");
        Ok(next)
    }

    /// Returns the end of the log.
    #[must_use]
    pub fn position(&self) -> LogPosition {
        LogPosition::new(self.version, self.offset)
    }

    /// Returns the id of the last transaction written.
    #[must_use]
    pub fn last_committed(&self) -> TransactionId {
        self.last_tx
    }

    /// Returns the checksum of the last transaction written.
    #[must_use]
    pub fn last_checksum(&self) -> u64 {
        self.last_checksum
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
