//! Decoded transactions as produced by the log.

use crate::log::{CommitEntry, StartEntry};
use crate::types::TransactionId;

/// One logical operation of a transaction.
///
/// The command encoding belongs to the storage engine; the log and the
/// recovery engine carry it as opaque bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command(Vec<u8>);

impl Command {
    /// Wraps encoded command bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the encoded size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the command carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Command {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// The operations of a transaction plus the metadata the engine needs to
/// apply them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRepresentation {
    commands: Vec<Command>,
    additional_header: Vec<u8>,
    time_started: u64,
    latest_committed_tx_when_started: TransactionId,
    time_committed: u64,
}

impl TransactionRepresentation {
    /// Creates a representation from commands and metadata.
    #[must_use]
    pub fn new(
        commands: Vec<Command>,
        additional_header: Vec<u8>,
        time_started: u64,
        latest_committed_tx_when_started: TransactionId,
        time_committed: u64,
    ) -> Self {
        Self {
            commands,
            additional_header,
            time_started,
            latest_committed_tx_when_started,
            time_committed,
        }
    }

    /// Returns the commands in log order.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Returns the engine-specific header bytes.
    #[must_use]
    pub fn additional_header(&self) -> &[u8] {
        &self.additional_header
    }

    /// Returns the start time (milliseconds since the Unix epoch).
    #[must_use]
    pub fn time_started(&self) -> u64 {
        self.time_started
    }

    /// Returns the last transaction committed when this one started.
    #[must_use]
    pub fn latest_committed_tx_when_started(&self) -> TransactionId {
        self.latest_committed_tx_when_started
    }

    /// Returns the commit time (milliseconds since the Unix epoch).
    #[must_use]
    pub fn time_committed(&self) -> u64 {
        self.time_committed
    }
}

/// A transaction decoded from the log: start marker, operations and commit
/// marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedTransaction {
    start: StartEntry,
    representation: TransactionRepresentation,
    commit: CommitEntry,
}

impl CommittedTransaction {
    /// Assembles a committed transaction from its log entries.
    #[must_use]
    pub fn new(start: StartEntry, commands: Vec<Command>, commit: CommitEntry) -> Self {
        let representation = TransactionRepresentation::new(
            commands,
            start.additional_header.clone(),
            start.time_written,
            start.last_committed_tx_when_started,
            commit.time_written,
        );
        Self {
            start,
            representation,
            commit,
        }
    }

    /// Returns the start marker.
    #[must_use]
    pub fn start(&self) -> &StartEntry {
        &self.start
    }

    /// Returns the commit marker.
    #[must_use]
    pub fn commit(&self) -> &CommitEntry {
        &self.commit
    }

    /// Returns the operations.
    #[must_use]
    pub fn representation(&self) -> &TransactionRepresentation {
        &self.representation
    }

    /// Returns the committed transaction id.
    #[must_use]
    pub fn tx_id(&self) -> TransactionId {
        self.commit.tx_id
    }

    /// Returns the checksum of the start marker.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        self.start.checksum()
    }

    /// Returns the commit time (milliseconds since the Unix epoch).
    #[must_use]
    pub fn commit_time(&self) -> u64 {
        self.commit.time_written
    }

    /// Consumes the transaction, keeping only its operations.
    #[must_use]
    pub fn into_representation(self) -> TransactionRepresentation {
        self.representation
    }
}
