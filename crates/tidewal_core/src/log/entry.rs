//! Log entry types and serialization.
//!
//! Every entry is framed the same way:
//!
//! ```text
//! | magic (4) | format (2) | type (1) | payload len (4) | payload | crc32 (4) |
//! ```
//!
//! The CRC covers the frame header and the payload.

use crate::error::{CoreError, CoreResult};
use crate::log::LogPosition;
use crate::transaction::Command;
use crate::types::{LogVersion, TransactionId};
use sha2::{Digest, Sha256};

/// Magic bytes identifying a log entry.
pub const ENTRY_MAGIC: [u8; 4] = *b"TWLE";

/// Current entry format version.
pub const ENTRY_FORMAT_VERSION: u16 = 1;

/// Frame header size: magic (4) + format (2) + type (1) + length (4).
pub const ENTRY_HEADER_SIZE: usize = 11;

/// Frame trailer size.
pub const ENTRY_CRC_SIZE: usize = 4;

/// Type tag of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogEntryType {
    /// Opens a transaction.
    Start = 1,
    /// One operation of the open transaction.
    Command = 2,
    /// Closes a transaction and assigns its id.
    Commit = 3,
    /// Marks a recovery starting point.
    CheckPoint = 4,
}

impl LogEntryType {
    /// Converts a byte to an entry type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Start),
            2 => Some(Self::Command),
            3 => Some(Self::Commit),
            4 => Some(Self::CheckPoint),
            _ => None,
        }
    }

    /// Converts the entry type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Start marker of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartEntry {
    /// Time the transaction started (milliseconds since the Unix epoch).
    pub time_written: u64,
    /// Last transaction committed when this one started.
    pub last_committed_tx_when_started: TransactionId,
    /// Checksum of the previous transaction's start marker.
    pub previous_checksum: u64,
    /// Engine-specific header bytes.
    pub additional_header: Vec<u8>,
}

impl StartEntry {
    /// Checksum identifying this transaction in the history.
    ///
    /// First eight bytes (little endian) of SHA-256 over the previous
    /// checksum, the last committed id, the start time and the additional
    /// header. Chaining through `previous_checksum` ties every transaction to
    /// the one before it.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(self.previous_checksum.to_le_bytes());
        hasher.update(self.last_committed_tx_when_started.as_u64().to_le_bytes());
        hasher.update(self.time_written.to_le_bytes());
        hasher.update(&self.additional_header);
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }
}

/// Commit marker of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitEntry {
    /// Id assigned to the transaction.
    pub tx_id: TransactionId,
    /// Time of commit (milliseconds since the Unix epoch).
    pub time_written: u64,
}

/// A single decoded log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// Transaction start marker.
    Start(StartEntry),
    /// Transaction operation.
    Command(Command),
    /// Transaction commit marker.
    Commit(CommitEntry),
    /// Checkpoint pointing at the position recovery may start from.
    CheckPoint {
        /// Recovery starting point recorded by the checkpoint.
        position: LogPosition,
    },
}

impl LogEntry {
    /// Maximum payload size; the frame stores the length in four bytes.
    pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize;

    /// Returns the entry type.
    #[must_use]
    pub fn entry_type(&self) -> LogEntryType {
        match self {
            Self::Start(_) => LogEntryType::Start,
            Self::Command(_) => LogEntryType::Command,
            Self::Commit(_) => LogEntryType::Commit,
            Self::CheckPoint { .. } => LogEntryType::CheckPoint,
        }
    }

    /// Serializes the payload (without frame).
    ///
    /// # Errors
    ///
    /// Returns an error if a variable-length field exceeds
    /// [`Self::MAX_PAYLOAD_SIZE`].
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::new();

        match self {
            Self::Start(start) => {
                let header_len = checked_len(start.additional_header.len())?;
                buf.extend_from_slice(&start.time_written.to_le_bytes());
                buf.extend_from_slice(&start.last_committed_tx_when_started.as_u64().to_le_bytes());
                buf.extend_from_slice(&start.previous_checksum.to_le_bytes());
                buf.extend_from_slice(&header_len.to_le_bytes());
                buf.extend_from_slice(&start.additional_header);
            }

            Self::Command(command) => {
                checked_len(command.len())?;
                buf.extend_from_slice(command.as_bytes());
            }

            Self::Commit(commit) => {
                buf.extend_from_slice(&commit.tx_id.as_u64().to_le_bytes());
                buf.extend_from_slice(&commit.time_written.to_le_bytes());
            }

            Self::CheckPoint { position } => {
                buf.extend_from_slice(&position.version().as_u64().to_le_bytes());
                buf.extend_from_slice(&position.byte_offset().to_le_bytes());
            }
        }

        Ok(buf)
    }

    /// Serializes the entry with its frame, ready to append to a segment.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is too large.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let payload_len = checked_len(payload.len())?;

        let mut buf = Vec::with_capacity(ENTRY_HEADER_SIZE + payload.len() + ENTRY_CRC_SIZE);
        buf.extend_from_slice(&ENTRY_MAGIC);
        buf.extend_from_slice(&ENTRY_FORMAT_VERSION.to_le_bytes());
        buf.push(self.entry_type().as_byte());
        buf.extend_from_slice(&payload_len.to_le_bytes());
        buf.extend_from_slice(&payload);

        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Deserializes an entry from its type and payload.
    ///
    /// `position` is the position of the frame and is only used for error
    /// reporting.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LogCorruption`] if the payload is short, has
    /// trailing bytes or carries invalid values.
    pub fn decode_payload(
        entry_type: LogEntryType,
        payload: &[u8],
        position: LogPosition,
    ) -> CoreResult<Self> {
        let mut reader = PayloadReader {
            payload,
            cursor: 0,
            position,
        };

        let entry = match entry_type {
            LogEntryType::Start => {
                let time_written = reader.read_u64()?;
                let last_committed = TransactionId::new(reader.read_u64()?);
                let previous_checksum = reader.read_u64()?;
                let header_len = reader.read_u32()? as usize;
                let additional_header = reader.read_bytes(header_len)?.to_vec();
                Self::Start(StartEntry {
                    time_written,
                    last_committed_tx_when_started: last_committed,
                    previous_checksum,
                    additional_header,
                })
            }

            LogEntryType::Command => {
                let bytes = reader.read_bytes(payload.len())?.to_vec();
                Self::Command(Command::new(bytes))
            }

            LogEntryType::Commit => {
                let tx_id = TransactionId::new(reader.read_u64()?);
                let time_written = reader.read_u64()?;
                Self::Commit(CommitEntry {
                    tx_id,
                    time_written,
                })
            }

            LogEntryType::CheckPoint => {
                let version = LogVersion::new(reader.read_u64()?);
                let byte_offset = reader.read_u64()?;
                Self::CheckPoint {
                    position: LogPosition::new(version, byte_offset),
                }
            }
        };

        reader.finish(entry_type)?;
        Ok(entry)
    }
}

fn checked_len(len: usize) -> CoreResult<u32> {
    u32::try_from(len).map_err(|_| {
        CoreError::invalid_operation(format!(
            "log entry field too large: {len} bytes exceeds maximum of {} bytes",
            LogEntry::MAX_PAYLOAD_SIZE
        ))
    })
}

struct PayloadReader<'a> {
    payload: &'a [u8],
    cursor: usize,
    position: LogPosition,
}

impl<'a> PayloadReader<'a> {
    fn read_bytes(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .cursor
            .checked_add(len)
            .filter(|end| *end <= self.payload.len())
            .ok_or_else(|| CoreError::log_corruption(self.position, "unexpected end of payload"))?;
        let bytes = &self.payload[self.cursor..end];
        self.cursor = end;
        Ok(bytes)
    }

    fn read_u64(&mut self) -> CoreResult<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> CoreResult<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.read_bytes(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn finish(&self, entry_type: LogEntryType) -> CoreResult<()> {
        if self.cursor != self.payload.len() {
            return Err(CoreError::log_corruption(
                self.position,
                format!(
                    "trailing bytes in {entry_type:?} entry: expected {} bytes, got {}",
                    self.cursor,
                    self.payload.len()
                ),
            ));
        }
        Ok(())
    }
}
