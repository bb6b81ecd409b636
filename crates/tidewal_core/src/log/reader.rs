//! Streaming log entry reader.
//!
//! Reads the entries of one segment one by one through a bounded read
//! buffer, so memory use stays constant regardless of segment size.

use crate::error::{CoreError, CoreResult};
use crate::log::entry::{
    LogEntry, LogEntryType, ENTRY_CRC_SIZE, ENTRY_FORMAT_VERSION, ENTRY_HEADER_SIZE, ENTRY_MAGIC,
};
use crate::log::{LogPosition, SharedStore};
use crate::types::LogVersion;

/// Read buffer size for streaming iteration.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A streaming iterator over the entries of one log segment.
///
/// Yields `(position, entry)` pairs where `position` is the first byte of
/// the entry's frame.
///
/// # Error Handling
///
/// - A frame cut short by the end of the segment ends the iteration
///   cleanly; [`has_unread_bytes`](Self::has_unread_bytes) then reports the
///   leftover bytes
/// - Bad magic, an unsupported format, an unknown entry type, a CRC
///   mismatch or an undecodable payload yield a corruption error
/// - Store failures yield a non-corruption error
///
/// The iterator is fused after the first error.
pub struct LogEntryReader {
    store: SharedStore,
    version: LogVersion,
    /// Segment size when the reader was opened.
    total_size: u64,
    /// Offset of the next unread entry.
    current_offset: u64,
    buffer: Vec<u8>,
    buffer_pos: usize,
    buffer_len: usize,
    finished: bool,
}

impl LogEntryReader {
    /// Creates a reader over `store` starting at `position`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store size cannot be read or if the position
    /// lies beyond the end of the segment.
    pub fn new(store: SharedStore, position: LogPosition) -> CoreResult<Self> {
        let total_size = store.lock().size()?;
        if position.byte_offset() > total_size {
            return Err(CoreError::invalid_operation(format!(
                "position {position} is beyond the end of the segment ({total_size} bytes)"
            )));
        }

        Ok(Self {
            store,
            version: position.version(),
            total_size,
            current_offset: position.byte_offset(),
            buffer: vec![0u8; READ_BUFFER_SIZE],
            buffer_pos: 0,
            buffer_len: 0,
            finished: false,
        })
    }

    /// Returns the version of the segment being read.
    #[must_use]
    pub fn version(&self) -> LogVersion {
        self.version
    }

    /// Returns the position of the next unread entry.
    #[must_use]
    pub fn position(&self) -> LogPosition {
        LogPosition::new(self.version, self.current_offset)
    }

    /// Returns `true` if bytes remain past the last complete entry.
    ///
    /// After the iterator ends cleanly this means the segment ends in a
    /// partially written entry.
    #[must_use]
    pub fn has_unread_bytes(&self) -> bool {
        self.current_offset < self.total_size
    }

    /// Makes sure `min_bytes` are buffered from the current position.
    ///
    /// Returns `false` if the segment ends first. Frames larger than the
    /// buffer grow it.
    fn ensure_buffered(&mut self, min_bytes: usize) -> CoreResult<bool> {
        let available = self.buffer_len - self.buffer_pos;
        if available >= min_bytes {
            return Ok(true);
        }

        let unbuffered = self.total_size - self.current_offset - available as u64;
        if unbuffered < (min_bytes - available) as u64 {
            return Ok(false);
        }

        if self.buffer_pos > 0 && available > 0 {
            self.buffer.copy_within(self.buffer_pos..self.buffer_len, 0);
        }
        self.buffer_len = available;
        self.buffer_pos = 0;

        if min_bytes > self.buffer.len() {
            self.buffer.resize(min_bytes.next_power_of_two(), 0);
        }

        let room = (self.buffer.len() - self.buffer_len) as u64;
        let to_read = room.min(unbuffered) as usize;
        if to_read > 0 {
            let read_offset = self.current_offset + self.buffer_len as u64;
            let data = self.store.lock().read_at(read_offset, to_read)?;
            self.buffer[self.buffer_len..self.buffer_len + data.len()].copy_from_slice(&data);
            self.buffer_len += data.len();
        }

        Ok(self.buffer_len - self.buffer_pos >= min_bytes)
    }

    fn read_next_entry(&mut self) -> CoreResult<Option<(LogPosition, LogEntry)>> {
        let position = LogPosition::new(self.version, self.current_offset);

        if !self.ensure_buffered(ENTRY_HEADER_SIZE)? {
            return Ok(None);
        }

        let header = &self.buffer[self.buffer_pos..self.buffer_pos + ENTRY_HEADER_SIZE];

        if header[0..4] != ENTRY_MAGIC {
            return Err(CoreError::log_corruption(position, "invalid entry magic"));
        }

        let format = u16::from_le_bytes([header[4], header[5]]);
        if format > ENTRY_FORMAT_VERSION {
            return Err(CoreError::log_corruption(
                position,
                format!("unsupported entry format version {format}"),
            ));
        }

        let type_byte = header[6];
        let entry_type = LogEntryType::from_byte(type_byte).ok_or_else(|| {
            CoreError::log_corruption(position, format!("unknown entry type {type_byte}"))
        })?;

        let payload_len =
            u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let total_len = ENTRY_HEADER_SIZE + payload_len + ENTRY_CRC_SIZE;

        if !self.ensure_buffered(total_len)? {
            return Ok(None);
        }

        let payload_start = self.buffer_pos + ENTRY_HEADER_SIZE;
        let payload_end = payload_start + payload_len;
        let mut crc_bytes = [0u8; ENTRY_CRC_SIZE];
        crc_bytes.copy_from_slice(&self.buffer[payload_end..payload_end + ENTRY_CRC_SIZE]);
        let stored_crc = u32::from_le_bytes(crc_bytes);
        let computed_crc = crc32fast::hash(&self.buffer[self.buffer_pos..payload_end]);

        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                position,
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let entry = LogEntry::decode_payload(
            entry_type,
            &self.buffer[payload_start..payload_end],
            position,
        )?;

        self.buffer_pos += total_len;
        self.current_offset += total_len as u64;

        Ok(Some((position, entry)))
    }
}

impl Iterator for LogEntryReader {
    type Item = CoreResult<(LogPosition, LogEntry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next_entry() {
            Ok(Some(item)) => Some(Ok(item)),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::entry::CommitEntry;
    use crate::types::TransactionId;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tidewal_store::{ByteStore, MemoryStore};

    fn commit(id: u64) -> LogEntry {
        LogEntry::Commit(CommitEntry {
            tx_id: TransactionId::new(id),
            time_written: id * 10,
        })
    }

    fn store_with(entries: &[LogEntry]) -> (SharedStore, Vec<u8>) {
        let mut bytes = Vec::new();
        for entry in entries {
            bytes.extend(entry.encode().unwrap());
        }
        let store: Box<dyn ByteStore> = Box::new(MemoryStore::with_data(bytes.clone()));
        (Arc::new(Mutex::new(store)), bytes)
    }

    fn start() -> LogPosition {
        LogPosition::new(LogVersion::new(0), 0)
    }

    #[test]
    fn reads_all_entries_with_positions() {
        let (store, bytes) = store_with(&[commit(1), commit(2), commit(3)]);
        let frame_len = bytes.len() as u64 / 3;

        let read: Vec<_> = LogEntryReader::new(store, start())
            .unwrap()
            .collect::<CoreResult<_>>()
            .unwrap();

        assert_eq!(read.len(), 3);
        assert_eq!(read[1].0.byte_offset(), frame_len);
        assert_eq!(read[2].1, commit(3));
    }

    #[test]
    fn starts_mid_segment() {
        let (store, bytes) = store_with(&[commit(1), commit(2)]);
        let second = LogPosition::new(LogVersion::new(0), bytes.len() as u64 / 2);

        let read: Vec<_> = LogEntryReader::new(store, second)
            .unwrap()
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(read, vec![commit(2)]);
    }

    #[test]
    fn torn_entry_ends_cleanly() {
        let (store, bytes) = store_with(&[commit(1), commit(2)]);
        let torn_len = bytes.len() as u64 - 5;
        store.lock().truncate(torn_len).unwrap();

        let mut reader = LogEntryReader::new(store, start()).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().is_none());
        assert!(reader.has_unread_bytes());
        assert_eq!(reader.position().byte_offset(), bytes.len() as u64 / 2);
    }

    #[test]
    fn crc_mismatch_is_corruption() {
        let (_, mut bytes) = store_with(&[commit(1)]);
        bytes[ENTRY_HEADER_SIZE] ^= 0xFF;
        let store: Box<dyn ByteStore> = Box::new(MemoryStore::with_data(bytes));

        let mut reader = LogEntryReader::new(Arc::new(Mutex::new(store)), start()).unwrap();
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, CoreError::ChecksumMismatch { .. }));
        assert_eq!(err.corruption_position(), Some(start()));
        assert!(reader.next().is_none());
    }

    #[test]
    fn garbage_is_corruption() {
        let store: Box<dyn ByteStore> = Box::new(MemoryStore::with_data(vec![0xAB; 64]));
        let mut reader = LogEntryReader::new(Arc::new(Mutex::new(store)), start()).unwrap();
        assert!(reader.next().unwrap().unwrap_err().is_corruption());
    }

    #[test]
    fn large_entries_grow_the_buffer() {
        let big = LogEntry::Command(crate::transaction::Command::new(vec![7; READ_BUFFER_SIZE * 2]));
        let (store, _) = store_with(&[big.clone(), commit(9)]);

        let read: Vec<_> = LogEntryReader::new(store, start())
            .unwrap()
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(read, vec![big, commit(9)]);
    }

    #[test]
    fn rejects_position_past_end() {
        let (store, bytes) = store_with(&[commit(1)]);
        let beyond = LogPosition::new(LogVersion::new(0), bytes.len() as u64 + 1);
        assert!(LogEntryReader::new(store, beyond).is_err());
    }
}
