//! Durable record of the last closed transaction.
//!
//! After recovery the coordinator records which transaction was applied
//! last, its checksum, commit time and where in the log it ends. The next
//! recovery and the next writer start from there.
//!
//! File format (`TXID`):
//!
//! ```text
//! | magic (4) | version (2) | reserved (2) | tx id (8) | checksum (8) |
//! | commit time (8) | log version (8) | byte offset (8) | crc32 (4) |
//! ```

use crate::error::{CoreError, CoreResult};
use crate::log::{sync_directory, LogPosition, SEGMENT_HEADER_SIZE};
use crate::types::{LogVersion, TransactionId};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

const TXID_MAGIC: [u8; 4] = *b"TWTX";
const TXID_VERSION: u16 = 1;
const TXID_FILE_SIZE: usize = 52;

/// File name of the transaction id store within a log directory.
pub const TXID_FILE: &str = "TXID";
const TXID_TEMP: &str = "TXID.tmp";

/// The last transaction whose effects are known to be in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedTransaction {
    /// Transaction id.
    pub tx_id: TransactionId,
    /// Start-entry checksum of the transaction.
    pub checksum: u64,
    /// Commit time (milliseconds since the Unix epoch).
    pub commit_time: u64,
    /// Log position just after the transaction.
    pub log_position: LogPosition,
}

impl Default for ClosedTransaction {
    fn default() -> Self {
        Self {
            tx_id: TransactionId::BASE,
            checksum: 0,
            commit_time: 0,
            log_position: LogPosition::new(LogVersion::INITIAL, SEGMENT_HEADER_SIZE),
        }
    }
}

/// Bookkeeping of the last committed and closed transaction.
pub trait TransactionIdStore {
    /// Returns the last closed transaction.
    fn last_closed_transaction(&self) -> ClosedTransaction;

    /// Records `tx_id` as both last committed and last closed.
    ///
    /// `byte_offset` and `log_version` locate the end of the transaction in
    /// the log.
    fn set_last_committed_and_closed(
        &mut self,
        tx_id: TransactionId,
        checksum: u64,
        commit_time: u64,
        byte_offset: u64,
        log_version: LogVersion,
    ) -> CoreResult<()>;
}

/// Transaction id store kept in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTransactionIdStore {
    last_closed: ClosedTransaction,
    updates: usize,
}

impl InMemoryTransactionIdStore {
    /// Creates a store at the initial state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose last closed transaction is `closed`.
    #[must_use]
    pub fn with_last_closed(closed: ClosedTransaction) -> Self {
        Self {
            last_closed: closed,
            updates: 0,
        }
    }

    /// Returns how many times the record was updated.
    #[must_use]
    pub fn updates(&self) -> usize {
        self.updates
    }
}

impl TransactionIdStore for InMemoryTransactionIdStore {
    fn last_closed_transaction(&self) -> ClosedTransaction {
        self.last_closed
    }

    fn set_last_committed_and_closed(
        &mut self,
        tx_id: TransactionId,
        checksum: u64,
        commit_time: u64,
        byte_offset: u64,
        log_version: LogVersion,
    ) -> CoreResult<()> {
        self.last_closed = ClosedTransaction {
            tx_id,
            checksum,
            commit_time,
            log_position: LogPosition::new(log_version, byte_offset),
        };
        self.updates += 1;
        Ok(())
    }
}

/// Transaction id store persisted as a small file in the log directory.
///
/// Every update is written to a temporary file, synced and renamed over the
/// previous record, so a crash leaves either the old or the new record.
#[derive(Debug)]
pub struct FileTransactionIdStore {
    dir: PathBuf,
    last_closed: ClosedTransaction,
}

impl FileTransactionIdStore {
    /// Opens the store in `dir`, reading the existing record if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the record exists but is unreadable.
    pub fn open(dir: &Path) -> CoreResult<Self> {
        let path = dir.join(TXID_FILE);
        let last_closed = if path.exists() {
            decode(&fs::read(&path)?)?
        } else {
            ClosedTransaction::default()
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            last_closed,
        })
    }

    /// Returns the path of the record file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(TXID_FILE)
    }

    fn persist(&self, closed: &ClosedTransaction) -> CoreResult<()> {
        let temp_path = self.dir.join(TXID_TEMP);
        let mut file = File::create(&temp_path)?;
        file.write_all(&encode(closed))?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.path())?;
        sync_directory(&self.dir)
    }
}

impl TransactionIdStore for FileTransactionIdStore {
    fn last_closed_transaction(&self) -> ClosedTransaction {
        self.last_closed
    }

    fn set_last_committed_and_closed(
        &mut self,
        tx_id: TransactionId,
        checksum: u64,
        commit_time: u64,
        byte_offset: u64,
        log_version: LogVersion,
    ) -> CoreResult<()> {
        let closed = ClosedTransaction {
            tx_id,
            checksum,
            commit_time,
            log_position: LogPosition::new(log_version, byte_offset),
        };
        self.persist(&closed)?;
        self.last_closed = closed;
        Ok(())
    }
}

fn encode(closed: &ClosedTransaction) -> Vec<u8> {
    let mut buf = Vec::with_capacity(TXID_FILE_SIZE);
    buf.extend_from_slice(&TXID_MAGIC);
    buf.extend_from_slice(&TXID_VERSION.to_le_bytes());
    buf.extend_from_slice(&[0u8; 2]);
    buf.extend_from_slice(&closed.tx_id.as_u64().to_le_bytes());
    buf.extend_from_slice(&closed.checksum.to_le_bytes());
    buf.extend_from_slice(&closed.commit_time.to_le_bytes());
    buf.extend_from_slice(&closed.log_position.version().as_u64().to_le_bytes());
    buf.extend_from_slice(&closed.log_position.byte_offset().to_le_bytes());
    let crc = crc32fast::hash(&buf);
    buf.extend_from_slice(&crc.to_le_bytes());
    buf
}

fn decode(data: &[u8]) -> CoreResult<ClosedTransaction> {
    if data.len() != TXID_FILE_SIZE {
        return Err(CoreError::invalid_format(format!(
            "transaction id record has {} bytes, expected {TXID_FILE_SIZE}",
            data.len()
        )));
    }
    if data[0..4] != TXID_MAGIC {
        return Err(CoreError::invalid_format("invalid transaction id record magic"));
    }
    let version = u16::from_le_bytes([data[4], data[5]]);
    if version > TXID_VERSION {
        return Err(CoreError::invalid_format(format!(
            "unsupported transaction id record version: {version}"
        )));
    }

    let body_end = TXID_FILE_SIZE - 4;
    let stored = u32::from_le_bytes([
        data[body_end],
        data[body_end + 1],
        data[body_end + 2],
        data[body_end + 3],
    ]);
    let computed = crc32fast::hash(&data[..body_end]);
    if stored != computed {
        return Err(CoreError::invalid_format(format!(
            "transaction id record checksum mismatch: stored {stored:08x}, computed {computed:08x}"
        )));
    }

    let field = |index: usize| {
        let start = 8 + index * 8;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&data[start..start + 8]);
        u64::from_le_bytes(bytes)
    };

    Ok(ClosedTransaction {
        tx_id: TransactionId::new(field(0)),
        checksum: field(1),
        commit_time: field(2),
        log_position: LogPosition::new(LogVersion::new(field(3)), field(4)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn in_memory_starts_at_base() {
        let store = InMemoryTransactionIdStore::new();
        assert_eq!(store.last_closed_transaction().tx_id, TransactionId::BASE);
        assert_eq!(store.updates(), 0);
    }

    #[test]
    fn in_memory_records_update() {
        let mut store = InMemoryTransactionIdStore::new();
        store
            .set_last_committed_and_closed(TransactionId::new(105), 9, 1_234, 400, LogVersion::new(2))
            .unwrap();

        let closed = store.last_closed_transaction();
        assert_eq!(closed.tx_id, TransactionId::new(105));
        assert_eq!(closed.checksum, 9);
        assert_eq!(closed.commit_time, 1_234);
        assert_eq!(closed.log_position, LogPosition::new(LogVersion::new(2), 400));
        assert_eq!(store.updates(), 1);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut store = FileTransactionIdStore::open(dir.path()).unwrap();
            assert_eq!(store.last_closed_transaction(), ClosedTransaction::default());
            store
                .set_last_committed_and_closed(TransactionId::new(42), 7, 99, 128, LogVersion::new(1))
                .unwrap();
        }

        let store = FileTransactionIdStore::open(dir.path()).unwrap();
        let closed = store.last_closed_transaction();
        assert_eq!(closed.tx_id, TransactionId::new(42));
        assert_eq!(closed.log_position, LogPosition::new(LogVersion::new(1), 128));
        assert!(!dir.path().join(TXID_TEMP).exists());
    }

    #[test]
    fn corrupt_record_is_rejected() {
        let dir = tempdir().unwrap();
        let mut bytes = encode(&ClosedTransaction::default());
        bytes[10] ^= 0x01;
        fs::write(dir.path().join(TXID_FILE), bytes).unwrap();

        assert!(matches!(
            FileTransactionIdStore::open(dir.path()),
            Err(CoreError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn encoded_size_is_fixed() {
        assert_eq!(encode(&ClosedTransaction::default()).len(), TXID_FILE_SIZE);
    }
}
