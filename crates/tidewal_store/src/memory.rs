//! In-memory byte store.

use crate::error::{StoreError, StoreResult};
use crate::store::ByteStore;
use parking_lot::RwLock;

/// A byte store kept entirely in memory.
///
/// Used for in-memory logs, tests and dry-run recovery. `flush` and `sync`
/// are no-ops.
///
/// # Example
///
/// ```rust
/// use tidewal_store::{ByteStore, MemoryStore};
///
/// let mut store = MemoryStore::new();
/// assert_eq!(store.append(b"abc").unwrap(), 0);
/// assert_eq!(store.size().unwrap(), 3);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Vec<u8>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `data`.
    ///
    /// Handy for replaying a captured segment image.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of the stored bytes.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.read().clone()
    }
}

impl ByteStore for MemoryStore {
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>> {
        let data = self.data.read();
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StoreError::ReadPastEnd { offset, len, size });
        }

        let start = offset as usize;
        Ok(data[start..start + len].to_vec())
    }

    fn append(&mut self, bytes: &[u8]) -> StoreResult<u64> {
        let mut data = self.data.write();
        let offset = data.len() as u64;
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn flush(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn size(&self) -> StoreResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn sync(&mut self) -> StoreResult<()> {
        Ok(())
    }

    fn truncate(&mut self, new_size: u64) -> StoreResult<()> {
        let mut data = self.data.write();
        let size = data.len() as u64;
        if new_size > size {
            return Err(StoreError::TruncateBeyondEnd {
                requested: new_size,
                size,
            });
        }
        data.truncate(new_size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_is_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.size().unwrap(), 0);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn append_reports_offsets() {
        let mut store = MemoryStore::new();
        assert_eq!(store.append(b"header").unwrap(), 0);
        assert_eq!(store.append(b"entry").unwrap(), 6);
        assert_eq!(store.size().unwrap(), 11);
    }

    #[test]
    fn read_at_returns_written_bytes() {
        let mut store = MemoryStore::new();
        store.append(b"header").unwrap();
        store.append(b"entry").unwrap();

        assert_eq!(store.read_at(6, 5).unwrap(), b"entry");
        assert!(store.read_at(3, 0).unwrap().is_empty());
    }

    #[test]
    fn read_past_end_fails() {
        let mut store = MemoryStore::new();
        store.append(b"short").unwrap();

        assert!(matches!(
            store.read_at(10, 1),
            Err(StoreError::ReadPastEnd { .. })
        ));
        assert!(matches!(
            store.read_at(3, 10),
            Err(StoreError::ReadPastEnd { size: 5, .. })
        ));
    }

    #[test]
    fn with_data_preloads_image() {
        let store = MemoryStore::with_data(b"segment".to_vec());
        assert_eq!(store.size().unwrap(), 7);
        assert_eq!(store.read_at(0, 7).unwrap(), b"segment");
    }

    #[test]
    fn truncate_cuts_tail() {
        let mut store = MemoryStore::new();
        store.append(b"good-torn").unwrap();

        store.truncate(4).unwrap();
        assert_eq!(store.snapshot(), b"good");

        store.truncate(0).unwrap();
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn truncate_never_grows() {
        let mut store = MemoryStore::new();
        store.append(b"abc").unwrap();

        assert!(matches!(
            store.truncate(100),
            Err(StoreError::TruncateBeyondEnd {
                requested: 100,
                size: 3
            })
        ));
    }
}
