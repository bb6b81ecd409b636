//! The byte store trait.

use crate::error::StoreResult;

/// An opaque byte store holding one log segment or metadata file.
///
/// # Invariants
///
/// - `append` returns the offset the data was written at, which equals
///   `size()` before the call
/// - `read_at` returns exactly the bytes previously written at that offset
/// - after `sync` returns, every appended byte and the store length survive
///   process termination
/// - `truncate` never grows a store
pub trait ByteStore: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::ReadPastEnd`] if the range extends beyond
    /// the current size, or an I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StoreResult<Vec<u8>>;

    /// Appends data and returns the offset it was written at.
    fn append(&mut self, data: &[u8]) -> StoreResult<u64>;

    /// Pushes buffered writes to the operating system.
    fn flush(&mut self) -> StoreResult<()>;

    /// Returns the current length in bytes.
    fn size(&self) -> StoreResult<u64>;

    /// Forces data and metadata to stable storage.
    fn sync(&mut self) -> StoreResult<()>;

    /// Cuts the store down to `new_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::TruncateBeyondEnd`] if `new_size` is
    /// larger than the current size.
    fn truncate(&mut self, new_size: u64) -> StoreResult<()>;
}
