//! Error types for byte store operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for byte store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by byte stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Attempted to read beyond the end of the store.
    #[error("read beyond end of store: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current store size.
        size: u64,
    },

    /// Attempted to truncate to a size larger than the store.
    #[error("cannot truncate store of size {size} to {requested} bytes")]
    TruncateBeyondEnd {
        /// The requested new size.
        requested: u64,
        /// The current store size.
        size: u64,
    },

    /// The file to create already exists.
    #[error("store file {} already exists", .path.display())]
    AlreadyExists {
        /// Path of the existing file.
        path: PathBuf,
    },

    /// The file no longer ends where the store last wrote.
    #[error("store length changed underneath: expected {expected} bytes, found {actual}")]
    LengthChanged {
        /// Length written through the store.
        expected: u64,
        /// Length found in the file.
        actual: u64,
    },
}
