//! # TideWAL Store
//!
//! Byte stores backing TideWAL log segments and metadata files.
//!
//! A byte store is an **append-mostly, opaque** sequence of bytes. It knows
//! nothing about log entries, segment headers or transactions; the log layer
//! in `tidewal_core` owns all interpretation.
//!
//! ## Operations
//!
//! - positional reads (`read_at`)
//! - appends that report the offset they landed at
//! - `flush` (push to the OS) and `sync` (data and metadata on disk)
//! - `truncate`, used to cut a torn tail off a log segment after recovery
//!
//! ## Available Stores
//!
//! - [`MemoryStore`] - ephemeral, for tests and dry runs
//! - [`FileStore`] - one OS file per store, created by temp file and rename
//!
//! ## Example
//!
//! ```rust
//! use tidewal_store::{ByteStore, MemoryStore};
//!
//! let mut store = MemoryStore::new();
//! let offset = store.append(b"segment bytes").unwrap();
//! assert_eq!(store.read_at(offset, 7).unwrap(), b"segment");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{StoreError, StoreResult};
pub use file::{FileStore, TEMP_SUFFIX};
pub use memory::MemoryStore;
pub use store::ByteStore;
