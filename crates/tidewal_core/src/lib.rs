//! # TideWAL Core
//!
//! Crash recovery for a WAL-backed store.
//!
//! This crate provides:
//! - A segmented transaction log with CRC-framed entries ([`log`])
//! - Checkpoint lookup ([`LatestCheckpointFinder`])
//! - Durable bookkeeping of the last closed transaction ([`txid_store`])
//! - The storage engine contract recovery replays into ([`engine`])
//! - The recovery pass itself ([`recovery`])
//!
//! ## Example
//!
//! ```rust
//! use tidewal_core::{LogFiles, LogWriter, Command, TransactionId};
//!
//! let files = LogFiles::in_memory();
//! let mut writer = LogWriter::with_base(&files, TransactionId::new(100)).unwrap();
//! let (tx_id, end) = writer.append_transaction(&[], &[Command::new(b"op".to_vec())]).unwrap();
//! assert_eq!(tx_id, TransactionId::new(101));
//! assert_eq!(end, writer.position());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod config;
pub mod engine;
mod error;
pub mod log;
pub mod recovery;
mod transaction;
pub mod txid_store;
mod types;

pub use checkpoint::{CheckpointSource, LatestCheckpointFinder};
pub use config::{
    LogConfig, RecoveryConfig, TailPolicy, DEFAULT_BATCH_SIZE, DEFAULT_PROGRESS_INTERVAL,
};
pub use engine::{
    IoLimiter, StorageEngine, TransactionApplicationMode, TransactionBatch, TransactionToApply,
};
pub use error::{CoreError, CoreResult};
pub use log::{
    LogEntry, LogFiles, LogPosition, LogReader, LogWriter, TransactionCursor,
};
pub use recovery::{
    NoopMonitor, PositionError, PositionLocator, RecoveredUpTo, RecoveryCoordinator,
    RecoveryError, RecoveryMonitor, RecoveryResult, RecoveryStart, RecoveryState, ReplayPath,
    TransactionQueue,
};
pub use transaction::{Command, CommittedTransaction, TransactionRepresentation};
pub use txid_store::{
    ClosedTransaction, FileTransactionIdStore, InMemoryTransactionIdStore, TransactionIdStore,
};
pub use types::{LogVersion, TransactionId};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
