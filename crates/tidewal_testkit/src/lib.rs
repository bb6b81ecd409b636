//! # TideWAL Testkit
//!
//! Test utilities for TideWAL recovery.
//!
//! This crate provides:
//! - Log fixtures on memory or a temp directory ([`TestLog`])
//! - A storage engine that records what recovery hands it ([`RecordingEngine`])
//! - A scripted [`LogReader`](tidewal_core::LogReader) for exact control over
//!   what a cursor yields ([`ScriptedLog`])
//! - A byte store that simulates crashes mid-write ([`CrashableStore`])
//! - A monitor that records recovery events ([`RecordingMonitor`])
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use tidewal_testkit::prelude::*;
//! use tidewal_core::{InMemoryTransactionIdStore, RecoveryCoordinator, TransactionId};
//!
//! let log = TestLog::with_transactions(TransactionId::new(100), 3);
//! let checkpoints = log.checkpoints();
//! let mut engine = RecordingEngine::new();
//! let mut tx_ids = InMemoryTransactionIdStore::new();
//!
//! RecoveryCoordinator::new(&mut engine, log.files(), &checkpoints, &mut tx_ids)
//!     .run_recovery()
//!     .unwrap();
//! assert_eq!(engine.applied_ids(), vec![101, 102, 103]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod engine;
pub mod fixtures;
pub mod generators;
pub mod monitor;
pub mod scripted;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::engine::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::monitor::*;
    pub use crate::scripted::*;
}

pub use crash::*;
pub use engine::*;
pub use fixtures::*;
pub use generators::*;
pub use monitor::*;
pub use scripted::*;
