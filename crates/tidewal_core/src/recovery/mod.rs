//! Crash recovery.
//!
//! After an unclean shutdown the storage engine may be missing transactions
//! that the log already holds. [`RecoveryCoordinator`] finds where the engine
//! left off ([`PositionLocator`]), streams the remaining transactions out of
//! the log and applies them in batches ([`TransactionQueue`]), then records
//! the last applied transaction and forces the engine to disk.

mod coordinator;
mod error;
mod monitor;
mod path;
mod position;
mod queue;

pub use coordinator::{RecoveredUpTo, RecoveryCoordinator, RecoveryState};
pub use error::{RecoveryError, RecoveryResult};
pub use monitor::{NoopMonitor, RecoveryMonitor};
pub use path::{PathElement, ReplayHop, ReplayPath};
pub use position::{PositionError, PositionLocator, RecoveryStart};
pub use queue::TransactionQueue;
