//! The storage engine seen from the recovery side.
//!
//! Recovery never touches store files itself. It hands batches of
//! transactions to a [`StorageEngine`] and asks it to make its state
//! durable once replay is done.

mod batch;

pub use batch::{BatchIter, TransactionBatch, TransactionToApply};
pub(crate) use batch::push_front;

use crate::error::CoreResult;

/// How a batch of transactions reaches the engine.
///
/// Recovery only ever applies in [`Recovery`](Self::Recovery) mode; the
/// mode is passed so an engine shared with live commits can tell replayed
/// batches apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionApplicationMode {
    /// Transactions replayed from the log after a crash.
    ///
    /// The engine is known to be behind the log and nothing else mutates it,
    /// so checks such as duplicate-id detection may be relaxed.
    Recovery,
}

/// I/O throttling for [`StorageEngine::flush_and_force`].
///
/// Recovery has no competing workload, so its final force is never
/// throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoLimiter {
    /// No throttling.
    Unlimited,
}

/// The store that recovery replays into.
pub trait StorageEngine {
    /// Called once per recovery pass, before anything else, when the engine
    /// has to expect replayed transactions.
    fn prepare_for_recovery_required(&mut self);

    /// Applies `batch` in order.
    ///
    /// # Errors
    ///
    /// Any error fails the recovery pass.
    fn apply(&mut self, batch: &TransactionBatch, mode: TransactionApplicationMode)
        -> CoreResult<()>;

    /// Writes all buffered state to stable storage.
    ///
    /// # Errors
    ///
    /// Any error fails the recovery pass.
    fn flush_and_force(&mut self, limiter: IoLimiter) -> CoreResult<()>;
}
