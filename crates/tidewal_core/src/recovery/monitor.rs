//! Hooks for observing a recovery pass.

use crate::log::LogPosition;
use crate::recovery::RecoveredUpTo;
use crate::types::TransactionId;

/// Receives recovery progress events. Every method defaults to a no-op.
pub trait RecoveryMonitor {
    /// Replay is about to start at `from`.
    fn recovery_required(&mut self, _from: LogPosition) {}

    /// `tx_id` was read from the log and queued for application.
    fn transaction_recovered(&mut self, _tx_id: TransactionId) {}

    /// The log stops forming complete transactions at `position`.
    fn corrupt_tail(&mut self, _position: LogPosition) {}

    /// The pass finished successfully.
    fn recovery_completed(&mut self, _outcome: &RecoveredUpTo) {}
}

/// A monitor that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitor;

impl RecoveryMonitor for NoopMonitor {}
