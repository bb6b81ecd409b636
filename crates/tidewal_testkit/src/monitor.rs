//! A recovery monitor that records every event.

use tidewal_core::{LogPosition, RecoveredUpTo, RecoveryMonitor, ReplayPath, TransactionId};

/// Records recovery events for later assertions.
#[derive(Debug, Default, Clone)]
pub struct RecordingMonitor {
    /// Positions reported by `recovery_required`.
    pub required: Vec<LogPosition>,
    /// Transactions reported as recovered, in order.
    pub recovered: Vec<TransactionId>,
    /// Corrupt tails reported.
    pub corrupt_tails: Vec<LogPosition>,
    /// Outcomes of completed passes.
    pub completed: Vec<RecoveredUpTo>,
}

impl RecordingMonitor {
    /// Creates an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// The replayed transactions as a path, if any were replayed.
    pub fn replay_path(&self) -> Option<ReplayPath> {
        ReplayPath::from_transactions(self.recovered.iter().copied())
    }
}

impl RecoveryMonitor for RecordingMonitor {
    fn recovery_required(&mut self, from: LogPosition) {
        self.required.push(from);
    }

    fn transaction_recovered(&mut self, tx_id: TransactionId) {
        self.recovered.push(tx_id);
    }

    fn corrupt_tail(&mut self, position: LogPosition) {
        self.corrupt_tails.push(position);
    }

    fn recovery_completed(&mut self, outcome: &RecoveredUpTo) {
        self.completed.push(outcome.clone());
    }
}
