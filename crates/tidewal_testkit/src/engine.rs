//! A storage engine that records what recovery hands it.

use tidewal_core::{
    CoreError, CoreResult, IoLimiter, StorageEngine, TransactionApplicationMode, TransactionBatch,
};

/// One call made on a [`RecordingEngine`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `prepare_for_recovery_required`.
    Prepare,
    /// A successful `apply` with the ids of the batch.
    Apply {
        /// Transaction ids in batch order.
        tx_ids: Vec<u64>,
        /// Mode the batch was applied in.
        mode: TransactionApplicationMode,
    },
    /// A successful `flush_and_force`.
    Force(IoLimiter),
}

/// Storage engine double: records every call and fails on request.
///
/// Applied batches are kept as transaction ids, so two passes over the same
/// log can be compared call by call.
#[derive(Debug, Default, Clone)]
pub struct RecordingEngine {
    calls: Vec<EngineCall>,
    apply_attempts: usize,
    fail_apply_at: Option<usize>,
    fail_force: bool,
    applied_before_prepare: bool,
}

impl RecordingEngine {
    /// Creates an engine that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the `attempt`-th call to `apply` (zero based, counting failed
    /// attempts too).
    #[must_use]
    pub fn failing_apply_at(mut self, attempt: usize) -> Self {
        self.fail_apply_at = Some(attempt);
        self
    }

    /// Fails every `flush_and_force`.
    #[must_use]
    pub fn failing_force(mut self) -> Self {
        self.fail_force = true;
        self
    }

    /// Stops injecting failures; recorded calls are kept.
    pub fn heal(&mut self) {
        self.fail_apply_at = None;
        self.fail_force = false;
    }

    /// Forgets recorded calls, keeping failure settings.
    pub fn clear(&mut self) {
        self.calls.clear();
        self.apply_attempts = 0;
        self.applied_before_prepare = false;
    }

    /// All recorded calls in order.
    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    /// Number of `prepare_for_recovery_required` calls.
    pub fn prepare_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, EngineCall::Prepare))
            .count()
    }

    /// Successfully applied batches, as transaction ids.
    pub fn batches(&self) -> Vec<Vec<u64>> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Apply { tx_ids, .. } => Some(tx_ids.clone()),
                _ => None,
            })
            .collect()
    }

    /// Sizes of the successfully applied batches.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches().iter().map(Vec::len).collect()
    }

    /// Every applied transaction id, flattened in apply order.
    pub fn applied_ids(&self) -> Vec<u64> {
        self.batches().into_iter().flatten().collect()
    }

    /// Modes of the successfully applied batches.
    pub fn modes(&self) -> Vec<TransactionApplicationMode> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Apply { mode, .. } => Some(*mode),
                _ => None,
            })
            .collect()
    }

    /// Number of successful `flush_and_force` calls.
    pub fn force_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, EngineCall::Force(_)))
            .count()
    }

    /// Whether a batch ever arrived before `prepare_for_recovery_required`.
    pub fn applied_before_prepare(&self) -> bool {
        self.applied_before_prepare
    }
}

impl StorageEngine for RecordingEngine {
    fn prepare_for_recovery_required(&mut self) {
        self.calls.push(EngineCall::Prepare);
    }

    fn apply(&mut self, batch: &TransactionBatch, mode: TransactionApplicationMode) -> CoreResult<()> {
        if self.prepare_count() == 0 {
            self.applied_before_prepare = true;
        }

        let attempt = self.apply_attempts;
        self.apply_attempts += 1;
        if self.fail_apply_at == Some(attempt) {
            return Err(CoreError::engine(format!(
                "injected failure applying batch {attempt}"
            )));
        }

        self.calls.push(EngineCall::Apply {
            tx_ids: batch.iter().map(|tx| tx.tx_id().as_u64()).collect(),
            mode,
        });
        Ok(())
    }

    fn flush_and_force(&mut self, limiter: IoLimiter) -> CoreResult<()> {
        if self.fail_force {
            return Err(CoreError::engine("injected failure forcing state to disk"));
        }
        self.calls.push(EngineCall::Force(limiter));
        Ok(())
    }
}
