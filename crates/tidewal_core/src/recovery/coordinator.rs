//! Drives a recovery pass from position lookup to durable bookkeeping.

use crate::checkpoint::CheckpointSource;
use crate::config::{RecoveryConfig, TailPolicy};
use crate::engine::{
    IoLimiter, StorageEngine, TransactionApplicationMode, TransactionBatch, TransactionToApply,
};
use crate::error::CoreError;
use crate::log::{LogPosition, LogReader, TransactionCursor};
use crate::recovery::{
    PositionError, PositionLocator, RecoveryError, RecoveryMonitor, RecoveryResult,
    RecoveryStart, TransactionQueue,
};
use crate::txid_store::TransactionIdStore;
use crate::types::TransactionId;

/// Phase of a recovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// Not started.
    Idle,
    /// Looking up where replay starts.
    LocatingPosition,
    /// Reading the log and applying transactions.
    Replaying,
    /// Applying the last batch, recording bookkeeping, forcing the engine.
    Finalizing,
    /// Finished successfully.
    Done,
    /// Abandoned after a fatal error.
    Failed,
}

/// Outcome of a successful recovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredUpTo {
    /// Position just after the last recovered transaction, or the located
    /// start if nothing was replayed.
    pub position: LogPosition,
    /// Last recovered transaction.
    pub last_transaction: Option<TransactionId>,
    /// Number of transactions applied.
    pub transactions_recovered: u64,
    /// Number of `apply` calls made.
    pub batches_applied: u64,
    /// Where the log stopped forming complete transactions, if it did.
    pub corrupt_tail: Option<LogPosition>,
    /// Whether the log was cut at `corrupt_tail`.
    pub tail_truncated: bool,
    /// Whether replay ran at all (`false` on the fast path).
    pub replayed: bool,
}

impl RecoveredUpTo {
    fn nothing_to_recover(position: LogPosition) -> Self {
        Self {
            position,
            last_transaction: None,
            transactions_recovered: 0,
            batches_applied: 0,
            corrupt_tail: None,
            tail_truncated: false,
            replayed: false,
        }
    }
}

struct LastRecovered {
    tx_id: TransactionId,
    checksum: u64,
    commit_time: u64,
    end: LogPosition,
}

/// Replays the committed transactions the storage engine is missing.
///
/// A pass:
/// 1. tells the engine recovery is requested
/// 2. locates the replay start; stops if nothing follows it
/// 3. streams transactions from the log into a [`TransactionQueue`], which
///    applies them in batches in [`TransactionApplicationMode::Recovery`]
/// 4. applies what is left, records the last transaction in the
///    [`TransactionIdStore`] and forces the engine
/// 5. cuts off an unreadable log tail, if configured to
///
/// A corrupt or torn tail in the newest segment ends replay at the last
/// complete transaction instead of failing the pass. Every other failure is returned as-is; the
/// pass can be rerun from scratch.
///
/// # Example
///
/// ```rust
/// use tidewal_core::{
///     CoreResult, InMemoryTransactionIdStore, IoLimiter, LatestCheckpointFinder, LogFiles,
///     LogWriter, RecoveryCoordinator, StorageEngine, TransactionApplicationMode,
///     TransactionBatch,
/// };
///
/// #[derive(Default)]
/// struct Counting(usize);
///
/// impl StorageEngine for Counting {
///     fn prepare_for_recovery_required(&mut self) {}
///     fn apply(&mut self, batch: &TransactionBatch, _: TransactionApplicationMode) -> CoreResult<()> {
///         self.0 += batch.len();
///         Ok(())
///     }
///     fn flush_and_force(&mut self, _: IoLimiter) -> CoreResult<()> {
///         Ok(())
///     }
/// }
///
/// let files = LogFiles::in_memory();
/// let mut writer = LogWriter::new(&files).unwrap();
/// writer.append_transaction(&[], &[]).unwrap();
///
/// let mut engine = Counting::default();
/// let mut tx_ids = InMemoryTransactionIdStore::new();
/// let checkpoints = LatestCheckpointFinder::new(&files);
/// let outcome = RecoveryCoordinator::new(&mut engine, &files, &checkpoints, &mut tx_ids)
///     .run_recovery()
///     .unwrap();
///
/// assert_eq!(outcome.transactions_recovered, 1);
/// assert_eq!(engine.0, 1);
/// ```
pub struct RecoveryCoordinator<'a> {
    engine: &'a mut dyn StorageEngine,
    log: &'a dyn LogReader,
    checkpoints: &'a dyn CheckpointSource,
    tx_ids: &'a mut dyn TransactionIdStore,
    monitor: Option<&'a mut dyn RecoveryMonitor>,
    config: RecoveryConfig,
    state: RecoveryState,
    prepared: bool,
}

impl<'a> RecoveryCoordinator<'a> {
    /// Creates a coordinator with the default configuration.
    pub fn new(
        engine: &'a mut dyn StorageEngine,
        log: &'a dyn LogReader,
        checkpoints: &'a dyn CheckpointSource,
        tx_ids: &'a mut dyn TransactionIdStore,
    ) -> Self {
        Self {
            engine,
            log,
            checkpoints,
            tx_ids,
            monitor: None,
            config: RecoveryConfig::default(),
            state: RecoveryState::Idle,
            prepared: false,
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: RecoveryConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches a progress monitor.
    #[must_use]
    pub fn with_monitor(mut self, monitor: &'a mut dyn RecoveryMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Returns the phase of the current or last pass.
    #[must_use]
    pub fn state(&self) -> RecoveryState {
        self.state
    }

    /// Runs a recovery pass.
    ///
    /// May be called again after a failure or a success; each call is an
    /// independent pass.
    ///
    /// # Errors
    ///
    /// Returns a [`RecoveryError`] if the start position is invalid, the log
    /// can't be read, or the engine or bookkeeping fails. Corruption in the
    /// newest segment ends replay; corruption in an older one is
    /// [`RecoveryError::CorruptionBeforeEnd`].
    pub fn run_recovery(&mut self) -> RecoveryResult<RecoveredUpTo> {
        self.state = RecoveryState::LocatingPosition;
        self.prepared = false;

        match self.run() {
            Ok(outcome) => {
                self.state = RecoveryState::Done;
                tracing::info!(
                    position = %outcome.position,
                    recovered = outcome.transactions_recovered,
                    batches = outcome.batches_applied,
                    "recovery completed"
                );
                if let Some(monitor) = self.monitor.as_deref_mut() {
                    monitor.recovery_completed(&outcome);
                }
                Ok(outcome)
            }
            Err(err) => {
                self.state = RecoveryState::Failed;
                tracing::error!(error = %err, "recovery failed");
                Err(err)
            }
        }
    }

    fn run(&mut self) -> RecoveryResult<RecoveredUpTo> {
        tracing::info!("starting recovery");
        self.engine.prepare_for_recovery_required();
        self.prepared = true;

        let current = self
            .log
            .current_version()
            .map_err(PositionError::LogInventory)?;
        let from = match PositionLocator::new(self.checkpoints, self.log).locate(current)? {
            RecoveryStart::NothingToRecover(position) => {
                tracing::info!(%position, "no transactions to recover");
                return Ok(RecoveredUpTo::nothing_to_recover(position));
            }
            RecoveryStart::ReplayFrom(position) => position,
        };

        tracing::info!(%from, "recovery required, replaying log");
        if let Some(monitor) = self.monitor.as_deref_mut() {
            monitor.recovery_required(from);
        }
        self.state = RecoveryState::Replaying;

        debug_assert!(
            self.prepared,
            "engine must be prepared before transactions are applied"
        );

        let engine = &mut *self.engine;
        let mut batches_applied = 0u64;
        let apply = |batch: &TransactionBatch| -> RecoveryResult<()> {
            tracing::debug!(
                first = %batch.first_tx_id(),
                last = %batch.last_tx_id(),
                count = batch.len(),
                "applying recovered batch"
            );
            engine
                .apply(batch, TransactionApplicationMode::Recovery)
                .map_err(|source| RecoveryError::Apply {
                    first: batch.first_tx_id(),
                    last: batch.last_tx_id(),
                    count: batch.len(),
                    source,
                })?;
            batches_applied += 1;
            Ok(())
        };
        let mut queue = TransactionQueue::new(self.config.batch_size, apply);

        let log = self.log;
        let mut cursor = log.open(from).map_err(|source| RecoveryError::LogRead {
            position: from,
            source,
        })?;

        let mut last: Option<LastRecovered> = None;
        let mut recovered = 0u64;
        let corrupt_tail = loop {
            match cursor.next() {
                None => {
                    let tail = cursor.unreadable_tail();
                    let before_newest = tail
                        .zip(current)
                        .filter(|(tail, newest)| tail.version() < *newest);
                    if let Some((tail, newest)) = before_newest {
                        return Err(RecoveryError::CorruptionBeforeEnd {
                            position: tail,
                            newest,
                            source: CoreError::log_corruption(tail, "incomplete transaction"),
                        });
                    }
                    break tail;
                }
                Some(Ok(tx)) => {
                    let tx_id = tx.tx_id();
                    last = Some(LastRecovered {
                        tx_id,
                        checksum: tx.checksum(),
                        commit_time: tx.commit_time(),
                        end: cursor.position(),
                    });
                    queue.submit(TransactionToApply::new(tx_id, tx.into_representation()))?;

                    recovered += 1;
                    if let Some(monitor) = self.monitor.as_deref_mut() {
                        monitor.transaction_recovered(tx_id);
                    }
                    if self.config.progress_interval > 0
                        && recovered % self.config.progress_interval == 0
                    {
                        tracing::debug!(recovered, last = %tx_id, "recovery progress");
                    }
                }
                Some(Err(err)) if err.is_corruption() => {
                    let tail = cursor.unreadable_tail().unwrap_or_else(|| cursor.position());
                    if let Some(newest) = current.filter(|newest| tail.version() < *newest) {
                        return Err(RecoveryError::CorruptionBeforeEnd {
                            position: tail,
                            newest,
                            source: err,
                        });
                    }
                    tracing::warn!(
                        %tail,
                        error = %err,
                        "log corrupt after last complete transaction, ending replay"
                    );
                    break Some(tail);
                }
                Some(Err(source)) => {
                    return Err(RecoveryError::LogRead {
                        position: cursor.position(),
                        source,
                    });
                }
            }
        };
        drop(cursor);

        if let Some(tail) = corrupt_tail {
            tracing::warn!(%tail, "log has an unreadable tail");
            if let Some(monitor) = self.monitor.as_deref_mut() {
                monitor.corrupt_tail(tail);
            }
        }

        self.state = RecoveryState::Finalizing;
        queue.flush()?;
        drop(queue);

        let position = match &last {
            Some(last) => {
                self.tx_ids
                    .set_last_committed_and_closed(
                        last.tx_id,
                        last.checksum,
                        last.commit_time,
                        last.end.byte_offset(),
                        last.end.version(),
                    )
                    .map_err(|source| RecoveryError::Bookkeeping {
                        tx_id: last.tx_id,
                        source,
                    })?;
                last.end
            }
            None => from,
        };

        self.engine
            .flush_and_force(IoLimiter::Unlimited)
            .map_err(|source| RecoveryError::DurabilityForce { source })?;

        let tail_truncated = match (corrupt_tail, self.config.tail_policy) {
            (Some(tail), TailPolicy::Truncate) => {
                self.log
                    .truncate_after(tail)
                    .map_err(|source| RecoveryError::TailTruncation {
                        position: tail,
                        source,
                    })?;
                tracing::warn!(%tail, "truncated log after last recovered transaction");
                true
            }
            _ => false,
        };

        Ok(RecoveredUpTo {
            position,
            last_transaction: last.map(|last| last.tx_id),
            transactions_recovered: recovered,
            batches_applied,
            corrupt_tail,
            tail_truncated,
            replayed: true,
        })
    }
}
