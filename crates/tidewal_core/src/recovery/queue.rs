//! Batching buffer between the log and the storage engine.

use crate::engine::{push_front, TransactionBatch, TransactionToApply};

/// Collects transactions and hands them to an applier in batches.
///
/// A batch is applied as soon as `max_size` transactions are pending, and on
/// [`flush`](Self::flush). Pending transactions are always a contiguous,
/// ordered run of submissions.
///
/// If the applier fails, the pending transactions stay queued unchanged and
/// the error is returned; the queue never retries on its own.
pub struct TransactionQueue<F> {
    max_size: usize,
    applier: F,
    /// Pending transactions linked newest first.
    pending: Option<Box<TransactionToApply>>,
    len: usize,
}

impl<F, E> TransactionQueue<F>
where
    F: FnMut(&TransactionBatch) -> Result<(), E>,
{
    /// Creates a queue applying up to `max_size` transactions per batch.
    ///
    /// A `max_size` of zero is treated as one.
    pub fn new(max_size: usize, applier: F) -> Self {
        Self {
            max_size: max_size.max(1),
            applier,
            pending: None,
            len: 0,
        }
    }

    /// Queues `tx`, applying the pending batch if it is full.
    ///
    /// # Errors
    ///
    /// Returns the applier's error if an automatic flush fails.
    pub fn submit(&mut self, tx: TransactionToApply) -> Result<(), E> {
        self.pending = Some(push_front(self.pending.take(), Box::new(tx)));
        self.len += 1;
        if self.len >= self.max_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Applies all pending transactions as one batch. Does nothing if none
    /// are pending.
    ///
    /// # Errors
    ///
    /// Returns the applier's error; the pending transactions are kept.
    pub fn flush(&mut self) -> Result<(), E> {
        let Some(newest) = self.pending.take() else {
            return Ok(());
        };

        let batch = TransactionBatch::from_reversed(newest, self.len);
        match (self.applier)(&batch) {
            Ok(()) => {
                self.len = 0;
                Ok(())
            }
            Err(err) => {
                let (newest, _) = batch.into_reversed();
                self.pending = Some(newest);
                Err(err)
            }
        }
    }

    /// Returns `true` if no transactions are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    /// Returns the number of pending transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }
}
