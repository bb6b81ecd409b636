//! Linked batches of transactions handed to the storage engine.

use crate::transaction::TransactionRepresentation;
use crate::types::TransactionId;

/// One transaction waiting to be applied, linked to the one after it.
#[derive(Debug)]
pub struct TransactionToApply {
    tx_id: TransactionId,
    representation: TransactionRepresentation,
    next: Option<Box<TransactionToApply>>,
}

impl TransactionToApply {
    /// Wraps a transaction for application.
    #[must_use]
    pub fn new(tx_id: TransactionId, representation: TransactionRepresentation) -> Self {
        Self {
            tx_id,
            representation,
            next: None,
        }
    }

    /// Returns the transaction id.
    #[must_use]
    pub fn tx_id(&self) -> TransactionId {
        self.tx_id
    }

    /// Returns the operations to apply.
    #[must_use]
    pub fn representation(&self) -> &TransactionRepresentation {
        &self.representation
    }

    /// Returns the next transaction of the batch.
    #[must_use]
    pub fn next(&self) -> Option<&TransactionToApply> {
        self.next.as_deref()
    }
}

impl Drop for TransactionToApply {
    fn drop(&mut self) {
        // Unlink iteratively; recursive drops overflow the stack on long chains.
        let mut next = self.next.take();
        while let Some(mut node) = next {
            next = node.next.take();
        }
    }
}

/// An ordered, non-empty group of transactions applied in one call.
#[derive(Debug)]
pub struct TransactionBatch {
    head: Box<TransactionToApply>,
    len: usize,
    last_tx_id: TransactionId,
}

impl TransactionBatch {
    /// Returns the first transaction.
    #[must_use]
    pub fn first(&self) -> &TransactionToApply {
        &self.head
    }

    /// Returns the id of the first transaction.
    #[must_use]
    pub fn first_tx_id(&self) -> TransactionId {
        self.head.tx_id
    }

    /// Returns the id of the last transaction.
    #[must_use]
    pub fn last_tx_id(&self) -> TransactionId {
        self.last_tx_id
    }

    /// Returns the number of transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`; a batch holds at least one transaction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates over the transactions in apply order.
    pub fn iter(&self) -> BatchIter<'_> {
        BatchIter {
            current: Some(&self.head),
        }
    }

    /// Builds a batch from a chain linked newest first.
    ///
    /// Relinks the chain in place into apply order.
    pub(crate) fn from_reversed(newest: Box<TransactionToApply>, len: usize) -> Self {
        let last_tx_id = newest.tx_id;
        let head = reverse(newest);
        Self {
            head,
            len,
            last_tx_id,
        }
    }

    /// Dissolves the batch back into a chain linked newest first.
    pub(crate) fn into_reversed(self) -> (Box<TransactionToApply>, usize) {
        (reverse(self.head), self.len)
    }
}

impl<'a> IntoIterator for &'a TransactionBatch {
    type Item = &'a TransactionToApply;
    type IntoIter = BatchIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the transactions of a [`TransactionBatch`].
pub struct BatchIter<'a> {
    current: Option<&'a TransactionToApply>,
}

impl<'a> Iterator for BatchIter<'a> {
    type Item = &'a TransactionToApply;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current?;
        self.current = current.next();
        Some(current)
    }
}

/// Pushes `node` in front of `chain`.
pub(crate) fn push_front(
    chain: Option<Box<TransactionToApply>>,
    mut node: Box<TransactionToApply>,
) -> Box<TransactionToApply> {
    node.next = chain;
    node
}

fn reverse(mut head: Box<TransactionToApply>) -> Box<TransactionToApply> {
    let mut reversed: Option<Box<TransactionToApply>> = None;
    loop {
        let rest = head.next.take();
        head.next = reversed;
        match rest {
            Some(next) => {
                reversed = Some(head);
                head = next;
            }
            None => return head,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: u64) -> Box<TransactionToApply> {
        Box::new(TransactionToApply::new(
            TransactionId::new(id),
            TransactionRepresentation::new(Vec::new(), Vec::new(), 0, TransactionId::BASE, 0),
        ))
    }

    fn chain(ids: &[u64]) -> (Box<TransactionToApply>, usize) {
        let mut newest: Option<Box<TransactionToApply>> = None;
        for &id in ids {
            newest = Some(push_front(newest, tx(id)));
        }
        (newest.unwrap(), ids.len())
    }

    #[test]
    fn batch_is_in_submission_order() {
        let (newest, len) = chain(&[101, 102, 103]);
        let batch = TransactionBatch::from_reversed(newest, len);

        let ids: Vec<u64> = batch.iter().map(|t| t.tx_id().as_u64()).collect();
        assert_eq!(ids, vec![101, 102, 103]);
        assert_eq!(batch.first_tx_id(), TransactionId::new(101));
        assert_eq!(batch.last_tx_id(), TransactionId::new(103));
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn into_reversed_restores_chain() {
        let (newest, len) = chain(&[1, 2, 3, 4]);
        let batch = TransactionBatch::from_reversed(newest, len);
        let (newest, len) = batch.into_reversed();
        assert_eq!(newest.tx_id(), TransactionId::new(4));

        let batch = TransactionBatch::from_reversed(newest, len);
        let ids: Vec<u64> = (&batch).into_iter().map(|t| t.tx_id().as_u64()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn single_transaction_batch() {
        let batch = TransactionBatch::from_reversed(tx(7), 1);
        assert_eq!(batch.first().tx_id(), batch.last_tx_id());
        assert!(batch.first().next().is_none());
    }

    #[test]
    fn long_chain_drops_without_overflow() {
        let mut newest: Option<Box<TransactionToApply>> = None;
        for id in 0..200_000 {
            newest = Some(push_front(newest, tx(id)));
        }
        drop(newest);
    }
}
