//! Replay order as a path.
//!
//! A replay visits transactions one after the other. Seen as a path, the
//! transactions are its vertices and each step from one transaction to the
//! next is a hop. Tools use this to show what a pass replayed.

use crate::types::TransactionId;

/// A step from one replayed transaction to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayHop {
    /// Transaction replayed first.
    pub from: TransactionId,
    /// Transaction replayed right after.
    pub to: TransactionId,
}

impl ReplayHop {
    /// Returns the hop walked the other way.
    #[must_use]
    pub fn reversed(self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }
}

/// One element of a path walk: alternately a transaction and a hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathElement {
    /// A replayed transaction.
    Transaction(TransactionId),
    /// The hop to the next transaction.
    Hop(ReplayHop),
}

/// The transactions of a replay in order, with the hops between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayPath {
    transactions: Vec<TransactionId>,
}

impl ReplayPath {
    /// Builds a path from transactions in replay order.
    ///
    /// Returns `None` if there are no transactions.
    pub fn from_transactions(ids: impl IntoIterator<Item = TransactionId>) -> Option<Self> {
        let transactions: Vec<TransactionId> = ids.into_iter().collect();
        if transactions.is_empty() {
            return None;
        }
        Some(Self { transactions })
    }

    /// Number of hops, one less than the number of transactions.
    #[must_use]
    pub fn length(&self) -> usize {
        self.transactions.len() - 1
    }

    /// First transaction replayed.
    #[must_use]
    pub fn start(&self) -> TransactionId {
        self.transactions[0]
    }

    /// Last transaction replayed.
    #[must_use]
    pub fn end(&self) -> TransactionId {
        self.transactions[self.transactions.len() - 1]
    }

    /// Transactions in replay order.
    #[must_use]
    pub fn transactions(&self) -> &[TransactionId] {
        &self.transactions
    }

    /// Transactions from last to first.
    pub fn reverse_transactions(&self) -> impl Iterator<Item = TransactionId> + '_ {
        self.transactions.iter().rev().copied()
    }

    /// Hops in replay order.
    pub fn hops(&self) -> impl Iterator<Item = ReplayHop> + '_ {
        self.transactions.windows(2).map(|pair| ReplayHop {
            from: pair[0],
            to: pair[1],
        })
    }

    /// Hops walked from the end back to the start.
    pub fn reverse_hops(&self) -> impl Iterator<Item = ReplayHop> + '_ {
        self.transactions.windows(2).rev().map(|pair| ReplayHop {
            from: pair[1],
            to: pair[0],
        })
    }

    /// The hop into the last transaction, if there is more than one.
    #[must_use]
    pub fn last_hop(&self) -> Option<ReplayHop> {
        self.hops().last()
    }

    /// Transactions and hops interleaved: transaction, hop, transaction, ...
    pub fn elements(&self) -> impl Iterator<Item = PathElement> + '_ {
        let hops = self.hops().map(Some).chain(std::iter::once(None));
        self.transactions
            .iter()
            .zip(hops)
            .flat_map(|(tx, hop)| {
                std::iter::once(PathElement::Transaction(*tx)).chain(hop.map(PathElement::Hop))
            })
    }
}
