//! Property-based test generators using proptest.
//!
//! Provides strategies for generating logs and recovery settings that
//! respect the log's invariants.

use proptest::prelude::*;
use tidewal_core::{Command, RecoveryConfig, TailPolicy, TransactionId};

/// Strategy for generating base transaction ids.
pub fn base_tx_id_strategy() -> impl Strategy<Value = TransactionId> {
    (1u64..1_000_000).prop_map(TransactionId::new)
}

/// Strategy for generating a single command payload.
pub fn command_strategy() -> impl Strategy<Value = Command> {
    prop::collection::vec(any::<u8>(), 0..256).prop_map(Command::new)
}

/// Strategy for generating the commands of one transaction.
pub fn transaction_strategy() -> impl Strategy<Value = Vec<Command>> {
    prop::collection::vec(command_strategy(), 0..5)
}

/// Strategy for generating a sequence of transactions.
pub fn transactions_strategy(max_count: usize) -> impl Strategy<Value = Vec<Vec<Command>>> {
    prop::collection::vec(transaction_strategy(), 0..=max_count)
}

/// Strategy for generating recovery batch sizes.
pub fn batch_size_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![Just(1usize), 1usize..16, 16usize..256]
}

/// Strategy for generating recovery configurations.
pub fn recovery_config_strategy() -> impl Strategy<Value = RecoveryConfig> {
    (
        batch_size_strategy(),
        prop_oneof![Just(TailPolicy::Truncate), Just(TailPolicy::Keep)],
    )
        .prop_map(|(batch_size, policy)| {
            RecoveryConfig::new()
                .batch_size(batch_size)
                .tail_policy(policy)
        })
}

/// Strategy for generating garbage appended after the last transaction.
///
/// Never empty, and never long enough to parse as a whole entry.
pub fn torn_tail_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..10)
}
