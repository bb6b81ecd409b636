//! Property tests: whatever the log and settings, recovery applies every
//! committed transaction after the start exactly once, in order.

use proptest::prelude::*;
use tidewal_core::{
    InMemoryTransactionIdStore, LogVersion, RecoveryCoordinator, TailPolicy, TransactionId,
    TransactionIdStore,
};
use tidewal_testkit::{
    batch_size_strategy, base_tx_id_strategy, recovery_config_strategy, torn_tail_strategy,
    transactions_strategy, FixedCheckpoint, RecordingEngine, ScriptedEnd, ScriptedLog, TestLog,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_transaction_applied_once_in_order(
        base in base_tx_id_strategy(),
        transactions in transactions_strategy(40),
        config in recovery_config_strategy(),
    ) {
        let log = TestLog::memory();
        log.start_after(base);
        let mut writer = log.writer();
        let ends: Vec<_> = transactions
            .iter()
            .map(|commands| writer.append_transaction(&[], commands).unwrap().1)
            .collect();
        drop(writer);

        let mut engine = RecordingEngine::new();
        let mut tx_ids = InMemoryTransactionIdStore::new();
        let checkpoints = log.checkpoints();
        let outcome = RecoveryCoordinator::new(&mut engine, log.files(), &checkpoints, &mut tx_ids)
            .with_config(config)
            .run_recovery()
            .unwrap();

        let expected: Vec<u64> = (1..=transactions.len() as u64)
            .map(|i| base.as_u64() + i)
            .collect();
        prop_assert_eq!(engine.applied_ids(), expected);
        prop_assert_eq!(engine.prepare_count(), 1);
        prop_assert!(engine.batch_sizes().iter().all(|size| *size >= 1 && *size <= config.batch_size));
        prop_assert_eq!(outcome.transactions_recovered, transactions.len() as u64);

        match ends.last() {
            Some(end) => {
                prop_assert_eq!(outcome.position, *end);
                prop_assert_eq!(tx_ids.last_closed_transaction().log_position, *end);
                prop_assert_eq!(engine.force_count(), 1);
            }
            None => {
                prop_assert!(!outcome.replayed);
                prop_assert_eq!(tx_ids.updates(), 0);
                prop_assert_eq!(engine.force_count(), 0);
            }
        }
    }

    #[test]
    fn torn_tail_never_loses_complete_transactions(
        count in 1usize..20,
        tail in torn_tail_strategy(),
        config in recovery_config_strategy(),
    ) {
        let log = TestLog::with_transactions(TransactionId::new(100), count);
        let end = log.writer().position();
        log.tear(&tail);

        let mut engine = RecordingEngine::new();
        let mut tx_ids = InMemoryTransactionIdStore::new();
        let checkpoints = log.checkpoints();
        let outcome = RecoveryCoordinator::new(&mut engine, log.files(), &checkpoints, &mut tx_ids)
            .with_config(config)
            .run_recovery()
            .unwrap();

        prop_assert_eq!(engine.applied_ids().len(), count);
        prop_assert_eq!(outcome.corrupt_tail, Some(end));
        prop_assert_eq!(tx_ids.last_closed_transaction().log_position, end);

        let size = log.segment_size(LogVersion::INITIAL).unwrap();
        match config.tail_policy {
            TailPolicy::Truncate => {
                prop_assert_eq!(size, Some(end.byte_offset()));
            }
            TailPolicy::Keep => {
                prop_assert_eq!(size, Some(end.byte_offset() + tail.len() as u64));
            }
        }
    }

    #[test]
    fn scripted_corruption_keeps_good_prefix(
        good in 0u64..500,
        batch_size in batch_size_strategy(),
    ) {
        let log = ScriptedLog::new(TransactionId::new(7), good).ending_with(ScriptedEnd::Corruption);
        let checkpoints = FixedCheckpoint::none();
        let mut engine = RecordingEngine::new();
        let mut tx_ids = InMemoryTransactionIdStore::new();

        let outcome = RecoveryCoordinator::new(&mut engine, &log, &checkpoints, &mut tx_ids)
            .with_config(tidewal_core::RecoveryConfig::new().batch_size(batch_size))
            .run_recovery()
            .unwrap();

        prop_assert_eq!(outcome.transactions_recovered, good);
        prop_assert_eq!(engine.applied_ids(), (8..8 + good).collect::<Vec<_>>());
        prop_assert_eq!(outcome.corrupt_tail, Some(log.end_of_transactions()));
        let expected_batches = good.div_ceil(batch_size as u64) as usize;
        prop_assert_eq!(engine.batches().len(), expected_batches);
    }
}
