//! Recovery over real log segments: on disk, across segments and after
//! simulated crashes.

use tidewal_core::{
    FileTransactionIdStore, InMemoryTransactionIdStore, LogFiles, LogPosition, LogVersion,
    LogWriter, RecoveryConfig, RecoveryCoordinator, RecoveryError, TailPolicy, TransactionId,
    TransactionIdStore,
};
use tidewal_store::MemoryStore;
use tidewal_testkit::{CrashableStore, RecordingEngine, TestLog};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("tidewal_core=debug")
        .with_test_writer()
        .try_init();
}

#[test]
fn disk_recovery_persists_bookkeeping() {
    init_tracing();
    let log = TestLog::on_disk();
    log.start_after(TransactionId::new(100));
    let ends = log.append_transactions(5);
    let log = log.reopen();
    let dir = log.dir().unwrap().to_path_buf();

    let mut engine = RecordingEngine::new();
    let mut tx_ids = FileTransactionIdStore::open(&dir).unwrap();
    let checkpoints = log.checkpoints();
    let outcome = RecoveryCoordinator::new(&mut engine, log.files(), &checkpoints, &mut tx_ids)
        .run_recovery()
        .unwrap();

    assert_eq!(outcome.position, ends[4]);
    assert_eq!(engine.applied_ids(), (101..=105).collect::<Vec<_>>());

    let reopened = FileTransactionIdStore::open(&dir).unwrap();
    let closed = reopened.last_closed_transaction();
    assert_eq!(closed.tx_id, TransactionId::new(105));
    assert_eq!(closed.log_position, ends[4]);
}

#[test]
fn rerun_on_disk_replays_same_range() {
    let log = TestLog::on_disk();
    log.start_after(TransactionId::new(100));
    log.append_transactions(3);
    let dir = log.dir().unwrap().to_path_buf();
    let checkpoints = log.checkpoints();

    let mut first = RecordingEngine::new();
    let mut tx_ids = FileTransactionIdStore::open(&dir).unwrap();
    RecoveryCoordinator::new(&mut first, log.files(), &checkpoints, &mut tx_ids)
        .run_recovery()
        .unwrap();

    let mut second = RecordingEngine::new();
    let mut tx_ids = FileTransactionIdStore::open(&dir).unwrap();
    RecoveryCoordinator::new(&mut second, log.files(), &checkpoints, &mut tx_ids)
        .run_recovery()
        .unwrap();

    assert_eq!(first.calls(), second.calls());
    assert_eq!(
        tx_ids.last_closed_transaction().tx_id,
        TransactionId::new(103)
    );
}

#[test]
fn checkpoint_limits_replay() {
    let log = TestLog::with_transactions(TransactionId::new(100), 4);
    let at = log.writer().position();
    log.checkpoint(at);
    let ends = log.append_transactions(2);

    let mut engine = RecordingEngine::new();
    let mut tx_ids = InMemoryTransactionIdStore::new();
    let checkpoints = log.checkpoints();
    let outcome = RecoveryCoordinator::new(&mut engine, log.files(), &checkpoints, &mut tx_ids)
        .run_recovery()
        .unwrap();

    assert_eq!(engine.applied_ids(), vec![105, 106]);
    assert_eq!(outcome.position, ends[1]);
}

#[test]
fn replay_crosses_segments() {
    let log = TestLog::with_transactions(TransactionId::new(100), 2);
    let second = log.rotate();
    log.append_transactions(2);
    let third = log.rotate();
    let ends = log.append_transactions(1);

    let mut engine = RecordingEngine::new();
    let mut tx_ids = InMemoryTransactionIdStore::new();
    let checkpoints = log.checkpoints();
    let outcome = RecoveryCoordinator::new(&mut engine, log.files(), &checkpoints, &mut tx_ids)
        .with_config(RecoveryConfig::new().batch_size(2))
        .run_recovery()
        .unwrap();

    assert_eq!(second.version(), LogVersion::new(1));
    assert_eq!(third.version(), LogVersion::new(2));
    assert_eq!(engine.batches(), vec![vec![101, 102], vec![103, 104], vec![105]]);
    assert_eq!(outcome.position, ends[0]);
    assert_eq!(
        tx_ids.last_closed_transaction().log_position.version(),
        LogVersion::new(2)
    );
}

#[test]
fn torn_tail_on_disk_is_cut_and_log_stays_writable() {
    init_tracing();
    let log = TestLog::on_disk();
    log.start_after(TransactionId::new(100));
    let ends = log.append_transactions(3);
    log.tear(b"TWLE\x01\x00\x01\xff");
    let log = log.reopen();

    assert!(LogWriter::new(log.files()).is_err());

    let mut engine = RecordingEngine::new();
    let mut tx_ids = InMemoryTransactionIdStore::new();
    let checkpoints = log.checkpoints();
    let outcome = RecoveryCoordinator::new(&mut engine, log.files(), &checkpoints, &mut tx_ids)
        .run_recovery()
        .unwrap();

    assert_eq!(outcome.transactions_recovered, 3);
    assert_eq!(outcome.corrupt_tail, Some(ends[2]));
    assert!(outcome.tail_truncated);

    let log = log.reopen();
    assert_eq!(
        log.segment_size(LogVersion::INITIAL).unwrap(),
        Some(ends[2].byte_offset())
    );
    let mut writer = log.writer();
    let (tx_id, _) = writer.append_transaction(&[], &[]).unwrap();
    assert_eq!(tx_id, TransactionId::new(104));
}

#[test]
fn crash_mid_transaction_loses_only_that_transaction() {
    let files = LogFiles::in_memory();
    let store = CrashableStore::new(Box::new(MemoryStore::new()));
    let control = store.control();
    files
        .create_segment_with_store(LogVersion::INITIAL, TransactionId::new(100), 0, Box::new(store))
        .unwrap();

    let mut writer = LogWriter::new(&files).unwrap();
    let mut ends: Vec<LogPosition> = Vec::new();
    for payload in [&b"a"[..], &b"bb"[..], &b"ccc"[..]] {
        let (_, end) = writer
            .append_transaction(&[], &[payload.to_vec().into()])
            .unwrap();
        ends.push(end);
    }
    control.crash_after_more(25);
    assert!(writer.append_transaction(&[], &[b"lost".to_vec().into()]).is_err());
    assert!(control.has_crashed());
    drop(writer);
    control.restart();

    let mut engine = RecordingEngine::new();
    let mut tx_ids = InMemoryTransactionIdStore::new();
    let checkpoints = tidewal_core::LatestCheckpointFinder::new(&files);
    let outcome = RecoveryCoordinator::new(&mut engine, &files, &checkpoints, &mut tx_ids)
        .run_recovery()
        .unwrap();

    assert_eq!(engine.applied_ids(), vec![101, 102, 103]);
    assert_eq!(outcome.corrupt_tail, Some(ends[2]));
    assert_eq!(
        files.segment_size(LogVersion::INITIAL).unwrap(),
        Some(ends[2].byte_offset())
    );
    assert_eq!(LogWriter::new(&files).unwrap().last_committed(), TransactionId::new(103));
}

#[test]
fn keep_policy_leaves_disk_untouched() {
    let log = TestLog::on_disk();
    log.start_after(TransactionId::new(100));
    let ends = log.append_transactions(2);
    log.tear(&[0x00; 40]);
    let size = log.segment_size(LogVersion::INITIAL).unwrap();

    let mut engine = RecordingEngine::new();
    let mut tx_ids = InMemoryTransactionIdStore::new();
    let checkpoints = log.checkpoints();
    let outcome = RecoveryCoordinator::new(&mut engine, log.files(), &checkpoints, &mut tx_ids)
        .with_config(RecoveryConfig::new().tail_policy(TailPolicy::Keep))
        .run_recovery()
        .unwrap();

    assert_eq!(outcome.corrupt_tail, Some(ends[1]));
    assert!(!outcome.tail_truncated);
    assert_eq!(log.segment_size(LogVersion::INITIAL).unwrap(), size);
}

#[test]
fn damage_before_newest_segment_keeps_later_segments() {
    init_tracing();
    let log = TestLog::on_disk();
    log.start_after(TransactionId::new(100));
    let ends = log.append_transactions(2);
    log.rotate();
    log.append_transactions(2);
    log.append_raw(LogVersion::INITIAL, &[0xAB; 30]).unwrap();
    let log = log.reopen();
    let sizes = [
        log.segment_size(LogVersion::INITIAL).unwrap(),
        log.segment_size(LogVersion::new(1)).unwrap(),
    ];

    for policy in [TailPolicy::Truncate, TailPolicy::Keep] {
        let mut engine = RecordingEngine::new();
        let mut tx_ids = InMemoryTransactionIdStore::new();
        let checkpoints = log.checkpoints();
        let err = RecoveryCoordinator::new(&mut engine, log.files(), &checkpoints, &mut tx_ids)
            .with_config(RecoveryConfig::new().tail_policy(policy))
            .run_recovery()
            .unwrap_err();

        assert!(matches!(
            err,
            RecoveryError::CorruptionBeforeEnd { position, newest, .. }
                if position == ends[1] && newest == LogVersion::new(1)
        ));
        assert_eq!(tx_ids.updates(), 0);
        assert_eq!(engine.force_count(), 0);
    }

    let log = log.reopen();
    assert_eq!(log.versions(), vec![LogVersion::INITIAL, LogVersion::new(1)]);
    assert_eq!(log.segment_size(LogVersion::INITIAL).unwrap(), sizes[0]);
    assert_eq!(log.segment_size(LogVersion::new(1)).unwrap(), sizes[1]);
}
