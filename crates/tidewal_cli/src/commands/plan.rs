//! Plan command implementation.
//!
//! Runs a real recovery pass against an engine that only counts, with
//! bookkeeping kept in memory and the log tail left alone. Nothing on disk
//! changes.

use crate::commands::{open_log, print_json};
use serde::Serialize;
use std::path::Path;
use tidewal_core::{
    CoreResult, InMemoryTransactionIdStore, IoLimiter, LatestCheckpointFinder, LogFiles,
    LogPosition, RecoveredUpTo, RecoveryConfig, RecoveryCoordinator, RecoveryMonitor,
    ReplayPath, StorageEngine, TailPolicy, TransactionApplicationMode, TransactionBatch,
    TransactionId,
};

/// What a recovery would do.
#[derive(Debug, Serialize)]
pub struct PlanResult {
    /// Whether any transaction would be replayed.
    pub recovery_required: bool,
    /// Where replay would start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_from: Option<String>,
    /// Number of transactions that would be applied.
    pub transactions: u64,
    /// Number of batches they would be applied in.
    pub batches: u64,
    /// First replayed transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_transaction: Option<u64>,
    /// Last replayed transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transaction: Option<u64>,
    /// Hops between replayed transactions.
    pub path_length: usize,
    /// Position bookkeeping would record.
    pub recovered_up_to: String,
    /// Where the log would be cut.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncate_at: Option<String>,
}

#[derive(Default)]
struct CountingEngine {
    transactions: u64,
}

impl StorageEngine for CountingEngine {
    fn prepare_for_recovery_required(&mut self) {}

    fn apply(&mut self, batch: &TransactionBatch, _mode: TransactionApplicationMode) -> CoreResult<()> {
        self.transactions += batch.len() as u64;
        Ok(())
    }

    fn flush_and_force(&mut self, _limiter: IoLimiter) -> CoreResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct PathMonitor {
    from: Option<LogPosition>,
    replayed: Vec<TransactionId>,
}

impl RecoveryMonitor for PathMonitor {
    fn recovery_required(&mut self, from: LogPosition) {
        self.from = Some(from);
    }

    fn transaction_recovered(&mut self, tx_id: TransactionId) {
        self.replayed.push(tx_id);
    }
}

/// Runs the plan command.
pub fn run(path: &Path, batch_size: usize, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let files = open_log(path)?;
    let result = plan(&files, batch_size)?;

    match format {
        "json" => print_json(&result)?,
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Dry-runs recovery over `files`.
pub fn plan(files: &LogFiles, batch_size: usize) -> Result<PlanResult, Box<dyn std::error::Error>> {
    let mut engine = CountingEngine::default();
    let mut tx_ids = InMemoryTransactionIdStore::new();
    let mut monitor = PathMonitor::default();
    let checkpoints = LatestCheckpointFinder::new(files);

    let outcome: RecoveredUpTo =
        RecoveryCoordinator::new(&mut engine, files, &checkpoints, &mut tx_ids)
            .with_config(
                RecoveryConfig::new()
                    .batch_size(batch_size)
                    .tail_policy(TailPolicy::Keep),
            )
            .with_monitor(&mut monitor)
            .run_recovery()?;

    debug_assert_eq!(engine.transactions, outcome.transactions_recovered);
    let path = ReplayPath::from_transactions(monitor.replayed.iter().copied());

    Ok(PlanResult {
        recovery_required: outcome.replayed,
        replay_from: monitor.from.map(|p| p.to_string()),
        transactions: outcome.transactions_recovered,
        batches: outcome.batches_applied,
        first_transaction: path.as_ref().map(|p| p.start().as_u64()),
        last_transaction: path.as_ref().map(|p| p.end().as_u64()),
        path_length: path.as_ref().map_or(0, ReplayPath::length),
        recovered_up_to: outcome.position.to_string(),
        truncate_at: outcome.corrupt_tail.map(|p| p.to_string()),
    })
}

fn print_text_output(result: &PlanResult) {
    println!("TideWAL Recovery Plan");
    println!("=====================");
    println!();
    if !result.recovery_required {
        println!("Nothing to recover; log is consistent up to {}", result.recovered_up_to);
        return;
    }
    if let Some(from) = &result.replay_from {
        println!("Replay from:   {from}");
    }
    match (result.first_transaction, result.last_transaction) {
        (Some(first), Some(last)) => println!(
            "Transactions:  {} (tx:{first}..=tx:{last}, {} hops)",
            result.transactions, result.path_length
        ),
        _ => println!("Transactions:  0"),
    }
    println!("Batches:       {}", result.batches);
    println!("Recovered to:  {}", result.recovered_up_to);
    if let Some(at) = &result.truncate_at {
        println!("Log would be truncated at {at}");
    }
}
