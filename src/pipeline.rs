//! Batch pipeline from CSV files to the transaction engine
//!
//! Wires the outer surface to the core: load accounts into an
//! `InMemoryGateway`, stream transactions in batches, submit each batch through
//! one or more concurrent submitters, wait for every callback, then stop the
//! engine and write the final account states.
//!
//! # Architecture
//!
//! ```text
//! accounts.csv ──AccountReader──> InMemoryGateway <──── AuditProcess (interval)
//!                                       ↑
//! transactions.csv ──TransactionReader──┤
//!         batches → submitters → TransactionEngine (single worker)
//! ```
//!
//! Batches are processed one after another: the next batch is read only when
//! every callback of the current one has fired. With a single submitter (the
//! default) the engine therefore sees the file order exactly.

use crate::core::{
    reply_channel, AuditConfig, AuditProcess, AuditReport, EngineConfig, InMemoryGateway,
    PersistenceGateway, ShutdownMode, TransactionEngine,
};
use crate::io::{load_accounts, write_accounts_csv, TransactionReader};
use crate::types::{Account, Transaction};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Configuration for a pipeline run
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Number of transactions read per batch
    pub batch_size: usize,

    /// Concurrent submitting tasks per batch
    pub submitters: usize,

    /// Tokio worker threads
    pub worker_threads: usize,

    pub shutdown_mode: ShutdownMode,

    pub audit: AuditConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            submitters: 1,
            worker_threads: num_cpus::get(),
            shutdown_mode: ShutdownMode::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl RunConfig {
    /// Create a RunConfig with custom sizing, falling back to defaults for zeros
    pub fn new(batch_size: usize, submitters: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            log::warn!(
                "Invalid batch_size ({}), using default ({})",
                batch_size,
                default.batch_size
            );
            default.batch_size
        } else {
            batch_size
        };

        let submitters = if submitters == 0 {
            log::warn!(
                "Invalid submitters ({}), using default ({})",
                submitters,
                default.submitters
            );
            default.submitters
        } else {
            submitters
        };

        Self {
            batch_size,
            submitters,
            ..default
        }
    }
}

/// What a run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Final account states
    pub accounts: Vec<Account>,

    /// Transactions handed to the engine
    pub submitted: usize,

    pub succeeded: usize,
    pub failed: usize,

    /// Transaction rows that could not be parsed
    pub skipped_rows: usize,

    /// Background audit passes run while processing
    pub audit_passes: u64,

    /// Audit of the final state
    pub final_audit: Option<AuditReport>,
}

type Outcome = (Transaction, Result<String, String>);

/// Submit `lane` in order and wait for every outcome
async fn submit_lane(engine: Arc<TransactionEngine>, lane: Vec<Transaction>) -> Vec<Outcome> {
    let mut waiting = Vec::with_capacity(lane.len());
    let mut outcomes = Vec::new();

    for transaction in lane {
        let (callback, receiver) = reply_channel();
        match engine.submit(transaction.clone(), callback) {
            Ok(()) => waiting.push((transaction, receiver)),
            Err(e) => outcomes.push((transaction, Err(e.to_string()))),
        }
    }

    for (transaction, receiver) in waiting {
        let outcome = receiver
            .await
            .unwrap_or_else(|_| Err("Dropped without a result".to_string()));
        outcomes.push((transaction, outcome));
    }
    outcomes
}

/// Split a batch round-robin over `lanes` submitters
fn split_lanes(batch: Vec<Transaction>, lanes: usize) -> Vec<Vec<Transaction>> {
    let lanes = lanes.max(1);
    let mut split: Vec<Vec<Transaction>> = (0..lanes).map(|_| Vec::new()).collect();
    for (index, transaction) in batch.into_iter().enumerate() {
        split[index % lanes].push(transaction);
    }
    split.retain(|lane| !lane.is_empty());
    split
}

async fn process(
    accounts_path: &Path,
    transactions_path: &Path,
    config: &RunConfig,
) -> Result<RunSummary, String> {
    let gateway = Arc::new(InMemoryGateway::new());
    for account in load_accounts(accounts_path).map_err(|e| e.to_string())? {
        if let Err(e) = gateway.insert_account(account) {
            log::warn!("Skipping account: {}", e);
        }
    }

    let file = tokio::fs::File::open(transactions_path)
        .await
        .map_err(|e| format!("Failed to open file '{}': {}", transactions_path.display(), e))?;
    let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
    let mut reader = TransactionReader::new(compat_file);

    let engine = Arc::new(TransactionEngine::new(
        gateway.clone(),
        EngineConfig {
            shutdown_mode: config.shutdown_mode,
        },
    ));
    let auditor = AuditProcess::new(gateway.clone(), config.audit.clone());
    let audit = auditor.clone().spawn(CancellationToken::new());
    engine.start().map_err(|e| e.to_string())?;

    let (mut submitted, mut succeeded, mut failed) = (0, 0, 0);
    loop {
        let batch = reader.read_batch(config.batch_size).await;
        if batch.is_empty() {
            break;
        }
        submitted += batch.len();

        let handles: Vec<_> = split_lanes(batch, config.submitters)
            .into_iter()
            .map(|lane| tokio::spawn(submit_lane(engine.clone(), lane)))
            .collect();

        for handle in handles {
            let outcomes = handle
                .await
                .map_err(|e| format!("Submitter task failed: {}", e))?;
            for (transaction, outcome) in outcomes {
                match outcome {
                    Ok(message) => {
                        succeeded += 1;
                        log::debug!("{}", message);
                    }
                    Err(reason) => {
                        failed += 1;
                        log::warn!(
                            "{} on account {} failed: {}",
                            transaction.kind(),
                            transaction.account_number(),
                            reason
                        );
                    }
                }
            }
        }
    }

    let shutdown = engine.stop().await;
    let audit_passes = audit.stop().await;
    log::info!(
        "Processed {} transaction(s): {} succeeded, {} failed, {} abandoned",
        shutdown.processed,
        succeeded,
        failed,
        shutdown.abandoned
    );

    let final_audit = match auditor.run_once() {
        Ok(report) => {
            log::info!("Final audit\n{}", report);
            Some(report)
        }
        Err(e) => {
            log::error!("Final audit failed: {}", e);
            None
        }
    };

    let accounts = gateway.load_all_accounts().map_err(|e| e.to_string())?;
    Ok(RunSummary {
        accounts,
        submitted,
        succeeded,
        failed,
        skipped_rows: reader.skipped(),
        audit_passes,
        final_audit,
    })
}

/// Run the whole pipeline and write final account states to `output`
///
/// # Arguments
///
/// * `accounts_path` - Accounts CSV loaded before processing
/// * `transactions_path` - Transactions CSV streamed in batches
/// * `config` - Batch sizing, shutdown mode and audit settings
/// * `output` - Writer receiving the final accounts CSV
///
/// # Returns
///
/// * `Ok(RunSummary)` if the run completed (individual transactions may have failed)
/// * `Err(String)` for fatal errors: unreadable input, runtime or output failure
pub fn run(
    accounts_path: &Path,
    transactions_path: &Path,
    config: &RunConfig,
    output: &mut dyn Write,
) -> Result<RunSummary, String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads.max(1))
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

    let summary = runtime.block_on(process(accounts_path, transactions_path, config))?;
    write_accounts_csv(&summary.accounts, output)?;
    Ok(summary)
}
