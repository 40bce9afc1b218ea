//! Asynchronous transaction engine
//!
//! This module provides the `TransactionEngine`, which serializes every
//! balance-mutating operation through a single worker task.
//!
//! # Design
//!
//! Callers `submit` a [`Transaction`] together with a [`TransactionCallback`].
//! The pair is pushed onto an unbounded queue, so submission never waits on
//! processing. One worker task dequeues items in FIFO order and, for each item:
//!
//! 1. Loads the primary account (`AccountNotFound` if missing)
//! 2. Executes the variant against the in-memory account
//! 3. Persists the new balance(s) and the audit record in one atomic scope,
//!    going through the [`TransferCoordinator`] for transfers
//! 4. Invokes the callback exactly once
//!
//! Because only the worker mutates balances, no two mutations ever interleave
//! and no per-account locking is needed.
//!
//! # Architecture
//!
//! ```text
//! submitters ──submit──> mpsc (unbounded) ──> worker task
//!                                               ├── PersistenceGateway
//!                                               └── TransferCoordinator
//! ```
//!
//! # Shutdown
//!
//! `stop` lets the in-flight item finish. Queued items are then either dropped
//! without a callback (`ShutdownMode::Abandon`) or processed before the worker
//! exits (`ShutdownMode::Drain`).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::coordinator::{atomically, TransferCoordinator};
use super::traits::{PersistenceGateway, TransactionCallback};
use crate::types::{PaymentError, Transaction, TransactionId};

/// What happens to queued items when the engine stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ShutdownMode {
    /// Drop queued items without invoking their callbacks
    #[default]
    Abandon,

    /// Process queued items before the worker exits
    Drain,
}

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub shutdown_mode: ShutdownMode,
}

/// Outcome of [`TransactionEngine::stop`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Items dropped without a callback
    pub abandoned: usize,

    /// Items whose callback was invoked over the engine's lifetime
    pub processed: u64,
}

/// A submitted transaction and the callback awaiting its outcome
struct WorkItem {
    transaction: Transaction,
    callback: Box<dyn TransactionCallback>,
}

#[derive(Default)]
struct Counters {
    pending: AtomicUsize,
    processed: AtomicU64,
}

/// Per-item processing, shared by the worker and `process_now`
#[derive(Clone)]
struct Processor {
    gateway: Arc<dyn PersistenceGateway>,
    coordinator: TransferCoordinator,
    counters: Arc<Counters>,
}

impl Processor {
    fn process(&self, transaction: &Transaction) -> Result<TransactionId, PaymentError> {
        transaction.validate()?;

        let mut account = self
            .gateway
            .load_account(transaction.account_number())?
            .ok_or_else(|| PaymentError::account_not_found(transaction.account_number()))?;
        let record = transaction.to_record();

        match transaction {
            Transaction::Transfer { .. } => {
                let receipt = self
                    .coordinator
                    .transfer_from(account, transaction, Some(&record))?;
                receipt
                    .transaction_id
                    .ok_or_else(|| PaymentError::persistence("Transfer committed without a record"))
            }
            Transaction::Deposit { .. } | Transaction::Withdraw { .. } => {
                transaction.execute(&mut account)?;
                atomically(self.gateway.as_ref(), |gateway| {
                    gateway.save_account_balance(&account.account_number, account.balance)?;
                    gateway.create_transaction_record(&record)
                })
            }
        }
    }

    fn complete(&self, item: WorkItem) {
        let WorkItem {
            transaction,
            callback,
        } = item;

        match self.process(&transaction) {
            Ok(transaction_id) => {
                log::debug!(
                    "{} on {} committed as {}",
                    transaction.kind(),
                    transaction.account_number(),
                    transaction_id
                );
                callback.on_success(format!(
                    "Transaction {} completed successfully",
                    transaction_id
                ));
            }
            Err(error) => {
                log::debug!(
                    "{} on {} failed: {}",
                    transaction.kind(),
                    transaction.account_number(),
                    error
                );
                callback.on_failure(error.to_string());
            }
        }
        self.counters.processed.fetch_add(1, Ordering::SeqCst);
    }

    /// Handle whatever is still queued once the worker has been told to stop
    fn finish(&self, mut receiver: UnboundedReceiver<WorkItem>, mode: ShutdownMode) -> usize {
        receiver.close();

        let mut abandoned = 0;
        while let Ok(item) = receiver.try_recv() {
            self.counters.pending.fetch_sub(1, Ordering::SeqCst);
            match mode {
                ShutdownMode::Drain => self.complete(item),
                ShutdownMode::Abandon => abandoned += 1,
            }
        }

        if abandoned > 0 {
            log::warn!(
                "Engine stopped with {} queued transaction(s) abandoned",
                abandoned
            );
        }
        abandoned
    }
}

async fn run_worker(
    processor: Processor,
    mut receiver: UnboundedReceiver<WorkItem>,
    token: CancellationToken,
    mode: ShutdownMode,
) -> usize {
    log::debug!("Engine worker started");
    loop {
        let item = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            item = receiver.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };
        processor.counters.pending.fetch_sub(1, Ordering::SeqCst);
        processor.complete(item);
    }
    log::debug!("Engine worker stopping");
    processor.finish(receiver, mode)
}

/// Single-worker transaction engine
///
/// Share it between submitting tasks with an `Arc`. `start` and `stop` must be
/// called from within a tokio runtime.
pub struct TransactionEngine {
    processor: Processor,
    config: EngineConfig,
    sender: UnboundedSender<WorkItem>,

    /// Held until `start` hands it to the worker
    receiver: Mutex<Option<UnboundedReceiver<WorkItem>>>,

    worker: Mutex<Option<JoinHandle<usize>>>,
    token: CancellationToken,
    stopped: AtomicBool,
}

impl TransactionEngine {
    /// Create a stopped engine over `gateway`
    ///
    /// Items may be submitted right away; they wait in the queue until `start`.
    pub fn new(gateway: Arc<dyn PersistenceGateway>, config: EngineConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            processor: Processor {
                coordinator: TransferCoordinator::new(gateway.clone()),
                gateway,
                counters: Arc::new(Counters::default()),
            },
            config,
            sender,
            receiver: Mutex::new(Some(receiver)),
            worker: Mutex::new(None),
            token: CancellationToken::new(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Enqueue a transaction for processing
    ///
    /// Never waits on the worker. If this returns `Ok`, `callback` will be
    /// invoked exactly once from the worker task, unless the engine is later
    /// stopped in `Abandon` mode before the item is reached. This holds even
    /// when the engine is stopped without ever being started.
    ///
    /// # Errors
    ///
    /// * `Validation` if the transaction fails its input checks
    /// * `EngineStopped` if `stop` has been called
    ///
    /// On error the callback is dropped without being invoked.
    pub fn submit<C>(&self, transaction: Transaction, callback: C) -> Result<(), PaymentError>
    where
        C: TransactionCallback,
    {
        transaction.validate()?;
        if self.stopped.load(Ordering::SeqCst) {
            return Err(PaymentError::EngineStopped);
        }

        let counters = &self.processor.counters;
        counters.pending.fetch_add(1, Ordering::SeqCst);
        self.sender
            .send(WorkItem {
                transaction,
                callback: Box::new(callback),
            })
            .map_err(|_| {
                counters.pending.fetch_sub(1, Ordering::SeqCst);
                PaymentError::EngineStopped
            })
    }

    /// Spawn the worker task on the current tokio runtime
    ///
    /// # Errors
    ///
    /// * `EngineAlreadyStarted` on a second call
    /// * `EngineStopped` if the engine was stopped before it was started
    pub fn start(&self) -> Result<(), PaymentError> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(PaymentError::EngineStopped);
        }
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(PaymentError::EngineAlreadyStarted)?;

        let handle = self.spawn_worker(receiver);
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    fn spawn_worker(&self, receiver: UnboundedReceiver<WorkItem>) -> JoinHandle<usize> {
        tokio::spawn(run_worker(
            self.processor.clone(),
            receiver,
            self.token.clone(),
            self.config.shutdown_mode,
        ))
    }

    /// Stop accepting work and wait for the worker to exit
    ///
    /// The in-flight item always finishes. Queued items are handled according
    /// to the configured [`ShutdownMode`]. Calling `stop` again is a no-op that
    /// returns an empty report.
    pub async fn stop(&self) -> ShutdownReport {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return ShutdownReport {
                abandoned: 0,
                processed: self.processed(),
            };
        }
        self.token.cancel();

        // A never-started engine still settles its queue from a worker task,
        // which sees the cancelled token and goes straight to the shutdown mode.
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .or_else(|| {
                self.receiver
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take()
                    .map(|receiver| self.spawn_worker(receiver))
            });
        let abandoned = match handle {
            Some(handle) => handle.await.unwrap_or_else(|error| {
                log::error!("Engine worker ended abnormally: {}", error);
                0
            }),
            None => 0,
        };

        ShutdownReport {
            abandoned,
            processed: self.processed(),
        }
    }

    /// Process one transaction right now, bypassing the queue
    ///
    /// Only for callers that already are the single writer, such as tests or
    /// tools operating on an engine that has not been started.
    pub fn process_now(&self, transaction: &Transaction) -> Result<TransactionId, PaymentError> {
        self.processor.process(transaction)
    }

    /// Number of queued items not yet picked up by the worker
    pub fn pending(&self) -> usize {
        self.processor.counters.pending.load(Ordering::SeqCst)
    }

    /// Number of items whose callback has been invoked
    pub fn processed(&self) -> u64 {
        self.processor.counters.processed.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
            && self
                .worker
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
    }

    pub fn gateway(&self) -> Arc<dyn PersistenceGateway> {
        self.processor.gateway.clone()
    }
}
