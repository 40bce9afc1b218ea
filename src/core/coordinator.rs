//! Two-account transfer coordination
//!
//! This module provides the `TransferCoordinator`, which makes a balance move
//! between two independently persisted accounts appear atomic to readers.
//!
//! # Protocol
//!
//! 1. Load source and destination (`InvalidAccount` naming the missing side)
//! 2. Debit the source in memory (`InsufficientFunds` aborts, nothing persisted)
//! 3. Credit the destination in memory
//! 4. In one atomic scope: save both balances (and the audit record, if any),
//!    then commit. Any failure rolls back and surfaces `TransferFailed`.
//!
//! On success the pair sum is unchanged; on failure neither balance moved.
//!
//! The same atomic-scope helper, [`atomically`], is used by the engine for
//! single-account items so that balance and audit record land together.

use std::sync::Arc;

use super::traits::PersistenceGateway;
use crate::types::{
    Account, PaymentError, Transaction, TransactionId, TransactionRecord, TransferSide,
};

/// Run `work` inside an atomic scope of `gateway`
///
/// Commits if `work` succeeds. Rolls back if `work` or the commit fails and
/// returns the first error; a failed rollback is logged, not returned.
pub fn atomically<T, F>(gateway: &dyn PersistenceGateway, work: F) -> Result<T, PaymentError>
where
    F: FnOnce(&dyn PersistenceGateway) -> Result<T, PaymentError>,
{
    gateway.begin_atomic()?;

    let result = work(gateway).and_then(|value| gateway.commit().map(|_| value));

    if result.is_err() {
        if let Err(rollback_error) = gateway.rollback() {
            log::error!("Rollback failed: {}", rollback_error);
        }
    }
    result
}

/// Result of a committed transfer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReceipt {
    /// Source account as committed
    pub source: Account,

    /// Destination account as committed
    pub destination: Account,

    /// Id of the audit record written in the same scope, if one was requested
    pub transaction_id: Option<TransactionId>,
}

/// Orchestrates two-account balance moves with rollback on partial failure
#[derive(Clone)]
pub struct TransferCoordinator {
    gateway: Arc<dyn PersistenceGateway>,
}

impl TransferCoordinator {
    pub fn new(gateway: Arc<dyn PersistenceGateway>) -> Self {
        Self { gateway }
    }

    /// Run the full transfer protocol for a `Transaction::Transfer`
    ///
    /// No audit record is written; see [`transfer_from`](Self::transfer_from).
    ///
    /// # Errors
    ///
    /// * `Validation` if `transfer` is not a valid transfer
    /// * `InvalidAccount` if either side does not exist
    /// * `InsufficientFunds` / `AccountInactive` from the in-memory debit or credit
    /// * `TransferFailed` if persisting failed and the scope was rolled back
    pub fn transfer(&self, transfer: &Transaction) -> Result<TransferReceipt, PaymentError> {
        let source = self.load(transfer.account_number(), TransferSide::Source)?;
        self.transfer_from(source, transfer, None)
    }

    /// Run steps 2-4 of the protocol with an already loaded source account
    ///
    /// # Arguments
    ///
    /// * `source` - The source account, freshly loaded by the caller
    /// * `transfer` - The `Transaction::Transfer` to apply
    /// * `record` - Audit record to persist inside the same atomic scope
    pub fn transfer_from(
        &self,
        mut source: Account,
        transfer: &Transaction,
        record: Option<&TransactionRecord>,
    ) -> Result<TransferReceipt, PaymentError> {
        let destination_number = transfer
            .destination()
            .ok_or_else(|| PaymentError::validation("Not a transfer"))?;
        transfer.validate()?;

        let mut destination = self.load(destination_number, TransferSide::Destination)?;

        // Debit then credit in memory; nothing has been persisted yet.
        transfer.execute(&mut source)?;
        destination.deposit(transfer.amount())?;

        let transaction_id = atomically(self.gateway.as_ref(), |gateway| {
            gateway.save_account_balance(&source.account_number, source.balance)?;
            gateway.save_account_balance(&destination.account_number, destination.balance)?;
            record
                .map(|record| gateway.create_transaction_record(record))
                .transpose()
        })
        .map_err(PaymentError::transfer_failed)?;

        log::debug!(
            "Transfer of {} from {} to {} committed",
            transfer.amount(),
            source.account_number,
            destination.account_number
        );

        Ok(TransferReceipt {
            source,
            destination,
            transaction_id,
        })
    }

    fn load(&self, account_number: &str, side: TransferSide) -> Result<Account, PaymentError> {
        self.gateway
            .load_account(account_number)?
            .ok_or_else(|| PaymentError::invalid_account(account_number, side))
    }
}
