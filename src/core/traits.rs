//! Core traits for persistence and completion callbacks
//!
//! This module defines the two seams of the core:
//! - [`PersistenceGateway`] - what the engine, coordinator and audit need from the store
//! - [`TransactionCallback`] - how the engine reports a work item's outcome

use rust_decimal::Decimal;
use tokio::sync::oneshot;

use crate::types::{Account, PaymentError, TransactionId, TransactionRecord, UserId};

/// Read/write operations the core depends on
///
/// Implementations are shared between the engine worker, the transfer
/// coordinator and the audit task, so they must be `Send + Sync`.
///
/// # Atomic Scopes
///
/// `begin_atomic` opens a scope in which writes are staged; `commit` makes them
/// visible together and `rollback` discards them. Only one scope may be open at
/// a time, and while it is open every write through the gateway belongs to it.
/// Callers other than the engine worker must therefore only read.
pub trait PersistenceGateway: Send + Sync {
    /// Load an account by number, `Ok(None)` if it does not exist
    fn load_account(&self, account_number: &str) -> Result<Option<Account>, PaymentError>;

    /// Overwrite the balance of an existing account
    fn save_account_balance(
        &self,
        account_number: &str,
        balance: Decimal,
    ) -> Result<(), PaymentError>;

    /// All accounts owned by a user, newest first
    fn load_accounts_by_user(&self, user_id: UserId) -> Result<Vec<Account>, PaymentError>;

    /// All accounts, newest first
    fn load_all_accounts(&self) -> Result<Vec<Account>, PaymentError>;

    /// Persist a transaction record and return its assigned id
    ///
    /// The `transaction_id` field of `record` is ignored.
    fn create_transaction_record(
        &self,
        record: &TransactionRecord,
    ) -> Result<TransactionId, PaymentError>;

    /// Records where the account is source or destination, most recent first (bounded)
    fn load_transactions_by_account(
        &self,
        account_number: &str,
    ) -> Result<Vec<TransactionRecord>, PaymentError>;

    /// Most recent records across all accounts, most recent first (bounded)
    fn load_recent_transactions(&self) -> Result<Vec<TransactionRecord>, PaymentError>;

    /// Open an atomic scope
    fn begin_atomic(&self) -> Result<(), PaymentError>;

    /// Make every write staged since `begin_atomic` visible at once
    fn commit(&self) -> Result<(), PaymentError>;

    /// Discard every write staged since `begin_atomic`
    fn rollback(&self) -> Result<(), PaymentError>;
}

/// Completion callback for a submitted transaction
///
/// Both methods consume the callback, so at most one of them can ever run.
/// The engine guarantees exactly one call for every accepted submission, made
/// from the engine's worker task. Callers that own state on another task must
/// hand the result back themselves.
pub trait TransactionCallback: Send + 'static {
    fn on_success(self: Box<Self>, message: String);

    fn on_failure(self: Box<Self>, reason: String);
}

/// Closures receive `Ok(message)` or `Err(reason)`
impl<F> TransactionCallback for F
where
    F: FnOnce(Result<String, String>) + Send + 'static,
{
    fn on_success(self: Box<Self>, message: String) {
        (*self)(Ok(message))
    }

    fn on_failure(self: Box<Self>, reason: String) {
        (*self)(Err(reason))
    }
}

/// Callback that forwards the outcome over a oneshot channel
///
/// Use [`reply_channel`] to create one together with its receiver.
#[derive(Debug)]
pub struct ReplyCallback {
    sender: oneshot::Sender<Result<String, String>>,
}

impl TransactionCallback for ReplyCallback {
    fn on_success(self: Box<Self>, message: String) {
        // The receiver may have given up waiting; the outcome is still logged by the engine.
        let _ = self.sender.send(Ok(message));
    }

    fn on_failure(self: Box<Self>, reason: String) {
        let _ = self.sender.send(Err(reason));
    }
}

/// Create a [`ReplyCallback`] and the receiver its outcome arrives on
///
/// If the engine drops the work item without running it (see
/// `ShutdownMode::Abandon`), the receiver resolves to `RecvError`.
pub fn reply_channel() -> (ReplyCallback, oneshot::Receiver<Result<String, String>>) {
    let (sender, receiver) = oneshot::channel();
    (ReplyCallback { sender }, receiver)
}
