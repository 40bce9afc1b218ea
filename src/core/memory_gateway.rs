//! Thread-safe in-memory persistence gateway
//!
//! This module provides `InMemoryGateway`, the reference implementation of
//! [`PersistenceGateway`]. It stores accounts and transaction records in
//! `DashMap`s and implements atomic scopes by staging writes.
//!
//! # Design
//!
//! - Accounts are keyed by account number, records by transaction id.
//! - `begin_atomic` opens a staging area. While it is open, balance writes and
//!   new records go to the staging area instead of the maps.
//! - `commit` applies the staging area under the write side of a visibility
//!   gate. Every read takes the read side, so a reader sees either none or all
//!   of a committed scope (never half a transfer).
//! - Transaction ids come from a monotonic counter, so a rolled-back record
//!   leaves a gap, just like an auto-increment column would.
//!
//! # Thread Safety
//!
//! All methods take `&self` and are safe to call from many threads. Only one
//! atomic scope can be open at a time; see the trait documentation for the
//! single-writer rule that comes with it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;

use super::traits::PersistenceGateway;
use crate::types::{
    Account, AccountNumber, PaymentError, TransactionId, TransactionRecord, UserId,
};

/// Maximum rows returned by `load_transactions_by_account`
pub const ACCOUNT_HISTORY_LIMIT: usize = 100;

/// Maximum rows returned by `load_recent_transactions`
pub const RECENT_TRANSACTIONS_LIMIT: usize = 1000;

/// Writes collected inside an open atomic scope
#[derive(Debug, Default)]
struct StagedWrites {
    balances: Vec<(AccountNumber, Decimal)>,
    records: Vec<TransactionRecord>,
}

/// Thread-safe in-memory store for accounts and transaction records
#[derive(Debug)]
pub struct InMemoryGateway {
    /// Committed accounts by account number
    accounts: DashMap<AccountNumber, Account>,

    /// Committed transaction records by id
    transactions: DashMap<TransactionId, TransactionRecord>,

    /// Source of transaction ids (first id is 1)
    next_transaction_id: AtomicU64,

    /// Open atomic scope, if any
    staged: Mutex<Option<StagedWrites>>,

    /// Readers hold the read side, commits and direct writes the write side
    visibility: RwLock<()>,
}

impl InMemoryGateway {
    /// Create a new empty gateway
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            transactions: DashMap::new(),
            next_transaction_id: AtomicU64::new(1),
            staged: Mutex::new(None),
            visibility: RwLock::new(()),
        }
    }

    /// Create a gateway pre-populated with accounts
    ///
    /// # Errors
    ///
    /// Fails on the first account that would be rejected by [`insert_account`](Self::insert_account).
    pub fn with_accounts(
        accounts: impl IntoIterator<Item = Account>,
    ) -> Result<Self, PaymentError> {
        let gateway = Self::new();
        for account in accounts {
            gateway.insert_account(account)?;
        }
        Ok(gateway)
    }

    /// Store an account
    ///
    /// Stands in for the external account-opening flow and for rows loaded from
    /// storage. The balance is stored as given, even below the kind's minimum.
    ///
    /// # Errors
    ///
    /// * `Validation` if the number is empty, the user id is zero or the number is taken
    pub fn insert_account(&self, account: Account) -> Result<(), PaymentError> {
        account.validate()?;
        let _gate = self.write_gate()?;

        match self.accounts.entry(account.account_number.clone()) {
            Entry::Occupied(_) => Err(PaymentError::validation(format!(
                "Account {} already exists",
                account.account_number
            ))),
            Entry::Vacant(slot) => {
                slot.insert(account);
                Ok(())
            }
        }
    }

    /// Activate or deactivate an account
    ///
    /// # Errors
    ///
    /// * `AccountNotFound` if no such account exists
    pub fn set_account_active(&self, account_number: &str, active: bool) -> Result<(), PaymentError> {
        let _gate = self.write_gate()?;
        let mut account = self
            .accounts
            .get_mut(account_number)
            .ok_or_else(|| PaymentError::account_not_found(account_number))?;
        account.active = active;
        Ok(())
    }

    /// Replace the description of a persisted record (the only mutable field)
    ///
    /// # Errors
    ///
    /// * `Persistence` if no record has this id
    pub fn update_transaction_description(
        &self,
        transaction_id: TransactionId,
        description: Option<String>,
    ) -> Result<(), PaymentError> {
        let _gate = self.write_gate()?;
        let mut record = self.transactions.get_mut(&transaction_id).ok_or_else(|| {
            PaymentError::persistence(format!("No transaction with id {}", transaction_id))
        })?;
        record.description = description;
        Ok(())
    }

    /// Whether an atomic scope is currently open
    pub fn in_atomic_scope(&self) -> bool {
        self.staging().map(|staged| staged.is_some()).unwrap_or(false)
    }

    fn staging(&self) -> Result<MutexGuard<'_, Option<StagedWrites>>, PaymentError> {
        self.staged
            .lock()
            .map_err(|_| PaymentError::persistence("staging area lock poisoned"))
    }

    fn read_gate(&self) -> Result<RwLockReadGuard<'_, ()>, PaymentError> {
        self.visibility
            .read()
            .map_err(|_| PaymentError::persistence("visibility gate poisoned"))
    }

    fn write_gate(&self) -> Result<RwLockWriteGuard<'_, ()>, PaymentError> {
        self.visibility
            .write()
            .map_err(|_| PaymentError::persistence("visibility gate poisoned"))
    }

    fn assign_id(&self, record: &TransactionRecord) -> TransactionRecord {
        let mut stored = record.clone();
        stored.transaction_id = self.next_transaction_id.fetch_add(1, Ordering::SeqCst);
        stored
    }

    /// Sort newest first; ids break timestamp ties
    fn newest_first(mut records: Vec<TransactionRecord>, limit: usize) -> Vec<TransactionRecord> {
        records.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(b.transaction_id.cmp(&a.transaction_id))
        });
        records.truncate(limit);
        records
    }

    fn newest_accounts_first(mut accounts: Vec<Account>) -> Vec<Account> {
        accounts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(a.account_number.cmp(&b.account_number))
        });
        accounts
    }
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceGateway for InMemoryGateway {
    fn load_account(&self, account_number: &str) -> Result<Option<Account>, PaymentError> {
        let _gate = self.read_gate()?;
        Ok(self
            .accounts
            .get(account_number)
            .map(|entry| entry.value().clone()))
    }

    fn save_account_balance(
        &self,
        account_number: &str,
        balance: Decimal,
    ) -> Result<(), PaymentError> {
        if !self.accounts.contains_key(account_number) {
            return Err(PaymentError::persistence(format!(
                "No account row for {}",
                account_number
            )));
        }

        let mut staged = self.staging()?;
        if let Some(scope) = staged.as_mut() {
            scope.balances.push((account_number.to_string(), balance));
            return Ok(());
        }
        drop(staged);

        let _gate = self.write_gate()?;
        if let Some(mut account) = self.accounts.get_mut(account_number) {
            account.balance = balance;
        }
        Ok(())
    }

    fn load_accounts_by_user(&self, user_id: UserId) -> Result<Vec<Account>, PaymentError> {
        let _gate = self.read_gate()?;
        let accounts = self
            .accounts
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        Ok(Self::newest_accounts_first(accounts))
    }

    fn load_all_accounts(&self) -> Result<Vec<Account>, PaymentError> {
        let _gate = self.read_gate()?;
        let accounts = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        Ok(Self::newest_accounts_first(accounts))
    }

    fn create_transaction_record(
        &self,
        record: &TransactionRecord,
    ) -> Result<TransactionId, PaymentError> {
        let stored = self.assign_id(record);
        let id = stored.transaction_id;

        let mut staged = self.staging()?;
        if let Some(scope) = staged.as_mut() {
            scope.records.push(stored);
            return Ok(id);
        }
        drop(staged);

        let _gate = self.write_gate()?;
        self.transactions.insert(id, stored);
        Ok(id)
    }

    fn load_transactions_by_account(
        &self,
        account_number: &str,
    ) -> Result<Vec<TransactionRecord>, PaymentError> {
        let _gate = self.read_gate()?;
        let records = self
            .transactions
            .iter()
            .filter(|entry| entry.value().involves(account_number))
            .map(|entry| entry.value().clone())
            .collect();
        Ok(Self::newest_first(records, ACCOUNT_HISTORY_LIMIT))
    }

    fn load_recent_transactions(&self) -> Result<Vec<TransactionRecord>, PaymentError> {
        let _gate = self.read_gate()?;
        let records = self
            .transactions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        Ok(Self::newest_first(records, RECENT_TRANSACTIONS_LIMIT))
    }

    fn begin_atomic(&self) -> Result<(), PaymentError> {
        let mut staged = self.staging()?;
        if staged.is_some() {
            return Err(PaymentError::persistence("An atomic scope is already open"));
        }
        *staged = Some(StagedWrites::default());
        Ok(())
    }

    fn commit(&self) -> Result<(), PaymentError> {
        let scope = self
            .staging()?
            .take()
            .ok_or_else(|| PaymentError::persistence("Commit without an open atomic scope"))?;

        let _gate = self.write_gate()?;
        for (account_number, balance) in scope.balances {
            if let Some(mut account) = self.accounts.get_mut(&account_number) {
                account.balance = balance;
            }
        }
        for record in scope.records {
            self.transactions.insert(record.transaction_id, record);
        }
        Ok(())
    }

    fn rollback(&self) -> Result<(), PaymentError> {
        if let Some(scope) = self.staging()?.take() {
            log::debug!(
                "Rolled back {} balance write(s) and {} record(s)",
                scope.balances.len(),
                scope.records.len()
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountKind, Transaction};
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn gateway_with(accounts: &[(&str, UserId, AccountKind, Decimal)]) -> InMemoryGateway {
        InMemoryGateway::with_accounts(accounts.iter().map(|(number, user, kind, balance)| {
            Account::open(*number, *user, *kind, *balance).unwrap()
        }))
        .unwrap()
    }

    #[test]
    fn test_load_account_returns_none_for_unknown() {
        let gateway = InMemoryGateway::new();
        assert_eq!(gateway.load_account("missing").unwrap(), None);
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let gateway = gateway_with(&[("A", 1, AccountKind::Savings, dec!(600))]);

        let duplicate = Account::open("A", 2, AccountKind::Current, dec!(0)).unwrap();
        let error = gateway.insert_account(duplicate).unwrap_err();

        assert!(error.to_string().contains("already exists"));
        assert_eq!(gateway.load_account("A").unwrap().unwrap().user_id, 1);
    }

    #[test]
    fn test_insert_accepts_stored_balance_below_minimum() {
        let gateway = InMemoryGateway::new();
        let account = Account::restore("Y", 3, AccountKind::Savings, dec!(300.00), true).unwrap();

        gateway.insert_account(account).unwrap();

        assert_eq!(gateway.load_account("Y").unwrap().unwrap().balance, dec!(300.00));
    }

    #[test]
    fn test_save_balance_outside_scope_is_immediate() {
        let gateway = gateway_with(&[("A", 1, AccountKind::Current, dec!(0))]);

        gateway.save_account_balance("A", dec!(42.50)).unwrap();

        assert_eq!(gateway.load_account("A").unwrap().unwrap().balance, dec!(42.50));
    }

    #[test]
    fn test_save_balance_unknown_account_fails() {
        let gateway = InMemoryGateway::new();
        let error = gateway.save_account_balance("ghost", dec!(1)).unwrap_err();
        assert!(matches!(error, PaymentError::Persistence { .. }));
    }

    #[test]
    fn test_atomic_scope_hides_writes_until_commit() {
        let gateway = gateway_with(&[
            ("A", 1, AccountKind::Current, dec!(1000)),
            ("B", 1, AccountKind::Savings, dec!(500)),
        ]);

        gateway.begin_atomic().unwrap();
        gateway.save_account_balance("A", dec!(800)).unwrap();
        gateway.save_account_balance("B", dec!(700)).unwrap();
        let id = gateway
            .create_transaction_record(&Transaction::transfer("A", "B", dec!(200)).to_record())
            .unwrap();

        assert!(gateway.in_atomic_scope());
        assert_eq!(gateway.load_account("A").unwrap().unwrap().balance, dec!(1000));
        assert!(gateway.load_recent_transactions().unwrap().is_empty());

        gateway.commit().unwrap();

        assert!(!gateway.in_atomic_scope());
        assert_eq!(gateway.load_account("A").unwrap().unwrap().balance, dec!(800));
        assert_eq!(gateway.load_account("B").unwrap().unwrap().balance, dec!(700));
        let recent = gateway.load_recent_transactions().unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].transaction_id, id);
    }

    #[test]
    fn test_rollback_discards_staged_writes() {
        let gateway = gateway_with(&[("A", 1, AccountKind::Current, dec!(1000))]);

        gateway.begin_atomic().unwrap();
        gateway.save_account_balance("A", dec!(1)).unwrap();
        gateway
            .create_transaction_record(&Transaction::withdraw("A", dec!(999)).to_record())
            .unwrap();
        gateway.rollback().unwrap();

        assert_eq!(gateway.load_account("A").unwrap().unwrap().balance, dec!(1000));
        assert!(gateway.load_recent_transactions().unwrap().is_empty());
    }

    #[test]
    fn test_nested_scope_is_rejected() {
        let gateway = InMemoryGateway::new();

        gateway.begin_atomic().unwrap();
        let error = gateway.begin_atomic().unwrap_err();

        assert!(error.to_string().contains("already open"));
        gateway.rollback().unwrap();
        gateway.begin_atomic().unwrap();
    }

    #[test]
    fn test_commit_without_scope_fails() {
        let gateway = InMemoryGateway::new();
        assert!(gateway.commit().is_err());
        assert!(gateway.rollback().is_ok());
    }

    #[test]
    fn test_transaction_ids_are_assigned_in_order() {
        let gateway = gateway_with(&[("A", 1, AccountKind::Current, dec!(0))]);
        let record = Transaction::deposit("A", dec!(1)).to_record();

        let first = gateway.create_transaction_record(&record).unwrap();
        let second = gateway.create_transaction_record(&record).unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_history_includes_incoming_transfers_newest_first() {
        let gateway = gateway_with(&[
            ("A", 1, AccountKind::Current, dec!(0)),
            ("B", 2, AccountKind::Current, dec!(0)),
        ]);
        let mut older = Transaction::deposit("B", dec!(5)).to_record();
        older.timestamp = older.timestamp - Duration::seconds(10);
        let newer = Transaction::transfer("A", "B", dec!(7)).to_record();
        let unrelated = Transaction::deposit("A", dec!(9)).to_record();

        gateway.create_transaction_record(&older).unwrap();
        gateway.create_transaction_record(&newer).unwrap();
        gateway.create_transaction_record(&unrelated).unwrap();

        let history = gateway.load_transactions_by_account("B").unwrap();
        let amounts: Vec<Decimal> = history.iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![dec!(7), dec!(5)]);
    }

    #[test]
    fn test_history_is_bounded() {
        let gateway = gateway_with(&[("A", 1, AccountKind::Current, dec!(0))]);
        let record = Transaction::deposit("A", dec!(1)).to_record();
        for _ in 0..(ACCOUNT_HISTORY_LIMIT + 5) {
            gateway.create_transaction_record(&record).unwrap();
        }

        assert_eq!(
            gateway.load_transactions_by_account("A").unwrap().len(),
            ACCOUNT_HISTORY_LIMIT
        );
    }

    #[test]
    fn test_load_accounts_by_user() {
        let gateway = gateway_with(&[
            ("A", 1, AccountKind::Current, dec!(0)),
            ("B", 2, AccountKind::Savings, dec!(500)),
            ("C", 1, AccountKind::Savings, dec!(900)),
        ]);

        let mut numbers: Vec<String> = gateway
            .load_accounts_by_user(1)
            .unwrap()
            .into_iter()
            .map(|a| a.account_number)
            .collect();
        numbers.sort();

        assert_eq!(numbers, vec!["A".to_string(), "C".to_string()]);
        assert_eq!(gateway.load_all_accounts().unwrap().len(), 3);
    }

    #[test]
    fn test_set_active_and_update_description() {
        let gateway = gateway_with(&[("A", 1, AccountKind::Current, dec!(0))]);
        let id = gateway
            .create_transaction_record(&Transaction::deposit("A", dec!(1)).to_record())
            .unwrap();

        gateway.set_account_active("A", false).unwrap();
        gateway
            .update_transaction_description(id, Some("salary".to_string()))
            .unwrap();

        assert!(!gateway.load_account("A").unwrap().unwrap().active);
        let record = &gateway.load_transactions_by_account("A").unwrap()[0];
        assert_eq!(record.description.as_deref(), Some("salary"));
        assert!(gateway.set_account_active("nope", true).is_err());
        assert!(gateway.update_transaction_description(999, None).is_err());
    }
}
