//! Fault injection for gateway-dependent tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;

use super::memory_gateway::InMemoryGateway;
use super::traits::PersistenceGateway;
use crate::types::{Account, PaymentError, TransactionId, TransactionRecord, UserId};

/// Gateway call that should fail
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailPoint {
    /// Saving the balance of this account
    SaveBalance(&'static str),
    CreateRecord,
    Commit,
    LoadAll,
}

/// Delegates to an `InMemoryGateway`, failing at one chosen call
pub struct FaultyGateway {
    inner: Arc<InMemoryGateway>,
    fail_point: FailPoint,
    failures: AtomicUsize,
}

impl FaultyGateway {
    pub fn new(inner: Arc<InMemoryGateway>, fail_point: FailPoint) -> Self {
        Self {
            inner,
            fail_point,
            failures: AtomicUsize::new(0),
        }
    }

    /// How many times the fail point has fired
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn check(&self, point: FailPoint) -> Result<(), PaymentError> {
        if point == self.fail_point {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(PaymentError::persistence(format!(
                "injected failure at {:?}",
                point
            )));
        }
        Ok(())
    }
}

impl PersistenceGateway for FaultyGateway {
    fn load_account(&self, account_number: &str) -> Result<Option<Account>, PaymentError> {
        self.inner.load_account(account_number)
    }

    fn save_account_balance(
        &self,
        account_number: &str,
        balance: Decimal,
    ) -> Result<(), PaymentError> {
        if let FailPoint::SaveBalance(target) = self.fail_point {
            if target == account_number {
                self.check(self.fail_point)?;
            }
        }
        self.inner.save_account_balance(account_number, balance)
    }

    fn load_accounts_by_user(&self, user_id: UserId) -> Result<Vec<Account>, PaymentError> {
        self.inner.load_accounts_by_user(user_id)
    }

    fn load_all_accounts(&self) -> Result<Vec<Account>, PaymentError> {
        self.check(FailPoint::LoadAll)?;
        self.inner.load_all_accounts()
    }

    fn create_transaction_record(
        &self,
        record: &TransactionRecord,
    ) -> Result<TransactionId, PaymentError> {
        self.check(FailPoint::CreateRecord)?;
        self.inner.create_transaction_record(record)
    }

    fn load_transactions_by_account(
        &self,
        account_number: &str,
    ) -> Result<Vec<TransactionRecord>, PaymentError> {
        self.inner.load_transactions_by_account(account_number)
    }

    fn load_recent_transactions(&self) -> Result<Vec<TransactionRecord>, PaymentError> {
        self.inner.load_recent_transactions()
    }

    fn begin_atomic(&self) -> Result<(), PaymentError> {
        self.inner.begin_atomic()
    }

    fn commit(&self) -> Result<(), PaymentError> {
        self.check(FailPoint::Commit)?;
        self.inner.commit()
    }

    fn rollback(&self) -> Result<(), PaymentError> {
        self.inner.rollback()
    }
}
