//! Transaction-related types for the BankBridge core
//!
//! This module defines the transaction variants callers submit to the engine
//! and the transaction record persisted for the audit trail.

use super::account::{Account, AccountNumber};
use super::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

/// Transaction identifier
///
/// Assigned by the persistence gateway on create; 0 means "not yet persisted".
pub type TransactionId = u64;

/// Persisted transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Deposit,
    Withdraw,
    Transfer,
}

impl TransactionKind {
    /// Persisted name (`DEPOSIT` / `WITHDRAW` / `TRANSFER`)
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Deposit => "DEPOSIT",
            TransactionKind::Withdraw => "WITHDRAW",
            TransactionKind::Transfer => "TRANSFER",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work submitted to the transaction engine
///
/// Every variant shares the same contract: [`validate`](Transaction::validate)
/// checks the input, [`execute`](Transaction::execute) applies the variant to its
/// primary account in memory.
#[derive(Debug, Clone, PartialEq)]
pub enum Transaction {
    /// Credit `amount` to `account`
    Deposit {
        account: AccountNumber,
        amount: Decimal,
    },

    /// Debit `amount` from `account`, subject to its minimum balance
    Withdraw {
        account: AccountNumber,
        amount: Decimal,
    },

    /// Move `amount` from `from` to `to`
    ///
    /// `execute` only debits the source. Crediting the destination is the
    /// transfer coordinator's job, inside the same atomic scope as the debit.
    Transfer {
        from: AccountNumber,
        to: AccountNumber,
        amount: Decimal,
    },
}

impl Transaction {
    pub fn deposit(account: impl Into<AccountNumber>, amount: Decimal) -> Self {
        Transaction::Deposit {
            account: account.into(),
            amount,
        }
    }

    pub fn withdraw(account: impl Into<AccountNumber>, amount: Decimal) -> Self {
        Transaction::Withdraw {
            account: account.into(),
            amount,
        }
    }

    pub fn transfer(
        from: impl Into<AccountNumber>,
        to: impl Into<AccountNumber>,
        amount: Decimal,
    ) -> Self {
        Transaction::Transfer {
            from: from.into(),
            to: to.into(),
            amount,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        match self {
            Transaction::Deposit { .. } => TransactionKind::Deposit,
            Transaction::Withdraw { .. } => TransactionKind::Withdraw,
            Transaction::Transfer { .. } => TransactionKind::Transfer,
        }
    }

    /// The primary account (the source, for transfers)
    pub fn account_number(&self) -> &str {
        match self {
            Transaction::Deposit { account, .. } | Transaction::Withdraw { account, .. } => account,
            Transaction::Transfer { from, .. } => from,
        }
    }

    /// The destination account, for transfers only
    pub fn destination(&self) -> Option<&str> {
        match self {
            Transaction::Transfer { to, .. } => Some(to.as_str()),
            _ => None,
        }
    }

    pub fn amount(&self) -> Decimal {
        match self {
            Transaction::Deposit { amount, .. }
            | Transaction::Withdraw { amount, .. }
            | Transaction::Transfer { amount, .. } => *amount,
        }
    }

    /// Description stored with the record unless it is edited later
    pub fn default_description(&self) -> String {
        match self {
            Transaction::Deposit { .. } => "Deposit to account".to_string(),
            Transaction::Withdraw { .. } => "Withdrawal from account".to_string(),
            Transaction::Transfer { to, .. } => format!("Transfer to {}", to),
        }
    }

    /// Check the input rules shared by all variants
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Validation` if:
    /// - The account number is empty
    /// - The amount is not positive
    /// - For transfers, the destination is empty or equal to the source
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.account_number().trim().is_empty() {
            return Err(PaymentError::validation("Account number cannot be empty"));
        }
        if self.amount() <= Decimal::ZERO {
            return Err(PaymentError::validation(
                "Transaction amount must be positive",
            ));
        }
        if let Transaction::Transfer { from, to, .. } = self {
            if to.trim().is_empty() {
                return Err(PaymentError::validation(
                    "Destination account cannot be empty",
                ));
            }
            if from == to {
                return Err(PaymentError::validation(
                    "Cannot transfer to the same account",
                ));
            }
        }
        Ok(())
    }

    /// Apply this transaction to its primary account in memory
    ///
    /// Nothing is persisted here. A failed execute leaves `primary` unchanged.
    ///
    /// # Arguments
    ///
    /// * `primary` - The account named by [`account_number`](Transaction::account_number)
    ///
    /// # Errors
    ///
    /// * `Validation` if the input is invalid or `primary` is a different account
    /// * Any error from [`Account::deposit`] / [`Account::withdraw`]
    pub fn execute(&self, primary: &mut Account) -> Result<(), PaymentError> {
        self.validate()?;
        if primary.account_number != self.account_number() {
            return Err(PaymentError::validation(format!(
                "Account number mismatch: expected {}, got {}",
                self.account_number(),
                primary.account_number
            )));
        }

        match self {
            Transaction::Deposit { amount, .. } => primary.deposit(*amount),
            Transaction::Withdraw { amount, .. } | Transaction::Transfer { amount, .. } => {
                primary.withdraw(*amount)
            }
        }
    }

    /// Build the not-yet-persisted audit record for this transaction
    pub fn to_record(&self) -> TransactionRecord {
        TransactionRecord {
            transaction_id: 0,
            account_number: self.account_number().to_string(),
            kind: self.kind(),
            amount: self.amount(),
            to_account: self.destination().map(str::to_string),
            description: Some(self.default_description()),
            timestamp: Utc::now(),
        }
    }
}

/// Persisted transaction record
///
/// Immutable once created, except for `description`. A transfer is stored once,
/// from the source's perspective, with the destination in `to_account`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    /// Assigned by the gateway; 0 before the record is persisted
    pub transaction_id: TransactionId,

    /// Primary (source) account
    pub account_number: AccountNumber,

    pub kind: TransactionKind,

    /// Always positive
    pub amount: Decimal,

    /// Destination account, only for TRANSFER
    pub to_account: Option<AccountNumber>,

    pub description: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    /// Whether the gateway has assigned an id
    pub fn is_persisted(&self) -> bool {
        self.transaction_id != 0
    }

    /// Whether this record touches `account_number` as source or destination
    pub fn involves(&self, account_number: &str) -> bool {
        self.account_number == account_number
            || self.to_account.as_deref() == Some(account_number)
    }

    /// One-line summary, e.g. `DEPOSIT - $100.00 on 2024-01-01 10:00:00`
    pub fn display_info(&self) -> String {
        format!(
            "{} - ${:.2} on {}",
            self.kind,
            self.amount,
            self.timestamp.format("%Y-%m-%d %H:%M:%S")
        )
    }
}
