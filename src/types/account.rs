//! Account-related types for the BankBridge core
//!
//! This module defines the Account structure, the account kinds and the
//! per-kind balance policy (minimum balance and periodic adjustment).
//!
//! # Kind Policy
//!
//! | kind    | minimum balance | periodic adjustment                       |
//! |---------|-----------------|-------------------------------------------|
//! | Savings | 500.00          | 4% annual interest, credited monthly      |
//! | Current | -1000.00        | 2% overdraft fee while the balance is < 0 |
//!
//! # Single Writer
//!
//! `Account` has no interior locking. Balance mutations happen only inside the
//! transaction engine's worker, which processes one item at a time.

use super::error::PaymentError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Account identifier (unique, immutable)
pub type AccountNumber = String;

/// Identifier of the owning user
pub type UserId = u32;

/// Account kinds supported by the core
///
/// Each kind maps to a [`KindPolicy`] through [`AccountKind::policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountKind {
    /// Interest-bearing account with a positive minimum balance
    Savings,

    /// Transactional account with an overdraft facility
    Current,
}

/// Periodic, kind-specific balance adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodicAdjustment {
    /// Credit `balance * annual_rate / 12`
    MonthlyInterest { annual_rate: Decimal },

    /// Charge `|balance| * rate` while the balance is negative
    OverdraftFee { rate: Decimal },
}

/// Balance rules attached to an account kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindPolicy {
    /// Lowest balance a withdrawal may leave behind
    pub minimum_balance: Decimal,

    /// Adjustment applied once per period by an external scheduler
    pub adjustment: PeriodicAdjustment,
}

impl AccountKind {
    /// Look up the balance policy for this kind
    pub fn policy(self) -> KindPolicy {
        match self {
            AccountKind::Savings => KindPolicy {
                minimum_balance: Decimal::new(50000, 2),
                adjustment: PeriodicAdjustment::MonthlyInterest {
                    annual_rate: Decimal::new(4, 2),
                },
            },
            AccountKind::Current => KindPolicy {
                minimum_balance: Decimal::new(-100000, 2),
                adjustment: PeriodicAdjustment::OverdraftFee {
                    rate: Decimal::new(2, 2),
                },
            },
        }
    }

    /// Minimum balance for this kind
    pub fn minimum_balance(self) -> Decimal {
        self.policy().minimum_balance
    }

    /// Human-readable feature list
    pub fn features(self) -> &'static str {
        match self {
            AccountKind::Savings => {
                "Savings Account Features:\n\
                 - 4% Annual Interest\n\
                 - Minimum Balance: $500.00\n\
                 - Unlimited Deposits\n\
                 - Limited Withdrawals"
            }
            AccountKind::Current => {
                "Current Account Features:\n\
                 - No Interest\n\
                 - Overdraft Limit: $1000.00\n\
                 - Unlimited Transactions\n\
                 - Business Friendly"
            }
        }
    }

    /// Persisted name of the kind (`SAVINGS` / `CURRENT`)
    pub fn as_str(self) -> &'static str {
        match self {
            AccountKind::Savings => "SAVINGS",
            AccountKind::Current => "CURRENT",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SAVINGS" => Ok(AccountKind::Savings),
            "CURRENT" => Ok(AccountKind::Current),
            other => Err(PaymentError::validation(format!(
                "Unknown account type '{}'",
                other
            ))),
        }
    }
}

/// Account state
///
/// Represents a single account as loaded from the persistence gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// Unique account number
    pub account_number: AccountNumber,

    /// Owning user
    pub user_id: UserId,

    /// Account kind, which selects the balance policy
    pub kind: AccountKind,

    /// Current balance
    ///
    /// A withdrawal never takes it below `kind.minimum_balance()`.
    pub balance: Decimal,

    /// Whether the account accepts balance changes
    pub active: bool,

    /// When the account was opened
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Open a new active account
    ///
    /// # Arguments
    ///
    /// * `account_number` - Unique, non-empty account number
    /// * `user_id` - Owning user (must be positive)
    /// * `kind` - Account kind
    /// * `initial_balance` - Opening balance, which must satisfy the kind's minimum
    ///
    /// # Returns
    ///
    /// * `Ok(Account)` with `created_at` set to now
    /// * `Err(PaymentError::Validation)` if any of the rules above is broken
    pub fn open(
        account_number: impl Into<AccountNumber>,
        user_id: UserId,
        kind: AccountKind,
        initial_balance: Decimal,
    ) -> Result<Self, PaymentError> {
        let account = Self::restore(account_number, user_id, kind, initial_balance, true)?;
        if account.balance < account.minimum_balance() {
            return Err(PaymentError::validation(format!(
                "Balance {:.2} below minimum required {:.2} for {} account",
                account.balance,
                account.minimum_balance(),
                account.kind
            )));
        }
        Ok(account)
    }

    /// Rebuild an account from persisted state
    ///
    /// Unlike [`open`](Self::open), the balance is taken as stored: an existing
    /// account may sit below its kind's minimum, and only withdrawals are held
    /// to the floor from then on.
    ///
    /// # Returns
    ///
    /// * `Err(PaymentError::Validation)` if the number is empty or the user id is zero
    pub fn restore(
        account_number: impl Into<AccountNumber>,
        user_id: UserId,
        kind: AccountKind,
        balance: Decimal,
        active: bool,
    ) -> Result<Self, PaymentError> {
        let account = Account {
            account_number: account_number.into(),
            user_id,
            kind,
            balance,
            active,
            created_at: Utc::now(),
        };
        account.validate()?;
        Ok(account)
    }

    /// Check the identity rules every stored account must satisfy
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.account_number.trim().is_empty() {
            return Err(PaymentError::validation("Account number cannot be empty"));
        }
        if self.user_id == 0 {
            return Err(PaymentError::validation("Invalid user ID"));
        }
        Ok(())
    }

    /// Minimum balance allowed by this account's kind
    pub fn minimum_balance(&self) -> Decimal {
        self.kind.minimum_balance()
    }

    /// Credit the account
    ///
    /// # Errors
    ///
    /// * `Validation` if `amount <= 0`
    /// * `AccountInactive` if the account is deactivated
    /// * `ArithmeticOverflow` if the balance cannot represent the result
    pub fn deposit(&mut self, amount: Decimal) -> Result<(), PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::validation("Deposit amount must be positive"));
        }
        self.ensure_active()?;

        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| PaymentError::arithmetic_overflow("deposit", &self.account_number))?;
        Ok(())
    }

    /// Debit the account
    ///
    /// Succeeds iff `balance - amount >= minimum_balance`. On failure the balance
    /// is left unchanged.
    ///
    /// # Errors
    ///
    /// * `Validation` if `amount <= 0`
    /// * `AccountInactive` if the account is deactivated
    /// * `InsufficientFunds(balance, amount)` if the minimum would be breached
    pub fn withdraw(&mut self, amount: Decimal) -> Result<(), PaymentError> {
        if amount <= Decimal::ZERO {
            return Err(PaymentError::validation("Withdrawal amount must be positive"));
        }
        self.ensure_active()?;

        let remaining = self
            .balance
            .checked_sub(amount)
            .ok_or_else(|| PaymentError::arithmetic_overflow("withdrawal", &self.account_number))?;

        if remaining < self.minimum_balance() {
            return Err(PaymentError::insufficient_funds(
                &self.account_number,
                self.balance,
                amount,
            ));
        }

        self.balance = remaining;
        Ok(())
    }

    /// Apply the kind's periodic adjustment and return the signed change
    ///
    /// Interest and fees are rounded to cents. The overdraft fee is charged in
    /// full even when it takes the balance below the overdraft floor. Call at
    /// most once per period; nothing in the core schedules this.
    pub fn apply_periodic_adjustment(&mut self) -> Result<Decimal, PaymentError> {
        self.ensure_active()?;

        let delta = match self.kind.policy().adjustment {
            PeriodicAdjustment::MonthlyInterest { annual_rate } => {
                (self.balance * annual_rate / Decimal::from(12)).round_dp(2)
            }
            PeriodicAdjustment::OverdraftFee { rate } if self.balance < Decimal::ZERO => {
                -(self.balance.abs() * rate).round_dp(2)
            }
            PeriodicAdjustment::OverdraftFee { .. } => Decimal::ZERO,
        };

        self.balance = self.balance.checked_add(delta).ok_or_else(|| {
            PaymentError::arithmetic_overflow("periodic adjustment", &self.account_number)
        })?;
        Ok(delta)
    }

    /// Feature description of this account's kind
    pub fn features(&self) -> &'static str {
        self.kind.features()
    }

    /// One-line summary, e.g. `SAV-1 - SAVINGS (Balance: $500.00)`
    pub fn display_info(&self) -> String {
        format!(
            "{} - {} (Balance: ${:.2})",
            self.account_number, self.kind, self.balance
        )
    }

    fn ensure_active(&self) -> Result<(), PaymentError> {
        if self.active {
            Ok(())
        } else {
            Err(PaymentError::account_inactive(&self.account_number))
        }
    }
}
