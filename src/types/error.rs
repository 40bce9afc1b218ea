//! Error types for the BankBridge core
//!
//! This module defines all error types that can occur while moving money between accounts.
//! Errors are designed to be descriptive: the engine hands their `Display` text to the
//! caller's `on_failure` callback, so the message is what the caller ends up seeing.
//!
//! # Error Categories
//!
//! - **Validation Errors**: non-positive amounts, empty identifiers, same-account transfers
//! - **Balance Errors**: insufficient funds, inactive accounts, arithmetic overflow
//! - **Lookup Errors**: unknown accounts (`AccountNotFound` / `InvalidAccount`)
//! - **Persistence Errors**: store failures and failed transfers (with the cause preserved)
//! - **Engine Errors**: submitting to a stopped engine, starting twice
//! - **File I/O Errors**: used by the CLI pipeline only

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Which side of a transfer an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferSide {
    Source,
    Destination,
}

impl fmt::Display for TransferSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferSide::Source => f.write_str("Source"),
            TransferSide::Destination => f.write_str("Destination"),
        }
    }
}

/// Main error type for the BankBridge core
///
/// Each variant includes relevant context to help diagnose the failure.
/// None of these errors is fatal to the transaction engine: the worker reports
/// them through the item's callback and moves on to the next queued item.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaymentError {
    /// Bad input: non-positive amount, empty identifier, same-account transfer, etc.
    ///
    /// Reported synchronously from `submit()` or via `on_failure`.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the rejected input
        message: String,
    },

    /// The balance would drop below the account kind's minimum
    ///
    /// The account balance is left unchanged. Never retried automatically.
    #[error(
        "Insufficient funds in account {account}. Current balance: {balance:.2}, Requested: {requested:.2}"
    )]
    InsufficientFunds {
        /// Account number
        account: String,
        /// Balance at the time of the attempt
        balance: Decimal,
        /// Requested withdrawal amount
        requested: Decimal,
    },

    /// The primary account of a transaction does not exist
    #[error("Account not found: {account}")]
    AccountNotFound {
        /// Account number that was looked up
        account: String,
    },

    /// One side of a transfer does not exist
    #[error("{side} account not found: {account}")]
    InvalidAccount {
        /// Account number that was looked up
        account: String,
        /// Which side of the transfer is missing
        side: TransferSide,
    },

    /// The account is deactivated and rejects balance changes
    #[error("Account {account} is inactive")]
    AccountInactive {
        /// Account number of the inactive account
        account: String,
    },

    /// Arithmetic overflow would occur
    ///
    /// The operation is rejected to maintain account integrity.
    #[error("Arithmetic overflow in {operation} for account {account}")]
    ArithmeticOverflow {
        /// Operation that would overflow
        operation: String,
        /// Account number
        account: String,
    },

    /// The persistence store rejected or could not run a statement
    #[error("Database error: {message}")]
    Persistence {
        /// Underlying cause as reported by the store
        message: String,
    },

    /// A two-account transfer could not be made durable and was rolled back
    #[error("Transfer failed: {cause}")]
    TransferFailed {
        /// The error that triggered the rollback
        cause: Box<PaymentError>,
    },

    /// The engine has been stopped and no longer accepts work
    #[error("Transaction engine is not running")]
    EngineStopped,

    /// `start()` was called on an engine whose worker already exists
    #[error("Transaction engine was already started")]
    EngineAlreadyStarted,

    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing error occurred
    ///
    /// This is a recoverable error - the malformed record is skipped
    /// and processing continues with the next record.
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },
}

// Conversion from io::Error to PaymentError
impl From<std::io::Error> for PaymentError {
    fn from(error: std::io::Error) -> Self {
        PaymentError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to PaymentError
impl From<csv::Error> for PaymentError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        PaymentError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl PaymentError {
    /// Create a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PaymentError::Validation {
            message: message.into(),
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account: &str, balance: Decimal, requested: Decimal) -> Self {
        PaymentError::InsufficientFunds {
            account: account.to_string(),
            balance,
            requested,
        }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(account: &str) -> Self {
        PaymentError::AccountNotFound {
            account: account.to_string(),
        }
    }

    /// Create an InvalidAccount error
    pub fn invalid_account(account: &str, side: TransferSide) -> Self {
        PaymentError::InvalidAccount {
            account: account.to_string(),
            side,
        }
    }

    /// Create an AccountInactive error
    pub fn account_inactive(account: &str) -> Self {
        PaymentError::AccountInactive {
            account: account.to_string(),
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(operation: &str, account: &str) -> Self {
        PaymentError::ArithmeticOverflow {
            operation: operation.to_string(),
            account: account.to_string(),
        }
    }

    /// Create a Persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        PaymentError::Persistence {
            message: message.into(),
        }
    }

    /// Wrap the cause of a rolled-back transfer
    pub fn transfer_failed(cause: PaymentError) -> Self {
        PaymentError::TransferFailed {
            cause: Box::new(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case::validation(
        PaymentError::Validation { message: "Transaction amount must be positive".to_string() },
        "Validation error: Transaction amount must be positive"
    )]
    #[case::insufficient_funds(
        PaymentError::InsufficientFunds { account: "SAV-1".to_string(), balance: dec!(500.00), requested: dec!(100.00) },
        "Insufficient funds in account SAV-1. Current balance: 500.00, Requested: 100.00"
    )]
    #[case::account_not_found(
        PaymentError::AccountNotFound { account: "NOPE".to_string() },
        "Account not found: NOPE"
    )]
    #[case::invalid_destination(
        PaymentError::InvalidAccount { account: "CUR-9".to_string(), side: TransferSide::Destination },
        "Destination account not found: CUR-9"
    )]
    #[case::account_inactive(
        PaymentError::AccountInactive { account: "SAV-2".to_string() },
        "Account SAV-2 is inactive"
    )]
    #[case::persistence(
        PaymentError::Persistence { message: "disk full".to_string() },
        "Database error: disk full"
    )]
    #[case::transfer_failed(
        PaymentError::transfer_failed(PaymentError::persistence("disk full")),
        "Transfer failed: Database error: disk full"
    )]
    #[case::engine_stopped(PaymentError::EngineStopped, "Transaction engine is not running")]
    #[case::parse_error_with_line(
        PaymentError::ParseError { line: Some(42), message: "Invalid field".to_string() },
        "CSV parse error at line 42: Invalid field"
    )]
    #[case::parse_error_without_line(
        PaymentError::ParseError { line: None, message: "Invalid field".to_string() },
        "CSV parse error: Invalid field"
    )]
    fn test_error_display(#[case] error: PaymentError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::insufficient_funds(
        PaymentError::insufficient_funds("A", dec!(10), dec!(20)),
        PaymentError::InsufficientFunds { account: "A".to_string(), balance: dec!(10), requested: dec!(20) }
    )]
    #[case::invalid_account(
        PaymentError::invalid_account("B", TransferSide::Source),
        PaymentError::InvalidAccount { account: "B".to_string(), side: TransferSide::Source }
    )]
    #[case::arithmetic_overflow(
        PaymentError::arithmetic_overflow("deposit", "C"),
        PaymentError::ArithmeticOverflow { operation: "deposit".to_string(), account: "C".to_string() }
    )]
    fn test_helper_functions(#[case] result: PaymentError, #[case] expected: PaymentError) {
        assert_eq!(result, expected);
    }

    #[test]
    fn test_transfer_failed_preserves_cause() {
        let error = PaymentError::transfer_failed(PaymentError::persistence("connection reset"));

        match error {
            PaymentError::TransferFailed { cause } => {
                assert_eq!(*cause, PaymentError::persistence("connection reset"));
            }
            other => panic!("Expected TransferFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied");
        let error: PaymentError = io_error.into();
        assert!(matches!(error, PaymentError::IoError { .. }));
        assert_eq!(error.to_string(), "I/O error: Permission denied");
    }
}
