//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account, account kinds and their balance policy
//! - `transaction`: Transaction variants, records and identifiers
//! - `error`: Error types for the BankBridge core

pub mod account;
pub mod error;
pub mod transaction;

pub use account::{Account, AccountKind, AccountNumber, KindPolicy, PeriodicAdjustment, UserId};
pub use error::{PaymentError, TransferSide};
pub use transaction::{Transaction, TransactionId, TransactionKind, TransactionRecord};
