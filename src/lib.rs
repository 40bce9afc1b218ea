//! BankBridge Core Library
//! # Overview
//!
//! This library applies money movements (deposits, withdrawals and transfers)
//! to accounts with kind-specific balance rules. Many callers may submit work
//! concurrently; a single engine worker applies it in order, so no balance is
//! ever updated by two operations at once.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, Transaction, PaymentError, etc.)
//! - [`core`] - Business logic components:
//!   - [`core::traits`] - Persistence gateway and completion callbacks
//!   - [`core::memory_gateway`] - In-memory store with atomic scopes
//!   - [`core::coordinator`] - All-or-nothing two-account transfers
//!   - [`core::engine`] - Single-worker asynchronous transaction engine
//!   - [`core::audit`] - Periodic read-only audit
//! - [`io`] - CSV reading and account output
//! - [`pipeline`] - Batch run from CSV files through the engine
//! - [`cli`] - CLI arguments parsing and logging setup
//!
//! # Account Kinds
//!
//! - **Savings**: minimum balance 500.00, monthly interest at 4% a year
//! - **Current**: overdraft down to -1000.00, 2% fee on a negative balance
//!
//! # Transaction Types
//!
//! - **Deposit**: Credit funds to an account
//! - **Withdraw**: Debit funds, respecting the account's minimum balance
//! - **Transfer**: Move funds between two accounts; both change or neither does

pub mod cli;
pub mod core;
pub mod io;
pub mod pipeline;
pub mod types;

pub use core::{
    AuditProcess, InMemoryGateway, PersistenceGateway, TransactionCallback, TransactionEngine,
    TransferCoordinator,
};
pub use io::write_accounts_csv;
pub use types::{
    Account, AccountKind, AccountNumber, PaymentError, Transaction, TransactionId,
    TransactionKind, TransactionRecord,
};
