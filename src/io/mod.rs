//! I/O module
//!
//! Handles CSV parsing and output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, output serialization)
//! - `sync_reader` - Synchronous accounts reader with iterator interface
//! - `async_reader` - Asynchronous transactions reader with batch reading interface

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::TransactionReader;
pub use csv_format::{
    convert_account_record, convert_transaction_record, write_accounts_csv, AccountCsvRecord,
    TransactionCsvRecord,
};
pub use sync_reader::{load_accounts, AccountReader};
