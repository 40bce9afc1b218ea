//! Synchronous account CSV reader with iterator interface
//!
//! Accounts are loaded once, before any transaction is processed, so a plain
//! blocking `csv::Reader` is enough here. Format concerns are delegated to the
//! `csv_format` module.
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Individual row errors are yielded as Err variants in the iterator
//! - Line numbers are included in error messages for debugging

use crate::io::csv_format::{convert_account_record, AccountCsvRecord};
use crate::types::{Account, PaymentError};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

/// Streaming reader over the rows of an accounts file
///
/// # Examples
///
/// ```no_run
/// use bankbridge_core::io::AccountReader;
/// use std::path::Path;
///
/// let reader = AccountReader::new(Path::new("accounts.csv")).unwrap();
/// let accounts: Vec<_> = reader.filter_map(Result::ok).collect();
/// println!("Loaded {} accounts", accounts.len());
/// ```
#[derive(Debug)]
pub struct AccountReader {
    reader: csv::Reader<File>,
    line_num: usize,
}

impl AccountReader {
    /// Open an accounts file
    ///
    /// The CSV reader trims whitespace and allows the optional `is_active`
    /// column to be missing.
    ///
    /// # Errors
    ///
    /// * `FileNotFound` if `path` does not exist
    /// * `IoError` for any other open failure
    pub fn new(path: &Path) -> Result<Self, PaymentError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => PaymentError::FileNotFound {
                path: path.display().to_string(),
            },
            _ => PaymentError::from(e),
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 0,
        })
    }
}

impl Iterator for AccountReader {
    type Item = Result<Account, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<AccountCsvRecord>();

        let row = deserializer.next()?;
        self.line_num += 1;
        // +1 for the header row
        let line = self.line_num + 1;

        Some(match row {
            Ok(record) => convert_account_record(record).map_err(|e| format!("Line {}: {}", line, e)),
            Err(e) => Err(format!("Line {}: CSV parse error: {}", line, e)),
        })
    }
}

/// Read every valid account from `path`
///
/// Invalid rows are logged and skipped.
pub fn load_accounts(path: &Path) -> Result<Vec<Account>, PaymentError> {
    let accounts = AccountReader::new(path)?
        .filter_map(|row| match row {
            Ok(account) => Some(account),
            Err(e) => {
                log::warn!("Skipping account row: {}", e);
                None
            }
        })
        .collect::<Vec<_>>();

    log::info!("Loaded {} account(s) from {}", accounts.len(), path.display());
    Ok(accounts)
}
