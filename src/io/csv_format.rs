//! CSV format handling for accounts and transactions
//!
//! This module centralizes all CSV format concerns, providing:
//! - Record structures for deserializing account and transaction rows
//! - Conversion from CSV records to domain types
//! - Account output serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::types::{Account, AccountKind, Transaction, UserId};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Header written by [`write_accounts_csv`]
pub const ACCOUNT_HEADER: [&str; 5] = [
    "account_number",
    "user_id",
    "account_type",
    "balance",
    "is_active",
];

/// Account row: account_number, user_id, account_type, balance, is_active
///
/// `is_active` may be omitted and then defaults to true.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AccountCsvRecord {
    pub account_number: String,
    pub user_id: UserId,
    pub account_type: String,
    pub balance: String,
    #[serde(default)]
    pub is_active: Option<String>,
}

/// Transaction row: type, account, to_account, amount
///
/// `to_account` is only read for transfers.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TransactionCsvRecord {
    #[serde(rename = "type")]
    pub tx_type: String,
    pub account: String,
    #[serde(default)]
    pub to_account: Option<String>,
    pub amount: Option<String>,
}

fn parse_amount(raw: &str, context: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw.trim()).map_err(|_| format!("Invalid amount '{}' for {}", raw, context))
}

fn parse_flag(raw: Option<&str>) -> Result<bool, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(true),
        Some(value) => match value.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(format!("Invalid is_active value '{}'", value)),
        },
    }
}

/// Convert an AccountCsvRecord to an Account
///
/// # Returns
///
/// * `Ok(Account)` - The stored account; the balance is not held to the kind's minimum
/// * `Err(String)` - Unknown type, malformed number, empty number or zero user id
pub fn convert_account_record(record: AccountCsvRecord) -> Result<Account, String> {
    let context = format!("account {}", record.account_number);
    let kind = AccountKind::from_str(&record.account_type).map_err(|e| e.to_string())?;
    let balance = parse_amount(&record.balance, &context)?;
    let active = parse_flag(record.is_active.as_deref())?;

    Account::restore(record.account_number, record.user_id, kind, balance, active)
        .map_err(|e| format!("Cannot load {}: {}", context, e))
}

/// Convert a TransactionCsvRecord to a Transaction
///
/// This function:
/// - Parses the type (`deposit`, `withdraw`/`withdrawal`, `transfer`; case-insensitive)
/// - Parses the amount, which every type requires
/// - Requires `to_account` for transfers
/// - Runs the transaction's own input validation
///
/// # Returns
///
/// * `Ok(Transaction)` - Successfully converted transaction
/// * `Err(String)` - Error message describing the conversion failure
pub fn convert_transaction_record(record: TransactionCsvRecord) -> Result<Transaction, String> {
    let context = format!("{} on account {}", record.tx_type, record.account);
    let amount = match record.amount.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => parse_amount(raw, &context)?,
        _ => return Err(format!("{} requires an amount", context)),
    };

    let transaction = match record.tx_type.trim().to_lowercase().as_str() {
        "deposit" => Transaction::deposit(record.account, amount),
        "withdraw" | "withdrawal" => Transaction::withdraw(record.account, amount),
        "transfer" => match record.to_account.filter(|to| !to.trim().is_empty()) {
            Some(to) => Transaction::transfer(record.account, to, amount),
            None => return Err(format!("{} requires a to_account", context)),
        },
        _ => {
            return Err(format!(
                "Invalid transaction type: '{}' for account {}",
                record.tx_type, record.account
            ))
        }
    };

    transaction
        .validate()
        .map_err(|e| format!("{}: {}", context, e))?;
    Ok(transaction)
}

/// Write account states to CSV format
///
/// Writes accounts with columns: account_number, user_id, account_type, balance, is_active.
/// Accounts are sorted by account number for deterministic output.
///
/// # Arguments
///
/// * `accounts` - Slice of accounts to write
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(ACCOUNT_HEADER)
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts: Vec<&Account> = accounts.iter().collect();
    sorted_accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));

    for account in sorted_accounts {
        writer
            .write_record(&[
                account.account_number.clone(),
                account.user_id.to_string(),
                account.kind.to_string(),
                format!("{:.2}", account.balance.round_dp(2)),
                account.active.to_string(),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
