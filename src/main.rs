//! BankBridge CLI
//!
//! Command-line interface for applying transactions from a CSV file to a set
//! of accounts loaded from another CSV file.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- accounts.csv transactions.csv > final_accounts.csv
//! cargo run -- --submitters 4 --batch-size 500 accounts.csv transactions.csv
//! cargo run -- --shutdown drain --audit-interval 5 --verbose accounts.csv transactions.csv
//! ```
//!
//! Accounts are loaded into memory, every transaction goes through the
//! single-worker engine, and the final account states are written to stdout.
//! Failed transactions and skipped rows are reported on stderr.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, file not readable, etc.)

use bankbridge_core::cli;
use bankbridge_core::pipeline;
use std::process;

fn main() {
    let args = cli::parse_args();

    if let Err(e) = cli::init_logging(args.verbose) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    let config = args.to_run_config();
    let mut output = std::io::stdout();
    match pipeline::run(
        &args.accounts_file,
        &args.transactions_file,
        &config,
        &mut output,
    ) {
        Ok(summary) => log::info!(
            "{} submitted, {} succeeded, {} failed, {} row(s) skipped",
            summary.submitted,
            summary.succeeded,
            summary.failed,
            summary.skipped_rows
        ),
        Err(e) => {
            log::error!("{}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
