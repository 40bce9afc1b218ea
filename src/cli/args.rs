use crate::core::{AuditConfig, ShutdownMode};
use crate::pipeline::RunConfig;
use clap::Parser;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::time::Duration;

/// Apply deposits, withdrawals and transfers to bank accounts
#[derive(Parser, Debug)]
#[command(name = "bankbridge")]
#[command(about = "Apply deposits, withdrawals and transfers to bank accounts", long_about = None)]
pub struct CliArgs {
    /// Accounts CSV file path
    #[arg(value_name = "ACCOUNTS", help = "Path to the accounts CSV file")]
    pub accounts_file: PathBuf,

    /// Transactions CSV file path
    #[arg(value_name = "TRANSACTIONS", help = "Path to the transactions CSV file")]
    pub transactions_file: PathBuf,

    /// Number of transactions per batch
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of transactions read per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Number of concurrent submitters per batch
    #[arg(
        long = "submitters",
        value_name = "COUNT",
        help = "Concurrent submitting tasks per batch (default: 1, keeps file order)"
    )]
    pub submitters: Option<usize>,

    /// What to do with queued transactions on shutdown
    #[arg(
        long = "shutdown",
        value_name = "MODE",
        default_value = "abandon",
        help = "Queued transactions on shutdown: 'abandon' drops them, 'drain' processes them"
    )]
    pub shutdown: ShutdownMode,

    /// Seconds between audit passes
    #[arg(
        long = "audit-interval",
        value_name = "SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between background audit passes"
    )]
    pub audit_interval: u64,

    /// Amount above which the audit flags a transaction
    #[arg(
        long = "suspicious-threshold",
        value_name = "AMOUNT",
        help = "Amount above which the audit flags a transaction (default: 10000.00)"
    )]
    pub suspicious_threshold: Option<Decimal>,

    /// Log progress at INFO instead of WARN
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Create a RunConfig from CLI arguments
    ///
    /// Missing values fall back to defaults; zero sizes are replaced with
    /// defaults and logged by [`RunConfig::new`].
    ///
    /// # Returns
    ///
    /// A `RunConfig` with values from CLI arguments or defaults.
    pub fn to_run_config(&self) -> RunConfig {
        let default = RunConfig::default();
        let base = if self.batch_size.is_some() || self.submitters.is_some() {
            RunConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.submitters.unwrap_or(default.submitters),
            )
        } else {
            default
        };

        RunConfig {
            shutdown_mode: self.shutdown,
            audit: AuditConfig {
                interval: Duration::from_secs(self.audit_interval),
                suspicious_threshold: self
                    .suspicious_threshold
                    .unwrap_or(base.audit.suspicious_threshold),
                ..base.audit
            },
            ..base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case::default_mode(&["program", "a.csv", "t.csv"], ShutdownMode::Abandon)]
    #[case::explicit_abandon(&["program", "--shutdown", "abandon", "a.csv", "t.csv"], ShutdownMode::Abandon)]
    #[case::drain(&["program", "--shutdown", "drain", "a.csv", "t.csv"], ShutdownMode::Drain)]
    fn test_shutdown_parsing(#[case] args: &[&str], #[case] expected: ShutdownMode) {
        let parsed = CliArgs::try_parse_from(args).unwrap();
        assert_eq!(parsed.shutdown, expected);
    }

    #[test]
    fn test_positional_paths() {
        let parsed = CliArgs::try_parse_from(["program", "accounts.csv", "tx.csv"]).unwrap();
        assert_eq!(parsed.accounts_file, PathBuf::from("accounts.csv"));
        assert_eq!(parsed.transactions_file, PathBuf::from("tx.csv"));
        assert!(!parsed.verbose);
    }

    #[rstest]
    #[case::all_defaults(&["program", "a.csv", "t.csv"], 1000, 1)]
    #[case::custom_batch_size(&["program", "--batch-size", "2000", "a.csv", "t.csv"], 2000, 1)]
    #[case::custom_submitters(&["program", "--submitters", "8", "a.csv", "t.csv"], 1000, 8)]
    #[case::zero_batch_size(&["program", "--batch-size", "0", "a.csv", "t.csv"], 1000, 1)]
    #[case::zero_submitters(&["program", "--submitters", "0", "a.csv", "t.csv"], 1000, 1)]
    fn test_run_config_sizing(
        #[case] args: &[&str],
        #[case] batch_size: usize,
        #[case] submitters: usize,
    ) {
        let config = CliArgs::try_parse_from(args).unwrap().to_run_config();

        assert_eq!(config.batch_size, batch_size);
        assert_eq!(config.submitters, submitters);
        assert_eq!(config.worker_threads, num_cpus::get());
    }

    #[test]
    fn test_run_config_audit_settings() {
        let config = CliArgs::try_parse_from([
            "program",
            "--audit-interval",
            "5",
            "--suspicious-threshold",
            "250.50",
            "--shutdown",
            "drain",
            "-v",
            "a.csv",
            "t.csv",
        ])
        .unwrap()
        .to_run_config();

        assert_eq!(config.audit.interval, Duration::from_secs(5));
        assert_eq!(config.audit.suspicious_threshold, dec!(250.50));
        assert_eq!(config.audit.recent_limit, 5);
        assert_eq!(config.shutdown_mode, ShutdownMode::Drain);
    }

    #[test]
    fn test_default_audit_settings() {
        let config = CliArgs::try_parse_from(["program", "a.csv", "t.csv"])
            .unwrap()
            .to_run_config();

        assert_eq!(config.audit, AuditConfig::default());
    }

    #[rstest]
    #[case::missing_transactions(&["program", "a.csv"])]
    #[case::missing_both(&["program"])]
    #[case::invalid_mode(&["program", "--shutdown", "later", "a.csv", "t.csv"])]
    #[case::zero_interval(&["program", "--audit-interval", "0", "a.csv", "t.csv"])]
    #[case::bad_threshold(&["program", "--suspicious-threshold", "lots", "a.csv", "t.csv"])]
    fn test_parsing_errors(#[case] args: &[&str]) {
        assert!(CliArgs::try_parse_from(args).is_err());
    }
}
