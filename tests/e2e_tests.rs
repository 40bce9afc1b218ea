//! End-to-end integration tests
//!
//! These tests validate the complete pipeline using predefined CSV fixtures.
//! Each test:
//! 1. Loads accounts.csv and transactions.csv from a fixture directory
//! 2. Runs every transaction through the engine
//! 3. Generates the output CSV
//! 4. Compares actual output with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Happy path scenarios
//! - Minimum balance and overdraft floors
//! - Transfers, including rejected and boundary transfers
//! - Unknown and inactive accounts
//! - Malformed rows in both input files
//! - Decimal precision of the output
//!
//! Each fixture is run with both shutdown modes; since the pipeline waits for
//! every callback before stopping, the output must not depend on the mode.

#[cfg(test)]
mod tests {
    use bankbridge_core::core::ShutdownMode;
    use bankbridge_core::pipeline::{run, RunConfig};
    use rstest::rstest;
    use std::fs;
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;

    /// Run a fixture and compare the output with expected.csv
    ///
    /// # Arguments
    ///
    /// * `fixture_name` - Name of the fixture directory (e.g., "happy_path")
    /// * `shutdown_mode` - Shutdown mode for the engine
    /// * `batch_size` - Transactions per batch
    ///
    /// # Panics
    ///
    /// Panics if a fixture file cannot be read or the output does not match.
    fn run_test_fixture(fixture_name: &str, shutdown_mode: ShutdownMode, batch_size: usize) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let accounts_path = format!("{}/accounts.csv", fixture_dir);
        let transactions_path = format!("{}/transactions.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        for path in [&accounts_path, &transactions_path, &expected_path] {
            assert!(Path::new(path).exists(), "Fixture file not found: {}", path);
        }

        let config = RunConfig {
            shutdown_mode,
            ..RunConfig::new(batch_size, 1)
        };
        let mut temp_output = NamedTempFile::new().expect("Failed to create temp file");

        run(
            Path::new(&accounts_path),
            Path::new(&transactions_path),
            &config,
            &mut temp_output,
        )
        .unwrap_or_else(|e| panic!("Failed to process transactions: {}", e));
        temp_output.flush().expect("Failed to flush temp file");

        let actual_output = fs::read_to_string(temp_output.path())
            .unwrap_or_else(|e| panic!("Failed to read temp output file: {}", e));
        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (shutdown: {:?}, batch size: {})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, shutdown_mode, batch_size, actual_output, expected_output
        );
    }

    #[rstest]
    #[case("happy_path")]
    #[case("balance_floors")]
    #[case("transfers")]
    #[case("unknown_and_inactive")]
    #[case("malformed_data")]
    #[case("precision")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values(ShutdownMode::Abandon, ShutdownMode::Drain)] shutdown_mode: ShutdownMode,
        #[values(1, 1000)] batch_size: usize,
    ) {
        run_test_fixture(fixture, shutdown_mode, batch_size);
    }

    #[test]
    fn test_summary_counts_for_transfers_fixture() {
        let mut output = Vec::new();

        let summary = run(
            Path::new("tests/fixtures/transfers/accounts.csv"),
            Path::new("tests/fixtures/transfers/transactions.csv"),
            &RunConfig::default(),
            &mut output,
        )
        .unwrap();

        // The self-transfer row never reaches the engine
        assert_eq!(summary.skipped_rows, 1);
        assert_eq!(summary.submitted, 6);
        assert_eq!(summary.succeeded, 3);
        assert_eq!(summary.failed, 3);
        let audit = summary.final_audit.expect("final audit");
        assert_eq!(audit.total_transactions, 3);
        assert!(!audit.suspicious_activity());
    }
}
