// CLI module
// Command-line interface, argument parsing and logging setup

mod args;
mod logging;

pub use args::CliArgs;
pub use logging::init_logging;

use clap::Parser;

/// Parse command-line arguments using clap
///
/// If parsing fails (invalid arguments, missing paths, or `--help`), clap
/// prints an error or the help text and exits the process.
pub fn parse_args() -> CliArgs {
    CliArgs::parse()
}
