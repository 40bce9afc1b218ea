use log::LevelFilter;
use simple_logger::SimpleLogger;

/// Install the global logger on stderr
///
/// WARN by default, INFO with `--verbose`. `RUST_LOG` overrides both.
pub fn init_logging(verbose: bool) -> Result<(), String> {
    let level = if verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    SimpleLogger::new()
        .with_level(level)
        .env()
        .init()
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}
