//! # tomatempo
//!
//! Resolves the application settings, starts the logging pipeline and reports
//! the effective configuration.
//!
//! ```text
//! tomatempo [--logging-config [<path>]]
//! ```
//!
//! `--logging-config` without a path reads `config/logging.toml`. Without the
//! flag the default wiring is used (stdout, stderr and a
//! JSON-lines file in the platform log directory). Any failure while loading
//! settings or configuring logging is fatal.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tomatempo::constants::LOGGING_CONFIG_FILE;
use tomatempo::logging::{self, log, LoggingConfig, LoggingError};
use tomatempo::settings::SettingsCache;

/// Command-line interface
#[derive(Debug, Parser)]
#[command(author, version, about = "Pomodoro timer: resolves settings and starts structured logging")]
struct Cli {
    /// Load logging from a TOML document instead of the default wiring
    #[arg(
        long,
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = LOGGING_CONFIG_FILE,
        help = "Logging document to load (defaults to config/logging.toml when no path is given)"
    )]
    logging_config: Option<PathBuf>,
}

fn main() -> ExitCode {
    // Exits with usage on bad arguments or after --help/--version
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Logging may not exist yet, so report directly
            eprintln!("tomatempo: {err}");
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), LoggingError> {
    let cache = SettingsCache::new();
    let settings = cache.get()?;

    let guard = match cli.logging_config {
        Some(path) => logging::init(&LoggingConfig::from_file(&path, &settings)?)?,
        None => logging::setup_logging(&settings)?,
    };

    let summary = settings.summary();
    log::info!(
        app_name = %summary.app_name,
        environment = %summary.environment,
        log_level = %summary.log_level,
        debug = summary.debug,
        log_file = %guard.log_file().display(),
        "settings loaded"
    );
    log::debug!(database_url = %settings.database_url, "database configured");
    if settings.is_prod() {
        log::warn!("running with production settings");
    }

    guard.shutdown();
    Ok(())
}
