//! Tracing setup for Sluice
//!
//! The console shows relay events at the level picked on the command line,
//! with HTTP plumbing crates held at `warn`. A log file receives everything
//! the relay crates emit at trace level, which is where per-chunk and
//! backpressure events end up.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Name of the per-run log file, overwritten on every start.
pub const LOG_FILE_NAME: &str = "sluice-last-run.log";

/// Overrides the console filter entirely when set, e.g. `SLUICE_LOG=sluice_core=trace`.
pub const LOG_ENV_VAR: &str = "SLUICE_LOG";

const RELAY_CRATES: [&str; 3] = ["sluice_core", "sluice_web", "sluice"];
const NOISY_CRATES: [&str; 4] = ["hyper", "hyper_util", "reqwest", "tower_http"];

/// Filter directives for console output at `level`.
pub fn console_directives(level: Level) -> String {
    let mut directives = vec![level.to_string().to_lowercase()];
    // Dependencies never get louder than warn on the console.
    let quiet = if level < Level::WARN { level } else { Level::WARN };
    directives.extend(
        NOISY_CRATES
            .iter()
            .map(|krate| format!("{krate}={}", quiet.to_string().to_lowercase())),
    );
    directives.join(",")
}

/// Filter directives for the log file: relay crates at trace, the rest at debug.
pub fn file_directives() -> String {
    let mut directives = vec!["debug".to_string()];
    directives.extend(RELAY_CRATES.iter().map(|krate| format!("{krate}=trace")));
    directives.join(",")
}

/// Installs the global subscriber and returns the path of the log file.
///
/// `logs_dir` defaults to `./logs`.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - If the log file cannot be created, a
///   filter directive is invalid, or a global subscriber is already installed
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let logs_dir = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_dir)?;
    let log_file_path = logs_dir.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;

    let console_filter = match std::env::var(LOG_ENV_VAR) {
        Ok(directives) => EnvFilter::try_new(directives)?,
        Err(_) => EnvFilter::try_new(console_directives(console_level))?,
    };

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(console_filter);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::try_new(file_directives())?);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        console = %console_level,
        log_file = %log_file_path.display(),
        "Tracing initialized"
    );
    Ok(log_file_path)
}

/// Console verbosity chosen on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliLogLevel {
    /// Failed requests and startup errors only
    Error,
    /// Also cancellations and ignored configuration
    Warn,
    /// Also request lifecycle and selected formats
    Info,
    /// Also backpressure and progress milestones
    Debug,
    /// Every chunk
    Trace,
}

impl CliLogLevel {
    /// Converts CLI log level to tracing Level enum.
    ///
    /// # Examples
    /// ```
    /// use sluice_core::tracing_setup::CliLogLevel;
    ///
    /// assert_eq!(CliLogLevel::Debug.as_tracing_level(), tracing::Level::DEBUG);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_quiets_http_crates() {
        let directives = console_directives(Level::DEBUG);
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("hyper=warn"));
        assert!(directives.contains("reqwest=warn"));

        // Below warn, dependencies follow the chosen level.
        assert!(console_directives(Level::ERROR).contains("hyper=error"));
    }

    #[test]
    fn test_file_traces_relay_crates() {
        let directives = file_directives();
        assert!(directives.contains("sluice_core=trace"));
        assert!(directives.contains("sluice_web=trace"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_cli_levels_parse_case_insensitive() {
        assert_eq!(
            CliLogLevel::from_str("WARN", true),
            Ok(CliLogLevel::Warn)
        );
        assert!(CliLogLevel::from_str("loud", true).is_err());
    }

    #[test]
    fn test_init_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");

        // Another test may already have installed a subscriber; the file is
        // created before installation either way.
        let _ = init_tracing(Level::WARN, Some(&logs));
        assert!(logs.join(LOG_FILE_NAME).exists());
    }
}
