//! Sluice CLI - Command-line interface
//!
//! Runs the audio relay server and offers diagnostics against the configured provider.

mod commands;

use clap::Parser;
use sluice_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "An audio relay server")]
struct Cli {
    /// Console log level
    #[arg(long, value_enum, default_value_t = CliLogLevel::Info, global = true)]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), None)
        .map_err(|e| anyhow::anyhow!("cannot initialize tracing: {e}"))?;

    commands::handle_command(cli.command).await
}
