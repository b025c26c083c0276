//! CLI command implementations

use anyhow::Context;
use clap::Subcommand;
use sluice_core::providers::provider_for_mode;
use sluice_core::{MediaIdentifier, RuntimeMode, SluiceConfig, SluiceError, select};
use tracing::{info, warn};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the relay server
    Serve {
        /// Host to bind to (overrides SLUICE_BIND_ADDR)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to (overrides SLUICE_BIND_ADDR)
        #[arg(short, long)]
        port: Option<u16>,
        /// Runtime mode: production or development
        #[arg(long, default_value = "development")]
        mode: RuntimeMode,
        /// Metadata service URL for production mode
        #[arg(long)]
        provider_url: Option<String>,
        /// Relay buffer high-water mark in bytes
        #[arg(long)]
        high_water_mark: Option<usize>,
    },
    /// Resolve an identifier and show which encoding would be relayed
    Probe {
        /// Media identifier
        identifier: String,
        /// Runtime mode: production or development
        #[arg(long, default_value = "development")]
        mode: RuntimeMode,
        /// Metadata service URL for production mode
        #[arg(long)]
        provider_url: Option<String>,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            host,
            port,
            mode,
            provider_url,
            high_water_mark,
        } => {
            if provider_url.is_some() && !mode.requires_provider_url() {
                warn!("--provider-url is ignored in {mode} mode");
            }
            let mut config = load_config(provider_url.as_deref())?;
            if let Some(host) = host {
                let ip = host
                    .parse()
                    .with_context(|| format!("invalid host address: {host}"))?;
                config.server.bind_addr.set_ip(ip);
            }
            if let Some(port) = port {
                config.server.bind_addr.set_port(port);
            }
            if let Some(bytes) = high_water_mark {
                config.relay.high_water_mark = bytes;
            }
            sluice_web::run_server(config, mode)
                .await
                .map_err(|e| anyhow::anyhow!("server failed: {e}"))
        }
        Commands::Probe {
            identifier,
            mode,
            provider_url,
        } => {
            let config = load_config(provider_url.as_deref())?;
            probe(&config, mode, &identifier).await.map_err(|e| {
                anyhow::anyhow!("{} ({e})", e.user_message())
            })
        }
    }
}

fn load_config(provider_url: Option<&str>) -> Result<SluiceConfig, SluiceError> {
    let mut config = SluiceConfig::from_env();
    if let Some(url) = provider_url {
        config.provider.set_base_url(url)?;
    }
    Ok(config)
}

async fn probe(config: &SluiceConfig, mode: RuntimeMode, raw: &str) -> Result<(), SluiceError> {
    let provider = provider_for_mode(mode, config)?;
    let identifier = MediaIdentifier::new(raw).map_err(|_| {
        SluiceError::Provider(sluice_core::ProviderError::NotFound {
            identifier: raw.to_string(),
        })
    })?;

    info!(identifier = %identifier, provider = provider.provider_name(), "Probing");
    let metadata = provider.resolve_metadata(&identifier).await?;

    println!("{} candidate formats for {identifier}:", metadata.candidates.len());
    for candidate in &metadata.candidates {
        println!(
            "  {:>6}  {:<40}  bitrate={:<6}  length={:<10}  audio_only={}",
            candidate.key,
            candidate.mime_type,
            candidate
                .bitrate
                .map_or_else(|| "?".to_string(), |b| b.to_string()),
            candidate
                .content_length
                .map_or_else(|| "?".to_string(), |l| l.to_string()),
            candidate.audio_only
        );
    }

    let selected = select(&metadata.candidates)?.with_length_hint(metadata.total_length_hint);
    println!(
        "Selected {} ({})",
        selected.descriptor().key,
        selected.content_type()
    );
    Ok(())
}
