//! HTTP server wiring for Sluice.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use sluice_core::config::RelayConfig;
use sluice_core::providers::provider_for_mode;
use sluice_core::{RuntimeMode, SluiceConfig, SourceProvider, StreamAdapter};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::handlers::{health, stream_audio};

/// Shared per-server state, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn SourceProvider>,
    pub adapter: StreamAdapter,
    pub relay: RelayConfig,
    pub mode: RuntimeMode,
}

impl AppState {
    pub fn new(provider: Arc<dyn SourceProvider>, relay: RelayConfig, mode: RuntimeMode) -> Self {
        Self {
            provider,
            adapter: StreamAdapter::new(relay.high_water_mark),
            relay,
            mode,
        }
    }
}

/// Builds the router with all routes and layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/stream/{identifier}", get(stream_audio))
        .route("/health", get(health))
        // The player page is served from another origin.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs the server until Ctrl-C.
///
/// # Errors
///
/// - `ConfigError` - Invalid configuration or missing provider URL
/// - `std::io::Error` - The listener could not be bound
pub async fn run_server(
    config: SluiceConfig,
    mode: RuntimeMode,
) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;
    let provider = provider_for_mode(mode, &config)?;
    let state = AppState::new(provider, config.relay.clone(), mode);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.bind_addr).await?;
    info!(
        "Sluice audio relay running on http://{} ({mode} mode)",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
