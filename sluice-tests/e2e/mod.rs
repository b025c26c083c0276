//! End-to-end tests for Sluice
//!
//! These tests drive the full router: identifier validation, metadata
//! resolution, format selection, relay and error mapping, with a scripted
//! provider standing in for the origin.

mod failures;
mod streaming;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use sluice_core::config::RelayConfig;
use sluice_core::testing::FakeProvider;
use sluice_core::{EncodingDescriptor, RuntimeMode, SluiceConfig, SourceProvider};
use sluice_web::{AppState, build_router};
use tower::ServiceExt;

/// Relay settings with short timeouts so timeout tests stay fast.
pub fn relay_config() -> RelayConfig {
    RelayConfig {
        metadata_timeout: Duration::from_millis(200),
        open_timeout: Duration::from_millis(200),
        ..SluiceConfig::for_testing().relay
    }
}

pub fn router_with(provider: Arc<FakeProvider>, relay: RelayConfig) -> Router {
    let provider: Arc<dyn SourceProvider> = provider;
    build_router(AppState::new(provider, relay, RuntimeMode::Development))
}

pub async fn get(app: Router, path: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(path)
        .body(Body::empty())
        .expect("valid request");
    app.oneshot(request).await.expect("router is infallible")
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("complete body");
    serde_json::from_slice(&bytes).expect("JSON body")
}

pub fn video(key: &str, bitrate: u32) -> EncodingDescriptor {
    EncodingDescriptor {
        audio_only: false,
        ..EncodingDescriptor::audio(key, "video/mp4", bitrate)
    }
}
