//! Integration tests for Sluice
//!
//! These run the router on a real TCP listener in front of the simulated
//! provider, so bytes cross an actual HTTP connection.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use sluice_core::providers::SimulatedProvider;
use sluice_core::{RuntimeMode, SluiceConfig};
use sluice_web::{AppState, build_router};
use tokio_test::assert_ok;

async fn spawn_server(config: &SluiceConfig) -> SocketAddr {
    let provider = Arc::new(SimulatedProvider::with_demo_catalog(config.simulation.clone()));
    let app = build_router(AppState::new(
        provider,
        config.relay.clone(),
        RuntimeMode::Development,
    ));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_simulated_stream_over_http() {
    let config = SluiceConfig::for_testing();
    let addr = spawn_server(&config).await;
    let size = config.simulation.resource_size;

    let response = assert_ok!(reqwest::get(format!("http://{addr}/stream/demo-music")).await);
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "audio/webm");
    assert_eq!(response.content_length(), Some(size as u64));

    let body = assert_ok!(response.bytes().await);
    let expected = SimulatedProvider::new(config.simulation.clone()).payload("demo-music", "251", size);
    assert_eq!(body.len(), size);
    assert_eq!(&body[..], &expected[..]);
}

#[tokio::test]
async fn test_simulated_video_only_over_http() {
    let config = SluiceConfig::for_testing();
    let addr = spawn_server(&config).await;

    let response = assert_ok!(reqwest::get(format!("http://{addr}/stream/demo-video-only")).await);
    assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);

    let body: serde_json::Value = assert_ok!(response.json().await);
    assert_eq!(body["videoId"], "demo-video-only");
}

#[tokio::test]
async fn test_simulated_failure_cuts_connection() {
    let config = SluiceConfig::for_testing();
    let addr = spawn_server(&config).await;
    let size = config.simulation.resource_size;

    let response = assert_ok!(reqwest::get(format!("http://{addr}/stream/demo-broken")).await);
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let mut stream = response.bytes_stream();
    let mut received = 0;
    let mut failed = false;
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => received += chunk.len(),
            Err(_) => {
                failed = true;
                break;
            }
        }
    }

    assert!(failed, "truncated body must surface as a transport error");
    assert!(received < size);
}
