//! Requests that fail before any audio byte is sent.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use sluice_core::testing::{FakeProvider, ScriptStep};
use sluice_core::{EncodingDescriptor, ProviderError};

use super::{get, json_body, relay_config, router_with, video};

#[tokio::test]
async fn test_unknown_identifier_is_not_found() {
    let provider = Arc::new(FakeProvider::new());

    let response = get(router_with(provider.clone(), relay_config()), "/stream/nope").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Media not found");
    assert_eq!(body["videoId"], "nope");
    assert_eq!(provider.resolve_calls(), 1);
    assert_eq!(provider.open_calls(), 0);
}

#[tokio::test]
async fn test_blank_identifier_is_not_found() {
    let provider = Arc::new(FakeProvider::new());

    let response = get(router_with(provider.clone(), relay_config()), "/stream/%20%20").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(provider.resolve_calls(), 0);
}

#[tokio::test]
async fn test_video_only_media_is_unprocessable() {
    let provider = Arc::new(FakeProvider::new().with_media(
        "silent",
        vec![video("v360", 360), video("v720", 720)],
        vec![ScriptStep::End],
    ));

    let response = get(router_with(provider.clone(), relay_config()), "/stream/silent").await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "No audio-only format available");
    assert!(body["details"].is_string());
    assert_eq!(provider.open_calls(), 0);
}

#[tokio::test]
async fn test_unauthorized_origin_is_upstream_failure() {
    let provider = Arc::new(FakeProvider::new().with_failure(
        "private",
        ProviderError::Unauthorized {
            reason: "sign in required".to_string(),
        },
    ));

    let response = get(router_with(provider, relay_config()), "/stream/private").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Failed to stream audio");
    assert!(body["details"].as_str().unwrap().contains("sign in required"));
}

#[tokio::test]
async fn test_open_failure_is_upstream_failure() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_media(
                "gone",
                vec![EncodingDescriptor::audio("a", "audio/mp4", 128)],
                vec![ScriptStep::End],
            )
            .with_open_failure(ProviderError::NotFound {
                identifier: "a".to_string(),
            }),
    );

    let response = get(router_with(provider, relay_config()), "/stream/gone").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_metadata_timeout_is_upstream_failure() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_media(
                "slow",
                vec![EncodingDescriptor::audio("a", "audio/mp4", 128)],
                vec![ScriptStep::End],
            )
            .with_metadata_delay(Duration::from_secs(5)),
    );

    let response = get(router_with(provider.clone(), relay_config()), "/stream/slow").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(provider.open_calls(), 0);
}

#[tokio::test]
async fn test_open_timeout_is_upstream_failure() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_media(
                "stuck",
                vec![EncodingDescriptor::audio("a", "audio/mp4", 128)],
                vec![ScriptStep::End],
            )
            .with_open_delay(Duration::from_secs(5)),
    );

    let response = get(router_with(provider, relay_config()), "/stream/stuck").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Failed to stream audio");
}
