//! Successful relays through `GET /stream/{identifier}`.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{StatusCode, header};
use bytes::Bytes;
use futures::StreamExt;
use sluice_core::testing::{FakeProvider, ScriptStep};
use sluice_core::{EncodingDescriptor, MediaMetadata};

use super::{get, relay_config, router_with, video};

fn chunk(data: &'static [u8]) -> ScriptStep {
    ScriptStep::Chunk(Bytes::from_static(data))
}

#[tokio::test]
async fn test_relays_highest_bitrate_audio() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_media(
                "abc123",
                vec![
                    video("v720", 720),
                    EncodingDescriptor::audio("a128", "audio/mp4; codecs=\"mp4a.40.2\"", 128),
                    EncodingDescriptor::audio("a256", "audio/webm; codecs=\"opus\"", 256),
                ],
                vec![chunk(b"wrong format"), ScriptStep::End],
            )
            .with_script(
                "a256",
                vec![chunk(b"one "), chunk(b"two "), chunk(b"three"), ScriptStep::End],
            ),
    );

    let response = get(router_with(provider.clone(), relay_config()), "/stream/abc123").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/webm");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert!(response.headers().get(header::CONTENT_LENGTH).is_none());

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"one two three");

    let opened = provider.opened_sources();
    assert_eq!(opened.len(), 1);
    assert_eq!(opened[0].0, "a256");
}

#[tokio::test]
async fn test_content_length_from_descriptor() {
    let mut audio = EncodingDescriptor::audio("a", "audio/mp4", 128);
    audio.content_length = Some(5);
    let provider = Arc::new(
        FakeProvider::new().with_media("sized", vec![audio], vec![chunk(b"hello"), ScriptStep::End]),
    );

    let response = get(router_with(provider, relay_config()), "/stream/sized").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
}

#[tokio::test]
async fn test_content_length_from_metadata_hint() {
    let provider = Arc::new(
        FakeProvider::new()
            .with_metadata(
                "hinted",
                MediaMetadata {
                    candidates: vec![EncodingDescriptor::audio("a", "audio/mp4", 128)],
                    total_length_hint: Some(3),
                },
            )
            .with_script("a", vec![chunk(b"abc"), ScriptStep::End]),
    );

    let response = get(router_with(provider, relay_config()), "/stream/hinted").await;

    assert_eq!(response.headers()[header::CONTENT_LENGTH], "3");
}

#[tokio::test]
async fn test_relays_more_than_high_water_mark() {
    let steps: Vec<ScriptStep> = (0..64)
        .map(|i| ScriptStep::Chunk(Bytes::from(vec![i as u8; 1024])))
        .chain(std::iter::once(ScriptStep::End))
        .collect();
    let provider = Arc::new(FakeProvider::new().with_media(
        "long",
        vec![EncodingDescriptor::audio("a", "audio/mp4", 128)],
        steps,
    ));
    let mut relay = relay_config();
    relay.high_water_mark = 4 * 1024;

    let response = get(router_with(provider.clone(), relay), "/stream/long").await;
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    assert_eq!(body.len(), 64 * 1024);
    assert!(body.chunks(1024).enumerate().all(|(i, c)| c.iter().all(|&b| b == i as u8)));
    assert!(provider.opened_sources()[0].1.pause_calls() > 0);
}

#[tokio::test]
async fn test_mid_stream_error_truncates_body() {
    let provider = Arc::new(FakeProvider::new().with_media(
        "broken",
        vec![EncodingDescriptor::audio("a", "audio/mp4", 128)],
        vec![chunk(b"partial"), ScriptStep::Error("origin reset".to_string())],
    ));

    let response = get(router_with(provider, relay_config()), "/stream/broken").await;

    // Headers are already committed, so the failure shows up in the body only.
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_client_disconnect_closes_source_once() {
    let provider = Arc::new(FakeProvider::new().with_media(
        "endless",
        vec![EncodingDescriptor::audio("a", "audio/mp4", 128)],
        vec![
            chunk(b"first"),
            ScriptStep::Delay(Duration::from_secs(30)),
            chunk(b"never"),
            ScriptStep::End,
        ],
    ));

    let response = get(router_with(provider.clone(), relay_config()), "/stream/endless").await;
    let mut body = response.into_body().into_data_stream();
    assert_eq!(body.next().await.unwrap().unwrap(), Bytes::from_static(b"first"));
    drop(body);

    let stats = provider.opened_sources()[0].1.clone();
    assert_eq!(stats.close_calls(), 1);
}

#[tokio::test]
async fn test_health_reports_provider() {
    let provider = Arc::new(FakeProvider::new());

    let response = get(router_with(provider, relay_config()), "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = super::json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["provider"], "fake");
}
