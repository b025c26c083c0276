//! Simulated provider for offline development.
//!
//! Serves synthetic audio resources from an in-memory catalog. Payloads are
//! derived from a seeded ChaCha stream so the same identifier always yields
//! the same bytes.

use std::collections::HashMap;

use bytes::Bytes;
use futures::StreamExt;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::config::SimulationConfig;
use crate::media::{EncodingDescriptor, MediaIdentifier, MediaMetadata};
use crate::provider::{ProviderError, PushSource, SourceProvider};
use crate::relay::TaskSource;

/// One simulated catalog entry.
#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    pub candidates: Vec<EncodingDescriptor>,
    /// Fail mid-stream after this many bytes.
    pub fail_after: Option<usize>,
}

/// In-memory provider producing deterministic synthetic payloads.
pub struct SimulatedProvider {
    config: SimulationConfig,
    catalog: HashMap<String, SimulatedMedia>,
}

fn fnv1a(data: &str) -> u64 {
    data.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

fn descriptor(
    key: &str,
    mime_type: &str,
    bitrate: u32,
    audio_only: bool,
    length: usize,
) -> EncodingDescriptor {
    EncodingDescriptor {
        key: key.to_string(),
        mime_type: mime_type.to_string(),
        bitrate: Some(bitrate),
        content_length: Some(length as u64),
        audio_only,
        locator: None,
    }
}

impl SimulatedProvider {
    /// Creates a provider with an empty catalog.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            catalog: HashMap::new(),
        }
    }

    /// Creates a provider preloaded with demo entries:
    ///
    /// - `demo-music`: video plus two audio-only encodings
    /// - `demo-talk`: a single audio-only encoding
    /// - `demo-video-only`: no audio-only encoding
    /// - `demo-broken`: fails halfway through the stream
    pub fn with_demo_catalog(config: SimulationConfig) -> Self {
        let size = config.resource_size;
        let standard = vec![
            descriptor("18", "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"", 720, false, size * 4),
            descriptor("140", "audio/mp4; codecs=\"mp4a.40.2\"", 128, true, size),
            descriptor("251", "audio/webm; codecs=\"opus\"", 160, true, size),
        ];

        Self::new(config)
            .with_media(
                "demo-music",
                SimulatedMedia {
                    candidates: standard.clone(),
                    fail_after: None,
                },
            )
            .with_media(
                "demo-talk",
                SimulatedMedia {
                    candidates: vec![descriptor("140", "audio/mp4", 96, true, size)],
                    fail_after: None,
                },
            )
            .with_media(
                "demo-video-only",
                SimulatedMedia {
                    candidates: vec![descriptor("18", "video/mp4", 720, false, size * 4)],
                    fail_after: None,
                },
            )
            .with_media(
                "demo-broken",
                SimulatedMedia {
                    candidates: standard,
                    fail_after: Some(size / 2),
                },
            )
    }

    /// Adds a catalog entry. Locators are filled in to route `open_stream`.
    pub fn with_media(mut self, identifier: &str, mut media: SimulatedMedia) -> Self {
        for candidate in &mut media.candidates {
            candidate.locator = Some(format!("{identifier}/{}", candidate.key));
        }
        self.catalog.insert(identifier.to_string(), media);
        self
    }

    /// Bytes the provider will emit for an encoding of an entry.
    pub fn payload(&self, identifier: &str, key: &str, length: usize) -> Vec<u8> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed ^ fnv1a(&format!("{identifier}/{key}")));
        let mut data = vec![0u8; length];
        rng.fill_bytes(&mut data);
        data
    }
}

#[async_trait::async_trait]
impl SourceProvider for SimulatedProvider {
    async fn resolve_metadata(
        &self,
        identifier: &MediaIdentifier,
    ) -> Result<MediaMetadata, ProviderError> {
        let media = self
            .catalog
            .get(identifier.as_str())
            .ok_or_else(|| ProviderError::NotFound {
                identifier: identifier.to_string(),
            })?;

        Ok(MediaMetadata {
            candidates: media.candidates.clone(),
            total_length_hint: None,
        })
    }

    async fn open_stream(
        &self,
        encoding: &EncodingDescriptor,
    ) -> Result<Box<dyn PushSource>, ProviderError> {
        let locator = encoding
            .locator
            .as_deref()
            .ok_or_else(|| ProviderError::MalformedResponse {
                reason: format!("encoding {} has no locator", encoding.key),
            })?;
        let (identifier, key) = locator.rsplit_once('/').ok_or_else(|| ProviderError::Other {
            reason: format!("unroutable locator {locator}"),
        })?;
        let media = self.catalog.get(identifier).ok_or_else(|| ProviderError::Other {
            reason: format!("locator {locator} points outside the catalog"),
        })?;

        let length = encoding.content_length.unwrap_or(self.config.resource_size as u64) as usize;
        let payload = Bytes::from(self.payload(identifier, key, length));
        let chunk_size = self.config.chunk_size.max(1);
        let delay = self.config.chunk_delay;
        let fail_after = media.fail_after;

        debug!(locator, length, chunk_size, "Opening simulated stream");

        let stream = futures::stream::unfold(0usize, move |offset| {
            let payload = payload.clone();
            async move {
                if offset >= payload.len() {
                    return None;
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if fail_after.is_some_and(|limit| offset >= limit) {
                    return Some((Err("simulated origin reset".to_string()), payload.len()));
                }
                let end = (offset + chunk_size).min(payload.len());
                Some((Ok(payload.slice(offset..end)), end))
            }
        })
        .boxed();

        Ok(Box::new(TaskSource::new("simulated", stream)))
    }

    fn provider_name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{RelayError, RelayEvent, StreamAdapter};
    use crate::selector::select;

    fn provider() -> SimulatedProvider {
        SimulatedProvider::with_demo_catalog(SimulationConfig::deterministic_testing())
    }

    #[tokio::test]
    async fn test_unknown_identifier_not_found() {
        let id = MediaIdentifier::new("nope").unwrap();
        assert!(matches!(
            provider().resolve_metadata(&id).await,
            Err(ProviderError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_demo_music_relays_full_payload() {
        let provider = provider();
        let id = MediaIdentifier::new("demo-music").unwrap();
        let metadata = provider.resolve_metadata(&id).await.unwrap();
        let selected = select(&metadata.candidates).unwrap();
        assert_eq!(selected.descriptor().key, "251");
        assert_eq!(selected.content_type(), "audio/webm");

        let session = StreamAdapter::new(4096).open(&selected, &provider).await.unwrap();
        let mut received = Vec::new();
        while let RelayEvent::Chunk(chunk) = session.next().await.unwrap() {
            received.extend_from_slice(&chunk);
        }

        let expected = provider.payload("demo-music", "251", 16 * 1024);
        assert_eq!(received, expected);
        assert_eq!(session.progress().percent, Some(100.0));
    }

    #[tokio::test]
    async fn test_payload_is_deterministic() {
        let a = provider().payload("demo-talk", "140", 64);
        let b = provider().payload("demo-talk", "140", 64);
        let other = provider().payload("demo-talk", "141", 64);
        assert_eq!(a, b);
        assert_ne!(a, other);
    }

    #[tokio::test]
    async fn test_demo_broken_fails_midway() {
        let provider = provider();
        let id = MediaIdentifier::new("demo-broken").unwrap();
        let metadata = provider.resolve_metadata(&id).await.unwrap();
        let selected = select(&metadata.candidates).unwrap();
        let session = StreamAdapter::new(64 * 1024).open(&selected, &provider).await.unwrap();

        let mut delivered = 0;
        let outcome = loop {
            match session.next().await {
                Ok(RelayEvent::Chunk(chunk)) => delivered += chunk.len(),
                other => break other,
            }
        };
        assert!(matches!(outcome, Err(RelayError::Source { .. })));
        assert!(delivered <= 8 * 1024);
    }

    #[tokio::test]
    async fn test_video_only_has_no_audio() {
        let id = MediaIdentifier::new("demo-video-only").unwrap();
        let metadata = provider().resolve_metadata(&id).await.unwrap();
        assert!(select(&metadata.candidates).is_err());
    }
}
