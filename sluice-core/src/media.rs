//! Media data model shared by providers, the selector and the relay.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque name of a requested media resource.
///
/// Only the shape is checked here: the identifier must contain at least one
/// non-whitespace character. Whether it names anything is up to the
/// [`SourceProvider`](crate::provider::SourceProvider).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MediaIdentifier(String);

/// Rejected identifier shape.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("media identifier must not be empty")]
pub struct InvalidIdentifier;

impl MediaIdentifier {
    /// Validates and wraps an identifier.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` - The identifier is empty or whitespace only
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidIdentifier> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidIdentifier);
        }
        if trimmed.len() == raw.len() {
            Ok(Self(raw))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for MediaIdentifier {
    type Err = InvalidIdentifier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// One candidate delivery format for a resource, as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingDescriptor {
    /// Provider-specific format key.
    pub key: String,
    /// Full MIME type, possibly with codec parameters.
    pub mime_type: String,
    /// Approximate bitrate in kbit/s.
    #[serde(default)]
    pub bitrate: Option<u32>,
    /// Declared total byte length.
    #[serde(default)]
    pub content_length: Option<u64>,
    pub audio_only: bool,
    /// Provider-specific locator used when opening the stream.
    #[serde(default)]
    pub locator: Option<String>,
}

impl EncodingDescriptor {
    /// Builds an audio-only descriptor with no locator, mostly for tests and simulation.
    pub fn audio(key: impl Into<String>, mime_type: impl Into<String>, bitrate: u32) -> Self {
        Self {
            key: key.into(),
            mime_type: mime_type.into(),
            bitrate: Some(bitrate),
            content_length: None,
            audio_only: true,
            locator: None,
        }
    }

    /// MIME type without parameters, e.g. `audio/webm` for `audio/webm; codecs="opus"`.
    pub fn mime_essence(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .map(str::trim)
            .unwrap_or_default()
    }
}

/// Resolved metadata for one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaMetadata {
    pub candidates: Vec<EncodingDescriptor>,
    #[serde(default)]
    pub total_length_hint: Option<u64>,
}

/// The single encoding chosen for a request.
///
/// Only [`select`](crate::selector::select) constructs this, so holding one
/// proves the descriptor is audio-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedEncoding {
    descriptor: EncodingDescriptor,
    length_hint: Option<u64>,
}

impl SelectedEncoding {
    pub(crate) fn new(descriptor: EncodingDescriptor) -> Self {
        Self {
            descriptor,
            length_hint: None,
        }
    }

    /// Attaches the metadata-level length hint, used when the descriptor has no length.
    pub fn with_length_hint(mut self, hint: Option<u64>) -> Self {
        self.length_hint = hint;
        self
    }

    pub fn descriptor(&self) -> &EncodingDescriptor {
        &self.descriptor
    }

    /// Value for the `Content-Type` response header.
    pub fn content_type(&self) -> &str {
        match self.descriptor.mime_essence() {
            "" => "application/octet-stream",
            essence => essence,
        }
    }

    /// Declared total length, preferring the descriptor over the metadata hint.
    ///
    /// A zero length is treated as unknown.
    pub fn content_length(&self) -> Option<u64> {
        self.descriptor
            .content_length
            .or(self.length_hint)
            .filter(|length| *length > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rejects_blank() {
        assert_eq!(MediaIdentifier::new(""), Err(InvalidIdentifier));
        assert_eq!(MediaIdentifier::new("   "), Err(InvalidIdentifier));
        assert_eq!(MediaIdentifier::new(" abc123 ").unwrap().as_str(), "abc123");
        assert_eq!("dQw4w9WgXcQ".parse::<MediaIdentifier>().unwrap().to_string(), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_mime_essence_strips_parameters() {
        let descriptor = EncodingDescriptor::audio("251", "audio/webm; codecs=\"opus\"", 160);
        assert_eq!(descriptor.mime_essence(), "audio/webm");

        let selected = SelectedEncoding::new(descriptor);
        assert_eq!(selected.content_type(), "audio/webm");
    }

    #[test]
    fn test_content_length_prefers_descriptor() {
        let mut descriptor = EncodingDescriptor::audio("140", "audio/mp4", 128);
        let selected = SelectedEncoding::new(descriptor.clone()).with_length_hint(Some(500));
        assert_eq!(selected.content_length(), Some(500));

        descriptor.content_length = Some(1200);
        let selected = SelectedEncoding::new(descriptor.clone()).with_length_hint(Some(500));
        assert_eq!(selected.content_length(), Some(1200));

        descriptor.content_length = Some(0);
        let selected = SelectedEncoding::new(descriptor);
        assert_eq!(selected.content_length(), None);
    }

    #[test]
    fn test_descriptor_deserializes_camel_case() {
        let json = r#"{"key":"140","mimeType":"audio/mp4","bitrate":128,"contentLength":42,"audioOnly":true}"#;
        let descriptor: EncodingDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.bitrate, Some(128));
        assert_eq!(descriptor.content_length, Some(42));
        assert!(descriptor.audio_only);
        assert_eq!(descriptor.locator, None);
    }
}
