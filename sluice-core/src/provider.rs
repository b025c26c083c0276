//! Source Provider contract.
//!
//! The provider turns an identifier into metadata and opens raw byte sources
//! for a chosen encoding. Everything origin-specific (credentials, header
//! sets, client spoofing) lives behind this boundary so the relay core can be
//! exercised with a fake provider.

use bytes::Bytes;
use thiserror::Error;

use crate::media::{EncodingDescriptor, MediaIdentifier, MediaMetadata};
use crate::relay::SourceSink;

/// Resolves identifiers and opens byte sources against an origin.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Resolves an identifier into its candidate encodings.
    ///
    /// # Errors
    ///
    /// - `ProviderError::NotFound` - The origin reports no such resource
    /// - `ProviderError::Unauthorized` - The origin rejected the credential set
    /// - `ProviderError::Network` - Transport failure or unexpected status
    /// - `ProviderError::MalformedResponse` - The origin answered with an unexpected shape
    async fn resolve_metadata(
        &self,
        identifier: &MediaIdentifier,
    ) -> Result<MediaMetadata, ProviderError>;

    /// Opens a push source for one encoding. The source must not emit
    /// anything until [`PushSource::start`] is called.
    ///
    /// # Errors
    ///
    /// - `ProviderError::Unauthorized` - The origin rejected the credential set
    /// - `ProviderError::Network` - The connection could not be established
    /// - `ProviderError::Other` - Provider-specific failure
    async fn open_stream(
        &self,
        encoding: &EncodingDescriptor,
    ) -> Result<Box<dyn PushSource>, ProviderError>;

    /// Short provider name for logs.
    fn provider_name(&self) -> &'static str;
}

/// Event-driven byte source.
///
/// After `start`, the source delivers any number of [`SourceEvent::Data`]
/// followed by at most one terminal `End` or `Error`, and nothing afterwards.
/// `pause`, `resume` and `close` may be called from any thread, in any order,
/// any number of times.
pub trait PushSource: Send + Sync {
    /// Begins delivery into `sink`. Called exactly once.
    fn start(&self, sink: SourceSink);

    /// Asks the source to stop delivering data until `resume`.
    ///
    /// Sources without a pause primitive may ignore this; the relay then
    /// bounds buffering on its own.
    fn pause(&self) {}

    /// Lifts a previous `pause`.
    fn resume(&self) {}

    /// Terminates the source and releases its resources.
    fn close(&self);
}

/// One notification from a push source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEvent {
    Data(Bytes),
    End,
    Error(String),
}

/// Errors reported by a [`SourceProvider`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("media not found: {identifier}")]
    NotFound { identifier: String },

    #[error("origin rejected credentials: {reason}")]
    Unauthorized { reason: String },

    #[error("network failure: {reason}")]
    Network { reason: String },

    #[error("malformed origin response: {reason}")]
    MalformedResponse { reason: String },

    #[error("provider failure: {reason}")]
    Other { reason: String },
}
