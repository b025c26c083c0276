//! Sluice Core - audio relay building blocks
//!
//! This crate provides the pieces needed to relay a remote audio-only media
//! resource to an HTTP client: encoding selection, the push-to-pull stream
//! adapter with bounded buffering, progress instrumentation, the failure
//! taxonomy, and the Source Provider contract together with the bundled
//! providers.

pub mod config;
pub mod error;
pub mod media;
pub mod mode;
pub mod progress;
pub mod provider;
pub mod providers;
pub mod relay;
pub mod selector;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::SluiceConfig;
pub use error::{ClassifiedError, ErrorKind, RelayFailure, classify};
pub use media::{EncodingDescriptor, MediaIdentifier, MediaMetadata, SelectedEncoding};
pub use mode::RuntimeMode;
pub use provider::{ProviderError, PushSource, SourceEvent, SourceProvider};
pub use relay::{RelayError, RelayEvent, RelaySession, StreamAdapter};
pub use selector::{SelectionError, select};

/// Errors that can bubble up from any Sluice subsystem outside a request.
///
/// Request-scoped failures go through [`error::classify`] instead; this type
/// covers startup and tooling paths such as the CLI.
#[derive(Debug, thiserror::Error)]
pub enum SluiceError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),
}

impl SluiceError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            SluiceError::Provider(ProviderError::NotFound { identifier }) => {
                format!("Media {identifier} not found")
            }
            SluiceError::Provider(ProviderError::Unauthorized { .. }) => {
                "Origin rejected the configured credentials".to_string()
            }
            SluiceError::Provider(_) => "Origin request failed".to_string(),
            SluiceError::Selection(_) => "No audio-only format available".to_string(),
            SluiceError::Configuration(e) => format!("Configuration error: {e}"),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            SluiceError::Configuration(_)
                | SluiceError::Provider(ProviderError::NotFound { .. })
                | SluiceError::Selection(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SluiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_by_subsystem() {
        let not_found = SluiceError::from(ProviderError::NotFound {
            identifier: "abc123".to_string(),
        });
        assert_eq!(not_found.user_message(), "Media abc123 not found");
        assert!(not_found.is_user_error());

        let network = SluiceError::from(ProviderError::Network {
            reason: "reset".to_string(),
        });
        assert_eq!(network.user_message(), "Origin request failed");
        assert!(!network.is_user_error());

        let config = SluiceError::from(config::ConfigError::MissingProviderUrl);
        assert!(config.user_message().starts_with("Configuration error"));
        assert!(config.is_user_error());
    }
}
