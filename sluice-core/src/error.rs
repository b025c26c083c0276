//! Failure classification.
//!
//! Every failure a request can run into, from identifier validation through
//! the mid-stream relay, is funnelled through [`classify`] into one of four
//! stable kinds. The transport layer only ever sees [`ClassifiedError`].

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::media::InvalidIdentifier;
use crate::provider::ProviderError;
use crate::relay::RelayError;
use crate::selector::SelectionError;

/// External failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The identifier does not resolve to any resource.
    NotFound,
    /// The resource exists but has no audio-only encoding.
    NoAudioFormat,
    /// Network, authorization, timeout or unexpected-shape failure upstream.
    UpstreamFailure,
    /// The relay broke after streaming had begun.
    RelayInterrupted,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::NoAudioFormat => write!(f, "no_audio_format"),
            ErrorKind::UpstreamFailure => write!(f, "upstream_failure"),
            ErrorKind::RelayInterrupted => write!(f, "relay_interrupted"),
        }
    }
}

/// Request stage a provider call or timeout belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Metadata,
    OpenStream,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Metadata => write!(f, "metadata resolution"),
            Stage::OpenStream => write!(f, "stream opening"),
        }
    }
}

/// Raw failure shapes fed to [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFailure {
    InvalidIdentifier(InvalidIdentifier),
    Provider { stage: Stage, error: ProviderError },
    Selection(SelectionError),
    Timeout { stage: Stage, after: Duration },
    Relay(RelayError),
    Other(String),
}

impl From<SelectionError> for RelayFailure {
    fn from(error: SelectionError) -> Self {
        RelayFailure::Selection(error)
    }
}

impl From<RelayError> for RelayFailure {
    fn from(error: RelayError) -> Self {
        RelayFailure::Relay(error)
    }
}

impl From<InvalidIdentifier> for RelayFailure {
    fn from(error: InvalidIdentifier) -> Self {
        RelayFailure::InvalidIdentifier(error)
    }
}

/// Classified, user-facing failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub detail: Option<String>,
}

impl ClassifiedError {
    fn new(kind: ErrorKind, message: &str, detail: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.to_string(),
            detail: Some(detail.into()),
        }
    }

    /// Detail if present, message otherwise.
    pub fn details(&self) -> &str {
        self.detail.as_deref().unwrap_or(&self.message)
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

const NOT_FOUND: &str = "Media not found";
const NO_AUDIO_FORMAT: &str = "No audio-only format available";
const UPSTREAM_FAILURE: &str = "Failed to stream audio";
const RELAY_INTERRUPTED: &str = "Audio relay interrupted";

/// Maps a raw failure into the external taxonomy.
///
/// Total and deterministic. A not-found report is only trusted while
/// resolving metadata; anything ambiguous becomes `UpstreamFailure`.
pub fn classify(failure: &RelayFailure) -> ClassifiedError {
    match failure {
        RelayFailure::InvalidIdentifier(e) => {
            ClassifiedError::new(ErrorKind::NotFound, NOT_FOUND, e.to_string())
        }
        RelayFailure::Provider {
            stage: Stage::Metadata,
            error: error @ ProviderError::NotFound { .. },
        } => ClassifiedError::new(ErrorKind::NotFound, NOT_FOUND, error.to_string()),
        RelayFailure::Provider { stage, error } => ClassifiedError::new(
            ErrorKind::UpstreamFailure,
            UPSTREAM_FAILURE,
            format!("{stage} failed: {error}"),
        ),
        RelayFailure::Selection(e) => {
            ClassifiedError::new(ErrorKind::NoAudioFormat, NO_AUDIO_FORMAT, e.to_string())
        }
        RelayFailure::Timeout { stage, after } => ClassifiedError::new(
            ErrorKind::UpstreamFailure,
            UPSTREAM_FAILURE,
            format!("{stage} timed out after {}ms", after.as_millis()),
        ),
        RelayFailure::Relay(e) => {
            ClassifiedError::new(ErrorKind::RelayInterrupted, RELAY_INTERRUPTED, e.to_string())
        }
        RelayFailure::Other(message) => {
            ClassifiedError::new(ErrorKind::UpstreamFailure, UPSTREAM_FAILURE, message.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(stage: Stage, error: ProviderError) -> RelayFailure {
        RelayFailure::Provider { stage, error }
    }

    #[test]
    fn test_not_found_only_during_metadata() {
        let not_found = ProviderError::NotFound {
            identifier: "abc123".to_string(),
        };

        let classified = classify(&provider(Stage::Metadata, not_found.clone()));
        assert_eq!(classified.kind, ErrorKind::NotFound);
        assert_eq!(classified.details(), "media not found: abc123");

        let classified = classify(&provider(Stage::OpenStream, not_found));
        assert_eq!(classified.kind, ErrorKind::UpstreamFailure);
    }

    #[test]
    fn test_upstream_kinds() {
        let cases = [
            ProviderError::Unauthorized {
                reason: "cookie expired".to_string(),
            },
            ProviderError::Network {
                reason: "reset".to_string(),
            },
            ProviderError::MalformedResponse {
                reason: "missing formats".to_string(),
            },
            ProviderError::Other {
                reason: "?".to_string(),
            },
        ];
        for error in cases {
            let classified = classify(&provider(Stage::Metadata, error.clone()));
            assert_eq!(classified.kind, ErrorKind::UpstreamFailure);
            assert!(classified.details().contains(&error.to_string()));
        }
    }

    #[test]
    fn test_selection_and_relay_kinds() {
        let classified = classify(&SelectionError::NoAudioFormat { candidates: 3 }.into());
        assert_eq!(classified.kind, ErrorKind::NoAudioFormat);
        assert_eq!(classified.message, "No audio-only format available");

        let classified = classify(&RelayError::Cancelled.into());
        assert_eq!(classified.kind, ErrorKind::RelayInterrupted);

        let classified = classify(&InvalidIdentifier.into());
        assert_eq!(classified.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_timeout_and_unknown_are_upstream() {
        let classified = classify(&RelayFailure::Timeout {
            stage: Stage::OpenStream,
            after: Duration::from_secs(15),
        });
        assert_eq!(classified.kind, ErrorKind::UpstreamFailure);
        assert_eq!(classified.details(), "stream opening timed out after 15000ms");

        let classified = classify(&RelayFailure::Other("weird".to_string()));
        assert_eq!(classified.kind, ErrorKind::UpstreamFailure);
        assert_eq!(classified.detail.as_deref(), Some("weird"));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let failure = provider(
            Stage::Metadata,
            ProviderError::Network {
                reason: "dns".to_string(),
            },
        );
        assert_eq!(classify(&failure), classify(&failure));
    }
}
