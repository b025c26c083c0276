//! JSON failure responses for requests that fail before streaming starts.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use sluice_core::{ClassifiedError, ErrorKind, RelayFailure, classify};
use tracing::error;

/// Wire shape of a failure body. `videoId` is kept for existing clients.
#[derive(Debug, Serialize)]
struct FailureBody<'a> {
    error: &'a str,
    details: &'a str,
    #[serde(rename = "videoId")]
    video_id: &'a str,
}

/// A classified failure bound to the identifier that was requested.
#[derive(Debug, Clone)]
pub struct StreamFailure {
    pub classified: ClassifiedError,
    pub identifier: String,
}

impl StreamFailure {
    /// Classifies `failure` for the request naming `identifier`.
    pub fn new(identifier: impl Into<String>, failure: &RelayFailure) -> Self {
        Self {
            classified: classify(failure),
            identifier: identifier.into(),
        }
    }

    /// HTTP status for the failure kind.
    pub fn status(&self) -> StatusCode {
        match self.classified.kind {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::NoAudioFormat => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::UpstreamFailure | ErrorKind::RelayInterrupted => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for StreamFailure {
    fn into_response(self) -> Response {
        let status = self.status();
        error!(
            identifier = %self.identifier,
            kind = %self.classified.kind,
            status = status.as_u16(),
            "Stream request failed: {}",
            self.classified.details()
        );

        let body = FailureBody {
            error: &self.classified.message,
            details: self.classified.details(),
            video_id: &self.identifier,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use sluice_core::error::Stage;
    use sluice_core::{ProviderError, SelectionError};

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_response() {
        let failure = RelayFailure::Provider {
            stage: Stage::Metadata,
            error: ProviderError::NotFound {
                identifier: "abc123".to_string(),
            },
        };
        let response = StreamFailure::new("abc123", &failure).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Media not found");
        assert_eq!(json["details"], "media not found: abc123");
        assert_eq!(json["videoId"], "abc123");
    }

    #[tokio::test]
    async fn test_status_per_kind() {
        let no_audio = StreamFailure::new(
            "x",
            &RelayFailure::Selection(SelectionError::NoAudioFormat { candidates: 1 }),
        );
        assert_eq!(no_audio.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let upstream = StreamFailure::new("x", &RelayFailure::Other("boom".to_string()));
        assert_eq!(upstream.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(upstream.into_response()).await;
        assert_eq!(json["error"], "Failed to stream audio");
        assert_eq!(json["details"], "boom");
    }
}
