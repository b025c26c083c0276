//! Audio relay endpoint.
//!
//! Everything up to and including opening the relay session happens before
//! the response is built, so any failure there becomes a JSON error with no
//! partial body. Once headers are out, a failure can only cut the body short.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Response, StatusCode, header};
use axum::response::IntoResponse;
use sluice_core::error::Stage;
use sluice_core::{MediaIdentifier, RelayFailure, select};
use tokio::time::timeout;
use tracing::info;

use crate::error::StreamFailure;
use crate::server::AppState;

/// `GET /stream/{identifier}`
pub async fn stream_audio(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Response<Body> {
    match start_relay(&state, &identifier).await {
        Ok(response) => response,
        Err(failure) => StreamFailure::new(identifier, &failure).into_response(),
    }
}

async fn start_relay(state: &AppState, raw: &str) -> Result<Response<Body>, RelayFailure> {
    let identifier = MediaIdentifier::new(raw)?;
    info!(identifier = %identifier, "Streaming request");

    let metadata_timeout = state.relay.metadata_timeout;
    let metadata = timeout(metadata_timeout, state.provider.resolve_metadata(&identifier))
        .await
        .map_err(|_| RelayFailure::Timeout {
            stage: Stage::Metadata,
            after: metadata_timeout,
        })?
        .map_err(|error| RelayFailure::Provider {
            stage: Stage::Metadata,
            error,
        })?;

    let selected = select(&metadata.candidates)?.with_length_hint(metadata.total_length_hint);
    let descriptor = selected.descriptor();
    info!(
        identifier = %identifier,
        key = %descriptor.key,
        mime_type = %descriptor.mime_type,
        bitrate = ?descriptor.bitrate,
        content_length = ?selected.content_length(),
        "Selected format"
    );

    let open_timeout = state.relay.open_timeout;
    let session = timeout(
        open_timeout,
        state.adapter.open(&selected, state.provider.as_ref()),
    )
    .await
    .map_err(|_| RelayFailure::Timeout {
        stage: Stage::OpenStream,
        after: open_timeout,
    })?
    .map_err(|error| RelayFailure::Provider {
        stage: Stage::OpenStream,
        error,
    })?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, selected.content_type())
        .header(header::CACHE_CONTROL, "no-store");
    if let Some(length) = selected.content_length() {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    // Dropping the body (client gone) drops the session, which cancels it.
    builder
        .body(Body::from_stream(session.into_body_stream()))
        .map_err(|e| RelayFailure::Other(format!("cannot build response: {e}")))
}
