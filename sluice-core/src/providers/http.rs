//! Production provider backed by an HTTP metadata service.
//!
//! Metadata is fetched as JSON from `{base_url}/media/{identifier}`; the body
//! is a [`MediaMetadata`] document whose candidates carry a `locator` (an
//! absolute URL or one relative to the base URL) for the raw byte stream.
//! Every request carries the configured browser-like headers and the
//! credential set as a `Cookie` header.

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{ConfigError, ProviderConfig};
use crate::media::{EncodingDescriptor, MediaIdentifier, MediaMetadata};
use crate::provider::{ProviderError, PushSource, SourceProvider};
use crate::relay::TaskSource;

/// Provider resolving media through an HTTP metadata service.
pub struct HttpManifestProvider {
    client: Client,
    base_url: Url,
}

fn header_value(name: &'static str, value: &str) -> Result<HeaderValue, ConfigError> {
    HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
        name,
        reason: e.to_string(),
    })
}

/// Maps a non-success origin status onto a provider error.
fn status_error(status: StatusCode, identifier: &str, url: &Url) -> ProviderError {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => ProviderError::NotFound {
            identifier: identifier.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized {
            reason: format!("{status} from {url}"),
        },
        _ => ProviderError::Network {
            reason: format!("{status} from {url}"),
        },
    }
}

fn transport_error(error: reqwest::Error) -> ProviderError {
    ProviderError::Network {
        reason: error.to_string(),
    }
}

impl HttpManifestProvider {
    /// Builds the provider and its HTTP client.
    ///
    /// # Errors
    ///
    /// - `ConfigError::MissingProviderUrl` - No base URL configured
    /// - `ConfigError::InvalidHeader` - A header value contains invalid characters
    /// - `ConfigError::HttpClient` - The HTTP client could not be built
    pub fn new(config: ProviderConfig) -> Result<Self, ConfigError> {
        let base_url = config.base_url.clone().ok_or(ConfigError::MissingProviderUrl)?;
        // Relative locators resolve against the base as a directory.
        let base_url = if base_url.path().ends_with('/') {
            base_url
        } else {
            let mut url = base_url;
            url.set_path(&format!("{}/", url.path()));
            url
        };

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value("User-Agent", &config.user_agent)?);
        headers.insert(ACCEPT, header_value("Accept", &config.accept)?);
        headers.insert(
            ACCEPT_LANGUAGE,
            header_value("Accept-Language", &config.accept_language)?,
        );
        if let Some(cookie) = config.cookie_header() {
            let mut value = header_value("Cookie", &cookie)?;
            value.set_sensitive(true);
            headers.insert(COOKIE, value);
        }

        info!(
            base_url = %base_url,
            cookies = config.cookies.len(),
            names = ?config.cookie_names(),
            "HTTP provider configured"
        );
        if config.cookies.is_empty() {
            warn!("No origin credentials configured; restricted media may fail with an authorization error");
        }

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient {
                reason: e.to_string(),
            })?;

        Ok(Self { client, base_url })
    }

    fn metadata_url(&self, identifier: &MediaIdentifier) -> Result<Url, ProviderError> {
        let path = format!("media/{}", urlencoding::encode(identifier.as_str()));
        self.base_url
            .join(&path)
            .map_err(|e| ProviderError::Other {
                reason: format!("cannot build metadata URL: {e}"),
            })
    }

    fn stream_url(&self, encoding: &EncodingDescriptor) -> Result<Url, ProviderError> {
        let locator = encoding
            .locator
            .as_deref()
            .ok_or_else(|| ProviderError::MalformedResponse {
                reason: format!("encoding {} has no locator", encoding.key),
            })?;
        self.base_url
            .join(locator)
            .map_err(|e| ProviderError::MalformedResponse {
                reason: format!("invalid locator {locator}: {e}"),
            })
    }
}

#[async_trait::async_trait]
impl SourceProvider for HttpManifestProvider {
    async fn resolve_metadata(
        &self,
        identifier: &MediaIdentifier,
    ) -> Result<MediaMetadata, ProviderError> {
        let url = self.metadata_url(identifier)?;
        debug!(%url, "Fetching media metadata");

        let response = self.client.get(url.clone()).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), identifier.as_str(), &url));
        }

        let body = response.bytes().await.map_err(transport_error)?;
        let metadata: MediaMetadata =
            serde_json::from_slice(&body).map_err(|e| ProviderError::MalformedResponse {
                reason: e.to_string(),
            })?;

        info!(
            identifier = %identifier,
            formats = metadata.candidates.len(),
            "Resolved media metadata"
        );
        Ok(metadata)
    }

    async fn open_stream(
        &self,
        encoding: &EncodingDescriptor,
    ) -> Result<Box<dyn PushSource>, ProviderError> {
        let url = self.stream_url(encoding)?;
        debug!(%url, key = %encoding.key, "Opening origin stream");

        let response = self.client.get(url.clone()).send().await.map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), &encoding.key, &url));
        }

        Ok(Box::new(TaskSource::new("http", response.bytes_stream())))
    }

    fn provider_name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use axum::Router;
    use axum::extract::Path;
    use axum::http::{HeaderMap as AxumHeaders, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::get;

    use super::*;
    use crate::config::Cookie;
    use crate::relay::{RelayEvent, StreamAdapter};
    use crate::selector::select;

    async fn metadata(Path(id): Path<String>, headers: AxumHeaders) -> impl IntoResponse {
        let cookie = headers
            .get("cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        match id.as_str() {
            "abc123" => (
                AxumStatus::OK,
                r#"{"candidates":[
                    {"key":"18","mimeType":"video/mp4","bitrate":720,"audioOnly":false,"locator":"files/18"},
                    {"key":"140","mimeType":"audio/mp4","bitrate":128,"audioOnly":true,"locator":"files/140"},
                    {"key":"251","mimeType":"audio/webm; codecs=\"opus\"","bitrate":160,"contentLength":11,"audioOnly":true,"locator":"files/251"}
                ]}"#
                .to_string(),
            ),
            "private" if cookie != "SID=secret" => (AxumStatus::FORBIDDEN, String::new()),
            "private" => (AxumStatus::OK, r#"{"candidates":[]}"#.to_string()),
            "garbled" => (AxumStatus::OK, "<html>".to_string()),
            "flaky" => (AxumStatus::BAD_GATEWAY, String::new()),
            _ => (AxumStatus::NOT_FOUND, String::new()),
        }
    }

    async fn file(Path(key): Path<String>) -> impl IntoResponse {
        match key.as_str() {
            "251" => (AxumStatus::OK, "opus-bytes!").into_response(),
            _ => AxumStatus::NOT_FOUND.into_response(),
        }
    }

    async fn spawn_origin() -> SocketAddr {
        let app = Router::new()
            .route("/api/media/{id}", get(metadata))
            .route("/api/files/{key}", get(file));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn provider_for(addr: SocketAddr, cookies: Vec<Cookie>) -> HttpManifestProvider {
        let mut config = ProviderConfig {
            cookies,
            ..Default::default()
        };
        config.set_base_url(&format!("http://{addr}/api")).unwrap();
        HttpManifestProvider::new(config).unwrap()
    }

    fn id(raw: &str) -> MediaIdentifier {
        MediaIdentifier::new(raw).unwrap()
    }

    #[test]
    fn test_requires_base_url() {
        assert!(matches!(
            HttpManifestProvider::new(ProviderConfig::default()),
            Err(ConfigError::MissingProviderUrl)
        ));
    }

    #[test]
    fn test_status_mapping() {
        let url = Url::parse("http://origin/x").unwrap();
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "x", &url),
            ProviderError::NotFound { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "x", &url),
            ProviderError::Unauthorized { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "x", &url),
            ProviderError::Network { .. }
        ));
    }

    #[tokio::test]
    async fn test_resolves_and_relays() {
        let addr = spawn_origin().await;
        let provider = provider_for(addr, Vec::new());

        let metadata = provider.resolve_metadata(&id("abc123")).await.unwrap();
        assert_eq!(metadata.candidates.len(), 3);

        let selected = select(&metadata.candidates).unwrap();
        assert_eq!(selected.descriptor().key, "251");
        assert_eq!(selected.content_length(), Some(11));

        let session = StreamAdapter::default().open(&selected, &provider).await.unwrap();
        let mut body = Vec::new();
        while let RelayEvent::Chunk(chunk) = session.next().await.unwrap() {
            body.extend_from_slice(&chunk);
        }
        assert_eq!(body, b"opus-bytes!");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let addr = spawn_origin().await;
        let provider = provider_for(addr, Vec::new());

        assert!(matches!(
            provider.resolve_metadata(&id("missing")).await,
            Err(ProviderError::NotFound { .. })
        ));
        assert!(matches!(
            provider.resolve_metadata(&id("private")).await,
            Err(ProviderError::Unauthorized { .. })
        ));
        assert!(matches!(
            provider.resolve_metadata(&id("garbled")).await,
            Err(ProviderError::MalformedResponse { .. })
        ));
        assert!(matches!(
            provider.resolve_metadata(&id("flaky")).await,
            Err(ProviderError::Network { .. })
        ));
    }

    #[tokio::test]
    async fn test_sends_cookie_header() {
        let addr = spawn_origin().await;
        let provider = provider_for(
            addr,
            vec![Cookie {
                name: "SID".to_string(),
                value: "secret".to_string(),
            }],
        );

        let metadata = provider.resolve_metadata(&id("private")).await.unwrap();
        assert!(metadata.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_open_without_locator_is_malformed() {
        let addr = spawn_origin().await;
        let provider = provider_for(addr, Vec::new());
        let encoding = EncodingDescriptor::audio("140", "audio/mp4", 128);

        assert!(matches!(
            provider.open_stream(&encoding).await,
            Err(ProviderError::MalformedResponse { .. })
        ));
    }
}
