//! Centralized configuration for Sluice.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase. The configuration is
//! built once at startup and handed to the server and providers explicitly.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::relay::DEFAULT_HIGH_WATER_MARK;

/// Central configuration for all Sluice components.
#[derive(Debug, Clone, Default)]
pub struct SluiceConfig {
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub provider: ProviderConfig,
    pub simulation: SimulationConfig,
}

/// Configuration problems detected at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid credential set: {reason}")]
    InvalidCookies { reason: String },

    #[error("invalid provider URL {url}: {reason}")]
    InvalidProviderUrl { url: String, reason: String },

    #[error("invalid {name} header value: {reason}")]
    InvalidHeader { name: &'static str, reason: String },

    #[error("cannot build HTTP client: {reason}")]
    HttpClient { reason: String },

    #[error("production mode requires a provider URL")]
    MissingProviderUrl,

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// Relay buffering and timeout policy.
///
/// The core defines no timeouts of its own; the transport applies these
/// around the two calls that can hang on an unresponsive origin.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Buffer size at which the source is paused.
    pub high_water_mark: usize,
    /// Limit for resolving metadata.
    pub metadata_timeout: Duration,
    /// Limit for opening the source stream.
    pub open_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            metadata_timeout: Duration::from_secs(15),
            open_timeout: Duration::from_secs(15),
        }
    }
}

/// One origin session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Origin access configuration used only by the production provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the metadata service.
    pub base_url: Option<Url>,
    /// User agent for origin requests
    pub user_agent: String,
    pub accept: String,
    pub accept_language: String,
    /// Credential set rendered into the `Cookie` header.
    pub cookies: Vec<Cookie>,
    /// Connect timeout for origin requests
    pub connect_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            cookies: Vec::new(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ProviderConfig {
    /// Renders the credential set as a `Cookie` header value.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let header = self
            .cookies
            .iter()
            .map(|cookie| format!("{}={}", cookie.name, cookie.value))
            .collect::<Vec<_>>()
            .join("; ");
        Some(header)
    }

    /// Parses and sets the metadata service URL.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidProviderUrl` - The URL does not parse
    pub fn set_base_url(&mut self, raw: &str) -> Result<(), ConfigError> {
        let url = Url::parse(raw).map_err(|e| ConfigError::InvalidProviderUrl {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;
        self.base_url = Some(url);
        Ok(())
    }

    /// Cookie names, for diagnostics. Values are never logged.
    pub fn cookie_names(&self) -> Vec<&str> {
        self.cookies.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Development-mode provider settings.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Deterministic seed for synthetic payloads
    pub seed: u64,
    /// Size of each simulated chunk
    pub chunk_size: usize,
    /// Delay between simulated chunks
    pub chunk_delay: Duration,
    /// Size of each simulated resource
    pub resource_size: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            chunk_size: 64 * 1024, // 64 KiB
            chunk_delay: Duration::from_millis(20),
            resource_size: 4 * 1024 * 1024, // 4 MiB
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration for fast deterministic tests.
    pub fn deterministic_testing() -> Self {
        Self {
            seed: 42,
            chunk_size: 1024,
            chunk_delay: Duration::ZERO,
            resource_size: 16 * 1024,
        }
    }
}

/// Parses a credential set from its JSON form `[{"name": .., "value": ..}]`.
///
/// # Errors
///
/// - `ConfigError::InvalidCookies` - The input is not a JSON array of name/value objects
pub fn parse_cookies(raw: &str) -> Result<Vec<Cookie>, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::InvalidCookies {
        reason: e.to_string(),
    })
}

impl SluiceConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are reported and ignored so the defaults stay in effect.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("SLUICE_BIND_ADDR") {
            match addr.parse() {
                Ok(addr) => config.server.bind_addr = addr,
                Err(_) => warn!("Ignoring invalid SLUICE_BIND_ADDR: {addr}"),
            }
        }

        if let Some(bytes) = lookup("SLUICE_HIGH_WATER_MARK") {
            match bytes.parse::<usize>() {
                Ok(bytes) => config.relay.high_water_mark = bytes,
                Err(_) => warn!("Ignoring invalid SLUICE_HIGH_WATER_MARK: {bytes}"),
            }
        }

        if let Some(seconds) = lookup("SLUICE_METADATA_TIMEOUT") {
            match seconds.parse::<u64>() {
                Ok(seconds) => config.relay.metadata_timeout = Duration::from_secs(seconds),
                Err(_) => warn!("Ignoring invalid SLUICE_METADATA_TIMEOUT: {seconds}"),
            }
        }

        if let Some(seconds) = lookup("SLUICE_OPEN_TIMEOUT") {
            match seconds.parse::<u64>() {
                Ok(seconds) => config.relay.open_timeout = Duration::from_secs(seconds),
                Err(_) => warn!("Ignoring invalid SLUICE_OPEN_TIMEOUT: {seconds}"),
            }
        }

        if let Some(url) = lookup("SLUICE_PROVIDER_URL") {
            match Url::parse(&url) {
                Ok(url) => config.provider.base_url = Some(url),
                Err(e) => warn!("Ignoring invalid SLUICE_PROVIDER_URL {url}: {e}"),
            }
        }

        if let Some(raw) = lookup("SLUICE_COOKIES") {
            match parse_cookies(&raw) {
                Ok(cookies) => config.provider.cookies = cookies,
                Err(e) => warn!("Ignoring SLUICE_COOKIES: {e}"),
            }
        }

        if let Some(seed) = lookup("SLUICE_SIMULATION_SEED") {
            match seed.parse::<u64>() {
                Ok(seed) => config.simulation.seed = seed,
                Err(_) => warn!("Ignoring invalid SLUICE_SIMULATION_SEED: {seed}"),
            }
        }

        config
    }

    /// Creates a configuration optimized for testing.
    pub fn for_testing() -> Self {
        Self {
            relay: RelayConfig {
                high_water_mark: 64 * 1024,
                metadata_timeout: Duration::from_secs(2),
                open_timeout: Duration::from_secs(2),
            },
            simulation: SimulationConfig::deterministic_testing(),
            ..Default::default()
        }
    }

    /// Checks values that would make the relay misbehave.
    ///
    /// # Errors
    ///
    /// - `ConfigError::ZeroValue` - A size or timeout is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.high_water_mark == 0 {
            return Err(ConfigError::ZeroValue {
                field: "high_water_mark",
            });
        }
        if self.relay.metadata_timeout.is_zero() {
            return Err(ConfigError::ZeroValue {
                field: "metadata_timeout",
            });
        }
        if self.relay.open_timeout.is_zero() {
            return Err(ConfigError::ZeroValue {
                field: "open_timeout",
            });
        }
        if self.simulation.chunk_size == 0 {
            return Err(ConfigError::ZeroValue {
                field: "simulation.chunk_size",
            });
        }
        Ok(())
    }
}
