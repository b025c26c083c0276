//! Bundled [`SourceProvider`](crate::provider::SourceProvider) implementations.

pub mod http;
pub mod simulated;

use std::sync::Arc;

pub use http::HttpManifestProvider;
pub use simulated::SimulatedProvider;

use crate::config::{ConfigError, SluiceConfig};
use crate::mode::RuntimeMode;
use crate::provider::SourceProvider;

/// Builds the provider matching the runtime mode.
///
/// # Errors
///
/// - `ConfigError::MissingProviderUrl` - Production mode without a provider URL
pub fn provider_for_mode(
    mode: RuntimeMode,
    config: &SluiceConfig,
) -> Result<Arc<dyn SourceProvider>, ConfigError> {
    let provider: Arc<dyn SourceProvider> = match mode {
        RuntimeMode::Production => Arc::new(HttpManifestProvider::new(config.provider.clone())?),
        RuntimeMode::Development => {
            Arc::new(SimulatedProvider::with_demo_catalog(config.simulation.clone()))
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_requires_url() {
        let config = SluiceConfig::default();
        assert!(matches!(
            provider_for_mode(RuntimeMode::Production, &config),
            Err(ConfigError::MissingProviderUrl)
        ));

        let provider = provider_for_mode(RuntimeMode::Development, &config).unwrap();
        assert_eq!(provider.provider_name(), "simulated");
    }
}
