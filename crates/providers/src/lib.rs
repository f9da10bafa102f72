//! Model provider implementations for deskpilot.
//!
//! All providers implement the `deskpilot_core::Provider` trait.
//! [`build_provider`] assembles the configured stack: the Anthropic
//! Messages API client wrapped in bounded retries.

pub mod anthropic;
pub mod retry;

pub use anthropic::AnthropicProvider;
pub use retry::RetryingProvider;

use deskpilot_config::AppConfig;
use deskpilot_core::ProviderError;
use std::sync::Arc;
use std::time::Duration;

/// Build the provider described by `config`.
pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn deskpilot_core::Provider>, ProviderError> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        ProviderError::NotConfigured(
            "no API key; set ANTHROPIC_API_KEY or api_key in config.toml".into(),
        )
    })?;

    let timeout = Duration::from_secs(config.provider.timeout_secs);
    let anthropic = AnthropicProvider::new(api_key, timeout)?.with_base_url(&config.provider.base_url);

    Ok(Arc::new(
        RetryingProvider::new(Arc::new(anthropic))
            .with_max_retries(config.provider.max_retries)
            .with_initial_backoff(Duration::from_millis(config.provider.initial_backoff_ms))
            .with_attempt_timeout(timeout),
    ))
}
