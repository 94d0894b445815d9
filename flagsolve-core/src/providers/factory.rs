//! Provider factory: build an LLM provider from configuration

use std::sync::Arc;

use crate::config::{ProviderConfig, ProviderName};
use crate::state::MetricsTracker;
use crate::Result;

use super::{AnthropicProvider, LlmProvider, OpenAiProvider};

/// Create a provider from configuration.
///
/// An explicit api_key in the config wins; otherwise the provider reads its
/// conventional environment variable.
pub fn create_provider(
    config: &ProviderConfig,
    metrics: MetricsTracker,
) -> Result<Arc<dyn LlmProvider>> {
    match config.name {
        ProviderName::Anthropic => {
            let provider = match &config.api_key {
                Some(key) => AnthropicProvider::with_api_key(key, &config.model, metrics),
                None => AnthropicProvider::new(&config.model, metrics)?,
            };
            let provider = match &config.base_url {
                Some(url) => provider.with_base_url(url),
                None => provider,
            };
            Ok(Arc::new(provider))
        }
        ProviderName::OpenAi => {
            let provider = match &config.api_key {
                Some(key) => OpenAiProvider::with_api_key(key, &config.model, metrics),
                None => OpenAiProvider::new(&config.model, metrics)?,
            };
            let provider = match &config.base_url {
                Some(url) => provider.with_base_url(url),
                None => provider,
            };
            Ok(Arc::new(provider))
        }
    }
}
