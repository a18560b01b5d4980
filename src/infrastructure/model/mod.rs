//! Model providers: the trait, the two supported clients and the factory.

mod anthropic;
mod base;
mod openai;
mod types;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;
pub use types::{ModelError, ModelRequest, ModelResponse};

use crate::config::{AppConfig, ConfigError};
use async_trait::async_trait;
use std::env;

#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;
}

#[async_trait]
impl ModelProvider for Box<dyn ModelProvider> {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        (**self).chat(request).await
    }
}

/// Builds the configured provider. Fails fast at startup when the selected
/// provider's API key variable is absent; a missing key is an operator
/// problem, not something to discover mid-run.
pub fn provider_from_config(config: &AppConfig) -> Result<Box<dyn ModelProvider>, ConfigError> {
    let env_var = config
        .api_key_env
        .clone()
        .unwrap_or_else(|| config.provider.default_api_key_env().to_string());
    let api_key = env::var(&env_var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingApiKey {
            provider: config.provider.as_str().to_string(),
            env_var: env_var.clone(),
        })?;
    let endpoint = config
        .provider_endpoint
        .clone()
        .unwrap_or_else(|| config.provider.default_endpoint().to_string());

    Ok(match config.provider {
        crate::config::ProviderKind::Anthropic => {
            Box::new(AnthropicClient::new(endpoint, api_key))
        }
        crate::config::ProviderKind::OpenAi => Box::new(OpenAiClient::new(endpoint, api_key)),
    })
}
