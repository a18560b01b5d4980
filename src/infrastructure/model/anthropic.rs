//! Anthropic messages client. Unlike the OpenAI shape, the system prompt is
//! a top-level field and auth goes through `x-api-key`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::ModelProvider;
use super::base::HttpClientBase;
use super::types::{ModelError, ModelRequest, ModelResponse};
use crate::domain::types::MessageRole;

const API_PATH: &str = "/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Clone)]
pub struct AnthropicClient {
    base: HttpClientBase,
}

impl AnthropicClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base: HttpClientBase::new("anthropic", endpoint.into(), api_key.into()),
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicClient {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let url = self.base.build_url(API_PATH);

        let mut system_parts = Vec::new();
        let mut messages = Vec::new();
        for message in &request.messages {
            match message.role {
                MessageRole::System => system_parts.push(message.content.clone()),
                role => messages.push(json!({
                    "role": role.as_str(),
                    "content": message.content,
                })),
            }
        }

        let payload = AnthropicRequest {
            model: request.model.clone(),
            max_tokens: MAX_TOKENS,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages,
        };

        info!(
            provider = self.base.id,
            model = request.model.as_str(),
            messages = request.messages.len(),
            "Sending request to Anthropic"
        );
        let headers = [
            ("x-api-key", self.base.api_key.clone()),
            ("anthropic-version", API_VERSION.to_string()),
        ];
        let response: AnthropicResponse =
            self.base.post_with_headers(&url, &headers, &payload).await?;
        debug!("Received response from Anthropic");

        let content = response
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| ModelError::invalid_response(self.base.id, "missing text block"))?;

        Ok(ModelResponse::new(content, request.session_id))
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Value>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    text: Option<String>,
}
