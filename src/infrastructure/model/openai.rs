//! OpenAI chat-completions client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::ModelProvider;
use super::base::HttpClientBase;
use super::types::{ModelError, ModelRequest, ModelResponse};

const API_PATH: &str = "/v1/chat/completions";

#[derive(Clone)]
pub struct OpenAiClient {
    base: HttpClientBase,
}

impl OpenAiClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base: HttpClientBase::new("openai", endpoint.into(), api_key.into()),
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiClient {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let url = self.base.build_url(API_PATH);
        let payload = OpenAiRequest {
            model: request.model.clone(),
            messages: request
                .messages
                .iter()
                .map(|message| {
                    json!({
                        "role": message.role.as_str(),
                        "content": message.content,
                    })
                })
                .collect(),
            stream: false,
        };

        info!(
            provider = self.base.id,
            model = request.model.as_str(),
            messages = request.messages.len(),
            "Sending request to OpenAI"
        );
        let response: OpenAiResponse = self.base.post_with_bearer(&url, &payload).await?;
        debug!("Received response from OpenAI");

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .map(|message| message.content)
            .ok_or_else(|| ModelError::invalid_response(self.base.id, "missing content"))?;

        Ok(ModelResponse::new(content, request.session_id))
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Value>,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: Option<OpenAiMessage>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}
