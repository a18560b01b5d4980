//! Validation + dispatch layer binding operation names to RPC calls for a
//! given environment, and unwrapping the MCP response envelope.

use crate::application::operations::{Operation, ValidationError, validate_arguments};
use crate::application::tooling::{RpcError, ToolBackend};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

pub struct ToolAdapter {
    backend: Arc<dyn ToolBackend>,
}

impl ToolAdapter {
    pub fn new(backend: Arc<dyn ToolBackend>) -> Self {
        Self { backend }
    }

    /// Validates the input, resolves a connection for the environment through
    /// the backend, invokes the named operation and unwraps the envelope.
    /// Remote failures propagate to the caller untouched.
    pub async fn execute(
        &self,
        environment: &str,
        operation_name: &str,
        arguments: Value,
    ) -> Result<Value, ToolError> {
        let operation = Operation::from_name(operation_name)
            .ok_or_else(|| ValidationError::UnknownOperation(operation_name.to_string()))?;
        let normalized = validate_arguments(operation, &arguments)?;

        debug!(environment, operation = operation.name(), "Dispatching operation");
        let envelope = self
            .backend
            .invoke_operation(environment, operation.name(), normalized)
            .await?;

        unwrap_envelope(environment, envelope).map_err(ToolError::Rpc)
    }
}

/// MCP wraps tool output in a content container. A text block carrying JSON
/// is the normal case; `structuredContent` is preferred when present, and an
/// `isError` flag marks application-level failure.
fn unwrap_envelope(environment: &str, envelope: Value) -> Result<Value, RpcError> {
    let is_error = envelope
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if is_error {
        let message =
            text_content(&envelope).unwrap_or_else(|| "remote tool reported an error".to_string());
        return Err(RpcError::Remote {
            environment: environment.to_string(),
            code: -32000,
            message,
            data: envelope.get("structuredContent").cloned(),
        });
    }

    if let Some(structured) = envelope.get("structuredContent") {
        if !structured.is_null() {
            return Ok(structured.clone());
        }
    }

    if let Some(text) = text_content(&envelope) {
        if let Ok(value) = serde_json::from_str::<Value>(&text) {
            return Ok(value);
        }
        return Ok(Value::String(text));
    }

    Ok(envelope)
}

fn text_content(envelope: &Value) -> Option<String> {
    let blocks = envelope.get("content").and_then(Value::as_array)?;
    for block in blocks {
        let is_text = block
            .get("type")
            .and_then(Value::as_str)
            .map(|kind| kind.eq_ignore_ascii_case("text"))
            .unwrap_or(false);
        if is_text {
            if let Some(text) = block.get("text").and_then(Value::as_str) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::tooling::RemoteToolInfo;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct EchoBackend {
        envelope: Value,
        calls: Mutex<Vec<(String, String, Value)>>,
    }

    impl EchoBackend {
        fn new(envelope: Value) -> Self {
            Self {
                envelope,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ToolBackend for EchoBackend {
        async fn invoke_operation(
            &self,
            environment: &str,
            operation: &str,
            arguments: Value,
        ) -> Result<Value, RpcError> {
            self.calls.lock().expect("calls lock").push((
                environment.to_string(),
                operation.to_string(),
                arguments,
            ));
            Ok(self.envelope.clone())
        }

        async fn discover(&self, _environment: &str) -> Result<Vec<RemoteToolInfo>, RpcError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn validates_before_dispatch_and_applies_defaults() {
        let backend = Arc::new(EchoBackend::new(json!({
            "content": [{"type": "text", "text": "{\"posts\": [], \"total\": 0, \"page\": 1, \"per_page\": 10}"}],
        })));
        let adapter = ToolAdapter::new(backend.clone());

        let result = adapter
            .execute("sandbox", "list-posts", json!({}))
            .await
            .expect("success");
        assert_eq!(result["total"], 0);

        let calls = backend.calls.lock().expect("calls lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "list-posts");
        assert_eq!(calls[0].2["per_page"], 10);
        assert_eq!(calls[0].2["page"], 1);
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_backend() {
        let backend = Arc::new(EchoBackend::new(json!({})));
        let adapter = ToolAdapter::new(backend.clone());

        let err = adapter
            .execute("sandbox", "create-post", json!({"title": "only"}))
            .await
            .expect_err("missing content");
        assert!(matches!(err, ToolError::Validation(_)));
        assert!(backend.calls.lock().expect("calls lock").is_empty());
    }

    #[tokio::test]
    async fn unknown_operation_is_rejected() {
        let backend = Arc::new(EchoBackend::new(json!({})));
        let adapter = ToolAdapter::new(backend);
        let err = adapter
            .execute("sandbox", "purge-posts", json!({}))
            .await
            .expect_err("unknown");
        assert!(matches!(
            err,
            ToolError::Validation(ValidationError::UnknownOperation(_))
        ));
    }

    #[tokio::test]
    async fn error_envelope_becomes_remote_error() {
        let backend = Arc::new(EchoBackend::new(json!({
            "isError": true,
            "content": [{"type": "text", "text": "Post not found"}],
        })));
        let adapter = ToolAdapter::new(backend);
        let err = adapter
            .execute("sandbox", "get-post", json!({"id": 99}))
            .await
            .expect_err("remote failure");
        match err {
            ToolError::Rpc(RpcError::Remote { message, .. }) => {
                assert_eq!(message, "Post not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn structured_content_wins_over_text() {
        let backend = Arc::new(EchoBackend::new(json!({
            "structuredContent": {"id": 5, "title": "T", "content": "C", "status": "draft"},
            "content": [{"type": "text", "text": "ignored"}],
        })));
        let adapter = ToolAdapter::new(backend);
        let result = adapter
            .execute("sandbox", "get-post", json!({"id": 5}))
            .await
            .expect("success");
        assert_eq!(result["id"], 5);
    }
}
