use super::directive::AgentDirective;
use super::errors::AgentError;
use crate::application::adapter::{ToolAdapter, ToolError};
use crate::application::operations::ALL_OPERATIONS;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

/// Binds the agent loop to one environment's tool surface: advertises the
/// operation catalogue, executes requested calls, and parses model output
/// into directives.
pub struct ToolRuntime {
    adapter: Arc<ToolAdapter>,
    environment: String,
}

impl ToolRuntime {
    pub fn new(adapter: Arc<ToolAdapter>, environment: impl Into<String>) -> Self {
        Self {
            adapter,
            environment: environment.into(),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn compose_system_instructions(&self) -> String {
        let mut lines = vec![
            format!(
                "You are an autonomous content assistant operating against the '{}' environment of a content-management system.",
                self.environment
            ),
            "All responses must be valid JSON without commentary or code fences.".to_string(),
            "When you need to invoke a tool, respond with: {\"action\":\"call_tool\",\"tool\":\"tool_name\",\"input\":{...}}."
                .to_string(),
            "When you are ready to give the final answer to the user, respond with: {\"action\":\"final\",\"response\":\"...\"}."
                .to_string(),
            "Available tools:".to_string(),
        ];

        for operation in ALL_OPERATIONS {
            let schema = serde_json::to_string(&operation.input_schema()).unwrap_or_default();
            lines.push(format!(
                "- {}: {} Input schema: {}",
                operation.name(),
                operation.description(),
                schema
            ));
        }

        lines.join(" ")
    }

    pub fn initial_user_prompt(&self, prompt: String) -> String {
        json!({
            "action": "user_request",
            "prompt": prompt,
            "environment": self.environment,
        })
        .to_string()
    }

    /// Executes one requested tool call. Failures do not bubble up: they are
    /// folded into an unsuccessful execution so the model can recover or
    /// conclude on its own.
    pub(crate) async fn execute(&self, tool_name: &str, input: Value) -> ToolExecution {
        match self
            .adapter
            .execute(&self.environment, tool_name, input.clone())
            .await
        {
            Ok(output) => {
                let execution = ToolExecution {
                    operation: tool_name.to_string(),
                    success: true,
                    input,
                    output,
                    message: None,
                };
                info!(operation = %execution.operation, success = true, "Tool executed");
                execution
            }
            Err(err) => {
                warn!(operation = %tool_name, environment = %self.environment, %err, "Tool execution failed");
                let message = match &err {
                    ToolError::Validation(inner) => inner.to_string(),
                    ToolError::Rpc(inner) => inner.to_string(),
                };
                ToolExecution {
                    operation: tool_name.to_string(),
                    success: false,
                    input,
                    output: Value::Null,
                    message: Some(message),
                }
            }
        }
    }

    pub fn parse_agent_action(&self, content: &str) -> Result<AgentDirective, AgentError> {
        if let Some(value) = extract_json(content) {
            parse_action_value(value)
        } else {
            Err(AgentError::InvalidResponse(
                "expected JSON object in agent response".into(),
            ))
        }
    }
}

pub(crate) struct ToolExecution {
    pub operation: String,
    pub success: bool,
    pub input: Value,
    pub output: Value,
    pub message: Option<String>,
}

fn parse_action_value(value: Value) -> Result<AgentDirective, AgentError> {
    match value {
        Value::Object(map) => {
            let Some(action) = map.get("action").and_then(Value::as_str) else {
                return Err(AgentError::InvalidResponse(
                    "missing action field in agent response".into(),
                ));
            };
            match action {
                "call_tool" => {
                    let tool = map.get("tool").and_then(Value::as_str).ok_or_else(|| {
                        AgentError::InvalidResponse("call_tool action missing tool field".into())
                    })?;
                    let input = map.get("input").cloned().unwrap_or(Value::Null);
                    Ok(AgentDirective::CallTool {
                        tool: tool.to_string(),
                        input,
                    })
                }
                "final" => {
                    let response = map.get("response").and_then(Value::as_str).ok_or_else(|| {
                        AgentError::InvalidResponse("final action missing response field".into())
                    })?;
                    Ok(AgentDirective::Final {
                        response: response.to_string(),
                    })
                }
                other => Err(AgentError::InvalidResponse(format!(
                    "unknown action value: {other}"
                ))),
            }
        }
        Value::String(text) => {
            if let Some(value) = extract_json(&text) {
                parse_action_value(value)
            } else {
                Err(AgentError::InvalidResponse(
                    "expected JSON object in agent response".into(),
                ))
            }
        }
        other => Err(AgentError::InvalidResponse(format!(
            "unsupported response type: {other}"
        ))),
    }
}

/// Models wrap JSON in prose or code fences often enough that a strict parse
/// alone is not workable.
fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if trimmed.starts_with("```") {
        let stripped = trimmed.trim_start_matches("```json");
        let stripped = stripped.trim_start_matches("```JSON");
        let stripped = stripped.trim_start_matches("```");
        if let Some(end) = stripped.rfind("```") {
            let slice = &stripped[..end];
            if let Ok(value) = serde_json::from_str::<Value>(slice.trim()) {
                return Some(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            let candidate = &trimmed[start..=end];
            if let Ok(value) = serde_json::from_str::<Value>(candidate) {
                return Some(value);
            }
        }
    }

    None
}
