use crate::application::agent::AgentStep;
use crate::application::tooling::RemoteToolInfo;
use crate::domain::change::TrackedChange;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AgentRunRequest {
    pub prompt: String,
    /// Environment the agent operates against; defaults to the configured
    /// agent environment (normally "sandbox").
    pub environment: Option<String>,
    pub session_id: Option<String>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AgentRunResponse {
    pub session_id: String,
    pub content: String,
    pub tool_steps: Vec<AgentStep>,
    pub tracked: usize,
    pub skipped: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ChangesResponse {
    pub count: usize,
    pub skipped: u64,
    pub changes: Vec<TrackedChange>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearResponse {
    pub cleared: usize,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct SyncRequest {
    /// Target environment; defaults to the configured sync target
    /// (normally "production").
    pub target: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncPreviewResponse {
    pub target: String,
    pub count: usize,
    pub changes: Vec<TrackedChange>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RemoteToolDto {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub input_schema: Option<Value>,
}

impl From<RemoteToolInfo> for RemoteToolDto {
    fn from(info: RemoteToolInfo) -> Self {
        Self {
            name: info.name,
            description: info.description,
            input_schema: info.input_schema,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ToolListResponse {
    pub environment: String,
    pub tools: Vec<RemoteToolDto>,
}
