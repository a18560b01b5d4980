use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AgentStep {
    pub operation: String,
    #[schema(value_type = Object)]
    pub input: Value,
    pub success: bool,
    #[schema(value_type = Object)]
    pub output: Value,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub session_id: String,
    pub response: String,
    pub steps: Vec<AgentStep>,
    /// Changes accepted by the tracker from this run.
    pub tracked: usize,
    /// Tool calls rejected by the tracker's validation gate.
    pub skipped: usize,
}

#[derive(Debug, Default)]
pub struct AgentOptions {
    pub session_id: Option<String>,
    pub system_prompt: Option<String>,
    /// When set, each executed step is sent here as it completes (used by
    /// the SSE route). Send failures are ignored.
    pub progress: Option<mpsc::Sender<AgentStep>>,
}
