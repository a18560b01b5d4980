//! Records produced by change tracking and replayed by the sync service.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

/// One tool call recorded from an agent run. `arguments` have already passed
/// shape validation; `result` is present only when the remote reply matched a
/// known output shape.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TrackedChange {
    pub operation: String,
    #[schema(value_type = Object)]
    pub arguments: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub result: Option<Value>,
    pub recorded_at: DateTime<Utc>,
    pub step_index: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChangeOutcome {
    pub operation: String,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub result: Option<Value>,
}

/// Aggregate result of one sync invocation.
///
/// Invariants: `applied + failed == total == outcomes.len()` and
/// `success` holds exactly when `failed == 0`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SyncOutcome {
    pub total: usize,
    pub applied: usize,
    pub failed: usize,
    pub success: bool,
    pub outcomes: Vec<ChangeOutcome>,
}
