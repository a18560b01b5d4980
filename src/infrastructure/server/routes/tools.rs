use super::super::dto::{ErrorResponse, ToolListResponse};
use super::super::state::ServerState;
use crate::application::tooling::{RpcError, ToolBackend};
use crate::infrastructure::model::ModelProvider;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

#[derive(Debug, Deserialize)]
pub struct ToolsQuery {
    pub environment: Option<String>,
}

#[utoipa::path(
    get,
    path = "/tools",
    tag = "tools",
    params(
        ("environment" = Option<String>, Query, description = "Environment to introspect; defaults to the agent environment")
    ),
    responses(
        (status = 200, description = "Operations the remote registry advertises", body = ToolListResponse),
        (status = 400, description = "Environment not configured or missing credentials", body = ErrorResponse),
        (status = 502, description = "Remote endpoint unreachable", body = ErrorResponse)
    )
)]
pub async fn tools_handler<P: ModelProvider + 'static>(
    State(state): State<Arc<ServerState<P>>>,
    Query(query): Query<ToolsQuery>,
) -> Result<Json<ToolListResponse>, (StatusCode, Json<ErrorResponse>)> {
    let environment = query
        .environment
        .unwrap_or_else(|| state.agent_environment().to_string());

    match state.connections().discover(&environment).await {
        Ok(tools) => Ok(Json(ToolListResponse {
            environment,
            tools: tools.into_iter().map(Into::into).collect(),
        })),
        Err(err) => {
            error!(environment = environment.as_str(), %err, "Tool discovery failed");
            let status = match &err {
                RpcError::Config(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            };
            Err((
                status,
                Json(ErrorResponse {
                    error: err.to_string(),
                }),
            ))
        }
    }
}
