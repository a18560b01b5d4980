use super::super::dto::{SyncPreviewResponse, SyncRequest};
use super::super::state::ServerState;
use crate::application::sync::SyncService;
use crate::domain::change::SyncOutcome;
use crate::infrastructure::model::ModelProvider;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use std::sync::Arc;
use tracing::{info, warn};

#[utoipa::path(
    get,
    path = "/sync/preview",
    tag = "sync",
    responses(
        (status = 200, description = "Changes that a sync would replay, in order", body = SyncPreviewResponse)
    )
)]
pub async fn preview_handler<P: ModelProvider + 'static>(
    State(state): State<Arc<ServerState<P>>>,
) -> Json<SyncPreviewResponse> {
    let changes = state.tracker().snapshot();
    Json(SyncPreviewResponse {
        target: state.sync_target().to_string(),
        count: changes.len(),
        changes,
    })
}

/// Replays the tracked changes against the target environment. Full success
/// returns 200 and clears the tracker; a partial failure returns 207 with
/// per-change detail and leaves everything in the tracker for reapplication;
/// 502 means nothing was applied.
#[utoipa::path(
    post,
    path = "/sync",
    tag = "sync",
    request_body = SyncRequest,
    responses(
        (status = 200, description = "All changes applied; tracker cleared", body = SyncOutcome),
        (status = 207, description = "Some changes applied, some failed", body = SyncOutcome),
        (status = 502, description = "No change could be applied", body = SyncOutcome)
    )
)]
pub async fn apply_handler<P: ModelProvider + 'static>(
    State(state): State<Arc<ServerState<P>>>,
    payload: Option<Json<SyncRequest>>,
) -> (StatusCode, Json<SyncOutcome>) {
    let request = payload.map(|Json(inner)| inner).unwrap_or_default();
    let target = request
        .target
        .unwrap_or_else(|| state.sync_target().to_string());
    info!(target = target.as_str(), "Received /sync request");

    let changes = state.tracker().snapshot();
    let service = SyncService::new(state.adapter(), target);
    let outcome = service.apply(&changes).await;

    let status = if outcome.success {
        state.tracker().clear();
        StatusCode::OK
    } else if outcome.applied > 0 {
        warn!(
            applied = outcome.applied,
            failed = outcome.failed,
            "Sync partially applied; tracker left intact for retry"
        );
        StatusCode::MULTI_STATUS
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, Json(outcome))
}
