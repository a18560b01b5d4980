use super::super::dto::{ChangesResponse, ClearResponse};
use super::super::state::ServerState;
use crate::infrastructure::model::ModelProvider;
use axum::Json;
use axum::extract::State;
use std::sync::Arc;
use tracing::info;

#[utoipa::path(
    get,
    path = "/changes",
    tag = "changes",
    responses(
        (status = 200, description = "Tracked changes in recorded order", body = ChangesResponse)
    )
)]
pub async fn changes_handler<P: ModelProvider + 'static>(
    State(state): State<Arc<ServerState<P>>>,
) -> Json<ChangesResponse> {
    let tracker = state.tracker();
    Json(ChangesResponse {
        count: tracker.count(),
        skipped: tracker.skipped(),
        changes: tracker.snapshot(),
    })
}

#[utoipa::path(
    delete,
    path = "/changes",
    tag = "changes",
    responses(
        (status = 200, description = "Tracker cleared", body = ClearResponse)
    )
)]
pub async fn clear_changes_handler<P: ModelProvider + 'static>(
    State(state): State<Arc<ServerState<P>>>,
) -> Json<ClearResponse> {
    let tracker = state.tracker();
    let cleared = tracker.count();
    tracker.clear();
    info!(cleared, "Tracker cleared via /changes");
    Json(ClearResponse { cleared })
}
