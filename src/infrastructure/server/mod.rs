mod dto;
mod routes;
mod state;

pub use dto::{
    AgentRunRequest, AgentRunResponse, ChangesResponse, ClearResponse, ErrorResponse,
    RemoteToolDto, SyncPreviewResponse, SyncRequest, ToolListResponse,
};
pub use state::ServerState;

use crate::application::agent::AgentStep;
use crate::domain::change::{ChangeOutcome, SyncOutcome, TrackedChange};
use crate::infrastructure::model::ModelProvider;
use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::agent::run_handler,
        routes::agent::stream_handler,
        routes::changes::changes_handler,
        routes::changes::clear_changes_handler,
        routes::sync::preview_handler,
        routes::sync::apply_handler,
        routes::tools::tools_handler
    ),
    components(
        schemas(
            AgentRunRequest,
            AgentRunResponse,
            ErrorResponse,
            ChangesResponse,
            ClearResponse,
            SyncRequest,
            SyncPreviewResponse,
            ToolListResponse,
            RemoteToolDto,
            AgentStep,
            TrackedChange,
            ChangeOutcome,
            SyncOutcome
        )
    ),
    tags(
        (name = "agent", description = "Agent runs against the sandbox environment"),
        (name = "changes", description = "Write operations tracked during agent runs"),
        (name = "sync", description = "Replay of tracked changes into the production environment"),
        (name = "tools", description = "Operations advertised by a remote registry")
    )
)]
struct ApiDoc;

pub async fn serve<P>(state: Arc<ServerState<P>>, addr: SocketAddr) -> Result<(), ServerError>
where
    P: ModelProvider + 'static,
{
    let api = ApiDoc::openapi();
    info!(%addr, "Binding REST server");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let app = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", api))
        .route("/agent/run", post(routes::agent::run_handler::<P>))
        .route("/agent/stream", post(routes::agent::stream_handler::<P>))
        .route(
            "/changes",
            get(routes::changes::changes_handler::<P>)
                .delete(routes::changes::clear_changes_handler::<P>),
        )
        .route("/sync/preview", get(routes::sync::preview_handler::<P>))
        .route("/sync", post(routes::sync::apply_handler::<P>))
        .route("/tools", get(routes::tools::tools_handler::<P>))
        .layer(cors)
        .with_state(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "REST server ready to accept connections");

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(ServerError::Serve)
}
