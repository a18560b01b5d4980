use super::super::dto::{AgentRunRequest, AgentRunResponse, ErrorResponse};
use super::super::state::ServerState;
use crate::application::agent::{Agent, AgentOptions, AgentStep};
use crate::infrastructure::model::ModelProvider;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

#[utoipa::path(
    post,
    path = "/agent/run",
    tag = "agent",
    request_body = AgentRunRequest,
    responses(
        (status = 200, description = "Agent run completed", body = AgentRunResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 502, description = "Model provider unavailable or run failed", body = ErrorResponse)
    )
)]
pub async fn run_handler<P: ModelProvider + 'static>(
    State(state): State<Arc<ServerState<P>>>,
    Json(payload): Json<AgentRunRequest>,
) -> Result<Json<AgentRunResponse>, (StatusCode, Json<ErrorResponse>)> {
    let environment = payload
        .environment
        .unwrap_or_else(|| state.agent_environment().to_string());
    info!(
        environment = environment.as_str(),
        session = payload.session_id.as_deref(),
        "Received /agent/run request"
    );

    if payload.prompt.trim().is_empty() {
        error!("Rejecting /agent/run request due to empty prompt");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "prompt cannot be empty".to_string(),
            }),
        ));
    }

    let agent = Agent::new(
        state.client(),
        state.adapter(),
        environment,
        state.tracker(),
    );
    let options = AgentOptions {
        session_id: payload.session_id,
        system_prompt: payload.system_prompt,
        progress: None,
    };

    match agent.run(payload.prompt, options).await {
        Ok(outcome) => {
            info!(
                session_id = outcome.session_id.as_str(),
                tracked = outcome.tracked,
                "Agent run completed successfully"
            );
            Ok(Json(AgentRunResponse {
                session_id: outcome.session_id,
                content: outcome.response,
                tool_steps: outcome.steps,
                tracked: outcome.tracked,
                skipped: outcome.skipped,
            }))
        }
        Err(err) => {
            error!(%err, "Agent run failed");
            Err((
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: err.to_string(),
                }),
            ))
        }
    }
}

#[utoipa::path(
    post,
    path = "/agent/stream",
    tag = "agent",
    request_body = AgentRunRequest,
    responses(
        (status = 200, description = "SSE stream of step events followed by a final or error event"),
        (status = 400, description = "Invalid request", body = ErrorResponse)
    )
)]
pub async fn stream_handler<P: ModelProvider + 'static>(
    State(state): State<Arc<ServerState<P>>>,
    Json(payload): Json<AgentRunRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<ErrorResponse>)> {
    if payload.prompt.trim().is_empty() {
        error!("Rejecting /agent/stream request due to empty prompt");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "prompt cannot be empty".to_string(),
            }),
        ));
    }

    let (event_tx, event_rx) = mpsc::channel::<Event>(16);
    let (step_tx, mut step_rx) = mpsc::channel::<AgentStep>(16);

    let forward_tx = event_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(step) = step_rx.recv().await {
            match Event::default().event("step").json_data(&step) {
                Ok(event) => {
                    if forward_tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(err) => error!(%err, "Failed to encode step event"),
            }
        }
    });

    tokio::spawn(async move {
        let environment = payload
            .environment
            .unwrap_or_else(|| state.agent_environment().to_string());
        let agent = Agent::new(
            state.client(),
            state.adapter(),
            environment,
            state.tracker(),
        );
        let options = AgentOptions {
            session_id: payload.session_id,
            system_prompt: payload.system_prompt,
            progress: Some(step_tx),
        };

        let result = agent.run(payload.prompt, options).await;
        // the step sender was moved into the run; the forwarder drains what
        // is left before the closing event goes out
        let _ = forwarder.await;

        let closing = match result {
            Ok(outcome) => Event::default().event("final").json_data(&AgentRunResponse {
                session_id: outcome.session_id,
                content: outcome.response,
                tool_steps: outcome.steps,
                tracked: outcome.tracked,
                skipped: outcome.skipped,
            }),
            Err(err) => Event::default().event("error").json_data(&ErrorResponse {
                error: err.to_string(),
            }),
        };
        match closing {
            Ok(event) => {
                let _ = event_tx.send(event).await;
            }
            Err(err) => error!(%err, "Failed to encode closing event"),
        }
    });

    Ok(Sse::new(ReceiverStream::new(event_rx).map(Ok)).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::adapter::ToolAdapter;
    use crate::application::client::{ChatClient, ClientConfig};
    use crate::application::tooling::{ConnectionManager, RemoteToolInfo, RpcError, ToolBackend};
    use crate::application::tracker::ChangeTracker;
    use crate::domain::types::{ChatMessage, MessageRole};
    use crate::infrastructure::model::{ModelError, ModelRequest, ModelResponse};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashMap;

    struct FinalOnlyProvider;

    #[async_trait]
    impl ModelProvider for FinalOnlyProvider {
        async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
            Ok(ModelResponse {
                message: ChatMessage::new(
                    MessageRole::Assistant,
                    r#"{"action":"final","response":"ok"}"#,
                ),
                session_id: request.session_id,
            })
        }
    }

    struct NullBackend;

    #[async_trait]
    impl ToolBackend for NullBackend {
        async fn invoke_operation(
            &self,
            _environment: &str,
            _operation: &str,
            _arguments: Value,
        ) -> Result<Value, RpcError> {
            Ok(Value::Null)
        }

        async fn discover(&self, _environment: &str) -> Result<Vec<RemoteToolInfo>, RpcError> {
            Ok(Vec::new())
        }
    }

    fn test_state() -> Arc<ServerState<FinalOnlyProvider>> {
        let client = Arc::new(ChatClient::new(
            FinalOnlyProvider,
            ClientConfig::new("test-model"),
        ));
        let adapter = Arc::new(ToolAdapter::new(Arc::new(NullBackend)));
        let connections = Arc::new(ConnectionManager::new(HashMap::new()));
        let tracker = Arc::new(ChangeTracker::new());
        Arc::new(ServerState::new(
            client,
            adapter,
            connections,
            tracker,
            "sandbox",
            "production",
        ))
    }

    fn request_with_prompt(prompt: &str) -> AgentRunRequest {
        AgentRunRequest {
            prompt: prompt.to_string(),
            environment: None,
            session_id: None,
            system_prompt: None,
        }
    }

    #[tokio::test]
    async fn run_rejects_an_empty_prompt() {
        let (status, Json(body)) = run_handler(State(test_state()), Json(request_with_prompt("  ")))
            .await
            .expect_err("empty prompt is rejected");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "prompt cannot be empty");
    }

    #[tokio::test]
    async fn stream_rejects_an_empty_prompt_before_upgrading() {
        let result = stream_handler(State(test_state()), Json(request_with_prompt(""))).await;
        let (status, Json(body)) = match result {
            Ok(_) => panic!("empty prompt must not open a stream"),
            Err(rejection) => rejection,
        };
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "prompt cannot be empty");
    }
}
