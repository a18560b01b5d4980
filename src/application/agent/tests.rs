use super::*;
use crate::application::adapter::ToolAdapter;
use crate::application::client::{ChatClient, ClientConfig};
use crate::application::tooling::{RemoteToolInfo, RpcError, ToolBackend};
use crate::application::tracker::ChangeTracker;
use crate::domain::types::{ChatMessage, MessageRole};
use crate::infrastructure::model::{ModelError, ModelProvider, ModelRequest, ModelResponse};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
struct StubBackend {
    envelope: Value,
    fail_with: Option<String>,
}

impl StubBackend {
    fn returning(envelope: Value) -> Self {
        Self {
            envelope,
            fail_with: None,
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            envelope: Value::Null,
            fail_with: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl ToolBackend for StubBackend {
    async fn invoke_operation(
        &self,
        environment: &str,
        _operation: &str,
        _arguments: Value,
    ) -> Result<Value, RpcError> {
        if let Some(message) = &self.fail_with {
            return Err(RpcError::Remote {
                environment: environment.to_string(),
                code: -32000,
                message: message.clone(),
                data: None,
            });
        }
        Ok(self.envelope.clone())
    }

    async fn discover(&self, _environment: &str) -> Result<Vec<RemoteToolInfo>, RpcError> {
        Ok(Vec::new())
    }
}

#[derive(Clone)]
struct ScriptedProvider {
    responses: Arc<Mutex<Vec<String>>>,
    recordings: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(
                responses.into_iter().map(String::from).collect(),
            )),
            recordings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn requests(&self) -> Vec<ModelRequest> {
        self.recordings.lock().await.clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn chat(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
        let mut responses = self.responses.lock().await;
        let response = responses.remove(0);
        let mut recordings = self.recordings.lock().await;
        recordings.push(request.clone());
        Ok(ModelResponse {
            message: ChatMessage::new(MessageRole::Assistant, response),
            session_id: request.session_id,
        })
    }
}

fn build_agent<P: ModelProvider>(
    provider: P,
    backend: StubBackend,
) -> (Agent<P>, Arc<ChangeTracker>) {
    let client = Arc::new(ChatClient::new(provider, ClientConfig::new("test-model")));
    let adapter = Arc::new(ToolAdapter::new(Arc::new(backend)));
    let tracker = Arc::new(ChangeTracker::new());
    let agent = Agent::new(client, adapter, "sandbox", tracker.clone());
    (agent, tracker)
}

fn post_envelope(id: i64) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": format!(
                "{{\"id\": {id}, \"title\": \"T\", \"content\": \"C\", \"status\": \"draft\"}}"
            ),
        }],
    })
}

#[tokio::test]
async fn returns_final_response_without_tools() {
    let provider = ScriptedProvider::new(vec![r#"{"action":"final","response":"done"}"#]);
    let (agent, tracker) = build_agent(provider, StubBackend::returning(Value::Null));

    let outcome = agent
        .run("say done".into(), AgentOptions::default())
        .await
        .expect("run succeeds");

    assert_eq!(outcome.response, "done");
    assert!(outcome.steps.is_empty());
    assert_eq!(outcome.tracked, 0);
    assert_eq!(tracker.count(), 0);
}

#[tokio::test]
async fn executes_tool_then_tracks_change() {
    let provider = ScriptedProvider::new(vec![
        r#"{"action":"call_tool","tool":"create-post","input":{"title":"T","content":"C"}}"#,
        r#"{"action":"final","response":"created"}"#,
    ]);
    let (agent, tracker) = build_agent(provider.clone(), StubBackend::returning(post_envelope(7)));

    let outcome = agent
        .run("make a post".into(), AgentOptions::default())
        .await
        .expect("run succeeds");

    assert_eq!(outcome.response, "created");
    assert_eq!(outcome.steps.len(), 1);
    assert!(outcome.steps[0].success);
    assert_eq!(outcome.tracked, 1);
    assert_eq!(outcome.skipped, 0);

    let snapshot = tracker.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].operation, "create-post");
    assert_eq!(snapshot[0].result.as_ref().expect("result")["id"], 7);

    // system instructions advertise the catalogue on the first call only
    let requests = provider.requests().await;
    assert_eq!(requests.len(), 2);
    let system = &requests[0].messages[0];
    assert_eq!(system.role, MessageRole::System);
    assert!(system.content.contains("create-post"));
    assert!(system.content.contains("sandbox"));
}

#[tokio::test]
async fn failed_tool_step_is_fed_back_not_fatal() {
    let provider = ScriptedProvider::new(vec![
        r#"{"action":"call_tool","tool":"get-post","input":{"id":99}}"#,
        r#"{"action":"final","response":"that post does not exist"}"#,
    ]);
    let (agent, tracker) = build_agent(provider.clone(), StubBackend::failing("Post not found"));

    let outcome = agent
        .run("fetch post 99".into(), AgentOptions::default())
        .await
        .expect("run survives tool failure");

    assert_eq!(outcome.steps.len(), 1);
    assert!(!outcome.steps[0].success);
    assert!(
        outcome.steps[0]
            .message
            .as_deref()
            .expect("message")
            .contains("Post not found")
    );

    // the failure was reported back to the model as a tool_result
    let requests = provider.requests().await;
    let feedback = &requests[1].messages.last().expect("feedback").content;
    assert!(feedback.contains("\"success\":false"));

    // the failed call still passes argument validation, so it is tracked
    assert_eq!(tracker.count(), 1);
    assert!(tracker.snapshot()[0].result.is_none());
}

#[tokio::test]
async fn step_trace_is_recorded_even_when_the_run_fails() {
    let provider = ScriptedProvider::new(vec![
        r#"{"action":"call_tool","tool":"create-post","input":{"title":"T","content":"C"}}"#,
        "this is not an action",
    ]);
    let (agent, tracker) = build_agent(provider, StubBackend::returning(post_envelope(3)));

    let err = agent
        .run("make a post".into(), AgentOptions::default())
        .await
        .expect_err("second turn is unparseable");
    assert!(matches!(err, AgentError::InvalidResponse(_)));

    // the change from the successful first step is not lost
    assert_eq!(tracker.count(), 1);
}

#[tokio::test]
async fn enforces_the_hard_step_cap() {
    let call = r#"{"action":"call_tool","tool":"list-posts","input":{}}"#;
    let mut responses = vec![call; MAX_TOOL_STEPS + 1];
    responses.push(r#"{"action":"final","response":"never reached"}"#);
    let provider = ScriptedProvider::new(responses);
    let envelope = json!({
        "content": [{
            "type": "text",
            "text": "{\"posts\": [], \"total\": 0, \"page\": 1, \"per_page\": 10}",
        }],
    });
    let (agent, _tracker) = build_agent(provider, StubBackend::returning(envelope));

    let err = agent
        .run("loop forever".into(), AgentOptions::default())
        .await
        .expect_err("cap exceeded");
    assert!(matches!(err, AgentError::StepLimit(MAX_TOOL_STEPS)));
}

#[tokio::test]
async fn parses_fenced_and_embedded_json_actions() {
    let provider = ScriptedProvider::new(vec![
        "```json\n{\"action\":\"final\",\"response\":\"fenced\"}\n```",
    ]);
    let (agent, _tracker) = build_agent(provider, StubBackend::returning(Value::Null));
    let outcome = agent
        .run("hi".into(), AgentOptions::default())
        .await
        .expect("fenced JSON accepted");
    assert_eq!(outcome.response, "fenced");

    let provider = ScriptedProvider::new(vec![
        "Sure! {\"action\":\"final\",\"response\":\"embedded\"} Hope that helps.",
    ]);
    let (agent, _tracker) = build_agent(provider, StubBackend::returning(Value::Null));
    let outcome = agent
        .run("hi".into(), AgentOptions::default())
        .await
        .expect("embedded JSON accepted");
    assert_eq!(outcome.response, "embedded");
}

#[tokio::test]
async fn progress_channel_receives_steps_as_they_complete() {
    let provider = ScriptedProvider::new(vec![
        r#"{"action":"call_tool","tool":"create-post","input":{"title":"T","content":"C"}}"#,
        r#"{"action":"final","response":"done"}"#,
    ]);
    let (agent, _tracker) = build_agent(provider, StubBackend::returning(post_envelope(1)));

    let (tx, mut rx) = tokio::sync::mpsc::channel(4);
    let options = AgentOptions {
        progress: Some(tx),
        ..AgentOptions::default()
    };
    agent.run("go".into(), options).await.expect("run succeeds");

    let streamed = rx.recv().await.expect("one step streamed");
    assert_eq!(streamed.operation, "create-post");
    assert!(rx.recv().await.is_none());
}
