use super::directive::AgentDirective;
use super::errors::AgentError;
use super::models::{AgentOptions, AgentOutcome, AgentStep};
use super::runtime::ToolRuntime;
use crate::application::adapter::ToolAdapter;
use crate::application::client::{ChatClient, ChatRequest};
use crate::application::tracker::ChangeTracker;
use crate::infrastructure::model::ModelProvider;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ceiling against runaway agent loops. A hard cap, not a per-call option.
pub const MAX_TOOL_STEPS: usize = 10;

pub struct Agent<P: ModelProvider> {
    client: Arc<ChatClient<P>>,
    runtime: ToolRuntime,
    tracker: Arc<ChangeTracker>,
}

impl<P: ModelProvider> Agent<P> {
    pub fn new(
        client: Arc<ChatClient<P>>,
        adapter: Arc<ToolAdapter>,
        environment: impl Into<String>,
        tracker: Arc<ChangeTracker>,
    ) -> Self {
        Self {
            client,
            runtime: ToolRuntime::new(adapter, environment),
            tracker,
        }
    }

    /// Drives the bounded tool-use loop. Handing the step trace to the
    /// change tracker is a mandatory side effect of every run; on failure
    /// the steps executed before the error are still recorded.
    pub async fn run(
        &self,
        prompt: String,
        mut options: AgentOptions,
    ) -> Result<AgentOutcome, AgentError> {
        info!(environment = self.runtime.environment(), "Agent run started");
        let progress = options.progress.take();
        let mut steps = Vec::new();

        let result = self.drive(prompt, options, progress, &mut steps).await;
        let summary = self.tracker.record_run(&steps);
        debug!(
            tracked = summary.tracked,
            skipped = summary.skipped,
            "Handed step trace to change tracker"
        );

        match result {
            Ok((session_id, response)) => Ok(AgentOutcome {
                session_id,
                response,
                steps,
                tracked: summary.tracked,
                skipped: summary.skipped,
            }),
            Err(err) => Err(err),
        }
    }

    async fn drive(
        &self,
        prompt: String,
        options: AgentOptions,
        progress: Option<tokio::sync::mpsc::Sender<AgentStep>>,
        steps: &mut Vec<AgentStep>,
    ) -> Result<(String, String), AgentError> {
        let mut session_id = options.session_id.clone();
        let instructions = self.runtime.compose_system_instructions();
        let system_prompt = match options.system_prompt {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{existing}\n\n{instructions}")
            }
            _ => instructions,
        };

        let mut next_prompt = self.runtime.initial_user_prompt(prompt);
        let mut system_prompt_to_send = Some(system_prompt);
        let mut first_call = true;

        loop {
            debug!(
                session = session_id.as_deref(),
                executed_steps = steps.len(),
                "Submitting agent turn to model provider"
            );
            let request = ChatRequest {
                prompt: next_prompt.clone(),
                system_prompt: if first_call {
                    system_prompt_to_send.take()
                } else {
                    None
                },
                session_id: session_id.clone(),
            };

            let result = self.client.chat(request).await?;
            session_id = Some(result.session_id.clone());
            first_call = false;

            match self.runtime.parse_agent_action(&result.content)? {
                AgentDirective::Final { response } => {
                    info!(
                        session_id = result.session_id.as_str(),
                        "Agent returned final response"
                    );
                    return Ok((result.session_id, response));
                }
                AgentDirective::CallTool { tool, input } => {
                    if steps.len() >= MAX_TOOL_STEPS {
                        warn!("Agent exceeded the tool invocation ceiling");
                        return Err(AgentError::StepLimit(MAX_TOOL_STEPS));
                    }
                    info!(operation = %tool, "Agent requested tool execution");
                    let execution = self.runtime.execute(&tool, input).await;

                    let step = AgentStep {
                        operation: execution.operation.clone(),
                        input: execution.input.clone(),
                        success: execution.success,
                        output: execution.output.clone(),
                        message: execution.message.clone(),
                    };
                    if let Some(sender) = &progress {
                        let _ = sender.send(step.clone()).await;
                    }
                    steps.push(step);

                    next_prompt = json!({
                        "tool_result": {
                            "tool": execution.operation,
                            "input": execution.input,
                            "success": execution.success,
                            "output": execution.output,
                            "message": execution.message,
                        }
                    })
                    .to_string();
                }
            }
        }
    }
}
