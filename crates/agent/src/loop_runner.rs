//! The agent reasoning loop implementation.

use chrono::Utc;
use serde_json::{Value, json};
use spotctl_config::AgentSettings;
use spotctl_core::action::ActionExecutionResult;
use spotctl_core::context::{AIContext, MessageRole, ToolCall, ToolResult};
use spotctl_core::error::{ContextError, ProviderError};
use spotctl_core::message::{Message, MessageToolCall};
use spotctl_core::provider::{Provider, ProviderRequest, ToolDefinition, Usage};
use spotctl_tools::ExecutionEngine;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::ContextManager;
use crate::selection::ToolSelection;
use crate::stream_event::AgentStreamEvent;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a music assistant with access to the user's Spotify account. \
Use the available tools to look up, create and change playlists, tracks and follows. \
Ask before making large changes and summarize what you did.";

/// Outcome of one prompt cycle. The conversation itself lives in the
/// [`ContextManager`] that was passed in.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<ToolResult>,
    /// Model round-trips made
    pub steps: u32,
    pub usage: Option<Usage>,
}

#[derive(Default)]
struct StepOutput {
    content: String,
    tool_calls: Vec<MessageToolCall>,
    usage: Option<Usage>,
}

/// Drives prompt → tool calls → tool results → next step until the model
/// answers without calling tools or the step budget runs out.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    engine: Arc<ExecutionEngine>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_steps: u32,
    system_prompt: String,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, engine: Arc<ExecutionEngine>, model: impl Into<String>) -> Self {
        Self {
            provider,
            engine,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            max_steps: 5,
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
        }
    }

    /// Apply the `[agent]` section of the config.
    pub fn with_settings(mut self, settings: &AgentSettings) -> Self {
        self.temperature = settings.temperature;
        self.max_tokens = Some(settings.max_tokens);
        self.max_steps = settings.max_steps;
        if let Some(prompt) = &settings.system_prompt {
            self.system_prompt = prompt.clone();
        }
        self
    }

    pub fn with_max_steps(mut self, max: u32) -> Self {
        self.max_steps = max;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    /// Run one prompt to completion and record it in `manager`.
    pub async fn execute_prompt(
        &self,
        prompt: &str,
        manager: &mut ContextManager,
        selection: &ToolSelection,
    ) -> spotctl_core::Result<AgentResponse> {
        self.run(prompt, manager, selection, None).await
    }

    /// Stream one prompt. The returned receiver yields text deltas as they
    /// arrive, then every tool call, then every tool result, and always ends
    /// with [`AgentStreamEvent::Finish`] carrying the updated context.
    pub fn stream_prompt(
        self: &Arc<Self>,
        prompt: impl Into<String>,
        manager: ContextManager,
        selection: ToolSelection,
    ) -> mpsc::Receiver<AgentStreamEvent> {
        let (tx, rx) = mpsc::channel(64);
        let this = Arc::clone(self);
        let prompt = prompt.into();

        tokio::spawn(async move {
            let mut manager = manager;
            let outcome = this.run(&prompt, &mut manager, &selection, Some(&tx)).await;

            let (steps, usage) = match outcome {
                Ok(response) => {
                    for call in response.tool_calls {
                        let _ = tx.send(AgentStreamEvent::ToolCall { call }).await;
                    }
                    for result in response.tool_results {
                        let _ = tx.send(AgentStreamEvent::ToolResult { result }).await;
                    }
                    (response.steps, response.usage)
                }
                Err(e) => {
                    warn!(error = %e, "Streamed prompt failed");
                    let _ = tx.send(AgentStreamEvent::Error { message: e.to_string() }).await;
                    (0, None)
                }
            };

            let _ = tx
                .send(AgentStreamEvent::Finish {
                    context: Box::new(manager.into_context()),
                    steps,
                    usage,
                })
                .await;
        });

        rx
    }

    async fn run(
        &self,
        prompt: &str,
        manager: &mut ContextManager,
        selection: &ToolSelection,
        deltas: Option<&mpsc::Sender<AgentStreamEvent>>,
    ) -> spotctl_core::Result<AgentResponse> {
        self.ensure_initialized(manager.context());

        let tools = selection.tool_definitions(self.engine.registry());
        let mut messages = self.history_messages(manager.context());
        manager.add_message(MessageRole::User, prompt);
        messages.push(Message::user(prompt));

        info!(
            session_id = %manager.session_id(),
            tools = tools.len(),
            streaming = deltas.is_some(),
            "Processing prompt"
        );

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut tool_results = Vec::new();
        let mut usage = None;
        let mut steps = 0;

        loop {
            if steps >= self.max_steps {
                warn!(steps, "Max steps reached with tool calls pending");
                break;
            }
            steps += 1;
            debug!(step = steps, "Agent loop step");

            let request = self.request(messages.clone(), tools.clone(), deltas.is_some());
            let step = match deltas {
                Some(tx) => self.stream_step(request, tx).await,
                None => self.complete_step(request).await,
            };
            let output = match step {
                Ok(output) => output,
                Err(e) => {
                    // Tools that already ran have side effects; keep their records.
                    if !tool_calls.is_empty() {
                        warn!(error = %e, tool_calls = tool_calls.len(), "Model call failed after tools ran");
                        record_turn(manager, &text, &tool_calls, &tool_results)?;
                    }
                    return Err(e.into());
                }
            };
            usage = add_usage(usage, output.usage);
            text.push_str(&output.content);

            if output.tool_calls.is_empty() {
                break;
            }

            debug!(tool_count = output.tool_calls.len(), "Executing tool calls");
            messages.push(Message::assistant_with_tools(output.content, output.tool_calls.clone()));

            // Sequential on purpose: handlers may mutate the session.
            for requested in &output.tool_calls {
                let (call, result) = self.dispatch(requested, manager).await;
                messages.push(Message::tool_result(&requested.id, render_result(&result)));
                tool_calls.push(call);
                tool_results.push(ToolResult {
                    tool_call_id: requested.id.clone(),
                    result: result.data.unwrap_or(Value::Null),
                    success: result.success,
                    error: result.error,
                    timestamp: Utc::now(),
                });
            }
        }

        record_turn(manager, &text, &tool_calls, &tool_results)?;

        info!(steps, tool_calls = tool_calls.len(), "Prompt finished");
        Ok(AgentResponse {
            text,
            tool_calls,
            tool_results,
            steps,
            usage,
        })
    }

    /// Remote actions need an initialized engine; sessions without usable
    /// credentials can still run system actions.
    fn ensure_initialized(&self, context: &AIContext) {
        if self.engine.is_initialized() || !context.remote_auth.is_usable() {
            return;
        }
        if let Err(e) = self.engine.initialize(context) {
            warn!(error = %e, "Engine initialization failed");
        }
    }

    /// System prompt followed by the text of earlier turns.
    fn history_messages(&self, context: &AIContext) -> Vec<Message> {
        let mut messages = vec![Message::system(&self.system_prompt)];
        messages.extend(context.conversation_history.iter().map(|m| match m.role {
            MessageRole::User => Message::user(&m.content),
            MessageRole::Assistant => Message::assistant(&m.content),
            MessageRole::System => Message::system(&m.content),
        }));
        messages
    }

    fn request(&self, messages: Vec<Message>, tools: Vec<ToolDefinition>, stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools,
            stream,
        }
    }

    async fn complete_step(&self, request: ProviderRequest) -> Result<StepOutput, ProviderError> {
        let response = self.provider.complete(request).await?;
        Ok(StepOutput {
            content: response.message.content,
            tool_calls: response.message.tool_calls,
            usage: response.usage,
        })
    }

    async fn stream_step(
        &self,
        request: ProviderRequest,
        tx: &mpsc::Sender<AgentStreamEvent>,
    ) -> Result<StepOutput, ProviderError> {
        let mut chunks = self.provider.stream(request).await?;
        let mut output = StepOutput::default();

        while let Some(chunk) = chunks.recv().await {
            let chunk = chunk?;
            if let Some(delta) = chunk.content.filter(|c| !c.is_empty()) {
                output.content.push_str(&delta);
                let _ = tx.send(AgentStreamEvent::Text { content: delta }).await;
            }
            output.tool_calls.extend(chunk.tool_calls);
            if chunk.usage.is_some() {
                output.usage = chunk.usage;
            }
            if chunk.done {
                break;
            }
        }
        Ok(output)
    }

    async fn dispatch(
        &self,
        requested: &MessageToolCall,
        manager: &mut ContextManager,
    ) -> (ToolCall, ActionExecutionResult) {
        let arguments = if requested.arguments.trim().is_empty() {
            Ok(json!({}))
        } else {
            serde_json::from_str::<Value>(&requested.arguments)
        };

        let call = ToolCall {
            id: requested.id.clone(),
            name: requested.name.clone(),
            parameters: arguments
                .as_ref()
                .ok()
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            timestamp: Utc::now(),
        };

        let result = match arguments {
            Ok(parameters) => {
                self.engine
                    .execute_action(&requested.name, manager.context_mut(), parameters, Some(&requested.id))
                    .await
            }
            Err(e) => ActionExecutionResult::failure(format!(
                "Invalid arguments for '{}': {e}",
                requested.name
            )),
        };
        manager.touch();

        info!(tool = %requested.name, success = result.success, "Tool executed");
        (call, result)
    }
}

/// Append the assistant turn and attach the tool records made during it.
fn record_turn(
    manager: &mut ContextManager,
    text: &str,
    tool_calls: &[ToolCall],
    tool_results: &[ToolResult],
) -> Result<(), ContextError> {
    manager.add_message(MessageRole::Assistant, text);
    if !tool_calls.is_empty() {
        manager.add_tool_calls(tool_calls.to_vec())?;
        manager.add_tool_results(tool_results.to_vec())?;
    }
    Ok(())
}

fn render_result(result: &ActionExecutionResult) -> String {
    serde_json::to_string(result).unwrap_or_else(|e| format!(r#"{{"success":false,"error":"{e}"}}"#))
}

fn add_usage(total: Option<Usage>, step: Option<Usage>) -> Option<Usage> {
    match (total, step) {
        (Some(a), Some(b)) => Some(Usage {
            prompt_tokens: a.prompt_tokens + b.prompt_tokens,
            completion_tokens: a.completion_tokens + b.completion_tokens,
            total_tokens: a.total_tokens + b.total_tokens,
        }),
        (a, b) => a.or(b),
    }
}
