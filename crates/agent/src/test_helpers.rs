//! Shared test doubles for the agent loop.

use async_trait::async_trait;
use serde_json::{Value, json};
use spotctl_config::AppConfig;
use spotctl_core::error::{MusicApiError, ProviderError};
use spotctl_core::message::{Message, MessageToolCall};
use spotctl_core::music::{ApiCall, Credentials, MusicService, TokenGrant};
use spotctl_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use spotctl_tools::{ExecutionConfig, ExecutionEngine, build_registry};
use std::sync::{Arc, Mutex};

/// A mock provider that replays scripted responses in order and records
/// every request. Running out of responses is a provider error.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len() - 1
        };
        self.responses
            .lock()
            .unwrap()
            .get(index)
            .cloned()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 500,
                message: format!("no scripted response for call #{index}"),
            })
    }
}

/// Answers every call with a small canned body.
#[derive(Default)]
pub struct StubMusicService {
    credentials: Mutex<Credentials>,
}

#[async_trait]
impl MusicService for StubMusicService {
    fn name(&self) -> &str {
        "stub"
    }

    fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.lock().unwrap() = credentials;
    }

    fn credentials(&self) -> Credentials {
        self.credentials.lock().unwrap().clone()
    }

    async fn call(&self, call: ApiCall) -> Result<Value, MusicApiError> {
        Ok(match call {
            ApiCall::Me => json!({"id": "user-1", "display_name": "Test User"}),
            _ => json!({"items": []}),
        })
    }

    async fn refresh_access_token(&self) -> Result<TokenGrant, MusicApiError> {
        Err(MusicApiError::MissingCredentials("no refresh token".into()))
    }
}

/// Engine over the full catalog with no retry delay.
pub fn engine() -> ExecutionEngine {
    let config = ExecutionConfig {
        retry_delay_ms: 0,
        contexts_dir: std::env::temp_dir().join("spotctl-agent-tests"),
        ..ExecutionConfig::default()
    };
    let registry = build_registry(&AppConfig::default()).unwrap();
    ExecutionEngine::new(config, Arc::new(registry), Arc::new(StubMusicService::default()))
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

/// Create a simple text response (no tool calls).
pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: usage(),
        model: "mock-model".into(),
    }
}

/// Create a response that requests tools.
pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tools("Calling tools.", tool_calls),
        usage: usage(),
        model: "mock-model".into(),
    }
}

pub fn tool_call(id: &str, name: &str, arguments: &str) -> MessageToolCall {
    MessageToolCall {
        id: id.into(),
        name: name.into(),
        arguments: arguments.into(),
    }
}
