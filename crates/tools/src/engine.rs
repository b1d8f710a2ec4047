//! Execution engine: resolves, throttles, routes and retries actions.
//!
//! ```text
//! name ──► registry ──► rate limiter ──► route ──► auth gate ──► handler
//!                                                      ▲            │
//!                                                      └── retry ◄──┘
//! ```
//!
//! Every outcome, including handler errors, comes back as an
//! [`ActionExecutionResult`]; nothing escapes [`ExecutionEngine::execute_action`].

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use spotctl_config::AppConfig;
use spotctl_core::action::ActionExecutionResult;
use spotctl_core::context::AIContext;
use spotctl_core::error::ActionError;
use spotctl_core::music::{Credentials, MusicService};
use spotctl_core::registry::ActionRegistry;
use spotctl_core::routing::{HandlerGroup, Route};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::handlers;
use crate::rate_limit::{Admission, RateLimitSnapshot, RateLimiter};

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    pub enable_rate_limit: bool,
    /// Attempts per action, the first one included.
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `retry_delay_ms * n` before the next.
    pub retry_delay_ms: u64,
    /// Log every attempt at `info` instead of `debug`.
    pub enable_logging: bool,
    /// Where `save_context` and `load_context` keep snapshots.
    pub contexts_dir: PathBuf,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            enable_rate_limit: true,
            max_retries: 3,
            retry_delay_ms: 1000,
            enable_logging: true,
            contexts_dir: AppConfig::contexts_dir(),
        }
    }
}

impl From<&AppConfig> for ExecutionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            enable_rate_limit: config.execution.enable_rate_limit,
            max_retries: config.execution.max_retries,
            retry_delay_ms: config.execution.retry_delay_ms,
            enable_logging: config.execution.enable_logging,
            contexts_dir: AppConfig::contexts_dir(),
        }
    }
}

/// Engine state visible to handlers (reported by `get_system_status`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub initialized: bool,
    pub service: String,
    pub config: ExecutionConfig,
    pub rate_limits: HashMap<String, RateLimitSnapshot>,
}

/// One attempt at one action.
pub struct ActionRequest<'a> {
    pub action: &'a str,
    pub parameters: Value,
    pub tool_call_id: Option<&'a str>,
    pub context: &'a mut AIContext,
    pub registry: &'a ActionRegistry,
    pub status: &'a EngineStatus,
}

/// Executes the actions of one handler group.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn group(&self) -> HandlerGroup;

    /// Run one attempt. `Err` values that are not retryable end the action
    /// immediately; `ExecutionFailed` and unsuccessful results are retried.
    async fn handle(&self, request: ActionRequest<'_>) -> Result<ActionExecutionResult, ActionError>;
}

pub struct ExecutionEngine {
    config: ExecutionConfig,
    registry: Arc<ActionRegistry>,
    music: Arc<dyn MusicService>,
    handlers: HashMap<HandlerGroup, Arc<dyn ActionHandler>>,
    limiter: RateLimiter,
    initialized: AtomicBool,
}

impl ExecutionEngine {
    pub fn new(config: ExecutionConfig, registry: Arc<ActionRegistry>, music: Arc<dyn MusicService>) -> Self {
        let handlers = handlers::default_handlers(music.clone(), config.contexts_dir.clone())
            .into_iter()
            .map(|h| (h.group(), h))
            .collect();

        Self {
            config,
            registry,
            music,
            handlers,
            limiter: RateLimiter::new(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Replace the handler for its group.
    pub fn with_handler(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.handlers.insert(handler.group(), handler);
        self
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Bind the session's credentials to the music service.
    ///
    /// Fails unless the context is authenticated and carries an access token.
    pub fn initialize(&self, context: &AIContext) -> Result<(), ActionError> {
        if !context.remote_auth.is_usable() {
            return Err(ActionError::AuthRequired(
                "session is not authenticated with Spotify; run `spotctl auth`".into(),
            ));
        }

        self.music.set_credentials(Credentials {
            access_token: context.remote_auth.access_token.clone(),
            refresh_token: context.remote_auth.refresh_token.clone(),
        });
        self.initialized.store(true, Ordering::SeqCst);
        self.log(format_args!("Execution engine initialized"));
        Ok(())
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            initialized: self.is_initialized(),
            service: self.music.name().to_string(),
            config: self.config.clone(),
            rate_limits: self.limiter.snapshot(),
        }
    }

    /// Calls counted against `action` in its current rate window.
    pub fn rate_limit_calls(&self, action: &str) -> Option<u32> {
        self.limiter.calls(action)
    }

    /// Resolve, throttle, route and run `name` with retries.
    pub async fn execute_action(
        &self,
        name: &str,
        context: &mut AIContext,
        parameters: Value,
        tool_call_id: Option<&str>,
    ) -> ActionExecutionResult {
        let Some(definition) = self.registry.get(name) else {
            debug!(action = %name, "Action not found");
            return ActionError::NotFound(name.to_string()).into();
        };

        if self.config.enable_rate_limit {
            if let Some(policy) = &definition.rate_limit {
                if let Admission::Denied { retry_after_ms } = self.limiter.check(name, policy) {
                    warn!(action = %name, retry_after_ms, "Rate limit exceeded");
                    return ActionError::RateLimited {
                        action: name.to_string(),
                        retry_after_ms,
                    }
                    .into();
                }
            }
        }

        let group = match self.registry.route(name) {
            Some(Route::Handler(group)) => group,
            Some(Route::Generic) => {
                return ActionExecutionResult::failure(format!(
                    "{}: generic execution not implemented",
                    ActionError::UnknownCategory(name.to_string())
                ));
            }
            Some(Route::Unmatched) | None => return ActionError::UnknownCategory(name.to_string()).into(),
        };

        let Some(handler) = self.handlers.get(&group).cloned() else {
            return ActionError::UnknownAction {
                group: group.to_string(),
                action: name.to_string(),
            }
            .into();
        };

        if group.is_remote() {
            if !self.is_initialized() {
                return ActionError::AuthRequired("execution engine has not been initialized".into()).into();
            }
            if !context.remote_auth.is_usable() {
                return ActionError::AuthRequired("session is not authenticated with Spotify".into()).into();
            }
        }

        let max_attempts = self.config.max_retries.max(1);
        let mut last_error = String::new();
        let mut retry_after_ms = None;

        for attempt in 1..=max_attempts {
            self.log(format_args!("Executing action '{name}' (attempt {attempt}/{max_attempts})"));

            let status = self.status();
            let outcome = handler
                .handle(ActionRequest {
                    action: name,
                    parameters: parameters.clone(),
                    tool_call_id,
                    context: &mut *context,
                    registry: &self.registry,
                    status: &status,
                })
                .await;

            match outcome {
                Ok(result) if result.success => {
                    if let Some(policy) = &definition.rate_limit {
                        self.limiter.charge(name, policy);
                    }
                    self.log(format_args!("Action '{name}' succeeded on attempt {attempt}"));
                    return result.for_action(name);
                }
                Ok(result) => {
                    last_error = result.error.unwrap_or_else(|| "unknown error".into());
                    retry_after_ms = None;
                }
                Err(err) if err.is_retryable() => {
                    last_error = err.to_string();
                    retry_after_ms = err.retry_after_ms();
                }
                Err(err) => {
                    debug!(action = %name, error = %err, "Action failed without retry");
                    return ActionExecutionResult::from(err).for_action(name);
                }
            }

            warn!(action = %name, attempt, error = %last_error, "Action attempt failed");
            if attempt < max_attempts {
                // The server's Retry-After wins over a shorter backoff.
                let backoff = self.config.retry_delay_ms * u64::from(attempt);
                let delay = retry_after_ms.map_or(backoff, |hint: u64| hint.max(backoff));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
        }

        let failure = ActionExecutionResult::failure(format!(
            "Action '{name}' failed after {max_attempts} attempts. Last error: {last_error}"
        ))
        .for_action(name);
        match retry_after_ms {
            Some(ms) => failure.with_metadata("retryAfterMs", ms),
            None => failure,
        }
    }

    fn log(&self, message: std::fmt::Arguments<'_>) {
        if self.config.enable_logging {
            info!("{message}");
        } else {
            debug!("{message}");
        }
    }
}
