//! Local actions: introspection, session context and token refresh.
//!
//! Except for the connection check and token refresh these never touch the
//! remote service, so they run without an authenticated session.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use spotctl_core::action::{ActionCategory, ActionDefinition, ActionExecutionResult};
use spotctl_core::context::AIContext;
use spotctl_core::error::{ActionError, MusicApiError};
use spotctl_core::music::{ApiCall, MusicService};
use spotctl_core::registry::ActionRegistry;
use spotctl_core::routing::HandlerGroup;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::{remote_error, to_data, unknown_action};
use crate::engine::{ActionHandler, ActionRequest};
use crate::params::{
    AvailableToolsParams, ExecuteCommandParams, GetContextParams, HelpParams, LoadContextParams, NoParams,
    SaveContextParams, parse,
};

pub struct SystemHandler {
    music: Arc<dyn MusicService>,
    contexts_dir: PathBuf,
}

fn describe(def: &ActionDefinition) -> Value {
    json!({
        "name": def.name,
        "description": def.description,
        "category": def.category,
        "permissions": def.permissions,
    })
}

impl SystemHandler {
    pub fn new(music: Arc<dyn MusicService>, contexts_dir: PathBuf) -> Self {
        Self { music, contexts_dir }
    }

    async fn connection_status(&self, action: &str) -> Result<ActionExecutionResult, ActionError> {
        let credentials = self.music.credentials();
        let has_access_token = credentials.access_token.is_some();
        let has_refresh_token = credentials.refresh_token.is_some();

        let (connected, profile, error) = if has_access_token {
            match self.music.call(ApiCall::Me).await {
                Ok(profile) => (true, profile, None),
                Err(MusicApiError::Unauthorized(msg)) => (false, Value::Null, Some(msg)),
                Err(e) => return Err(remote_error(action, e)),
            }
        } else {
            (false, Value::Null, None)
        };

        Ok(ActionExecutionResult::ok(json!({
            "connected": connected,
            "hasAccessToken": has_access_token,
            "hasRefreshToken": has_refresh_token,
            "userProfile": profile,
            "error": error,
        })))
    }

    async fn refresh_token(&self, action: &str, context: &mut AIContext) -> Result<ActionExecutionResult, ActionError> {
        let mut credentials = self.music.credentials();
        if credentials.refresh_token.is_none() {
            credentials.refresh_token = context.remote_auth.refresh_token.clone();
            if credentials.refresh_token.is_none() {
                return Err(ActionError::AuthRequired("No refresh token available".into()));
            }
            self.music.set_credentials(credentials);
        }

        let grant = self
            .music
            .refresh_access_token()
            .await
            .map_err(|e| remote_error(action, e))?;

        context.remote_auth.access_token = Some(grant.access_token);
        if let Some(refresh) = grant.refresh_token {
            context.remote_auth.refresh_token = Some(refresh);
        }
        context.remote_auth.is_authenticated = true;
        context.session.last_activity = Utc::now();
        info!(expires_in = grant.expires_in, "Access token refreshed");

        Ok(ActionExecutionResult::ok(json!({
            "refreshed": true,
            "expiresIn": grant.expires_in,
        })))
    }

    async fn save_context(&self, action: &str, p: SaveContextParams, context: &AIContext) -> Result<ActionExecutionResult, ActionError> {
        let filename = p
            .filename
            .unwrap_or_else(|| format!("context-{}.json", context.session.session_id));
        let path = self.contexts_dir.join(&filename);
        let failed = |reason: String| ActionError::ExecutionFailed {
            action: action.to_string(),
            reason,
        };

        let body = serde_json::to_string_pretty(context).map_err(|e| failed(e.to_string()))?;
        tokio::fs::create_dir_all(&self.contexts_dir)
            .await
            .map_err(|e| failed(format!("cannot create {}: {e}", self.contexts_dir.display())))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| failed(format!("cannot write {}: {e}", path.display())))?;
        info!(path = %path.display(), "Context saved");

        Ok(ActionExecutionResult::ok(json!({
            "saved": true,
            "filename": filename,
            "path": path.display().to_string(),
        })))
    }

    /// Replace session and history with a saved snapshot.
    ///
    /// The live credentials are kept; a snapshot is validated in full before
    /// anything is applied.
    async fn load_context(&self, action: &str, p: LoadContextParams, context: &mut AIContext) -> Result<ActionExecutionResult, ActionError> {
        let path = self.contexts_dir.join(&p.filename);
        let invalid = |reason: String| ActionError::InvalidParameters {
            action: action.to_string(),
            reason,
        };

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| invalid(format!("cannot read {}: {e}", path.display())))?;
        let loaded: AIContext = serde_json::from_str(&raw).map_err(|e| invalid(format!("malformed context: {e}")))?;
        loaded.validate().map_err(|e| invalid(e.to_string()))?;

        let messages = loaded.conversation_history.len();
        let session_id = loaded.session.session_id.clone();
        let auth = std::mem::take(&mut context.remote_auth);
        *context = loaded;
        context.remote_auth = auth;
        info!(path = %path.display(), messages, "Context loaded");

        Ok(ActionExecutionResult::ok(json!({
            "loaded": true,
            "filename": p.filename,
            "sessionId": session_id,
            "messageCount": messages,
        })))
    }

    fn help(&self, registry: &ActionRegistry, p: HelpParams) -> Result<ActionExecutionResult, ActionError> {
        let Some(topic) = p.topic.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) else {
            let actions: Vec<Value> = registry
                .get_all()
                .into_iter()
                .map(|def| {
                    json!({
                        "name": def.name,
                        "description": def.description,
                        "category": def.category,
                    })
                })
                .collect();
            return Ok(ActionExecutionResult::ok(json!({
                "availableActions": actions,
                "categories": ActionCategory::ALL,
                "usage": "Ask in plain language, e.g. \"like every song in my Road Trip playlist\". \
                          Use get_help with an action name or category for details.",
            })));
        };

        if let Some(def) = registry.get(&topic) {
            return Ok(ActionExecutionResult::ok(json!({
                "action": describe(def),
                "parameters": def.parameters,
            }))
            .with_metadata("targetAction", topic));
        }

        if let Ok(category) = topic.parse::<ActionCategory>() {
            let actions: Vec<Value> = registry.get_by_category(category).into_iter().map(describe).collect();
            return Ok(ActionExecutionResult::ok(json!({
                "category": category,
                "actions": actions,
            })));
        }

        Err(ActionError::NotFound(topic))
    }
}

#[async_trait]
impl ActionHandler for SystemHandler {
    fn group(&self) -> HandlerGroup {
        HandlerGroup::System
    }

    async fn handle(&self, request: ActionRequest<'_>) -> Result<ActionExecutionResult, ActionError> {
        let ActionRequest {
            action,
            parameters: params,
            context,
            registry,
            status,
            ..
        } = request;

        match action {
            "get_available_tools" => {
                let p: AvailableToolsParams = parse(action, params)?;
                let defs = match p.category {
                    Some(category) => registry.get_by_category(category),
                    None => registry.get_all(),
                };
                let tools: Vec<Value> = defs.into_iter().map(describe).collect();
                let count = tools.len();
                Ok(ActionExecutionResult::ok(json!({ "tools": tools, "count": count })))
            }
            "get_system_status" => {
                parse::<NoParams>(action, params)?;
                Ok(ActionExecutionResult::ok(json!({
                    "status": "operational",
                    "timestamp": Utc::now(),
                    "engine": to_data(action, status)?,
                    "registry": to_data(action, &registry.get_stats())?,
                })))
            }
            "get_spotify_connection_status" => self.connection_status(action).await,
            "refresh_spotify_token" => self.refresh_token(action, context).await,
            "get_context" => {
                let p: GetContextParams = parse(action, params)?;
                let ctx = &*context;
                let mut data = json!({
                    "session": ctx.session,
                    "spotify": {
                        "isAuthenticated": ctx.remote_auth.is_authenticated,
                        "hasAccessToken": ctx.remote_auth.access_token.is_some(),
                        "hasRefreshToken": ctx.remote_auth.refresh_token.is_some(),
                        "userId": ctx.remote_auth.user_id,
                    },
                    "messageCount": ctx.conversation_history.len(),
                });
                if p.include_history {
                    data["conversationHistory"] = to_data(action, &ctx.conversation_history)?;
                }
                Ok(ActionExecutionResult::ok(data))
            }
            "clear_context" => {
                let cleared = context.conversation_history.len();
                context.conversation_history.clear();
                context.session.metadata.clear();
                context.session.last_activity = Utc::now();
                Ok(ActionExecutionResult::ok(json!({ "cleared": true, "messagesRemoved": cleared })))
            }
            "save_context" => self.save_context(action, parse(action, params)?, context).await,
            "load_context" => self.load_context(action, parse(action, params)?, context).await,
            "get_help" => self.help(registry, parse(action, params)?),
            "execute_command" => {
                let p: ExecuteCommandParams = parse(action, params)?;
                warn!(command = %p.command, args = ?p.args, "Refused raw command execution");
                Err(ActionError::Unsupported {
                    action: action.to_string(),
                    reason: "direct command execution is disabled".into(),
                })
            }
            _ => Err(unknown_action(self.group(), action)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::test_helpers::{FakeMusicService, run_handler};
    use spotctl_config::AppConfig;
    use spotctl_core::context::{ConversationMessage, MessageRole, RemoteAuth};

    fn registry() -> ActionRegistry {
        catalog::build_registry(&AppConfig::default()).unwrap()
    }

    fn handler(dir: &std::path::Path) -> SystemHandler {
        SystemHandler::new(Arc::new(FakeMusicService::new()), dir.to_path_buf())
    }

    #[tokio::test]
    async fn available_tools_filters_by_category() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry();
        let mut ctx = AIContext::default();

        let all = run_handler(&handler(tmp.path()), "get_available_tools", json!({}), &mut ctx, &registry)
            .await
            .unwrap();
        assert_eq!(all.data.unwrap()["count"], registry.len());

        let search = run_handler(
            &handler(tmp.path()),
            "get_available_tools",
            json!({"category": "search"}),
            &mut ctx,
            &registry,
        )
        .await
        .unwrap();
        let data = search.data.unwrap();
        assert_eq!(data["count"], 6);
        assert!(data["tools"].as_array().unwrap().iter().all(|t| t["category"] == "search"));
    }

    #[tokio::test]
    async fn save_then_load_restores_history_but_keeps_live_auth() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry();
        let h = handler(tmp.path());

        let mut saved = AIContext::default();
        saved
            .conversation_history
            .push(ConversationMessage::new(MessageRole::User, "hello"));
        run_handler(&h, "save_context", json!({"filename": "s.json"}), &mut saved, &registry)
            .await
            .unwrap();

        let mut live = AIContext::new(RemoteAuth {
            access_token: Some("live".into()),
            refresh_token: None,
            user_id: None,
            is_authenticated: true,
        });
        let result = run_handler(&h, "load_context", json!({"filename": "s.json"}), &mut live, &registry)
            .await
            .unwrap();

        assert_eq!(result.data.unwrap()["messageCount"], 1);
        assert_eq!(live.session.session_id, saved.session.session_id);
        assert_eq!(live.conversation_history, saved.conversation_history);
        assert_eq!(live.remote_auth.access_token.as_deref(), Some("live"));
    }

    #[tokio::test]
    async fn malformed_snapshot_is_rejected_without_changes() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("bad.json"), "{\"session\": 1}").unwrap();
        let registry = registry();
        let mut ctx = AIContext::default();
        let before = ctx.clone();

        let err = run_handler(&handler(tmp.path()), "load_context", json!({"filename": "bad.json"}), &mut ctx, &registry)
            .await
            .unwrap_err();

        assert!(matches!(err, ActionError::InvalidParameters { .. }));
        assert_eq!(ctx, before);
    }

    #[tokio::test]
    async fn clear_context_empties_history_and_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry();
        let mut ctx = AIContext::default();
        ctx.conversation_history
            .push(ConversationMessage::new(MessageRole::User, "hi"));
        ctx.session.metadata.insert("k".into(), json!("v"));

        run_handler(&handler(tmp.path()), "clear_context", json!({}), &mut ctx, &registry)
            .await
            .unwrap();

        assert!(ctx.conversation_history.is_empty());
        assert!(ctx.session.metadata.is_empty());
    }

    #[tokio::test]
    async fn refresh_writes_new_token_into_context() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry();
        let mut ctx = AIContext::new(RemoteAuth {
            access_token: Some("old".into()),
            refresh_token: Some("r".into()),
            user_id: None,
            is_authenticated: true,
        });

        run_handler(&handler(tmp.path()), "refresh_spotify_token", json!({}), &mut ctx, &registry)
            .await
            .unwrap();
        assert_eq!(ctx.remote_auth.access_token.as_deref(), Some("refreshed-token"));

        let err = run_handler(
            &handler(tmp.path()),
            "refresh_spotify_token",
            json!({}),
            &mut AIContext::default(),
            &registry,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ActionError::AuthRequired(_)));
    }

    #[tokio::test]
    async fn help_covers_actions_categories_and_unknown_topics() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = registry();
        let mut ctx = AIContext::default();
        let h = handler(tmp.path());

        let action = run_handler(&h, "get_help", json!({"topic": "merge_playlists"}), &mut ctx, &registry)
            .await
            .unwrap();
        assert_eq!(action.data.unwrap()["action"]["category"], "playlist");

        let category = run_handler(&h, "get_help", json!({"topic": "user"}), &mut ctx, &registry)
            .await
            .unwrap();
        assert_eq!(category.data.unwrap()["actions"].as_array().unwrap().len(), 9);

        let err = run_handler(&h, "get_help", json!({"topic": "karaoke"}), &mut ctx, &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::NotFound(_)));
    }

    #[tokio::test]
    async fn connection_status_without_token_is_disconnected() {
        let tmp = tempfile::tempdir().unwrap();
        let result = run_handler(
            &handler(tmp.path()),
            "get_spotify_connection_status",
            json!({}),
            &mut AIContext::default(),
            &registry(),
        )
        .await
        .unwrap();
        assert_eq!(result.data.unwrap()["connected"], false);
    }
}
