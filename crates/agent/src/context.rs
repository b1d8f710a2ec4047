//! Session context manager.
//!
//! Owns one [`AIContext`] and is the only place that mutates it outside of
//! action handlers. Every mutation bumps `session.last_activity`.

use chrono::{Duration, Utc};
use spotctl_core::context::{AIContext, ConversationMessage, MessageRole, Metadata, RemoteAuth, ToolCall, ToolResult};
use spotctl_core::error::ContextError;
use tracing::debug;

/// Sessions idle for longer than this are considered inactive.
pub const DEFAULT_ACTIVITY_THRESHOLD_MS: i64 = 30 * 60 * 1000;

/// Partial update for [`RemoteAuth`]; `None` fields keep their value.
#[derive(Debug, Clone, Default)]
pub struct RemoteAuthUpdate {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_id: Option<String>,
    pub is_authenticated: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct ContextManager {
    context: AIContext,
}

impl ContextManager {
    /// Fresh session with empty history.
    pub fn new(remote_auth: RemoteAuth) -> Self {
        Self {
            context: AIContext::new(remote_auth),
        }
    }

    /// Adopt an existing context as-is.
    pub fn from_context(context: AIContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AIContext {
        &self.context
    }

    /// Mutable access for action execution. Callers that mutate through this
    /// should call [`ContextManager::touch`] afterwards.
    pub fn context_mut(&mut self) -> &mut AIContext {
        &mut self.context
    }

    pub fn into_context(self) -> AIContext {
        self.context
    }

    pub fn session_id(&self) -> &str {
        &self.context.session.session_id
    }

    pub fn touch(&mut self) {
        self.context.session.last_activity = Utc::now();
    }

    pub fn update_remote_auth(&mut self, update: RemoteAuthUpdate) {
        let auth = &mut self.context.remote_auth;
        if let Some(token) = update.access_token {
            auth.access_token = Some(token);
        }
        if let Some(token) = update.refresh_token {
            auth.refresh_token = Some(token);
        }
        if let Some(user_id) = update.user_id {
            auth.user_id = Some(user_id);
        }
        if let Some(flag) = update.is_authenticated {
            auth.is_authenticated = flag;
        }
        self.touch();
    }

    /// Shallow merge: keys in `metadata` overwrite existing ones.
    pub fn update_session_metadata(&mut self, metadata: Metadata) {
        self.context.session.metadata.extend(metadata);
        self.touch();
    }

    pub fn add_message(&mut self, role: MessageRole, content: impl Into<String>) -> &ConversationMessage {
        self.context
            .conversation_history
            .push(ConversationMessage::new(role, content));
        self.touch();
        let last = self.context.conversation_history.len() - 1;
        &self.context.conversation_history[last]
    }

    /// Attach tool calls to the latest message, which must be an assistant turn.
    pub fn add_tool_calls(&mut self, calls: Vec<ToolCall>) -> Result<(), ContextError> {
        let message = self.last_assistant_mut("tool calls")?;
        message.tool_calls.get_or_insert_with(Vec::new).extend(calls);
        self.touch();
        Ok(())
    }

    /// Attach tool results to the latest message, which must be an assistant turn.
    pub fn add_tool_results(&mut self, results: Vec<ToolResult>) -> Result<(), ContextError> {
        let message = self.last_assistant_mut("tool results")?;
        message.tool_results.get_or_insert_with(Vec::new).extend(results);
        self.touch();
        Ok(())
    }

    fn last_assistant_mut(&mut self, operation: &'static str) -> Result<&mut ConversationMessage, ContextError> {
        self.context
            .conversation_history
            .last_mut()
            .filter(|m| m.role == MessageRole::Assistant)
            .ok_or(ContextError::NoAssistantMessage { operation })
    }

    pub fn get_last_message(&self) -> Option<&ConversationMessage> {
        self.context.conversation_history.last()
    }

    pub fn get_messages_by_role(&self, role: MessageRole) -> Vec<&ConversationMessage> {
        self.context
            .conversation_history
            .iter()
            .filter(|m| m.role == role)
            .collect()
    }

    /// The last `count` messages, oldest first.
    pub fn get_recent_messages(&self, count: usize) -> &[ConversationMessage] {
        let history = &self.context.conversation_history;
        &history[history.len().saturating_sub(count)..]
    }

    pub fn clear_history(&mut self) {
        self.context.conversation_history.clear();
        self.touch();
    }

    /// Start a new session, keeping the remote credentials.
    pub fn reset_session(&mut self) {
        let auth = std::mem::take(&mut self.context.remote_auth);
        self.context = AIContext::new(auth);
        debug!(session_id = %self.context.session.session_id, "Session reset");
    }

    /// Time between session start and the last recorded activity.
    pub fn session_duration(&self) -> Duration {
        self.context.session.last_activity - self.context.session.start_time
    }

    pub fn is_session_active(&self, threshold_ms: i64) -> bool {
        Utc::now() - self.context.session.last_activity < Duration::milliseconds(threshold_ms)
    }

    pub fn validate_context(&self) -> bool {
        self.context.validate().is_ok()
    }

    pub fn export_context(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.context)
    }

    /// Replace the current context with a serialized snapshot. Nothing is
    /// changed unless the snapshot parses and validates.
    pub fn import_context(&mut self, json: &str) -> Result<(), ContextError> {
        let context: AIContext =
            serde_json::from_str(json).map_err(|e| ContextError::Validation(e.to_string()))?;
        context.validate()?;
        debug!(
            session_id = %context.session.session_id,
            messages = context.conversation_history.len(),
            "Context imported"
        );
        self.context = context;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: "search_tracks".into(),
            parameters: json!({"query": "x"}).as_object().cloned().unwrap(),
            timestamp: Utc::now(),
        }
    }

    fn result(id: &str) -> ToolResult {
        ToolResult {
            tool_call_id: id.into(),
            result: json!({"tracks": []}),
            success: true,
            error: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn new_session_is_unauthenticated_and_empty() {
        let manager = ContextManager::default();
        assert!(!manager.context().remote_auth.is_authenticated);
        assert!(manager.get_last_message().is_none());
        assert!(manager.validate_context());
        assert!(manager.is_session_active(DEFAULT_ACTIVITY_THRESHOLD_MS));
    }

    #[test]
    fn auth_update_merges_fields() {
        let mut manager = ContextManager::new(RemoteAuth {
            refresh_token: Some("refresh".into()),
            ..Default::default()
        });
        let before = manager.context().session.last_activity;

        manager.update_remote_auth(RemoteAuthUpdate {
            access_token: Some("access".into()),
            is_authenticated: Some(true),
            ..Default::default()
        });

        let auth = &manager.context().remote_auth;
        assert_eq!(auth.access_token.as_deref(), Some("access"));
        assert_eq!(auth.refresh_token.as_deref(), Some("refresh"));
        assert!(auth.is_usable());
        assert!(manager.context().session.last_activity >= before);
    }

    #[test]
    fn metadata_update_is_shallow_merge() {
        let mut manager = ContextManager::default();
        manager.update_session_metadata(json!({"a": 1, "b": {"x": 1}}).as_object().cloned().unwrap());
        manager.update_session_metadata(json!({"b": {"y": 2}, "c": 3}).as_object().cloned().unwrap());

        let metadata = &manager.context().session.metadata;
        assert_eq!(metadata["a"], 1);
        assert_eq!(metadata["b"], json!({"y": 2}));
        assert_eq!(metadata["c"], 3);
    }

    #[test]
    fn tool_records_need_an_assistant_turn() {
        let mut manager = ContextManager::default();
        manager.add_message(MessageRole::User, "play something");

        let err = manager.add_tool_calls(vec![call("c1")]).unwrap_err();
        assert_eq!(err, ContextError::NoAssistantMessage { operation: "tool calls" });
        let err = manager.add_tool_results(vec![result("c1")]).unwrap_err();
        assert_eq!(err, ContextError::NoAssistantMessage { operation: "tool results" });

        let last = manager.get_last_message().unwrap();
        assert!(last.tool_calls.is_none());
        assert!(last.tool_results.is_none());
        assert_eq!(manager.context().conversation_history.len(), 1);
    }

    #[test]
    fn tool_records_attach_to_latest_assistant_message() {
        let mut manager = ContextManager::default();
        manager.add_message(MessageRole::User, "find daft punk");
        manager.add_message(MessageRole::Assistant, "Searching");
        manager.add_tool_calls(vec![call("c1")]).unwrap();
        manager.add_tool_calls(vec![call("c2")]).unwrap();
        manager.add_tool_results(vec![result("c1")]).unwrap();

        let last = manager.get_last_message().unwrap();
        let ids: Vec<&str> = last.tool_calls.iter().flatten().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2"]);
        assert_eq!(last.tool_results.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn recent_messages_and_role_filter() {
        let mut manager = ContextManager::default();
        manager.add_message(MessageRole::User, "one");
        manager.add_message(MessageRole::Assistant, "two");
        manager.add_message(MessageRole::User, "three");

        let recent: Vec<&str> = manager.get_recent_messages(2).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(recent, ["two", "three"]);
        assert_eq!(manager.get_recent_messages(10).len(), 3);
        assert_eq!(manager.get_messages_by_role(MessageRole::User).len(), 2);
    }

    #[test]
    fn clear_history_keeps_auth_and_session() {
        let mut manager = ContextManager::new(RemoteAuth {
            access_token: Some("t".into()),
            is_authenticated: true,
            ..Default::default()
        });
        let session_id = manager.session_id().to_string();
        manager.add_message(MessageRole::User, "hi");
        manager.clear_history();

        assert!(manager.context().conversation_history.is_empty());
        assert!(manager.context().remote_auth.is_usable());
        assert_eq!(manager.session_id(), session_id);
    }

    #[test]
    fn reset_session_keeps_auth_only() {
        let mut manager = ContextManager::new(RemoteAuth {
            access_token: Some("t".into()),
            is_authenticated: true,
            ..Default::default()
        });
        let old_id = manager.session_id().to_string();
        manager.add_message(MessageRole::User, "hi");
        manager.update_session_metadata(json!({"k": "v"}).as_object().cloned().unwrap());

        manager.reset_session();

        assert_ne!(manager.session_id(), old_id);
        assert!(manager.context().conversation_history.is_empty());
        assert!(manager.context().session.metadata.is_empty());
        assert!(manager.context().remote_auth.is_usable());
    }

    #[test]
    fn export_import_round_trips_timestamps() {
        let mut manager = ContextManager::default();
        manager.add_message(MessageRole::User, "find daft punk");
        manager.add_message(MessageRole::Assistant, "Found it");
        manager.add_tool_calls(vec![call("c1")]).unwrap();
        manager.add_tool_results(vec![result("c1")]).unwrap();

        let exported = manager.export_context().unwrap();
        let mut restored = ContextManager::default();
        restored.import_context(&exported).unwrap();

        assert_eq!(restored.context(), manager.context());
    }

    #[test]
    fn malformed_import_leaves_context_untouched() {
        let mut manager = ContextManager::default();
        manager.add_message(MessageRole::User, "keep me");
        let before = manager.context().clone();

        assert!(matches!(manager.import_context("{not json"), Err(ContextError::Validation(_))));
        assert!(matches!(
            manager.import_context(r#"{"session": {"sessionId": "x"}}"#),
            Err(ContextError::Validation(_))
        ));

        let mut bad = AIContext::default();
        bad.session.session_id = String::new();
        let json = serde_json::to_string(&bad).unwrap();
        assert!(matches!(manager.import_context(&json), Err(ContextError::Validation(_))));

        assert_eq!(manager.context(), &before);
    }

    #[test]
    fn inactivity_is_measured_from_last_activity() {
        let mut manager = ContextManager::default();
        let now = Utc::now();
        manager.context_mut().session.last_activity = now - Duration::minutes(31);
        manager.context_mut().session.start_time = now - Duration::minutes(40);

        assert!(!manager.is_session_active(DEFAULT_ACTIVITY_THRESHOLD_MS));
        assert!(manager.is_session_active(60 * 60 * 1000));
        assert_eq!(manager.session_duration().num_minutes(), 9);
    }
}
