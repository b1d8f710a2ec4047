//! Session context: the mutable state threaded through one conversation.
//!
//! These are the serialized shapes. Mutation goes through the context
//! manager in `spotctl-agent`, which keeps `last_activity` current.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::ContextError;

/// Open key/value bag.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AIContext {
    pub session: SessionContext,

    /// Credentials for the remote music service.
    #[serde(rename = "spotify")]
    pub remote_auth: RemoteAuth,

    pub conversation_history: Vec<ConversationMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Account id on the remote service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub is_authenticated: bool,
}

impl RemoteAuth {
    /// Authenticated flag set and an access token present.
    pub fn is_usable(&self) -> bool {
        self.is_authenticated && self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolResult>>,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            tool_calls: None,
            tool_results: None,
        }
    }
}

/// A recorded tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub parameters: Metadata,
    pub timestamp: DateTime<Utc>,
}

/// A recorded tool outcome, linked to its call by `tool_call_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_call_id: String,
    #[serde(default)]
    pub result: serde_json::Value,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AIContext {
    /// Fresh session with empty history.
    pub fn new(remote_auth: RemoteAuth) -> Self {
        let now = Utc::now();
        Self {
            session: SessionContext {
                user_id: None,
                session_id: Uuid::new_v4().to_string(),
                start_time: now,
                last_activity: now,
                metadata: Metadata::new(),
            },
            remote_auth,
            conversation_history: Vec::new(),
        }
    }

    /// Checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ContextError> {
        if self.session.session_id.trim().is_empty() {
            return Err(ContextError::Validation("session.sessionId must not be empty".into()));
        }
        if self.session.last_activity < self.session.start_time {
            return Err(ContextError::Validation(
                "session.lastActivity precedes session.startTime".into(),
            ));
        }

        let mut seen = HashSet::new();
        for (index, message) in self.conversation_history.iter().enumerate() {
            if message.id.is_empty() {
                return Err(ContextError::Validation(format!(
                    "conversationHistory[{index}].id must not be empty"
                )));
            }
            if !seen.insert(message.id.as_str()) {
                return Err(ContextError::Validation(format!(
                    "conversationHistory[{index}].id '{}' is duplicated",
                    message.id
                )));
            }
            for call in message.tool_calls.iter().flatten() {
                if call.id.is_empty() || call.name.is_empty() {
                    return Err(ContextError::Validation(format!(
                        "conversationHistory[{index}].toolCalls entries need an id and a name"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for AIContext {
    fn default() -> Self {
        Self::new(RemoteAuth::default())
    }
}
