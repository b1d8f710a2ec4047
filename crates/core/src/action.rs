//! Action definitions: the unit of registration.
//!
//! An action is a named, schema-described operation the agent loop can
//! offer to a language model as a tool. Definitions are plain data; the
//! code that executes them lives behind handler groups in `spotctl-tools`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ActionError;
use crate::provider::ToolDefinition;
use crate::routing::HandlerGroup;

/// The closed set of action categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Playlist,
    Track,
    User,
    Search,
    System,
}

impl ActionCategory {
    pub const ALL: [ActionCategory; 5] = [
        ActionCategory::Playlist,
        ActionCategory::Track,
        ActionCategory::User,
        ActionCategory::Search,
        ActionCategory::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playlist => "playlist",
            Self::Track => "track",
            Self::User => "user",
            Self::Search => "search",
            Self::System => "system",
        }
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionCategory {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ActionError::InvalidCategory(s.to_string()))
    }
}

/// Fixed-window call budget for one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    pub max_calls: u32,
    pub window_ms: u64,
}

impl RateLimitPolicy {
    pub fn new(max_calls: u32, window_ms: u64) -> Self {
        Self { max_calls, window_ms }
    }
}

/// A registered action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDefinition {
    /// Unique name (e.g. "create_playlist")
    pub name: String,

    /// Human-readable description, also sent to the LLM
    pub description: String,

    pub category: ActionCategory,

    /// JSON Schema of the parameters object
    pub parameters: serde_json::Value,

    /// Capabilities the caller must hold. Empty means unrestricted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitPolicy>,

    /// Explicit handler group. When absent the registry infers one from the name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_group: Option<HandlerGroup>,
}

impl ActionDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: ActionCategory,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            category,
            parameters,
            permissions: Vec::new(),
            rate_limit: None,
            handler_group: None,
        }
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rate_limit(mut self, max_calls: u32, window_ms: u64) -> Self {
        self.rate_limit = Some(RateLimitPolicy::new(max_calls, window_ms));
        self
    }

    pub fn with_handler_group(mut self, group: HandlerGroup) -> Self {
        self.handler_group = Some(group);
        self
    }

    pub fn requires_permissions(&self) -> bool {
        !self.permissions.is_empty()
    }

    /// Whether a caller holding `granted` may invoke this action.
    /// Exact string match, no wildcards.
    pub fn permitted_by(&self, granted: &[String]) -> bool {
        self.permissions.iter().all(|p| granted.contains(p))
    }

    /// Convert into the shape sent to the LLM.
    pub fn to_tool_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Uniform envelope returned for every dispatched action.
///
/// Build it through [`ActionExecutionResult::ok`] or
/// [`ActionExecutionResult::failure`]; a success never carries an error and a
/// failure never carries data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionExecutionResult {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ActionExecutionResult {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Tag the result with the action that produced it.
    pub fn for_action(self, action: &str) -> Self {
        self.with_metadata("action", action)
    }
}

impl From<ActionError> for ActionExecutionResult {
    fn from(err: ActionError) -> Self {
        let result = Self::failure(err.to_string());
        match err {
            ActionError::RateLimited { retry_after_ms, .. } => result
                .with_metadata("rateLimitExceeded", true)
                .with_metadata("retryAfterMs", retry_after_ms),
            _ => result,
        }
    }
}
