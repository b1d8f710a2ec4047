//! Agent-level streaming events.
//!
//! A streamed prompt yields text deltas as the model produces them, then
//! the recorded tool calls, then their results, and finally the updated
//! session context. The sequence is finite and consumed once.

use spotctl_core::context::{AIContext, ToolCall, ToolResult};
use spotctl_core::provider::Usage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text from the model.
    Text { content: String },

    ToolCall { call: ToolCall },

    ToolResult { result: ToolResult },

    /// The model call failed; a `Finish` event still follows.
    Error { message: String },

    /// Last event of every stream.
    Finish {
        context: Box<AIContext>,
        steps: u32,
        usage: Option<Usage>,
    },
}

impl AgentStreamEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::ToolCall { .. } => "tool_call",
            Self::ToolResult { .. } => "tool_result",
            Self::Error { .. } => "error",
            Self::Finish { .. } => "finish",
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn text_event_serialization() {
        let event = AgentStreamEvent::Text { content: "Hello".into() };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"text","content":"Hello"}"#);
    }

    #[test]
    fn tool_call_event_carries_record() {
        let event = AgentStreamEvent::ToolCall {
            call: ToolCall {
                id: "call_1".into(),
                name: "search_tracks".into(),
                parameters: serde_json::Map::new(),
                timestamp: Utc::now(),
            },
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "tool_call");
        assert_eq!(value["call"]["name"], "search_tracks");
        assert_eq!(event.event_type(), "tool_call");
    }

    #[test]
    fn finish_event_round_trips() {
        let event = AgentStreamEvent::Finish {
            context: Box::new(AIContext::default()),
            steps: 2,
            usage: None,
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: AgentStreamEvent = serde_json::from_str(&json).unwrap();
        assert!(back.is_finish());
        assert_eq!(back.event_type(), "finish");
    }
}
