//! Error types for the spotctl domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all spotctl operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Action errors ---
    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    // --- Session context errors ---
    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    // --- LLM provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Remote music service errors ---
    #[error("Music service error: {0}")]
    Music(#[from] MusicApiError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Action '{0}' is already registered")]
    DuplicateName(String),

    #[error("Invalid category '{0}'")]
    InvalidCategory(String),

    #[error("Action '{0}' not found")]
    NotFound(String),

    #[error("Rate limit exceeded for action '{action}'. Try again in {retry_after_ms}ms")]
    RateLimited { action: String, retry_after_ms: u64 },

    #[error("Spotify authentication required: {0}")]
    AuthRequired(String),

    #[error("Action '{action}' failed: {reason}")]
    ExecutionFailed { action: String, reason: String },

    /// The remote service throttled the call and asked for a pause.
    #[error("Action '{action}' was throttled by Spotify, retry after {retry_after_ms}ms")]
    Throttled { action: String, retry_after_ms: u64 },

    #[error("Invalid parameters for '{action}': {reason}")]
    InvalidParameters { action: String, reason: String },

    #[error("Unknown action category for '{0}'")]
    UnknownCategory(String),

    #[error("Unknown {group} action: {action}")]
    UnknownAction { group: String, action: String },

    #[error("Unsupported action '{action}': {reason}")]
    Unsupported { action: String, reason: String },
}

impl ActionError {
    /// Only transient execution failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExecutionFailed { .. } | Self::Throttled { .. })
    }

    /// Minimum wait the remote service asked for before the next attempt.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::Throttled { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Cannot add {operation}: no assistant message found")]
    NoAssistantMessage { operation: &'static str },

    #[error("Invalid context format: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum MusicApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited by Spotify, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Spotify API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_displays_retry_hint() {
        let err = Error::Action(ActionError::RateLimited {
            action: "search_tracks".into(),
            retry_after_ms: 250,
        });
        assert!(err.to_string().contains("search_tracks"));
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn only_execution_failures_are_retryable() {
        assert!(ActionError::ExecutionFailed {
            action: "like_songs".into(),
            reason: "502".into(),
        }
        .is_retryable());
        assert!(ActionError::Throttled {
            action: "like_songs".into(),
            retry_after_ms: 3000,
        }
        .is_retryable());
        assert!(!ActionError::NotFound("x".into()).is_retryable());
        assert!(!ActionError::AuthRequired("no token".into()).is_retryable());
        assert!(!ActionError::InvalidParameters {
            action: "search_tracks".into(),
            reason: "limit".into(),
        }
        .is_retryable());
    }

    #[test]
    fn context_error_names_operation() {
        let err = ContextError::NoAssistantMessage { operation: "tool results" };
        assert_eq!(err.to_string(), "Cannot add tool results: no assistant message found");
    }
}
