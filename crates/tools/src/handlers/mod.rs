//! Handler groups: one [`ActionHandler`] per routing group.
//!
//! Each handler matches on the action name, parses its typed parameters and
//! issues the remote calls. Failures are returned as [`ActionError`]s; the
//! engine decides whether to retry.

pub mod playlist;
pub mod search;
pub mod system;
pub mod track;
pub mod user;

use serde::Serialize;
use serde_json::Value;
use spotctl_core::error::{ActionError, MusicApiError};
use spotctl_core::music::MusicService;
use spotctl_core::routing::HandlerGroup;
use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::ActionHandler;

pub use playlist::PlaylistHandler;
pub use search::SearchHandler;
pub use system::SystemHandler;
pub use track::TrackHandler;
pub use user::UserHandler;

/// The five built-in handlers.
pub fn default_handlers(music: Arc<dyn MusicService>, contexts_dir: PathBuf) -> Vec<Arc<dyn ActionHandler>> {
    vec![
        Arc::new(PlaylistHandler::new(music.clone())),
        Arc::new(TrackHandler::new(music.clone())),
        Arc::new(SearchHandler::new(music.clone())),
        Arc::new(UserHandler::new(music.clone())),
        Arc::new(SystemHandler::new(music, contexts_dir)),
    ]
}

/// Map a remote failure onto the action taxonomy.
///
/// Credential problems cannot be fixed by retrying; everything else can.
pub(crate) fn remote_error(action: &str, err: MusicApiError) -> ActionError {
    match err {
        MusicApiError::Unauthorized(msg) | MusicApiError::MissingCredentials(msg) => ActionError::AuthRequired(msg),
        MusicApiError::RateLimited { retry_after_secs } => ActionError::Throttled {
            action: action.to_string(),
            retry_after_ms: retry_after_secs.saturating_mul(1000),
        },
        other => ActionError::ExecutionFailed {
            action: action.to_string(),
            reason: other.to_string(),
        },
    }
}

pub(crate) fn unknown_action(group: HandlerGroup, action: &str) -> ActionError {
    ActionError::UnknownAction {
        group: group.to_string(),
        action: action.to_string(),
    }
}

pub(crate) fn to_data<T: Serialize>(action: &str, value: &T) -> Result<Value, ActionError> {
    serde_json::to_value(value).map_err(|e| ActionError::ExecutionFailed {
        action: action.to_string(),
        reason: format!("failed to serialize result: {e}"),
    })
}

/// Length of the array at `pointer`, or 0.
pub(crate) fn count_at(body: &Value, pointer: &str) -> usize {
    body.pointer(pointer).and_then(Value::as_array).map_or(0, Vec::len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_errors_are_not_retryable() {
        let err = remote_error("like_songs", MusicApiError::Unauthorized("expired".into()));
        assert!(matches!(err, ActionError::AuthRequired(_)));
        assert!(!err.is_retryable());

        let err = remote_error(
            "like_songs",
            MusicApiError::Api {
                status: 500,
                message: "boom".into(),
            },
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn spotify_throttling_keeps_retry_after() {
        let err = remote_error("search_tracks", MusicApiError::RateLimited { retry_after_secs: 7 });
        assert!(err.is_retryable());
        assert_eq!(err.retry_after_ms(), Some(7000));
    }

    #[test]
    fn count_at_tolerates_missing_paths() {
        let body = serde_json::json!({"artists": {"items": [1, 2]}});
        assert_eq!(count_at(&body, "/artists/items"), 2);
        assert_eq!(count_at(&body, "/items"), 0);
        assert_eq!(count_at(&Value::Null, "/items"), 0);
    }
}
