//! In-memory music service for tests.

use async_trait::async_trait;
use serde_json::{Value, json};
use spotctl_core::action::ActionExecutionResult;
use spotctl_core::context::AIContext;
use spotctl_core::error::{ActionError, MusicApiError};
use spotctl_core::music::{ApiCall, Credentials, MusicService, TokenGrant};
use spotctl_core::registry::ActionRegistry;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::engine::{ActionHandler, ActionRequest, EngineStatus, ExecutionConfig};

/// Records every call and answers from canned playlists or per-label overrides.
#[derive(Default)]
pub struct FakeMusicService {
    playlists: Mutex<HashMap<String, Vec<Value>>>,
    overrides: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashMap<String, (u32, MusicApiError)>>,
    calls: Mutex<Vec<ApiCall>>,
    credentials: Mutex<Credentials>,
}

pub fn track(playlist_id: &str, index: usize) -> Value {
    let id = format!("{playlist_id}-t{index}");
    json!({
        "id": id,
        "uri": format!("spotify:track:{id}"),
        "name": format!("Track {index}"),
        "artists": [{"name": "Artist"}],
    })
}

pub fn playlist_page(items: Vec<Value>) -> Value {
    json!({ "total": items.len(), "items": items })
}

impl FakeMusicService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_playlist(&self, id: &str, tracks: usize) {
        let items = (0..tracks).map(|i| track(id, i)).collect();
        self.playlists.lock().unwrap().insert(id.to_string(), items);
    }

    /// Answer every call with this label with `body`.
    pub fn respond_with(&self, label: &str, body: Value) {
        self.overrides.lock().unwrap().insert(label.to_string(), body);
    }

    /// Fail the next `times` calls with this label.
    pub fn fail_times(&self, label: &str, times: u32, error: MusicApiError) {
        self.failures.lock().unwrap().insert(label.to_string(), (times, error));
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, label: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.label() == label).count()
    }

    fn default_body(&self, call: &ApiCall) -> Value {
        match call {
            ApiCall::PlaylistTracks {
                playlist_id,
                limit,
                offset,
            } => {
                let playlists = self.playlists.lock().unwrap();
                let tracks = playlists.get(playlist_id).cloned().unwrap_or_default();
                let page: Vec<Value> = tracks
                    .into_iter()
                    .skip(*offset as usize)
                    .take(*limit as usize)
                    .map(|t| json!({ "track": t }))
                    .collect();
                playlist_page(page)
            }
            ApiCall::CreatePlaylist { name, public, .. } => {
                json!({ "id": "new-playlist", "name": name, "public": public })
            }
            ApiCall::Me => json!({ "id": "user-1", "display_name": "Test User" }),
            ApiCall::CurrentlyPlaying => Value::Null,
            ApiCall::FollowedArtists { .. } => json!({ "artists": { "items": [] } }),
            ApiCall::Recommendations(_) => json!({ "tracks": [] }),
            ApiCall::AddTracksToPlaylist { .. } | ApiCall::RemoveTracksFromPlaylist { .. } => {
                json!({ "snapshot_id": "snap" })
            }
            ApiCall::SaveTracks { .. }
            | ApiCall::RemoveSavedTracks { .. }
            | ApiCall::FollowArtists { .. }
            | ApiCall::UnfollowArtists { .. }
            | ApiCall::FollowPlaylist { .. }
            | ApiCall::UnfollowPlaylist { .. } => Value::Null,
            _ => json!({ "items": [] }),
        }
    }
}

#[async_trait]
impl MusicService for FakeMusicService {
    fn name(&self) -> &str {
        "fake"
    }

    fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.lock().unwrap() = credentials;
    }

    fn credentials(&self) -> Credentials {
        self.credentials.lock().unwrap().clone()
    }

    async fn call(&self, call: ApiCall) -> Result<Value, MusicApiError> {
        let label = call.label();
        self.calls.lock().unwrap().push(call.clone());

        if let Some((remaining, error)) = self.failures.lock().unwrap().get_mut(label) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(error.clone());
            }
        }

        if let Some(body) = self.overrides.lock().unwrap().get(label) {
            return Ok(body.clone());
        }

        Ok(self.default_body(&call))
    }

    async fn refresh_access_token(&self) -> Result<TokenGrant, MusicApiError> {
        let mut credentials = self.credentials.lock().unwrap();
        if credentials.refresh_token.is_none() {
            return Err(MusicApiError::MissingCredentials("no refresh token".into()));
        }
        credentials.access_token = Some("refreshed-token".into());
        Ok(TokenGrant {
            access_token: "refreshed-token".into(),
            refresh_token: None,
            expires_in: 3600,
            scope: None,
        })
    }
}

pub fn status() -> EngineStatus {
    EngineStatus {
        initialized: true,
        service: "fake".into(),
        config: ExecutionConfig {
            contexts_dir: std::env::temp_dir().join("spotctl-handler-tests"),
            ..ExecutionConfig::default()
        },
        rate_limits: HashMap::new(),
    }
}

/// Run one attempt of `action` directly against `handler`.
pub async fn run_handler(
    handler: &dyn ActionHandler,
    action: &str,
    parameters: Value,
    context: &mut AIContext,
    registry: &ActionRegistry,
) -> Result<ActionExecutionResult, ActionError> {
    let status = status();
    handler
        .handle(ActionRequest {
            action,
            parameters,
            tool_call_id: None,
            context,
            registry,
            status: &status,
        })
        .await
}
