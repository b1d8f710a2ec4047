use async_trait::async_trait;
use serde_json::{Value, json};
use spotctl_core::action::ActionExecutionResult;
use spotctl_core::error::ActionError;
use spotctl_core::music::{ApiCall, MusicService};
use spotctl_core::routing::HandlerGroup;
use std::sync::Arc;

use super::{count_at, remote_error, to_data, unknown_action};
use crate::engine::{ActionHandler, ActionRequest};
use crate::ops::{self, LibraryChange};
use crate::params::{PageParams, PlaylistIdsParams, TrackIdsParams, parse};

pub struct TrackHandler {
    music: Arc<dyn MusicService>,
}

impl TrackHandler {
    pub fn new(music: Arc<dyn MusicService>) -> Self {
        Self { music }
    }

    async fn from_playlists(
        &self,
        action: &str,
        p: PlaylistIdsParams,
        change: LibraryChange,
    ) -> Result<ActionExecutionResult, ActionError> {
        let summary = ops::update_library_from_playlists(self.music.as_ref(), &p.playlist_ids, change)
            .await
            .map_err(|e| remote_error(action, e))?;

        Ok(ActionExecutionResult::ok(to_data(action, &summary)?)
            .with_metadata("playlistCount", p.playlist_ids.len())
            .with_metadata("trackCount", summary.total_tracks))
    }

    async fn songs(&self, action: &str, p: TrackIdsParams, change: LibraryChange) -> Result<ActionExecutionResult, ActionError> {
        let music = self.music.as_ref();
        ops::process_in_batches(&p.track_ids, ops::LIBRARY_BATCH_SIZE, ops::BATCH_PAUSE, |ids| async move {
            music.call(change.call(ids)).await.map(|_| ())
        })
        .await
        .map_err(|e| remote_error(action, e))?;

        let key = match change {
            LibraryChange::Save => "liked",
            LibraryChange::Remove => "disliked",
        };
        Ok(ActionExecutionResult::ok(json!({ key: true })).with_metadata("trackCount", p.track_ids.len()))
    }

    async fn lookup(&self, action: &str, call: ApiCall, count: usize) -> Result<ActionExecutionResult, ActionError> {
        let body = self.music.call(call).await.map_err(|e| remote_error(action, e))?;
        Ok(ActionExecutionResult::ok(body).with_metadata("trackCount", count))
    }
}

#[async_trait]
impl ActionHandler for TrackHandler {
    fn group(&self) -> HandlerGroup {
        HandlerGroup::Track
    }

    async fn handle(&self, request: ActionRequest<'_>) -> Result<ActionExecutionResult, ActionError> {
        let action = request.action;
        let params = request.parameters;

        match action {
            "like_all_songs_from_playlists" => {
                self.from_playlists(action, parse(action, params)?, LibraryChange::Save).await
            }
            "dislike_all_songs_from_playlists" => {
                self.from_playlists(action, parse(action, params)?, LibraryChange::Remove).await
            }
            "like_songs" => self.songs(action, parse(action, params)?, LibraryChange::Save).await,
            "dislike_songs" => self.songs(action, parse(action, params)?, LibraryChange::Remove).await,
            "get_current_track" => {
                let body = self
                    .music
                    .call(ApiCall::CurrentlyPlaying)
                    .await
                    .map_err(|e| remote_error(action, e))?;
                // Nothing playing comes back as an empty body.
                let is_playing = body.get("is_playing").and_then(Value::as_bool).unwrap_or(false);
                let data = if body.is_null() { json!({ "is_playing": false }) } else { body };
                Ok(ActionExecutionResult::ok(data).with_metadata("isPlaying", is_playing))
            }
            "get_saved_tracks" => {
                let p: PageParams = parse(action, params)?;
                let body = self
                    .music
                    .call(ApiCall::SavedTracks {
                        limit: p.limit,
                        offset: p.offset,
                    })
                    .await
                    .map_err(|e| remote_error(action, e))?;
                let count = count_at(&body, "/items");
                Ok(ActionExecutionResult::ok(body).with_metadata("count", count))
            }
            "get_track_details" => {
                let p: TrackIdsParams = parse(action, params)?;
                let count = p.track_ids.len();
                self.lookup(action, ApiCall::Tracks { ids: p.track_ids }, count).await
            }
            "get_track_audio_features" => {
                let p: TrackIdsParams = parse(action, params)?;
                let count = p.track_ids.len();
                self.lookup(action, ApiCall::AudioFeatures { ids: p.track_ids }, count).await
            }
            _ => Err(unknown_action(self.group(), action)),
        }
    }
}
