use async_trait::async_trait;
use serde_json::{Value, json};
use spotctl_core::action::ActionExecutionResult;
use spotctl_core::error::{ActionError, MusicApiError};
use spotctl_core::music::{ApiCall, MusicService};
use spotctl_core::routing::HandlerGroup;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::{count_at, remote_error, to_data, unknown_action};
use crate::engine::{ActionHandler, ActionRequest};
use crate::ops;
use crate::params::{
    CreatePlaylistParams, MergePlaylistsParams, PageParams, PlaylistTrackIdsParams, PlaylistTracksParams, parse,
};

/// Identifies a merge into a new playlist: name, visibility and sources.
type NewTargetKey = (String, bool, Vec<String>);

pub struct PlaylistHandler {
    music: Arc<dyn MusicService>,
    /// Playlists created by a merge attempt that failed afterwards. A retry
    /// of the same merge fills the playlist instead of creating another.
    pending_targets: Mutex<HashMap<NewTargetKey, String>>,
}

impl PlaylistHandler {
    pub fn new(music: Arc<dyn MusicService>) -> Self {
        Self {
            music,
            pending_targets: Mutex::new(HashMap::new()),
        }
    }

    fn pending_targets(&self) -> MutexGuard<'_, HashMap<NewTargetKey, String>> {
        self.pending_targets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn create(&self, action: &str, p: CreatePlaylistParams) -> Result<ActionExecutionResult, ActionError> {
        let body = self
            .music
            .call(ApiCall::CreatePlaylist {
                name: p.name,
                public: p.is_public,
                description: p.description,
            })
            .await
            .map_err(|e| remote_error(action, e))?;

        let id = body.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        Ok(ActionExecutionResult::ok(body).with_metadata("playlistId", id))
    }

    async fn tracks(&self, action: &str, p: PlaylistTracksParams) -> Result<ActionExecutionResult, ActionError> {
        let remote = |e| remote_error(action, e);

        // An explicit limit asks for one page; otherwise fetch everything.
        if let Some(limit) = p.limit {
            let body = self
                .music
                .call(ApiCall::PlaylistTracks {
                    playlist_id: p.playlist_id.clone(),
                    limit,
                    offset: p.offset.unwrap_or(0),
                })
                .await
                .map_err(remote)?;
            let count = count_at(&body, "/items");
            return Ok(ActionExecutionResult::ok(body)
                .with_metadata("playlistId", p.playlist_id)
                .with_metadata("count", count));
        }

        let tracks = ops::playlist_tracks(self.music.as_ref(), &p.playlist_id)
            .await
            .map_err(remote)?;
        let count = tracks.len();
        let tracks: Vec<Value> = if p.include_details {
            tracks
        } else {
            tracks.iter().map(summarize_track).collect()
        };

        Ok(ActionExecutionResult::ok(json!({
            "playlistId": p.playlist_id,
            "total": count,
            "tracks": tracks,
        }))
        .with_metadata("playlistId", p.playlist_id)
        .with_metadata("count", count))
    }

    async fn merge(&self, action: &str, p: MergePlaylistsParams) -> Result<ActionExecutionResult, ActionError> {
        let remote = |e| remote_error(action, e);

        let (target, new_target) = match p.target_playlist_id.filter(|t| !t.trim().is_empty()) {
            Some(target) => (target, None),
            None => {
                let name = p.new_playlist_name.unwrap_or_default();
                let key = (name.clone(), p.new_playlist_public, p.source_playlist_ids.clone());
                let pending = self.pending_targets().get(&key).cloned();
                let id = match pending {
                    Some(id) => {
                        debug!(playlist_id = %id, "Reusing playlist created by an earlier merge attempt");
                        id
                    }
                    None => {
                        let body = self
                            .music
                            .call(ApiCall::CreatePlaylist {
                                name,
                                public: p.new_playlist_public,
                                description: None,
                            })
                            .await
                            .map_err(remote)?;
                        body.get("id")
                            .and_then(Value::as_str)
                            .ok_or_else(|| remote(MusicApiError::Decode("created playlist has no id".into())))?
                            .to_string()
                    }
                };
                (id, Some(key))
            }
        };
        let created = new_target.is_some();

        let merged = ops::merge_into(self.music.as_ref(), &p.source_playlist_ids, &target, &p.exclude_track_ids).await;
        let summary = match (merged, new_target) {
            (Ok(summary), Some(key)) => {
                self.pending_targets().remove(&key);
                summary
            }
            (Ok(summary), None) => summary,
            (Err(e), Some(key)) => {
                self.pending_targets().insert(key, target);
                return Err(remote(e));
            }
            (Err(e), None) => return Err(remote(e)),
        };
        info!(target = %target, added = summary.total_added, created, "Playlists merged");

        let mut data = to_data(action, &summary)?;
        if let Some(obj) = data.as_object_mut() {
            obj.insert("createdPlaylist".into(), created.into());
        }
        Ok(ActionExecutionResult::ok(data)
            .with_metadata("sourceCount", p.source_playlist_ids.len())
            .with_metadata("targetPlaylistId", target))
    }

    async fn change_items(
        &self,
        action: &str,
        p: PlaylistTrackIdsParams,
        add: bool,
    ) -> Result<ActionExecutionResult, ActionError> {
        let uris: Vec<String> = p.track_ids.iter().map(|id| ops::to_track_uri(id)).collect();
        let playlist_id = p.playlist_id.as_str();
        let music = self.music.as_ref();

        ops::process_in_batches(&uris, ops::PLAYLIST_ADD_BATCH_SIZE, ops::BATCH_PAUSE, |batch| async move {
            let call = if add {
                ApiCall::AddTracksToPlaylist {
                    playlist_id: playlist_id.to_string(),
                    uris: batch,
                }
            } else {
                ApiCall::RemoveTracksFromPlaylist {
                    playlist_id: playlist_id.to_string(),
                    uris: batch,
                }
            };
            music.call(call).await.map(|_| ())
        })
        .await
        .map_err(|e| remote_error(action, e))?;

        let key = if add { "added" } else { "removed" };
        Ok(ActionExecutionResult::ok(json!({ key: true, "trackCount": uris.len() }))
            .with_metadata("playlistId", p.playlist_id.clone())
            .with_metadata("trackCount", uris.len()))
    }
}

/// Compact view of a track for listings.
fn summarize_track(track: &Value) -> Value {
    let artists: Vec<&str> = track
        .get("artists")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|artist| artist.get("name").and_then(Value::as_str)).collect())
        .unwrap_or_default();

    json!({
        "id": track.get("id"),
        "name": track.get("name"),
        "uri": track.get("uri"),
        "artists": artists,
    })
}

#[async_trait]
impl ActionHandler for PlaylistHandler {
    fn group(&self) -> HandlerGroup {
        HandlerGroup::Playlist
    }

    async fn handle(&self, request: ActionRequest<'_>) -> Result<ActionExecutionResult, ActionError> {
        let action = request.action;
        let params = request.parameters;

        match action {
            "create_playlist" => self.create(action, parse(action, params)?).await,
            "get_user_playlists" => {
                let p: PageParams = parse(action, params)?;
                let body = self
                    .music
                    .call(ApiCall::UserPlaylists {
                        limit: p.limit,
                        offset: p.offset,
                    })
                    .await
                    .map_err(|e| remote_error(action, e))?;
                let count = count_at(&body, "/items");
                Ok(ActionExecutionResult::ok(body).with_metadata("count", count))
            }
            "get_playlist_tracks" => self.tracks(action, parse(action, params)?).await,
            "merge_playlists" => self.merge(action, parse(action, params)?).await,
            "add_tracks_to_playlist" => self.change_items(action, parse(action, params)?, true).await,
            "remove_tracks_from_playlist" => self.change_items(action, parse(action, params)?, false).await,
            _ => Err(unknown_action(self.group(), action)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{FakeMusicService, run_handler};
    use spotctl_core::context::AIContext;
    use spotctl_core::registry::ActionRegistry;

    async fn run(music: Arc<FakeMusicService>, action: &str, params: Value) -> Result<ActionExecutionResult, ActionError> {
        let handler = PlaylistHandler::new(music);
        run_handler(&handler, action, params, &mut AIContext::default(), &ActionRegistry::new()).await
    }

    #[tokio::test]
    async fn playlist_tracks_without_limit_aggregates_summaries() {
        let music = Arc::new(FakeMusicService::new());
        music.add_playlist("p1", 130);

        let result = run(music.clone(), "get_playlist_tracks", json!({"playlistId": "p1"}))
            .await
            .unwrap();

        let data = result.data.unwrap();
        assert_eq!(data["total"], 130);
        assert_eq!(data["tracks"][129]["id"], "p1-t129");
        assert_eq!(data["tracks"][0]["artists"], json!(["Artist"]));
        assert_eq!(music.call_count("playlist_tracks"), 2);
    }

    #[tokio::test]
    async fn playlist_tracks_with_limit_fetches_one_page() {
        let music = Arc::new(FakeMusicService::new());
        music.add_playlist("p1", 130);

        let result = run(
            music.clone(),
            "get_playlist_tracks",
            json!({"playlistId": "p1", "limit": 10, "offset": 5}),
        )
        .await
        .unwrap();

        assert_eq!(result.metadata["count"], 10);
        assert_eq!(music.calls(), vec![ApiCall::PlaylistTracks {
            playlist_id: "p1".into(),
            limit: 10,
            offset: 5,
        }]);
    }

    #[tokio::test]
    async fn merge_creates_playlist_when_no_target() {
        let music = Arc::new(FakeMusicService::new());
        music.add_playlist("a", 2);

        let result = run(
            music.clone(),
            "merge_playlists",
            json!({"sourcePlaylistIds": ["a"], "newPlaylistName": "Mix", "newPlaylistPublic": true}),
        )
        .await
        .unwrap();

        assert_eq!(result.metadata["targetPlaylistId"], "new-playlist");
        assert_eq!(result.data.unwrap()["createdPlaylist"], true);
        assert_eq!(music.calls()[0], ApiCall::CreatePlaylist {
            name: "Mix".into(),
            public: true,
            description: None,
        });
    }

    #[tokio::test]
    async fn add_tracks_converts_ids_to_uris() {
        let music = Arc::new(FakeMusicService::new());
        run(
            music.clone(),
            "add_tracks_to_playlist",
            json!({"playlistId": "p1", "trackIds": ["x", "spotify:track:y"]}),
        )
        .await
        .unwrap();

        assert_eq!(music.calls(), vec![ApiCall::AddTracksToPlaylist {
            playlist_id: "p1".into(),
            uris: vec!["spotify:track:x".into(), "spotify:track:y".into()],
        }]);
    }

    #[tokio::test]
    async fn unknown_playlist_action_is_reported() {
        let err = run(Arc::new(FakeMusicService::new()), "rename_playlist", json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown playlist action: rename_playlist");
    }
}
