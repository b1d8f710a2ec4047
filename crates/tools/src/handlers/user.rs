use async_trait::async_trait;
use serde_json::{Value, json};
use spotctl_core::action::ActionExecutionResult;
use spotctl_core::error::ActionError;
use spotctl_core::music::{ApiCall, MusicService, TopItemKind};
use spotctl_core::routing::HandlerGroup;
use std::sync::Arc;

use super::{count_at, remote_error, unknown_action};
use crate::engine::{ActionHandler, ActionRequest};
use crate::params::{
    ArtistIdsParams, FollowPlaylistParams, FollowedArtistsParams, PlaylistIdParams, RecentlyPlayedParams,
    TopItemsParams, parse,
};

pub struct UserHandler {
    music: Arc<dyn MusicService>,
}

impl UserHandler {
    pub fn new(music: Arc<dyn MusicService>) -> Self {
        Self { music }
    }

    async fn call(&self, action: &str, call: ApiCall) -> Result<Value, ActionError> {
        self.music.call(call).await.map_err(|e| remote_error(action, e))
    }

    async fn top(&self, action: &str, kind: TopItemKind, params: Value) -> Result<ActionExecutionResult, ActionError> {
        let p: TopItemsParams = parse(action, params)?;
        let body = self
            .call(action, ApiCall::TopItems {
                kind,
                time_range: p.time_range,
                limit: p.limit,
                offset: p.offset,
            })
            .await?;
        let count = count_at(&body, "/items");
        Ok(ActionExecutionResult::ok(body)
            .with_metadata("timeRange", p.time_range.as_str())
            .with_metadata("count", count))
    }
}

#[async_trait]
impl ActionHandler for UserHandler {
    fn group(&self) -> HandlerGroup {
        HandlerGroup::User
    }

    async fn handle(&self, request: ActionRequest<'_>) -> Result<ActionExecutionResult, ActionError> {
        let action = request.action;
        let params = request.parameters;

        match action {
            "get_user_profile" => {
                let body = self.call(action, ApiCall::Me).await?;
                let user_id = body.get("id").cloned().unwrap_or(Value::Null);
                Ok(ActionExecutionResult::ok(body).with_metadata("userId", user_id))
            }
            "get_user_top_tracks" => self.top(action, TopItemKind::Tracks, params).await,
            "get_user_top_artists" => self.top(action, TopItemKind::Artists, params).await,
            "get_followed_artists" => {
                let p: FollowedArtistsParams = parse(action, params)?;
                let body = self
                    .call(action, ApiCall::FollowedArtists {
                        limit: p.limit,
                        after: p.after,
                    })
                    .await?;
                let count = count_at(&body, "/artists/items");
                Ok(ActionExecutionResult::ok(body).with_metadata("count", count))
            }
            "follow_artists" | "unfollow_artists" => {
                let p: ArtistIdsParams = parse(action, params)?;
                let count = p.artist_ids.len();
                let (call, key) = if action == "follow_artists" {
                    (ApiCall::FollowArtists { ids: p.artist_ids }, "followed")
                } else {
                    (ApiCall::UnfollowArtists { ids: p.artist_ids }, "unfollowed")
                };
                self.call(action, call).await?;
                Ok(ActionExecutionResult::ok(json!({ key: true })).with_metadata("artistCount", count))
            }
            "follow_playlist" => {
                let p: FollowPlaylistParams = parse(action, params)?;
                self.call(action, ApiCall::FollowPlaylist {
                    playlist_id: p.playlist_id.clone(),
                    public: p.is_public,
                })
                .await?;
                Ok(ActionExecutionResult::ok(json!({ "followed": true })).with_metadata("playlistId", p.playlist_id))
            }
            "unfollow_playlist" => {
                let p: PlaylistIdParams = parse(action, params)?;
                self.call(action, ApiCall::UnfollowPlaylist {
                    playlist_id: p.playlist_id.clone(),
                })
                .await?;
                Ok(ActionExecutionResult::ok(json!({ "unfollowed": true })).with_metadata("playlistId", p.playlist_id))
            }
            "get_recently_played" => {
                let p: RecentlyPlayedParams = parse(action, params)?;
                let body = self
                    .call(action, ApiCall::RecentlyPlayed {
                        limit: p.limit,
                        after: p.after,
                        before: p.before,
                    })
                    .await?;
                let count = count_at(&body, "/items");
                Ok(ActionExecutionResult::ok(body).with_metadata("count", count))
            }
            _ => Err(unknown_action(self.group(), action)),
        }
    }
}
