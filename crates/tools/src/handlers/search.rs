use async_trait::async_trait;
use serde_json::Value;
use spotctl_core::action::ActionExecutionResult;
use spotctl_core::error::ActionError;
use spotctl_core::music::{ApiCall, MusicService, RecommendationQuery, SearchType};
use spotctl_core::routing::HandlerGroup;
use std::sync::Arc;

use super::{count_at, remote_error, unknown_action};
use crate::engine::{ActionHandler, ActionRequest};
use crate::params::{RecommendationsParams, SearchAllParams, SearchParams, parse};

pub struct SearchHandler {
    music: Arc<dyn MusicService>,
}

impl SearchHandler {
    pub fn new(music: Arc<dyn MusicService>) -> Self {
        Self { music }
    }

    async fn search_one(&self, action: &str, kind: SearchType, params: Value) -> Result<ActionExecutionResult, ActionError> {
        let p: SearchParams = parse(action, params)?;
        let body = self
            .music
            .call(ApiCall::Search {
                query: p.query.clone(),
                types: vec![kind],
                limit: p.limit,
                offset: p.offset,
                market: p.market,
            })
            .await
            .map_err(|e| remote_error(action, e))?;

        // Results are keyed by the plural type name, e.g. `tracks.items`.
        let count = count_at(&body, &format!("/{}s/items", kind.as_str()));
        Ok(ActionExecutionResult::ok(body)
            .with_metadata("query", p.query)
            .with_metadata("count", count))
    }
}

#[async_trait]
impl ActionHandler for SearchHandler {
    fn group(&self) -> HandlerGroup {
        HandlerGroup::Search
    }

    async fn handle(&self, request: ActionRequest<'_>) -> Result<ActionExecutionResult, ActionError> {
        let action = request.action;
        let params = request.parameters;

        match action {
            "search_tracks" => self.search_one(action, SearchType::Track, params).await,
            "search_playlists" => self.search_one(action, SearchType::Playlist, params).await,
            "search_artists" => self.search_one(action, SearchType::Artist, params).await,
            "search_albums" => self.search_one(action, SearchType::Album, params).await,
            "search_all" => {
                let p: SearchAllParams = parse(action, params)?;
                let types: Vec<&str> = p.types.iter().map(SearchType::as_str).collect();
                let types = types.join(",");
                let body = self
                    .music
                    .call(ApiCall::Search {
                        query: p.query.clone(),
                        types: p.types,
                        limit: p.limit,
                        offset: 0,
                        market: p.market,
                    })
                    .await
                    .map_err(|e| remote_error(action, e))?;
                Ok(ActionExecutionResult::ok(body)
                    .with_metadata("query", p.query)
                    .with_metadata("types", types))
            }
            "get_recommendations" => {
                let p: RecommendationsParams = parse(action, params)?;
                let body = self
                    .music
                    .call(ApiCall::Recommendations(RecommendationQuery {
                        seed_tracks: p.seed_tracks,
                        seed_artists: p.seed_artists,
                        seed_genres: p.seed_genres,
                        limit: p.limit,
                        market: p.market,
                        target_acousticness: p.target_acousticness,
                        target_danceability: p.target_danceability,
                        target_energy: p.target_energy,
                        target_valence: p.target_valence,
                    }))
                    .await
                    .map_err(|e| remote_error(action, e))?;
                let count = count_at(&body, "/tracks");
                Ok(ActionExecutionResult::ok(body).with_metadata("count", count))
            }
            _ => Err(unknown_action(self.group(), action)),
        }
    }
}
