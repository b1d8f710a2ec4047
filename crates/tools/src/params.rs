//! Typed parameter shapes, one per action.
//!
//! Parameters arrive as loose JSON from the model. Each handler parses them
//! into its struct here, filling defaults and checking bounds before any
//! remote call is made.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use spotctl_core::action::ActionCategory;
use spotctl_core::error::ActionError;
use spotctl_core::music::{SearchType, TimeRange};

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 50;
pub const MAX_RECOMMENDATION_LIMIT: u32 = 100;
/// Largest page the remote service returns for playlist items.
pub const MAX_PLAYLIST_PAGE: u32 = 100;

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_true() -> bool {
    true
}

fn default_search_types() -> Vec<SearchType> {
    vec![
        SearchType::Track,
        SearchType::Artist,
        SearchType::Album,
        SearchType::Playlist,
    ]
}

/// A parameter struct that can check its own bounds after deserialization.
pub trait ActionParams: DeserializeOwned {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Deserialize and validate `value` for `action`. `null` is treated as `{}`.
pub fn parse<T: ActionParams>(action: &str, value: serde_json::Value) -> Result<T, ActionError> {
    let value = if value.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        value
    };

    let invalid = |reason: String| ActionError::InvalidParameters {
        action: action.to_string(),
        reason,
    };

    let params: T = serde_json::from_value(value).map_err(|e| invalid(e.to_string()))?;
    params.validate().map_err(invalid)?;
    Ok(params)
}

fn check_limit(limit: u32, max: u32) -> Result<(), String> {
    if (1..=max).contains(&limit) {
        Ok(())
    } else {
        Err(format!("limit must be between 1 and {max}, got {limit}"))
    }
}

fn check_non_empty(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} must not be empty"))
    } else {
        Ok(())
    }
}

fn check_ids(field: &str, ids: &[String]) -> Result<(), String> {
    if ids.is_empty() {
        return Err(format!("{field} must contain at least one id"));
    }
    if ids.iter().any(|id| id.trim().is_empty()) {
        return Err(format!("{field} contains an empty id"));
    }
    Ok(())
}

fn check_unit(field: &str, value: Option<f64>) -> Result<(), String> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(format!("{field} must be between 0.0 and 1.0, got {v}")),
        _ => Ok(()),
    }
}

/// Actions that take no parameters; anything passed is ignored.
#[derive(Debug, Default, Deserialize)]
pub struct NoParams {}

impl ActionParams for NoParams {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl ActionParams for PageParams {
    fn validate(&self) -> Result<(), String> {
        check_limit(self.limit, MAX_PAGE_LIMIT)
    }
}

// --- playlist ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaylistParams {
    pub name: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl ActionParams for CreatePlaylistParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("name", &self.name)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistTracksParams {
    pub playlist_id: String,
    #[serde(default)]
    pub include_details: bool,
    /// Absent means "every track", fetched page by page.
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl ActionParams for PlaylistTracksParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("playlistId", &self.playlist_id)?;
        match self.limit {
            Some(limit) => check_limit(limit, MAX_PLAYLIST_PAGE),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePlaylistsParams {
    pub source_playlist_ids: Vec<String>,
    #[serde(default)]
    pub target_playlist_id: Option<String>,
    #[serde(default)]
    pub new_playlist_name: Option<String>,
    #[serde(default)]
    pub new_playlist_public: bool,
    #[serde(default)]
    pub exclude_track_ids: Vec<String>,
}

impl ActionParams for MergePlaylistsParams {
    fn validate(&self) -> Result<(), String> {
        check_ids("sourcePlaylistIds", &self.source_playlist_ids)?;
        let has_target = self.target_playlist_id.as_deref().is_some_and(|t| !t.trim().is_empty());
        let has_name = self.new_playlist_name.as_deref().is_some_and(|n| !n.trim().is_empty());
        if !has_target && !has_name {
            return Err("either targetPlaylistId or newPlaylistName is required".into());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistTrackIdsParams {
    pub playlist_id: String,
    pub track_ids: Vec<String>,
}

impl ActionParams for PlaylistTrackIdsParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("playlistId", &self.playlist_id)?;
        check_ids("trackIds", &self.track_ids)
    }
}

// --- track ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistIdsParams {
    pub playlist_ids: Vec<String>,
}

impl ActionParams for PlaylistIdsParams {
    fn validate(&self) -> Result<(), String> {
        check_ids("playlistIds", &self.playlist_ids)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackIdsParams {
    pub track_ids: Vec<String>,
}

impl ActionParams for TrackIdsParams {
    fn validate(&self) -> Result<(), String> {
        check_ids("trackIds", &self.track_ids)
    }
}

// --- search ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub market: Option<String>,
}

impl ActionParams for SearchParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("query", &self.query)?;
        check_limit(self.limit, MAX_PAGE_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAllParams {
    pub query: String,
    #[serde(default = "default_search_types")]
    pub types: Vec<SearchType>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub market: Option<String>,
}

impl ActionParams for SearchAllParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("query", &self.query)?;
        if self.types.is_empty() {
            return Err("types must name at least one content type".into());
        }
        check_limit(self.limit, MAX_PAGE_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationsParams {
    #[serde(default)]
    pub seed_tracks: Vec<String>,
    #[serde(default)]
    pub seed_artists: Vec<String>,
    #[serde(default)]
    pub seed_genres: Vec<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub target_acousticness: Option<f64>,
    #[serde(default)]
    pub target_danceability: Option<f64>,
    #[serde(default)]
    pub target_energy: Option<f64>,
    #[serde(default)]
    pub target_valence: Option<f64>,
}

impl ActionParams for RecommendationsParams {
    fn validate(&self) -> Result<(), String> {
        if self.seed_tracks.is_empty() && self.seed_artists.is_empty() && self.seed_genres.is_empty() {
            return Err("at least one of seedTracks, seedArtists or seedGenres is required".into());
        }
        check_limit(self.limit, MAX_RECOMMENDATION_LIMIT)?;
        check_unit("targetAcousticness", self.target_acousticness)?;
        check_unit("targetDanceability", self.target_danceability)?;
        check_unit("targetEnergy", self.target_energy)?;
        check_unit("targetValence", self.target_valence)
    }
}

// --- user ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopItemsParams {
    #[serde(default)]
    pub time_range: TimeRange,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl ActionParams for TopItemsParams {
    fn validate(&self) -> Result<(), String> {
        check_limit(self.limit, MAX_PAGE_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowedArtistsParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub after: Option<String>,
}

impl ActionParams for FollowedArtistsParams {
    fn validate(&self) -> Result<(), String> {
        check_limit(self.limit, MAX_PAGE_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistIdsParams {
    pub artist_ids: Vec<String>,
}

impl ActionParams for ArtistIdsParams {
    fn validate(&self) -> Result<(), String> {
        check_ids("artistIds", &self.artist_ids)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowPlaylistParams {
    pub playlist_id: String,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

impl ActionParams for FollowPlaylistParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("playlistId", &self.playlist_id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistIdParams {
    pub playlist_id: String,
}

impl ActionParams for PlaylistIdParams {
    fn validate(&self) -> Result<(), String> {
        check_non_empty("playlistId", &self.playlist_id)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentlyPlayedParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Unix timestamp in milliseconds
    #[serde(default)]
    pub after: Option<i64>,
    #[serde(default)]
    pub before: Option<i64>,
}

impl ActionParams for RecentlyPlayedParams {
    fn validate(&self) -> Result<(), String> {
        check_limit(self.limit, MAX_PAGE_LIMIT)?;
        if self.after.is_some() && self.before.is_some() {
            return Err("only one of after or before may be given".into());
        }
        Ok(())
    }
}

// --- system ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableToolsParams {
    #[serde(default)]
    pub category: Option<ActionCategory>,
}

impl ActionParams for AvailableToolsParams {}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetContextParams {
    #[serde(default)]
    pub include_history: bool,
}

impl ActionParams for GetContextParams {}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveContextParams {
    #[serde(default)]
    pub filename: Option<String>,
}

impl ActionParams for SaveContextParams {
    fn validate(&self) -> Result<(), String> {
        match &self.filename {
            Some(name) => check_filename(name),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadContextParams {
    pub filename: String,
}

impl ActionParams for LoadContextParams {
    fn validate(&self) -> Result<(), String> {
        check_filename(&self.filename)
    }
}

/// Context files live flat in one directory.
fn check_filename(name: &str) -> Result<(), String> {
    check_non_empty("filename", name)?;
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(format!("filename '{name}' must not contain path separators"));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelpParams {
    #[serde(default)]
    pub topic: Option<String>,
}

impl ActionParams for HelpParams {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteCommandParams {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ActionParams for ExecuteCommandParams {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_defaults_fill_in() {
        let p: SearchParams = parse("search_tracks", json!({"query": "daft punk"})).unwrap();
        assert_eq!(p.limit, 20);
        assert_eq!(p.offset, 0);
        assert!(p.market.is_none());
    }

    #[test]
    fn limit_out_of_bounds_is_rejected() {
        let err = parse::<SearchParams>("search_tracks", json!({"query": "x", "limit": 51})).unwrap_err();
        match err {
            ActionError::InvalidParameters { action, reason } => {
                assert_eq!(action, "search_tracks");
                assert!(reason.contains("between 1 and 50"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(parse::<PageParams>("get_saved_tracks", json!({"limit": 0})).is_err());
    }

    #[test]
    fn recommendations_allow_larger_limit_but_check_targets() {
        let ok: RecommendationsParams =
            parse("get_recommendations", json!({"seedGenres": ["house"], "limit": 100})).unwrap();
        assert_eq!(ok.limit, 100);

        assert!(parse::<RecommendationsParams>("get_recommendations", json!({"limit": 10})).is_err());
        assert!(
            parse::<RecommendationsParams>(
                "get_recommendations",
                json!({"seedTracks": ["t"], "targetEnergy": 1.5})
            )
            .is_err()
        );
    }

    #[test]
    fn missing_required_field_is_invalid() {
        let err = parse::<TrackIdsParams>("like_songs", json!({})).unwrap_err();
        assert!(err.to_string().contains("trackIds"));
        assert!(parse::<TrackIdsParams>("like_songs", json!({"trackIds": []})).is_err());
    }

    #[test]
    fn merge_needs_target_or_new_name() {
        assert!(parse::<MergePlaylistsParams>("merge_playlists", json!({"sourcePlaylistIds": ["a"]})).is_err());
        let p: MergePlaylistsParams = parse(
            "merge_playlists",
            json!({"sourcePlaylistIds": ["a", "b"], "newPlaylistName": "Mix"}),
        )
        .unwrap();
        assert!(!p.new_playlist_public);
        assert!(p.exclude_track_ids.is_empty());
    }

    #[test]
    fn visibility_defaults_differ_between_create_and_follow() {
        let create: CreatePlaylistParams = parse("create_playlist", json!({"name": "Road trip"})).unwrap();
        let follow: FollowPlaylistParams = parse("follow_playlist", json!({"playlistId": "p1"})).unwrap();
        assert!(!create.is_public);
        assert!(follow.is_public);
    }

    #[test]
    fn top_items_default_to_medium_term() {
        let p: TopItemsParams = parse("get_user_top_tracks", serde_json::Value::Null).unwrap();
        assert_eq!(p.time_range, TimeRange::MediumTerm);
        let p: TopItemsParams = parse("get_user_top_tracks", json!({"timeRange": "long_term"})).unwrap();
        assert_eq!(p.time_range, TimeRange::LongTerm);
    }

    #[test]
    fn search_all_defaults_to_every_type() {
        let p: SearchAllParams = parse("search_all", json!({"query": "jazz"})).unwrap();
        assert_eq!(p.types.len(), 4);
    }

    #[test]
    fn context_filenames_cannot_escape_directory() {
        assert!(parse::<LoadContextParams>("load_context", json!({"filename": "../secrets"})).is_err());
        assert!(parse::<SaveContextParams>("save_context", json!({"filename": "a\\b.json"})).is_err());
        assert!(parse::<LoadContextParams>("load_context", json!({"filename": "session.json"})).is_ok());
    }

    #[test]
    fn unknown_category_is_invalid() {
        assert!(parse::<AvailableToolsParams>("get_available_tools", json!({"category": "podcast"})).is_err());
        let p: AvailableToolsParams = parse("get_available_tools", json!({"category": "search"})).unwrap();
        assert_eq!(p.category, Some(ActionCategory::Search));
    }
}
