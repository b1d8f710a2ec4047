//! MusicService trait: the abstraction over the remote music API.
//!
//! Handlers never build URLs. They describe a request as an [`ApiCall`] and
//! get the decoded JSON body back. The HTTP implementation lives in
//! `spotctl-spotify`; tests use an in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MusicApiError;

/// Tokens the service authenticates with.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Result of a token exchange or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Track,
    Artist,
    Album,
    Playlist,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Playlist => "playlist",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    ShortTerm,
    #[default]
    MediumTerm,
    LongTerm,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShortTerm => "short_term",
            Self::MediumTerm => "medium_term",
            Self::LongTerm => "long_term",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopItemKind {
    Tracks,
    Artists,
}

impl TopItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tracks => "tracks",
            Self::Artists => "artists",
        }
    }
}

/// Seeds and tunables for a recommendations request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationQuery {
    pub seed_tracks: Vec<String>,
    pub seed_artists: Vec<String>,
    pub seed_genres: Vec<String>,
    pub limit: u32,
    pub market: Option<String>,
    pub target_acousticness: Option<f64>,
    pub target_danceability: Option<f64>,
    pub target_energy: Option<f64>,
    pub target_valence: Option<f64>,
}

/// One request to the remote service.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    /// Current user profile
    Me,
    CreatePlaylist {
        name: String,
        public: bool,
        description: Option<String>,
    },
    UserPlaylists {
        limit: u32,
        offset: u32,
    },
    PlaylistTracks {
        playlist_id: String,
        limit: u32,
        offset: u32,
    },
    AddTracksToPlaylist {
        playlist_id: String,
        uris: Vec<String>,
    },
    RemoveTracksFromPlaylist {
        playlist_id: String,
        uris: Vec<String>,
    },
    SaveTracks {
        ids: Vec<String>,
    },
    RemoveSavedTracks {
        ids: Vec<String>,
    },
    CurrentlyPlaying,
    SavedTracks {
        limit: u32,
        offset: u32,
    },
    Tracks {
        ids: Vec<String>,
    },
    AudioFeatures {
        ids: Vec<String>,
    },
    Search {
        query: String,
        types: Vec<SearchType>,
        limit: u32,
        offset: u32,
        market: Option<String>,
    },
    Recommendations(RecommendationQuery),
    TopItems {
        kind: TopItemKind,
        time_range: TimeRange,
        limit: u32,
        offset: u32,
    },
    FollowedArtists {
        limit: u32,
        after: Option<String>,
    },
    FollowArtists {
        ids: Vec<String>,
    },
    UnfollowArtists {
        ids: Vec<String>,
    },
    FollowPlaylist {
        playlist_id: String,
        public: bool,
    },
    UnfollowPlaylist {
        playlist_id: String,
    },
    RecentlyPlayed {
        limit: u32,
        after: Option<i64>,
        before: Option<i64>,
    },
}

impl ApiCall {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Me => "me",
            Self::CreatePlaylist { .. } => "create_playlist",
            Self::UserPlaylists { .. } => "user_playlists",
            Self::PlaylistTracks { .. } => "playlist_tracks",
            Self::AddTracksToPlaylist { .. } => "add_tracks_to_playlist",
            Self::RemoveTracksFromPlaylist { .. } => "remove_tracks_from_playlist",
            Self::SaveTracks { .. } => "save_tracks",
            Self::RemoveSavedTracks { .. } => "remove_saved_tracks",
            Self::CurrentlyPlaying => "currently_playing",
            Self::SavedTracks { .. } => "saved_tracks",
            Self::Tracks { .. } => "tracks",
            Self::AudioFeatures { .. } => "audio_features",
            Self::Search { .. } => "search",
            Self::Recommendations(_) => "recommendations",
            Self::TopItems { .. } => "top_items",
            Self::FollowedArtists { .. } => "followed_artists",
            Self::FollowArtists { .. } => "follow_artists",
            Self::UnfollowArtists { .. } => "unfollow_artists",
            Self::FollowPlaylist { .. } => "follow_playlist",
            Self::UnfollowPlaylist { .. } => "unfollow_playlist",
            Self::RecentlyPlayed { .. } => "recently_played",
        }
    }
}

/// The remote music service.
///
/// Credentials are held by the service itself; the execution engine pushes
/// the session's tokens in at initialization.
#[async_trait]
pub trait MusicService: Send + Sync {
    fn name(&self) -> &str;

    fn set_credentials(&self, credentials: Credentials);

    fn credentials(&self) -> Credentials;

    /// Perform one call and return the decoded body (`Null` for empty responses).
    async fn call(&self, call: ApiCall) -> Result<serde_json::Value, MusicApiError>;

    /// Exchange the stored refresh token for a new access token and store it.
    async fn refresh_access_token(&self) -> Result<TokenGrant, MusicApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials {
            access_token: Some("secret-token".into()),
            refresh_token: None,
        };
        let printed = format!("{creds:?}");
        assert!(!printed.contains("secret-token"));
        assert!(printed.contains("REDACTED"));
    }

    #[test]
    fn time_range_defaults_to_medium() {
        assert_eq!(TimeRange::default().as_str(), "medium_term");
        let parsed: TimeRange = serde_json::from_str(r#""short_term""#).unwrap();
        assert_eq!(parsed, TimeRange::ShortTerm);
    }
}
