//! Action-name routing.
//!
//! Every action executes through one of five handler groups. The group is
//! normally declared on the definition; [`infer_route`] is the name-based
//! fallback used for definitions that do not declare one.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::action::ActionCategory;

/// The handler group an action executes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandlerGroup {
    Playlist,
    Track,
    Search,
    User,
    System,
}

impl HandlerGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playlist => "playlist",
            Self::Track => "track",
            Self::Search => "search",
            Self::User => "user",
            Self::System => "system",
        }
    }

    /// Groups whose handlers call the remote music service and therefore
    /// need an authenticated session.
    pub fn is_remote(&self) -> bool {
        !matches!(self, Self::System)
    }
}

impl fmt::Display for HandlerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ActionCategory> for HandlerGroup {
    fn from(category: ActionCategory) -> Self {
        match category {
            ActionCategory::Playlist => Self::Playlist,
            ActionCategory::Track => Self::Track,
            ActionCategory::User => Self::User,
            ActionCategory::Search => Self::Search,
            ActionCategory::System => Self::System,
        }
    }
}

/// Outcome of resolving an action name to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Handler(HandlerGroup),
    /// A create/get/merge/add/remove verb whose object could not be identified.
    Unmatched,
    /// Leading token is not a known verb; no generic executor exists.
    Generic,
}

impl Route {
    pub fn group(&self) -> Option<HandlerGroup> {
        match self {
            Self::Handler(group) => Some(*group),
            _ => None,
        }
    }
}

/// Infer a route from the action name alone.
///
/// The leading `_`-separated token selects the verb. CRUD-style verbs are
/// disambiguated by substring: "playlist" first, then "track" or "song",
/// then "user".
pub fn infer_route(name: &str) -> Route {
    let verb = name.split('_').next().unwrap_or_default();
    match verb {
        "create" | "get" | "merge" | "add" | "remove" => {
            if name.contains("playlist") {
                Route::Handler(HandlerGroup::Playlist)
            } else if name.contains("track") || name.contains("song") {
                Route::Handler(HandlerGroup::Track)
            } else if name.contains("user") {
                Route::Handler(HandlerGroup::User)
            } else {
                Route::Unmatched
            }
        }
        "like" | "dislike" => Route::Handler(HandlerGroup::Track),
        "search" => Route::Handler(HandlerGroup::Search),
        "follow" | "unfollow" => Route::Handler(HandlerGroup::User),
        "system" => Route::Handler(HandlerGroup::System),
        _ => Route::Generic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crud_verbs_use_substring_checks() {
        assert_eq!(infer_route("create_playlist"), Route::Handler(HandlerGroup::Playlist));
        assert_eq!(infer_route("get_saved_tracks"), Route::Handler(HandlerGroup::Track));
        assert_eq!(infer_route("remove_song"), Route::Handler(HandlerGroup::Track));
        assert_eq!(infer_route("get_user_profile"), Route::Handler(HandlerGroup::User));
        assert_eq!(infer_route("get_help"), Route::Unmatched);
    }

    #[test]
    fn playlist_wins_over_track() {
        assert_eq!(infer_route("add_tracks_to_playlist"), Route::Handler(HandlerGroup::Playlist));
    }

    #[test]
    fn track_wins_over_user() {
        // Declared group on the catalog entry overrides this.
        assert_eq!(infer_route("get_user_top_tracks"), Route::Handler(HandlerGroup::Track));
    }

    #[test]
    fn other_verbs() {
        assert_eq!(infer_route("like_songs"), Route::Handler(HandlerGroup::Track));
        assert_eq!(infer_route("dislike_all_songs_from_playlists"), Route::Handler(HandlerGroup::Track));
        assert_eq!(infer_route("search_albums"), Route::Handler(HandlerGroup::Search));
        assert_eq!(infer_route("unfollow_artists"), Route::Handler(HandlerGroup::User));
        assert_eq!(infer_route("system_status"), Route::Handler(HandlerGroup::System));
        assert_eq!(infer_route("foo_bar"), Route::Generic);
        assert_eq!(infer_route(""), Route::Generic);
    }

    #[test]
    fn only_system_is_local() {
        assert!(HandlerGroup::Playlist.is_remote());
        assert!(!HandlerGroup::System.is_remote());
    }
}
