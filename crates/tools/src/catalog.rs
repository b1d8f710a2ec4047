//! The built-in action catalog.
//!
//! Names, descriptions and parameter schemas are what the language model
//! sees; they must stay stable. Every entry declares its handler group so
//! routing never depends on how the name happens to be spelled.

use serde_json::{Value, json};
use spotctl_config::AppConfig;
use spotctl_core::action::{ActionCategory, ActionDefinition};
use spotctl_core::error::ActionError;
use spotctl_core::registry::ActionRegistry;
use spotctl_core::routing::HandlerGroup;
use tracing::debug;

/// Bulk actions fan out into many remote calls; keep them on a short leash.
const BULK_MAX_CALLS: u32 = 5;
const BULK_WINDOW_MS: u64 = 60_000;

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn limit(max: u32, description: &str) -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "maximum": max,
        "default": 20,
        "description": description,
    })
}

fn offset() -> Value {
    json!({ "type": "integer", "minimum": 0, "default": 0, "description": "Offset for pagination" })
}

fn ids(description: &str) -> Value {
    json!({ "type": "array", "items": { "type": "string" }, "description": description })
}

fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn market() -> Value {
    string("Market/country code (e.g., \"US\", \"BR\")")
}

fn unit(description: &str) -> Value {
    json!({ "type": "number", "minimum": 0.0, "maximum": 1.0, "description": description })
}

fn time_range() -> Value {
    json!({
        "type": "string",
        "enum": ["short_term", "medium_term", "long_term"],
        "default": "medium_term",
        "description": "Time range for top items",
    })
}

fn entry(
    name: &str,
    description: &str,
    category: ActionCategory,
    parameters: Value,
    permissions: &[&str],
) -> ActionDefinition {
    ActionDefinition::new(name, description, category, parameters)
        .with_permissions(permissions.iter().copied())
        .with_handler_group(HandlerGroup::from(category))
}

fn search_entry(name: &str, what: &str) -> ActionDefinition {
    entry(
        name,
        &format!("Search for {what} on Spotify"),
        ActionCategory::Search,
        object(
            json!({
                "query": string(&format!("Search query for {what}")),
                "limit": limit(50, "Number of results to return"),
                "offset": offset(),
                "market": market(),
            }),
            &["query"],
        ),
        &[],
    )
}

fn playlist_actions() -> Vec<ActionDefinition> {
    use ActionCategory::Playlist;
    vec![
        entry(
            "create_playlist",
            "Create a new Spotify playlist",
            Playlist,
            object(
                json!({
                    "name": string("Name of the playlist"),
                    "isPublic": { "type": "boolean", "default": false, "description": "Whether the playlist should be public" },
                    "description": string("Description of the playlist"),
                }),
                &["name"],
            ),
            &["playlist:modify"],
        ),
        entry(
            "get_user_playlists",
            "Get all user playlists from Spotify",
            Playlist,
            object(
                json!({ "limit": limit(50, "Number of playlists to retrieve"), "offset": offset() }),
                &[],
            ),
            &["playlist:read"],
        ),
        entry(
            "get_playlist_tracks",
            "Get all tracks from a specific playlist",
            Playlist,
            object(
                json!({
                    "playlistId": string("ID of the playlist"),
                    "includeDetails": { "type": "boolean", "default": false, "description": "Include detailed track information" },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 100,
                        "description": "Fetch a single page of this size instead of every track",
                    },
                    "offset": offset(),
                }),
                &["playlistId"],
            ),
            &["playlist:read"],
        ),
        entry(
            "merge_playlists",
            "Merge multiple playlists into a new playlist or existing one",
            Playlist,
            object(
                json!({
                    "sourcePlaylistIds": ids("IDs of playlists to merge"),
                    "targetPlaylistId": string("ID of existing playlist to merge into (if not provided, creates new playlist)"),
                    "newPlaylistName": string("Name for new playlist (required if targetPlaylistId not provided)"),
                    "newPlaylistPublic": { "type": "boolean", "default": false, "description": "Whether new playlist should be public" },
                    "excludeTrackIds": ids("Track IDs to exclude from merge"),
                }),
                &["sourcePlaylistIds"],
            ),
            &["playlist:modify", "playlist:read"],
        )
        .with_rate_limit(BULK_MAX_CALLS, BULK_WINDOW_MS),
        entry(
            "add_tracks_to_playlist",
            "Add specific tracks to a playlist",
            Playlist,
            object(
                json!({
                    "playlistId": string("ID of the playlist"),
                    "trackIds": ids("Array of track IDs to add"),
                }),
                &["playlistId", "trackIds"],
            ),
            &["playlist:modify"],
        ),
        entry(
            "remove_tracks_from_playlist",
            "Remove specific tracks from a playlist",
            Playlist,
            object(
                json!({
                    "playlistId": string("ID of the playlist"),
                    "trackIds": ids("Array of track IDs to remove"),
                }),
                &["playlistId", "trackIds"],
            ),
            &["playlist:modify"],
        ),
    ]
}

fn track_actions() -> Vec<ActionDefinition> {
    use ActionCategory::Track;
    let playlist_ids = || object(json!({ "playlistIds": ids("Array of playlist IDs to process") }), &["playlistIds"]);
    let track_ids = |description: &str| object(json!({ "trackIds": ids(description) }), &["trackIds"]);

    vec![
        entry(
            "like_all_songs_from_playlists",
            "Like all songs from selected playlists (add to saved tracks)",
            Track,
            playlist_ids(),
            &["track:modify", "playlist:read"],
        )
        .with_rate_limit(BULK_MAX_CALLS, BULK_WINDOW_MS),
        entry(
            "dislike_all_songs_from_playlists",
            "Dislike all songs from selected playlists (remove from saved tracks)",
            Track,
            playlist_ids(),
            &["track:modify", "playlist:read"],
        )
        .with_rate_limit(BULK_MAX_CALLS, BULK_WINDOW_MS),
        entry(
            "like_songs",
            "Like specific songs (add to saved tracks)",
            Track,
            track_ids("Array of track IDs to like"),
            &["track:modify"],
        ),
        entry(
            "dislike_songs",
            "Dislike specific songs (remove from saved tracks)",
            Track,
            track_ids("Array of track IDs to dislike"),
            &["track:modify"],
        ),
        entry(
            "get_current_track",
            "Get the currently playing track from Spotify",
            Track,
            object(json!({}), &[]),
            &["track:read"],
        ),
        entry(
            "get_saved_tracks",
            "Get user saved tracks (liked songs)",
            Track,
            object(
                json!({ "limit": limit(50, "Number of tracks to retrieve"), "offset": offset() }),
                &[],
            ),
            &["track:read"],
        ),
        entry(
            "get_track_details",
            "Get detailed information about specific tracks",
            Track,
            track_ids("Array of track IDs to get details for"),
            &["track:read"],
        ),
        entry(
            "get_track_audio_features",
            "Get audio features for tracks (tempo, energy, danceability, etc.)",
            Track,
            track_ids("Array of track IDs to get audio features for"),
            &["track:read"],
        ),
    ]
}

fn search_actions() -> Vec<ActionDefinition> {
    use ActionCategory::Search;
    vec![
        search_entry("search_tracks", "tracks"),
        search_entry("search_playlists", "playlists"),
        search_entry("search_artists", "artists"),
        search_entry("search_albums", "albums"),
        entry(
            "search_all",
            "Search for all types of content on Spotify (tracks, artists, albums, playlists)",
            Search,
            object(
                json!({
                    "query": string("Search query"),
                    "types": {
                        "type": "array",
                        "items": { "type": "string", "enum": ["track", "artist", "album", "playlist"] },
                        "default": ["track", "artist", "album", "playlist"],
                        "description": "Types of content to search for",
                    },
                    "limit": limit(50, "Number of results per type"),
                    "market": market(),
                }),
                &["query"],
            ),
            &[],
        ),
        entry(
            "get_recommendations",
            "Get track recommendations based on seed tracks, artists, or genres",
            Search,
            object(
                json!({
                    "seedTracks": ids("Array of track IDs to use as seeds"),
                    "seedArtists": ids("Array of artist IDs to use as seeds"),
                    "seedGenres": ids("Array of genres to use as seeds"),
                    "limit": limit(100, "Number of recommendations to return"),
                    "market": market(),
                    "targetAcousticness": unit("Target acousticness (0.0 to 1.0)"),
                    "targetDanceability": unit("Target danceability (0.0 to 1.0)"),
                    "targetEnergy": unit("Target energy (0.0 to 1.0)"),
                    "targetValence": unit("Target valence/positivity (0.0 to 1.0)"),
                }),
                &[],
            ),
            &[],
        ),
    ]
}

fn user_actions() -> Vec<ActionDefinition> {
    use ActionCategory::User;
    let top = |what: &str| {
        object(
            json!({
                "timeRange": time_range(),
                "limit": limit(50, &format!("Number of {what} to return")),
                "offset": offset(),
            }),
            &[],
        )
    };
    let artist_ids = |description: &str| object(json!({ "artistIds": ids(description) }), &["artistIds"]);

    vec![
        entry(
            "get_user_profile",
            "Get current user profile information",
            User,
            object(json!({}), &[]),
            &["user:read"],
        ),
        entry("get_user_top_tracks", "Get user top tracks", User, top("tracks"), &["user:read"]),
        entry("get_user_top_artists", "Get user top artists", User, top("artists"), &["user:read"]),
        entry(
            "get_followed_artists",
            "Get artists followed by the user",
            User,
            object(
                json!({
                    "limit": limit(50, "Number of artists to return"),
                    "after": string("Artist ID to start after (for pagination)"),
                }),
                &[],
            ),
            &["user:read"],
        ),
        entry(
            "follow_artists",
            "Follow artists",
            User,
            artist_ids("Array of artist IDs to follow"),
            &["user:modify"],
        ),
        entry(
            "unfollow_artists",
            "Unfollow artists",
            User,
            artist_ids("Array of artist IDs to unfollow"),
            &["user:modify"],
        ),
        entry(
            "follow_playlist",
            "Follow a playlist",
            User,
            object(
                json!({
                    "playlistId": string("ID of the playlist to follow"),
                    "isPublic": { "type": "boolean", "default": true, "description": "Whether to follow publicly" },
                }),
                &["playlistId"],
            ),
            &["user:modify"],
        ),
        entry(
            "unfollow_playlist",
            "Unfollow a playlist",
            User,
            object(json!({ "playlistId": string("ID of the playlist to unfollow") }), &["playlistId"]),
            &["user:modify"],
        ),
        entry(
            "get_recently_played",
            "Get recently played tracks",
            User,
            object(
                json!({
                    "limit": limit(50, "Number of tracks to return"),
                    "after": { "type": "integer", "description": "Unix timestamp to get tracks after" },
                    "before": { "type": "integer", "description": "Unix timestamp to get tracks before" },
                }),
                &[],
            ),
            &["user:read"],
        ),
    ]
}

fn system_actions() -> Vec<ActionDefinition> {
    use ActionCategory::System;
    let none = || object(json!({}), &[]);

    vec![
        entry(
            "get_available_tools",
            "Get list of all available tools and their descriptions",
            System,
            object(
                json!({
                    "category": {
                        "type": "string",
                        "enum": ActionCategory::ALL,
                        "description": "Filter tools by category",
                    },
                }),
                &[],
            ),
            &[],
        ),
        entry("get_system_status", "Get system status and health information", System, none(), &[]),
        entry(
            "get_spotify_connection_status",
            "Check Spotify API connection status and authentication",
            System,
            none(),
            &[],
        ),
        entry("refresh_spotify_token", "Refresh Spotify access token", System, none(), &[]),
        entry(
            "get_context",
            "Get current session context and conversation history",
            System,
            object(
                json!({
                    "includeHistory": { "type": "boolean", "default": false, "description": "Include full conversation history" },
                }),
                &[],
            ),
            &[],
        ),
        entry(
            "clear_context",
            "Clear current session context and conversation history",
            System,
            none(),
            &[],
        ),
        entry(
            "save_context",
            "Save current session context to file",
            System,
            object(
                json!({ "filename": string("Filename to save context to (auto-generated if not provided)") }),
                &[],
            ),
            &[],
        ),
        entry(
            "load_context",
            "Load session context from file",
            System,
            object(json!({ "filename": string("Filename to load context from") }), &["filename"]),
            &[],
        ),
        entry(
            "get_help",
            "Get help information about using the AI framework",
            System,
            object(json!({ "topic": string("Specific topic to get help for") }), &[]),
            &[],
        ),
        entry(
            "execute_command",
            "Execute a raw Spotify CLI command",
            System,
            object(
                json!({
                    "command": string("CLI command to execute"),
                    "args": { "type": "array", "items": { "type": "string" }, "default": [], "description": "Command arguments" },
                }),
                &["command"],
            ),
            &["system:execute"],
        ),
    ]
}

/// Every built-in definition, in catalog order.
pub fn definitions() -> Vec<ActionDefinition> {
    let mut all = playlist_actions();
    all.extend(track_actions());
    all.extend(search_actions());
    all.extend(user_actions());
    all.extend(system_actions());
    all
}

/// Register the catalog, applying `[rate_limits.<action>]` overrides.
pub fn register_all(registry: &mut ActionRegistry, config: &AppConfig) -> Result<(), ActionError> {
    for mut definition in definitions() {
        if let Some(policy) = config.rate_limit_override(&definition.name) {
            debug!(action = %definition.name, max_calls = policy.max_calls, window_ms = policy.window_ms, "Rate limit override");
            definition.rate_limit = Some(policy);
        }
        registry.register(definition)?;
    }
    Ok(())
}

pub fn build_registry(config: &AppConfig) -> Result<ActionRegistry, ActionError> {
    let mut registry = ActionRegistry::new();
    register_all(&mut registry, config)?;
    Ok(registry)
}
