//! Multi-call operations built on top of single [`ApiCall`]s.
//!
//! Aggregating a whole playlist, writing the library in batches and merging
//! playlists each take many remote calls; the handlers delegate here.

use serde::Serialize;
use serde_json::Value;
use spotctl_core::error::MusicApiError;
use spotctl_core::music::{ApiCall, MusicService};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Page size used when aggregating playlist items.
pub const PLAYLIST_PAGE_SIZE: u32 = 100;
/// Most ids the library endpoints accept per request.
pub const LIBRARY_BATCH_SIZE: usize = 50;
/// Most URIs a playlist accepts per add request.
pub const PLAYLIST_ADD_BATCH_SIZE: usize = 100;
/// Pause between consecutive batches.
pub const BATCH_PAUSE: Duration = Duration::from_millis(100);

/// Fetch every track of a playlist, page by page, in playlist order.
///
/// Stops at the first page shorter than [`PLAYLIST_PAGE_SIZE`]. Items whose
/// track is gone (`null`) are dropped.
pub async fn playlist_tracks(music: &dyn MusicService, playlist_id: &str) -> Result<Vec<Value>, MusicApiError> {
    let mut tracks = Vec::new();
    let mut offset = 0;

    loop {
        let page = music
            .call(ApiCall::PlaylistTracks {
                playlist_id: playlist_id.to_string(),
                limit: PLAYLIST_PAGE_SIZE,
                offset,
            })
            .await?;

        let items = page
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| MusicApiError::Decode(format!("playlist {playlist_id} page has no items")))?;
        let page_len = items.len();

        tracks.extend(
            items
                .iter()
                .filter_map(|item| item.get("track"))
                .filter(|track| !track.is_null())
                .cloned(),
        );

        if page_len < PLAYLIST_PAGE_SIZE as usize {
            break;
        }
        offset += PLAYLIST_PAGE_SIZE;
    }

    debug!(playlist_id, tracks = tracks.len(), "Aggregated playlist tracks");
    Ok(tracks)
}

/// Run `process` over consecutive chunks of `items`, pausing between chunks.
///
/// No pause follows the last chunk. The first error stops processing.
pub async fn process_in_batches<T, F, Fut, E>(
    items: &[T],
    batch_size: usize,
    pause: Duration,
    mut process: F,
) -> Result<usize, E>
where
    T: Clone,
    F: FnMut(Vec<T>) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let batch_size = batch_size.max(1);
    let mut batches = 0;

    for (index, chunk) in items.chunks(batch_size).enumerate() {
        process(chunk.to_vec()).await?;
        batches += 1;
        if (index + 1) * batch_size < items.len() {
            tokio::time::sleep(pause).await;
        }
    }

    Ok(batches)
}

pub fn track_id(track: &Value) -> Option<&str> {
    track.get("id").and_then(Value::as_str)
}

pub fn track_uri(track: &Value) -> Option<&str> {
    track.get("uri").and_then(Value::as_str)
}

/// `spotify:track:<id>` for a bare id; URIs pass through unchanged.
pub fn to_track_uri(id: &str) -> String {
    if id.starts_with("spotify:") {
        id.to_string()
    } else {
        format!("spotify:track:{id}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryChange {
    Save,
    Remove,
}

impl LibraryChange {
    pub(crate) fn call(self, ids: Vec<String>) -> ApiCall {
        match self {
            Self::Save => ApiCall::SaveTracks { ids },
            Self::Remove => ApiCall::RemoveSavedTracks { ids },
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Save => "saved",
            Self::Remove => "removed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistCount {
    pub playlist_id: String,
    pub tracks: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySummary {
    pub playlists: Vec<PlaylistCount>,
    pub total_tracks: usize,
}

/// Save or remove every track of each playlist in the user's library.
pub async fn update_library_from_playlists(
    music: &dyn MusicService,
    playlist_ids: &[String],
    change: LibraryChange,
) -> Result<LibrarySummary, MusicApiError> {
    let mut summary = LibrarySummary::default();

    for playlist_id in playlist_ids {
        let tracks = playlist_tracks(music, playlist_id).await?;
        let ids: Vec<String> = tracks.iter().filter_map(track_id).map(str::to_string).collect();

        if !ids.is_empty() {
            process_in_batches(&ids, LIBRARY_BATCH_SIZE, BATCH_PAUSE, |batch| async move {
                music.call(change.call(batch)).await.map(|_| ())
            })
            .await?;
        }

        info!(playlist_id = %playlist_id, tracks = ids.len(), "Library tracks {}", change.verb());
        summary.total_tracks += ids.len();
        summary.playlists.push(PlaylistCount {
            playlist_id: playlist_id.clone(),
            tracks: ids.len(),
        });
    }

    Ok(summary)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub target_playlist_id: String,
    pub sources: Vec<PlaylistCount>,
    pub total_added: usize,
}

/// Append every track of `sources` to `target`, skipping `exclude` ids.
pub async fn merge_into(
    music: &dyn MusicService,
    sources: &[String],
    target: &str,
    exclude: &[String],
) -> Result<MergeSummary, MusicApiError> {
    let mut summary = MergeSummary {
        target_playlist_id: target.to_string(),
        sources: Vec::new(),
        total_added: 0,
    };

    for source in sources {
        let tracks = playlist_tracks(music, source).await?;
        let uris: Vec<String> = tracks
            .iter()
            .filter(|t| track_id(t).is_none_or(|id| !exclude.iter().any(|e| e == id)))
            .filter_map(track_uri)
            .map(str::to_string)
            .collect();

        if !uris.is_empty() {
            process_in_batches(&uris, PLAYLIST_ADD_BATCH_SIZE, BATCH_PAUSE, |batch| async move {
                music
                    .call(ApiCall::AddTracksToPlaylist {
                        playlist_id: target.to_string(),
                        uris: batch,
                    })
                    .await
                    .map(|_| ())
            })
            .await?;
        }

        info!(source = %source, target, added = uris.len(), "Merged playlist");
        summary.total_added += uris.len();
        summary.sources.push(PlaylistCount {
            playlist_id: source.clone(),
            tracks: uris.len(),
        });
    }

    Ok(summary)
}
