//! Playlist API wire types
//!
//! JSON bodies exchanged with the playlist REST API. Field names are
//! camelCase on the wire.

use chrono::{DateTime, Utc};
use core_library::{Playlist, PlaylistId};
use serde::{Deserialize, Serialize};

use crate::error::{RestProviderError, Result};

/// Playlist resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistResource {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub owner: String,
    #[serde(default)]
    pub tracks: Vec<TrackResource>,
    pub revision: u64,
    #[serde(default)]
    pub is_favorites: bool,
    /// Creation time (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackResource {
    pub track_id: String,
    pub position: usize,
}

/// `GET /playlists` response
#[derive(Debug, Deserialize)]
pub struct PlaylistListResponse {
    pub playlists: Vec<PlaylistResource>,
}

/// Body of a 409/412 response
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictBody {
    #[serde(default)]
    pub current_revision: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlaylistBody<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    pub is_favorites: bool,
}

#[derive(Debug, Serialize)]
pub struct RenamePlaylistBody<'a> {
    pub name: &'a str,
}

/// Full details update; a `null` description clears it.
#[derive(Debug, Serialize)]
pub struct UpdateDetailsBody<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTracksBody<'a> {
    pub track_ids: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTrackBody<'a> {
    pub track_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ReorderBody {
    pub from: usize,
    pub to: usize,
}

/// Parse RFC 3339 timestamp
fn parse_timestamp(rfc3339: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(rfc3339)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl PlaylistResource {
    /// Convert to the domain model. Tracks are ordered by their wire position.
    pub fn into_playlist(self) -> Result<Playlist> {
        let mut tracks = self.tracks;
        tracks.sort_by_key(|track| track.position);

        let mut playlist = Playlist::new(PlaylistId::new(self.id), self.name, self.owner)
            .with_tracks(tracks.into_iter().map(|track| track.track_id))
            .with_revision(self.revision);
        playlist.description = self.description;
        playlist.is_favorites = self.is_favorites;
        playlist.created_at = self.created_at.as_deref().and_then(parse_timestamp);

        playlist
            .validate()
            .map_err(|e| RestProviderError::ParseError(e.to_string()))?;
        Ok(playlist)
    }
}
