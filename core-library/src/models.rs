//! Domain models for playlists
//!
//! Playlists are value types. Every change produces a new `Playlist` through
//! one of the `with_*` transforms, which validate the request against the
//! current track list and renumber positions so they stay contiguous.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{LibraryError, Result};

/// Display name used for the favorites playlist.
pub const FAVORITES_NAME: &str = "Favorites";

const PROVISIONAL_PREFIX: &str = "pending-";

// =============================================================================
// ID Types
// =============================================================================

/// Opaque playlist identifier assigned by the remote service.
///
/// Playlists created locally carry a provisional identifier until the server
/// assigns the real one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(String);

impl PlaylistId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh local-only identifier for a playlist the server has not seen yet.
    pub fn provisional() -> Self {
        Self(format!("{}{}", PROVISIONAL_PREFIX, Uuid::new_v4()))
    }

    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(PROVISIONAL_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlaylistId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PlaylistId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque track identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Server-supplied revision counter; strictly increases on every committed change.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(pub u64);

impl Revision {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// A track's place in a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub track_id: TrackId,
    /// Zero-based index within the playlist
    pub position: usize,
}

/// Playlist with its ordered tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Account that owns the playlist
    pub owner: String,
    pub tracks: Vec<TrackRef>,
    pub revision: Revision,
    /// The per-account favorites playlist
    #[serde(default)]
    pub is_favorites: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Playlist {
    /// Create an empty playlist at revision 0.
    pub fn new(id: PlaylistId, name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            owner: owner.into(),
            tracks: Vec::new(),
            revision: Revision::default(),
            is_favorites: false,
            created_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = Revision(revision);
        self
    }

    pub fn as_favorites(mut self) -> Self {
        self.is_favorites = true;
        self
    }

    /// Replace the track list, assigning positions in iteration order.
    pub fn with_tracks<I, T>(mut self, tracks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TrackId>,
    {
        self.tracks = tracks
            .into_iter()
            .enumerate()
            .map(|(position, id)| TrackRef {
                track_id: id.into(),
                position,
            })
            .collect();
        self
    }

    pub fn track_ids(&self) -> Vec<&TrackId> {
        self.tracks.iter().map(|t| &t.track_id).collect()
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Position of the first occurrence of `track_id`.
    pub fn position_of(&self, track_id: &TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| &t.track_id == track_id)
    }

    /// Check the committed-state invariants: non-empty name and contiguous,
    /// zero-based positions.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;

        for (index, track) in self.tracks.iter().enumerate() {
            if track.position != index {
                return Err(LibraryError::invalid(
                    "tracks",
                    format!(
                        "position {} of track {} should be {}",
                        track.position, track.track_id, index
                    ),
                ));
            }
        }

        Ok(())
    }

    pub fn summary(&self) -> PlaylistSummary {
        PlaylistSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            track_count: self.track_count(),
            revision: self.revision,
            is_favorites: self.is_favorites,
        }
    }

    // -------------------------------------------------------------------------
    // Transforms
    // -------------------------------------------------------------------------

    pub fn renamed(&self, name: &str) -> Result<Playlist> {
        validate_name(name)?;
        let mut next = self.clone();
        next.name = name.trim().to_string();
        Ok(next)
    }

    /// Insert `track_id` at `position`, or append when `position` is `None`.
    pub fn with_track_added(&self, track_id: &TrackId, position: Option<usize>) -> Result<Playlist> {
        let len = self.tracks.len();
        let index = position.unwrap_or(len);
        if index > len {
            return Err(LibraryError::IndexOutOfRange { index, len });
        }

        let mut next = self.clone();
        next.tracks.insert(
            index,
            TrackRef {
                track_id: track_id.clone(),
                position: index,
            },
        );
        next.renumber();
        Ok(next)
    }

    /// Replace name and description. `None` clears the description.
    pub fn with_details(&self, name: &str, description: Option<&str>) -> Result<Playlist> {
        let mut next = self.renamed(name)?;
        next.description = description
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string);
        Ok(next)
    }

    /// Insert `track_ids` in order starting at `position`, or append them
    /// when `position` is `None`.
    pub fn with_tracks_added(
        &self,
        track_ids: &[TrackId],
        position: Option<usize>,
    ) -> Result<Playlist> {
        if track_ids.is_empty() {
            return Err(LibraryError::invalid("tracks", "No tracks to add"));
        }
        let len = self.tracks.len();
        let index = position.unwrap_or(len);
        if index > len {
            return Err(LibraryError::IndexOutOfRange { index, len });
        }

        let mut next = self.clone();
        next.tracks.splice(
            index..index,
            track_ids.iter().map(|track_id| TrackRef {
                track_id: track_id.clone(),
                position: index,
            }),
        );
        next.renumber();
        Ok(next)
    }

    /// Remove the first occurrence of `track_id`.
    pub fn without_track(&self, track_id: &TrackId) -> Result<Playlist> {
        self.track_removal(track_id).map(|(_, next)| next)
    }

    /// Index of the first occurrence of `track_id` together with the
    /// playlist after removing it.
    pub fn track_removal(&self, track_id: &TrackId) -> Result<(usize, Playlist)> {
        let index = self
            .position_of(track_id)
            .ok_or_else(|| LibraryError::TrackNotInPlaylist {
                playlist_id: self.id.to_string(),
                track_id: track_id.to_string(),
            })?;

        let mut next = self.clone();
        next.tracks.remove(index);
        next.renumber();
        Ok((index, next))
    }

    /// Move the track at `from` so that it ends up at index `to`.
    pub fn with_track_moved(&self, from: usize, to: usize) -> Result<Playlist> {
        let len = self.tracks.len();
        if from >= len {
            return Err(LibraryError::IndexOutOfRange { index: from, len });
        }
        if to >= len {
            return Err(LibraryError::IndexOutOfRange { index: to, len });
        }

        let mut next = self.clone();
        let moved = next.tracks.remove(from);
        next.tracks.insert(to, moved);
        next.renumber();
        Ok(next)
    }

    fn renumber(&mut self) {
        for (position, track) in self.tracks.iter_mut().enumerate() {
            track.position = position;
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(LibraryError::invalid("name", "Playlist name cannot be empty"));
    }
    Ok(())
}

/// Lightweight projection used by list views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: PlaylistId,
    pub name: String,
    pub track_count: usize,
    pub revision: Revision,
    pub is_favorites: bool,
}

/// Payload of a create command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlaylist {
    pub name: String,
    pub description: Option<String>,
    pub is_favorites: bool,
}

impl NewPlaylist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            is_favorites: false,
        }
    }

    pub fn favorites() -> Self {
        Self {
            name: FAVORITES_NAME.to_string(),
            description: None,
            is_favorites: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)
    }

    /// Local placeholder shown while the create call is in flight.
    pub fn to_provisional(&self, owner: impl Into<String>) -> Playlist {
        Playlist {
            id: PlaylistId::provisional(),
            name: self.name.trim().to_string(),
            description: self.description.clone(),
            owner: owner.into(),
            tracks: Vec::new(),
            revision: Revision::default(),
            is_favorites: self.is_favorites,
            created_at: Some(Utc::now()),
        }
    }
}
