//! Contract of the remote playlist store
//!
//! The synchronization core depends only on [`RemotePlaylistService`]. Every
//! mutating call carries a [`RemoteCallContext`]: the credential, the
//! caller's idempotency token (the server must apply a given token at most
//! once) and the revision the change was based on.

use async_trait::async_trait;
use core_auth::Credential;
use core_library::{NewPlaylist, Playlist, PlaylistId, Revision, TrackId};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Caller-chosen token identifying one logical command across retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyToken(String);

impl IdempotencyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Random (UUID v4) token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IdempotencyToken {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for IdempotencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classified failure of a remote call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("credential rejected")]
    Unauthenticated,

    #[error("revision conflict (server revision {current_revision:?})")]
    Conflict { current_revision: Option<Revision> },

    #[error("playlist not found")]
    NotFound,

    #[error("unavailable: {0}")]
    Unavailable(String),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Per-call metadata for mutating remote operations.
#[derive(Debug, Clone)]
pub struct RemoteCallContext {
    pub credential: Credential,
    pub idempotency_token: IdempotencyToken,
    /// Revision of the local pre-image; `None` for create.
    pub expected_revision: Option<Revision>,
}

/// Network boundary to the remote playlist store.
///
/// Mutations return the authoritative playlist after the change (unit for
/// delete). Implementations must not retry mutations on their own unless the
/// server deduplicates by idempotency token.
#[async_trait]
pub trait RemotePlaylistService: Send + Sync {
    async fn fetch_playlists(&self, credential: &Credential) -> RemoteResult<Vec<Playlist>>;

    async fn fetch_playlist(
        &self,
        credential: &Credential,
        id: &PlaylistId,
    ) -> RemoteResult<Playlist>;

    async fn create_playlist(
        &self,
        ctx: &RemoteCallContext,
        request: &NewPlaylist,
    ) -> RemoteResult<Playlist>;

    async fn rename_playlist(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        name: &str,
    ) -> RemoteResult<Playlist>;

    /// Replace name and description. `None` clears the description.
    async fn update_playlist_details(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        name: &str,
        description: Option<&str>,
    ) -> RemoteResult<Playlist>;

    async fn delete_playlist(&self, ctx: &RemoteCallContext, id: &PlaylistId) -> RemoteResult<()>;

    /// Insert at `position`, or append when `None`.
    async fn add_track(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        track_id: &TrackId,
        position: Option<usize>,
    ) -> RemoteResult<Playlist>;

    /// Insert `track_ids` in order starting at `position`, or append them
    /// when `None`. Applied atomically.
    async fn add_tracks(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        track_ids: &[TrackId],
        position: Option<usize>,
    ) -> RemoteResult<Playlist>;

    /// Remove `track_id`, expected at `position` in the base revision.
    async fn remove_track(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        track_id: &TrackId,
        position: usize,
    ) -> RemoteResult<Playlist>;

    /// Move the track at `from` so it ends up at `to`.
    async fn reorder_track(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        from: usize,
        to: usize,
    ) -> RemoteResult<Playlist>;
}
