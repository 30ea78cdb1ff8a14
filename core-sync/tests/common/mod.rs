//! Shared test doubles for repository tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use core_auth::{Credential, StaticCredentialProvider};
use core_library::{NewPlaylist, Playlist, PlaylistId, Revision, TrackId};
use core_sync::{
    IdempotencyToken, PlaylistRepository, RemoteCallContext, RemoteError, RemotePlaylistService,
    RemoteResult, RepositoryConfig,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// In-memory remote
// ============================================================================

/// Remote playlist store that applies each idempotency token at most once.
///
/// Mutations are applied before any scripted response delay, so a caller
/// that times out still leaves the change applied server-side.
#[derive(Default)]
pub struct InMemoryRemote {
    state: Mutex<RemoteState>,
}

#[derive(Default)]
struct RemoteState {
    playlists: HashMap<PlaylistId, Playlist>,
    /// Response recorded per token; `None` for delete.
    applied: HashMap<IdempotencyToken, Option<Playlist>>,
    apply_count: usize,
    calls: Vec<String>,
    failures: VecDeque<RemoteError>,
    response_delay: Option<Duration>,
    next_id: usize,
    /// Positions sent with remove-track calls, in call order.
    removed_positions: Vec<usize>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_playlists(playlists: impl IntoIterator<Item = Playlist>) -> Self {
        let remote = Self::new();
        for playlist in playlists {
            remote.insert(playlist);
        }
        remote
    }

    /// Change server state behind the client's back.
    pub fn insert(&self, playlist: Playlist) {
        self.state
            .lock()
            .unwrap()
            .playlists
            .insert(playlist.id.clone(), playlist);
    }

    pub fn remove(&self, id: &PlaylistId) {
        self.state.lock().unwrap().playlists.remove(id);
    }

    pub fn playlist(&self, id: &PlaylistId) -> Option<Playlist> {
        self.state.lock().unwrap().playlists.get(id).cloned()
    }

    pub fn all(&self) -> Vec<Playlist> {
        self.state.lock().unwrap().playlists.values().cloned().collect()
    }

    /// Fail the next call (read or write) with `error`.
    pub fn fail_next(&self, error: RemoteError) {
        self.state.lock().unwrap().failures.push_back(error);
    }

    /// Delay every response after the change is applied.
    pub fn set_response_delay(&self, delay: Option<Duration>) {
        self.state.lock().unwrap().response_delay = delay;
    }

    /// Number of mutations actually applied.
    pub fn apply_count(&self) -> usize {
        self.state.lock().unwrap().apply_count
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn removed_positions(&self) -> Vec<usize> {
        self.state.lock().unwrap().removed_positions.clone()
    }

    /// Record the call and fail it if a failure is scripted. Failures are
    /// delayed like responses.
    async fn begin(&self, call: &str) -> RemoteResult<()> {
        let failure = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call.to_string());
            state.failures.pop_front()
        };
        match failure {
            Some(error) => self.respond(Err(error)).await,
            None => Ok(()),
        }
    }

    async fn respond<T>(&self, value: T) -> T {
        let delay = self.state.lock().unwrap().response_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        value
    }

    /// Apply `change` to an existing playlist once per token.
    fn mutate<F>(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        change: F,
    ) -> RemoteResult<Option<Playlist>>
    where
        F: FnOnce(&Playlist) -> Option<Playlist>,
    {
        let mut state = self.state.lock().unwrap();
        if let Some(previous) = state.applied.get(&ctx.idempotency_token) {
            return Ok(previous.clone());
        }

        let current = state
            .playlists
            .get(id)
            .cloned()
            .ok_or(RemoteError::NotFound)?;
        if let Some(expected) = ctx.expected_revision {
            if expected != current.revision {
                return Err(RemoteError::Conflict {
                    current_revision: Some(current.revision),
                });
            }
        }

        let next = change(&current).map(|mut next| {
            next.revision = Revision(current.revision.value() + 1);
            next
        });
        match &next {
            Some(playlist) => {
                state.playlists.insert(id.clone(), playlist.clone());
            }
            None => {
                state.playlists.remove(id);
            }
        }
        state.apply_count += 1;
        state
            .applied
            .insert(ctx.idempotency_token.clone(), next.clone());
        Ok(next)
    }

    fn updated(result: RemoteResult<Option<Playlist>>) -> RemoteResult<Playlist> {
        result?.ok_or(RemoteError::NotFound)
    }
}

#[async_trait]
impl RemotePlaylistService for InMemoryRemote {
    async fn fetch_playlists(&self, _credential: &Credential) -> RemoteResult<Vec<Playlist>> {
        self.begin("fetch_playlists").await?;
        let all = self.all();
        self.respond(Ok(all)).await
    }

    async fn fetch_playlist(
        &self,
        _credential: &Credential,
        id: &PlaylistId,
    ) -> RemoteResult<Playlist> {
        self.begin("fetch_playlist").await?;
        let found = self.playlist(id).ok_or(RemoteError::NotFound);
        self.respond(found).await
    }

    async fn create_playlist(
        &self,
        ctx: &RemoteCallContext,
        request: &NewPlaylist,
    ) -> RemoteResult<Playlist> {
        self.begin("create_playlist").await?;
        let created = {
            let mut state = self.state.lock().unwrap();
            match state.applied.get(&ctx.idempotency_token) {
                Some(Some(previous)) => previous.clone(),
                _ => {
                    state.next_id += 1;
                    let mut playlist = Playlist::new(
                        PlaylistId::new(format!("srv-{}", state.next_id)),
                        request.name.trim(),
                        ctx.credential.subject.clone(),
                    )
                    .with_revision(1);
                    playlist.description = request.description.clone();
                    playlist.is_favorites = request.is_favorites;
                    state
                        .playlists
                        .insert(playlist.id.clone(), playlist.clone());
                    state.apply_count += 1;
                    state
                        .applied
                        .insert(ctx.idempotency_token.clone(), Some(playlist.clone()));
                    playlist
                }
            }
        };
        self.respond(Ok(created)).await
    }

    async fn rename_playlist(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        name: &str,
    ) -> RemoteResult<Playlist> {
        self.begin("rename_playlist").await?;
        let result = Self::updated(self.mutate(ctx, id, |p| p.renamed(name).ok()));
        self.respond(result).await
    }

    async fn update_playlist_details(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        name: &str,
        description: Option<&str>,
    ) -> RemoteResult<Playlist> {
        self.begin("update_playlist_details").await?;
        let result = Self::updated(self.mutate(ctx, id, |p| p.with_details(name, description).ok()));
        self.respond(result).await
    }

    async fn delete_playlist(&self, ctx: &RemoteCallContext, id: &PlaylistId) -> RemoteResult<()> {
        self.begin("delete_playlist").await?;
        let result = self.mutate(ctx, id, |_| None).map(|_| ());
        self.respond(result).await
    }

    async fn add_track(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        track_id: &TrackId,
        position: Option<usize>,
    ) -> RemoteResult<Playlist> {
        self.begin("add_track").await?;
        let result = Self::updated(
            self.mutate(ctx, id, |p| p.with_track_added(track_id, position).ok()),
        );
        self.respond(result).await
    }

    async fn add_tracks(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        track_ids: &[TrackId],
        position: Option<usize>,
    ) -> RemoteResult<Playlist> {
        self.begin("add_tracks").await?;
        let result = Self::updated(
            self.mutate(ctx, id, |p| p.with_tracks_added(track_ids, position).ok()),
        );
        self.respond(result).await
    }

    async fn remove_track(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        track_id: &TrackId,
        position: usize,
    ) -> RemoteResult<Playlist> {
        self.begin("remove_track").await?;
        self.state.lock().unwrap().removed_positions.push(position);
        let result = Self::updated(self.mutate(ctx, id, |p| p.without_track(track_id).ok()));
        self.respond(result).await
    }

    async fn reorder_track(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        from: usize,
        to: usize,
    ) -> RemoteResult<Playlist> {
        self.begin("reorder_track").await?;
        let result = Self::updated(self.mutate(ctx, id, |p| p.with_track_moved(from, to).ok()));
        self.respond(result).await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn credential() -> Credential {
    Credential::new("token-abc", "user-1", Utc::now() + ChronoDuration::hours(1))
}

pub fn credentials() -> Arc<StaticCredentialProvider> {
    Arc::new(StaticCredentialProvider::with_credential(credential()))
}

/// P1 = [T1, T2, T3] at revision 5.
pub fn sample_playlist() -> Playlist {
    Playlist::new(PlaylistId::new("p1"), "Road trip", "user-1")
        .with_tracks(["t1", "t2", "t3"])
        .with_revision(5)
}

pub fn favorites_playlist() -> Playlist {
    Playlist::new(PlaylistId::new("fav"), "Favorites", "user-1")
        .with_tracks(["t9"])
        .with_revision(2)
        .as_favorites()
}

pub fn track_ids(playlist: &Playlist) -> Vec<String> {
    playlist
        .track_ids()
        .into_iter()
        .map(|id| id.to_string())
        .collect()
}

/// Repository over `remote` with its cache primed from the remote.
pub async fn primed_repository(remote: Arc<InMemoryRemote>) -> PlaylistRepository {
    let repository = PlaylistRepository::new(credentials(), remote, RepositoryConfig::default());
    repository
        .refresh_all()
        .await
        .expect("initial refresh should succeed");
    repository
}
