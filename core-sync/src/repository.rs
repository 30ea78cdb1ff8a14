//! # Playlist Repository
//!
//! Applies playlist commands optimistically and reconciles them with the
//! remote playlist service.
//!
//! ## Workflow
//!
//! For a command against an existing playlist:
//! 1. Take the playlist's mutation lock (`Busy` if another command holds it)
//! 2. Snapshot the cache entry as the rollback pre-image and check the
//!    payload against it
//! 3. Obtain an unexpired credential
//! 4. Apply the change locally and publish it
//! 5. Dispatch the remote call with the idempotency token and the
//!    pre-image revision, bounded by the command timeout
//! 6. Adopt and publish the server representation, or restore and publish
//!    the pre-image and return the classified error
//!
//! Create follows the same shape with a provisional `pending-<uuid>` entry
//! that the server playlist replaces on success.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{CommandOptions, PlaylistRepository};
//!
//! # async fn example(repository: PlaylistRepository) -> core_sync::Result<()> {
//! let playlists = repository.refresh_all().await?;
//! let mut subscription = repository.subscribe(&playlists[0].id);
//!
//! repository
//!     .rename(&playlists[0].id, "Evening", CommandOptions::default())
//!     .await?;
//! let latest = subscription.changed().await;
//! # Ok(())
//! # }
//! ```

use bridge_traits::time::{Clock, SystemClock};
use core_auth::{Credential, CredentialProvider};
use core_library::{
    NewPlaylist, Playlist, PlaylistCache, PlaylistId, PlaylistStatePublisher,
    PlaylistSubscription, PlaylistSummary, TrackId,
};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, PlaylistEvent};
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::command::{
    CommandKind, CommandOptions, CommandOutcome, Edit, PendingOperation, PlaylistCommand,
    RemoteCall, Route,
};
use crate::error::{Result, SyncError};
use crate::lock::{MutationLease, MutationLocks};
use crate::remote::{
    IdempotencyToken, RemoteCallContext, RemoteError, RemotePlaylistService, RemoteResult,
};

/// Repository configuration
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// Remote call timeout used when a command does not set its own.
    pub default_timeout: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            default_timeout: core_runtime::config::DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

impl From<&CoreConfig> for RepositoryConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            default_timeout: config.remote_timeout,
        }
    }
}

/// Local authority for playlists with optimistic remote synchronization.
pub struct PlaylistRepository {
    // Never held across an await point.
    cache: Mutex<PlaylistCache>,
    publisher: PlaylistStatePublisher,
    locks: MutationLocks,
    credentials: Arc<dyn CredentialProvider>,
    remote: Arc<dyn RemotePlaylistService>,
    clock: Arc<dyn Clock>,
    event_bus: Option<EventBus>,
    config: RepositoryConfig,
}

impl PlaylistRepository {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        remote: Arc<dyn RemotePlaylistService>,
        config: RepositoryConfig,
    ) -> Self {
        Self {
            cache: Mutex::new(PlaylistCache::new()),
            publisher: PlaylistStatePublisher::new(),
            locks: MutationLocks::new(),
            credentials,
            remote,
            clock: Arc::new(SystemClock),
            event_bus: None,
            config,
        }
    }

    /// Time source for credential expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Use an existing publisher, e.g. one already handed to the UI layer.
    pub fn with_publisher(mut self, publisher: PlaylistStatePublisher) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    fn cache(&self) -> MutexGuard<'_, PlaylistCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PlaylistEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Playlist(event));
        }
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Execute one command and return its settled result.
    ///
    /// # Errors
    ///
    /// - `Busy` if a command is already in flight for the playlist
    /// - `NotFound` if the playlist is not cached, or the server no longer
    ///   has it (the entry is then evicted)
    /// - `InvalidCommand` if the payload does not apply to the cached entry
    /// - `Cancelled` if the cancellation token fired before dispatch
    /// - `Unauthenticated`, `Conflict`, `Unavailable`, `Timeout` from the
    ///   credential provider or the remote call, after local state was
    ///   restored
    #[instrument(
        skip(self, command, options),
        fields(command = %command.kind(), playlist_id = ?command.target().map(PlaylistId::as_str))
    )]
    pub async fn execute(
        &self,
        command: PlaylistCommand,
        options: CommandOptions,
    ) -> Result<CommandOutcome> {
        let submitted = command.clone();
        match command.into_route() {
            Route::Create(request) => self
                .execute_create(request, options)
                .await
                .map(CommandOutcome::Playlist),
            Route::Existing { id, edit } => {
                self.execute_mutation(id, edit, submitted, options).await
            }
        }
    }

    pub async fn create(&self, request: NewPlaylist, options: CommandOptions) -> Result<Playlist> {
        self.execute_create(request, options).await
    }

    pub async fn rename(
        &self,
        id: &PlaylistId,
        name: impl Into<String>,
        options: CommandOptions,
    ) -> Result<Playlist> {
        let command = PlaylistCommand::Rename {
            id: id.clone(),
            name: name.into(),
        };
        self.execute_for_playlist(command, options).await
    }

    /// Replace the playlist's name and description. `None` clears the
    /// description.
    pub async fn update_details(
        &self,
        id: &PlaylistId,
        name: impl Into<String>,
        description: Option<String>,
        options: CommandOptions,
    ) -> Result<Playlist> {
        let command = PlaylistCommand::UpdateDetails {
            id: id.clone(),
            name: name.into(),
            description,
        };
        self.execute_for_playlist(command, options).await
    }

    pub async fn delete(&self, id: &PlaylistId, options: CommandOptions) -> Result<()> {
        let command = PlaylistCommand::Delete { id: id.clone() };
        self.execute(command, options).await.map(|_| ())
    }

    pub async fn add_track(
        &self,
        id: &PlaylistId,
        track_id: &TrackId,
        position: Option<usize>,
        options: CommandOptions,
    ) -> Result<Playlist> {
        let command = PlaylistCommand::AddTrack {
            id: id.clone(),
            track_id: track_id.clone(),
            position,
        };
        self.execute_for_playlist(command, options).await
    }

    /// Add `track_ids` in one remote call. The batch is applied or rolled
    /// back as a whole.
    pub async fn add_tracks(
        &self,
        id: &PlaylistId,
        track_ids: Vec<TrackId>,
        position: Option<usize>,
        options: CommandOptions,
    ) -> Result<Playlist> {
        let command = PlaylistCommand::AddTracks {
            id: id.clone(),
            track_ids,
            position,
        };
        self.execute_for_playlist(command, options).await
    }

    pub async fn remove_track(
        &self,
        id: &PlaylistId,
        track_id: &TrackId,
        options: CommandOptions,
    ) -> Result<Playlist> {
        let command = PlaylistCommand::RemoveTrack {
            id: id.clone(),
            track_id: track_id.clone(),
        };
        self.execute_for_playlist(command, options).await
    }

    pub async fn reorder(
        &self,
        id: &PlaylistId,
        from: usize,
        to: usize,
        options: CommandOptions,
    ) -> Result<Playlist> {
        let command = PlaylistCommand::Reorder {
            id: id.clone(),
            from,
            to,
        };
        self.execute_for_playlist(command, options).await
    }

    async fn execute_for_playlist(
        &self,
        command: PlaylistCommand,
        options: CommandOptions,
    ) -> Result<Playlist> {
        let id = command.target().cloned();
        match self.execute(command, options).await? {
            CommandOutcome::Playlist(playlist) => Ok(playlist),
            CommandOutcome::Deleted(_) => Err(SyncError::NotFound {
                playlist_id: id.map(|id| id.to_string()).unwrap_or_default(),
            }),
        }
    }

    async fn execute_mutation(
        &self,
        id: PlaylistId,
        edit: Edit,
        command: PlaylistCommand,
        options: CommandOptions,
    ) -> Result<CommandOutcome> {
        let kind = command.kind();

        let _lease = self.acquire(&id)?;
        if options.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let pre_image = self.cache().snapshot(&id)?;
        let plan = edit.plan(&pre_image)?;
        let renames = plan
            .optimistic
            .as_ref()
            .map_or(true, |next| next.name != pre_image.name);
        if pre_image.is_favorites && renames {
            return Err(SyncError::InvalidCommand(
                "the favorites playlist cannot be renamed or deleted".to_string(),
            ));
        }

        let credential = self.credential().await?;

        // Last point at which cancellation is honoured.
        if options.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let pending = PendingOperation {
            command,
            pre_image: Some(pre_image.clone()),
            token: options.idempotency_token.clone(),
        };

        match &plan.optimistic {
            Some(next) => self.store(next.clone()),
            None => self.evict_local(&id),
        }
        self.emit(PlaylistEvent::CommandStarted {
            playlist_id: id.to_string(),
            command: kind.to_string(),
        });
        debug!(revision = %pre_image.revision, token = %pending.token, "optimistic change applied");

        let ctx = RemoteCallContext {
            credential,
            idempotency_token: pending.token.clone(),
            expected_revision: Some(pre_image.revision),
        };
        let timeout = options.timeout.unwrap_or(self.config.default_timeout);
        let result = self.dispatch(&plan.call, &ctx, &id, timeout).await;

        match result {
            Ok(Some(server)) => {
                self.store(server.clone());
                self.emit(PlaylistEvent::Committed {
                    playlist_id: id.to_string(),
                    command: kind.to_string(),
                    revision: server.revision.value(),
                });
                info!(revision = %server.revision, "playlist change committed");
                Ok(CommandOutcome::Playlist(server))
            }
            Ok(None) => {
                self.emit(PlaylistEvent::Committed {
                    playlist_id: id.to_string(),
                    command: kind.to_string(),
                    revision: pre_image.revision.value(),
                });
                info!("playlist deleted");
                Ok(CommandOutcome::Deleted(id))
            }
            Err(error) => Err(self.settle_failure(&pending, &ctx, error).await),
        }
    }

    /// Issue the remote call for an existing-playlist command.
    ///
    /// `Ok(None)` means the playlist was deleted.
    async fn dispatch(
        &self,
        call: &RemoteCall,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        timeout: Duration,
    ) -> Result<Option<Playlist>> {
        let remote = self.remote.as_ref();
        let request = async {
            match call {
                RemoteCall::Rename { name } => {
                    remote.rename_playlist(ctx, id, name).await.map(Some)
                }
                RemoteCall::UpdateDetails { name, description } => remote
                    .update_playlist_details(ctx, id, name, description.as_deref())
                    .await
                    .map(Some),
                RemoteCall::Delete => remote.delete_playlist(ctx, id).await.map(|_| None),
                RemoteCall::AddTrack { track_id, position } => remote
                    .add_track(ctx, id, track_id, *position)
                    .await
                    .map(Some),
                RemoteCall::AddTracks {
                    track_ids,
                    position,
                } => remote
                    .add_tracks(ctx, id, track_ids, *position)
                    .await
                    .map(Some),
                RemoteCall::RemoveTrack { track_id, position } => remote
                    .remove_track(ctx, id, track_id, *position)
                    .await
                    .map(Some),
                RemoteCall::Reorder { from, to } => {
                    remote.reorder_track(ctx, id, *from, *to).await.map(Some)
                }
            }
        };

        classify(with_timeout(timeout, request).await?, id)
    }

    /// Restore local state after a failed remote call and classify the error.
    async fn settle_failure(
        &self,
        pending: &PendingOperation,
        ctx: &RemoteCallContext,
        error: SyncError,
    ) -> SyncError {
        let kind = pending.command.kind();
        let Some(pre_image) = &pending.pre_image else {
            return error;
        };
        let id = &pre_image.id;

        match error {
            SyncError::NotFound { .. } => {
                warn!("playlist no longer exists remotely, evicting");
                self.evict(id);
                error
            }
            SyncError::Conflict { current, .. } => {
                self.restore(pre_image);
                self.emit(PlaylistEvent::ConflictDetected {
                    playlist_id: id.to_string(),
                    command: kind.to_string(),
                    expected_revision: pre_image.revision.value(),
                    current_revision: current.map(|revision| revision.value()),
                });
                warn!(expected = %pre_image.revision, current = ?current, "revision conflict, re-fetching");

                let current = match self.refetch(&ctx.credential, id).await {
                    Some(server) => Some(server.revision),
                    None => current,
                };
                SyncError::Conflict {
                    playlist_id: id.to_string(),
                    expected: Some(pre_image.revision),
                    current,
                }
            }
            other => {
                self.restore(pre_image);
                if matches!(other, SyncError::Unauthenticated(_)) {
                    self.credentials.invalidate().await;
                }
                self.emit(PlaylistEvent::RolledBack {
                    playlist_id: id.to_string(),
                    command: kind.to_string(),
                    reason: other.label().to_string(),
                });
                warn!(error = %other, "remote call failed, rolled back");
                other
            }
        }
    }

    /// Replace the local entry with the server's after a conflict.
    ///
    /// Failures leave the restored pre-image in place.
    async fn refetch(&self, credential: &Credential, id: &PlaylistId) -> Option<Playlist> {
        let fetch = self.remote.fetch_playlist(credential, id);
        match with_timeout(self.config.default_timeout, fetch).await {
            Ok(Ok(server)) => {
                self.store(server.clone());
                Some(server)
            }
            Ok(Err(RemoteError::NotFound)) => {
                self.evict(id);
                None
            }
            Ok(Err(error)) => {
                warn!(error = %error, "re-fetch after conflict failed");
                None
            }
            Err(error) => {
                warn!(error = %error, "re-fetch after conflict failed");
                None
            }
        }
    }

    async fn execute_create(
        &self,
        request: NewPlaylist,
        options: CommandOptions,
    ) -> Result<Playlist> {
        request.validate()?;
        if options.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let credential = self.credential().await?;
        let provisional = request.to_provisional(credential.subject.clone());
        let provisional_id = provisional.id.clone();
        let _lease = self.acquire(&provisional_id)?;

        if options.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        self.store(provisional.clone());
        self.emit(PlaylistEvent::CommandStarted {
            playlist_id: provisional_id.to_string(),
            command: CommandKind::Create.to_string(),
        });
        debug!(playlist_id = %provisional_id, "provisional playlist published");

        let ctx = RemoteCallContext {
            credential,
            idempotency_token: options.idempotency_token.clone(),
            expected_revision: None,
        };
        let timeout = options.timeout.unwrap_or(self.config.default_timeout);
        let result = with_timeout(timeout, self.remote.create_playlist(&ctx, &request))
            .await
            .and_then(|result| classify(result, &provisional_id));

        self.evict_local(&provisional_id);

        match result {
            Ok(server) => {
                self.locks.touch(&server.id);
                self.store(server.clone());
                self.emit(PlaylistEvent::Committed {
                    playlist_id: server.id.to_string(),
                    command: CommandKind::Create.to_string(),
                    revision: server.revision.value(),
                });
                info!(playlist_id = %server.id, "playlist created");
                Ok(server)
            }
            Err(error) => {
                if matches!(error, SyncError::Unauthenticated(_)) {
                    self.credentials.invalidate().await;
                }
                self.emit(PlaylistEvent::RolledBack {
                    playlist_id: provisional_id.to_string(),
                    command: CommandKind::Create.to_string(),
                    reason: error.label().to_string(),
                });
                warn!(error = %error, "create failed, provisional playlist withdrawn");
                Err(error)
            }
        }
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    /// Replace the local view with the server's collection.
    ///
    /// Left alone: playlists with a command in flight or written by one
    /// while the fetch was running, entries newer than the fetched copy, and
    /// provisional entries.
    #[instrument(skip(self))]
    pub async fn refresh_all(&self) -> Result<Vec<Playlist>> {
        let credential = self.credential().await?;
        let started = self.locks.generation();
        let held_at_start = self.locks.held_ids();
        let fetched = with_timeout(
            self.config.default_timeout,
            self.remote.fetch_playlists(&credential),
        )
        .await?;

        let remote = match fetched {
            Ok(playlists) => playlists,
            Err(error) => {
                let error = SyncError::from_remote(error, "");
                if matches!(error, SyncError::Unauthenticated(_)) {
                    self.credentials.invalidate().await;
                }
                warn!(error = %error, "playlist refresh failed");
                return Err(error);
            }
        };

        let remote_ids: HashSet<PlaylistId> = remote.iter().map(|p| p.id.clone()).collect();
        let mut skipped = 0;
        let mut evicted = Vec::new();

        let listed = {
            let mut cache = self.cache();
            // Computed under the cache lock: writers stamp before storing.
            let mut held = self.locks.busy_since(started);
            held.extend(held_at_start);

            for playlist in &remote {
                let cached = cache.get(&playlist.id);
                let newer_locally = cached
                    .as_ref()
                    .is_some_and(|local| local.revision > playlist.revision);
                if held.contains(&playlist.id) || newer_locally {
                    skipped += 1;
                    continue;
                }
                if cached.as_ref() != Some(playlist) {
                    cache.put(playlist.clone());
                    self.publisher.publish(playlist);
                }
            }

            for id in cache.ids() {
                if !remote_ids.contains(&id) && !held.contains(&id) && !id.is_provisional() {
                    cache.remove(&id);
                    self.publisher.publish_removed(&id);
                    evicted.push(id);
                }
            }
            cache.list()
        };

        for id in evicted {
            self.emit(PlaylistEvent::Evicted {
                playlist_id: id.to_string(),
            });
        }
        self.emit(PlaylistEvent::Refreshed {
            playlist_count: remote.len(),
            skipped_pending: skipped,
        });
        info!(count = remote.len(), skipped, "playlists refreshed");
        Ok(listed)
    }

    /// Fetch one playlist from the server and publish it.
    #[instrument(skip(self), fields(playlist_id = %id))]
    pub async fn load_playlist(&self, id: &PlaylistId) -> Result<Playlist> {
        let _lease = self.acquire(id)?;
        let credential = self.credential().await?;

        let fetched = with_timeout(
            self.config.default_timeout,
            self.remote.fetch_playlist(&credential, id),
        )
        .await?;

        match fetched {
            Ok(playlist) => {
                self.store(playlist.clone());
                Ok(playlist)
            }
            Err(RemoteError::NotFound) => {
                self.evict(id);
                Err(SyncError::NotFound {
                    playlist_id: id.to_string(),
                })
            }
            Err(error) => {
                let error = SyncError::from_remote(error, id.as_str());
                warn!(error = %error, "playlist load failed");
                if matches!(error, SyncError::Unauthenticated(_)) {
                    self.credentials.invalidate().await;
                }
                Err(error)
            }
        }
    }

    /// Return the favorites playlist, creating it if the server has none.
    #[instrument(skip(self, token))]
    pub async fn ensure_favorites(&self, token: IdempotencyToken) -> Result<Playlist> {
        if let Some(favorites) = self.favorites() {
            return Ok(favorites);
        }

        self.refresh_all().await?;
        if let Some(favorites) = self.favorites() {
            return Ok(favorites);
        }

        info!("no favorites playlist found, creating one");
        self.execute_create(NewPlaylist::favorites(), CommandOptions::new(token))
            .await
    }

    fn favorites(&self) -> Option<Playlist> {
        self.cache()
            .list()
            .into_iter()
            .find(|playlist| playlist.is_favorites && !playlist.id.is_provisional())
    }

    pub fn playlist(&self, id: &PlaylistId) -> Option<Playlist> {
        self.cache().get(id)
    }

    /// Cached playlists, favorites first.
    pub fn playlists(&self) -> Vec<Playlist> {
        self.cache().list()
    }

    pub fn is_pending(&self, id: &PlaylistId) -> bool {
        self.locks.is_held(id)
    }

    pub fn subscribe(&self, id: &PlaylistId) -> PlaylistSubscription {
        self.publisher.subscribe(id)
    }

    pub fn subscribe_index(&self) -> watch::Receiver<Vec<PlaylistSummary>> {
        self.publisher.subscribe_index()
    }

    pub fn publisher(&self) -> &PlaylistStatePublisher {
        &self.publisher
    }

    // -------------------------------------------------------------------------
    // Cache + publisher helpers
    // -------------------------------------------------------------------------

    fn acquire(&self, id: &PlaylistId) -> Result<MutationLease> {
        self.locks.try_acquire(id).ok_or_else(|| {
            debug!(playlist_id = %id, "rejected, mutation in flight");
            SyncError::Busy {
                playlist_id: id.to_string(),
            }
        })
    }

    /// Current credential from the provider, never one past its expiry.
    ///
    /// An expired credential is invalidated and requested once more.
    async fn credential(&self) -> Result<Credential> {
        let credential = self.credentials.current_credential().await?;
        if !credential.is_expired_at(self.clock.now(), Duration::ZERO) {
            return Ok(credential);
        }

        warn!(subject = %credential.subject, "credential expired, requesting a fresh one");
        self.credentials.invalidate().await;
        let credential = self.credentials.current_credential().await?;
        if credential.is_expired_at(self.clock.now(), Duration::ZERO) {
            return Err(SyncError::Unauthenticated(
                "credential provider returned an expired credential".to_string(),
            ));
        }
        Ok(credential)
    }

    /// Put and publish under one cache lock so observers never see an order
    /// different from the cache's.
    fn store(&self, playlist: Playlist) {
        let mut cache = self.cache();
        self.publisher.publish(&playlist);
        cache.put(playlist);
    }

    fn restore(&self, pre_image: &Playlist) {
        debug!(playlist_id = %pre_image.id, revision = %pre_image.revision, "restoring pre-image");
        self.store(pre_image.clone());
    }

    fn evict_local(&self, id: &PlaylistId) {
        let mut cache = self.cache();
        cache.remove(id);
        self.publisher.publish_removed(id);
    }

    fn evict(&self, id: &PlaylistId) {
        self.evict_local(id);
        self.emit(PlaylistEvent::Evicted {
            playlist_id: id.to_string(),
        });
    }
}

async fn with_timeout<F, T>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| SyncError::Timeout(timeout))
}

fn classify<T>(result: RemoteResult<T>, id: &PlaylistId) -> Result<T> {
    result.map_err(|error| SyncError::from_remote(error, id.as_str()))
}
