//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided dependencies (a credential provider and
//! either a ready-made remote playlist service or an HTTP client for the REST
//! provider) into the playlist synchronization core. Hosts build a
//! [`CoreConfig`], hand it to [`PlaylistCore::start`] together with
//! [`CoreDependencies`], and then drive everything through
//! [`PlaylistCore::repository`].

pub mod error;

pub use error::{CoreError, Result};

pub use core_auth::{Credential, CredentialProvider, StaticCredentialProvider};
pub use core_library::{NewPlaylist, Playlist, PlaylistId, PlaylistSubscription, TrackId};
pub use core_runtime::config::CoreConfig;
pub use core_runtime::events::{CoreEvent, EventStream};
pub use core_sync::{
    CommandOptions, IdempotencyToken, PlaylistCommand, PlaylistRepository, RemotePlaylistService,
    SyncError,
};

use core_auth::CredentialCache;
use core_runtime::events::EventBus;
use core_sync::RepositoryConfig;
use std::sync::Arc;
use tracing::info;

/// Aggregated handle to the dependencies the core requires.
pub struct CoreDependencies {
    pub credential_provider: Arc<dyn CredentialProvider>,
    /// Remote playlist store. When absent the REST provider is built from
    /// the configuration's base URL and HTTP client.
    pub remote: Option<Arc<dyn RemotePlaylistService>>,
}

impl CoreDependencies {
    pub fn new(credential_provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            credential_provider,
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemotePlaylistService>) -> Self {
        self.remote = Some(remote);
        self
    }
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct PlaylistCore {
    config: Arc<CoreConfig>,
    event_bus: EventBus,
    credentials: Arc<CredentialCache>,
    repository: Arc<PlaylistRepository>,
}

impl PlaylistCore {
    /// Wire the core without touching the network.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Runtime`] if the configuration is invalid, or no remote
    ///   was supplied and the REST provider cannot be built from it
    pub fn new(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);
        let emit_events = config.features.emit_events;

        let mut credentials =
            CredentialCache::new(deps.credential_provider, config.credential_refresh_buffer);
        if emit_events {
            credentials = credentials.with_event_bus(event_bus.clone());
        }
        let credentials = Arc::new(credentials);

        let remote = match deps.remote {
            Some(remote) => remote,
            None => Self::build_remote(&config)?,
        };

        let mut repository = PlaylistRepository::new(
            credentials.clone(),
            remote,
            RepositoryConfig::from(&config),
        );
        if emit_events {
            repository = repository.with_event_bus(event_bus.clone());
        }

        info!(
            remote_timeout_ms = config.remote_timeout.as_millis() as u64,
            emit_events, "Playlist core initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            event_bus,
            credentials,
            repository: Arc::new(repository),
        })
    }

    /// Wire the core and run the startup work the configuration asks for.
    pub async fn start(config: CoreConfig, deps: CoreDependencies) -> Result<Self> {
        let core = Self::new(config, deps)?;

        if core.config.features.ensure_favorites_on_start {
            let favorites = core
                .repository
                .ensure_favorites(IdempotencyToken::generate())
                .await?;
            info!(playlist_id = %favorites.id, "Favorites playlist ready");
        }

        Ok(core)
    }

    #[cfg(feature = "rest")]
    fn build_remote(config: &CoreConfig) -> Result<Arc<dyn RemotePlaylistService>> {
        let service = provider_rest::RestPlaylistService::from_config(config)?;
        Ok(Arc::new(service))
    }

    #[cfg(not(feature = "rest"))]
    fn build_remote(_config: &CoreConfig) -> Result<Arc<dyn RemotePlaylistService>> {
        Err(CoreError::InitializationFailed(
            "no remote playlist service supplied and the `rest` feature is disabled".to_string(),
        ))
    }

    pub fn repository(&self) -> Arc<PlaylistRepository> {
        Arc::clone(&self.repository)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Subscribe to playlist and auth events.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Drop the cached credential, e.g. after the host signs the user out.
    pub async fn sign_out(&self) {
        self.credentials.invalidate().await;
    }
}

impl std::fmt::Debug for PlaylistCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistCore")
            .field("config", &self.config)
            .field("event_bus", &self.event_bus)
            .finish_non_exhaustive()
    }
}
