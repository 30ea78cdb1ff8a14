//! Playlist REST API connector
//!
//! Implements `RemotePlaylistService` over the host-provided `HttpClient`.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_auth::Credential;
use core_library::{NewPlaylist, Playlist, PlaylistId, TrackId};
use core_runtime::config::{CoreConfig, DEFAULT_READ_ATTEMPTS, DEFAULT_REMOTE_TIMEOUT};
use core_sync::{RemoteCallContext, RemotePlaylistService, RemoteResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{RestProviderError, Result};
use crate::types::{
    AddTrackBody, AddTracksBody, ConflictBody, CreatePlaylistBody, PlaylistListResponse,
    PlaylistResource, RenamePlaylistBody, ReorderBody, UpdateDetailsBody,
};

/// Header carrying the server revision on conflict responses
const REVISION_HEADER: &str = "X-Playlist-Revision";

/// Playlist REST API connector
///
/// # Features
///
/// - Bearer authentication from the call's credential
/// - `Idempotency-Key` and `If-Match` headers on every mutation
/// - Exponential backoff for reads on rate limiting and server errors
/// - Mutations are sent once; retries are left to the caller, who reuses the
///   idempotency token
///
/// # Example
///
/// ```ignore
/// use provider_rest::RestPlaylistService;
/// use core_sync::RemotePlaylistService;
///
/// let service = RestPlaylistService::new(http_client, "https://api.example.com/v1");
/// let playlists = service.fetch_playlists(&credential).await?;
/// ```
pub struct RestPlaylistService {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    read_attempts: u32,
    request_timeout: Duration,
}

impl RestPlaylistService {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
            read_attempts: DEFAULT_READ_ATTEMPTS,
            request_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Fails when the configuration has no HTTP client or no API base URL.
    pub fn from_config(config: &CoreConfig) -> core_runtime::Result<Self> {
        let http_client = config.require_http_client()?;
        let base_url = config.require_api_base_url()?;
        Ok(Self::new(http_client, base_url)
            .with_read_attempts(config.read_attempts)
            .with_request_timeout(config.remote_timeout))
    }

    pub fn with_read_attempts(mut self, attempts: u32) -> Self {
        self.read_attempts = attempts.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn playlists_url(&self) -> String {
        format!("{}/playlists", self.base_url)
    }

    fn playlist_url(&self, id: &PlaylistId) -> String {
        format!("{}/playlists/{}", self.base_url, urlencoding::encode(id.as_str()))
    }

    fn request(&self, method: HttpMethod, url: String, credential: &Credential) -> HttpRequest {
        HttpRequest::new(method, url)
            .bearer_token(credential.token.clone())
            .header("Accept", "application/json")
            .timeout(self.request_timeout)
    }

    fn mutation(&self, method: HttpMethod, url: String, ctx: &RemoteCallContext) -> HttpRequest {
        let request = self
            .request(method, url, &ctx.credential)
            .header("Idempotency-Key", ctx.idempotency_token.as_str());
        match ctx.expected_revision {
            Some(revision) => request.header("If-Match", revision.to_string()),
            None => request,
        }
    }

    /// Classify a non-success response.
    fn classify(response: &HttpResponse, playlist_id: Option<&PlaylistId>) -> RestProviderError {
        match response.status {
            401 | 403 => RestProviderError::Unauthorized {
                status_code: response.status,
            },
            404 => RestProviderError::NotFound {
                playlist_id: playlist_id.map(ToString::to_string).unwrap_or_default(),
            },
            409 | 412 => {
                let current_revision = response
                    .header(REVISION_HEADER)
                    .and_then(|value| value.trim().parse().ok())
                    .or_else(|| {
                        response
                            .json::<ConflictBody>()
                            .ok()
                            .and_then(|body| body.current_revision)
                    });
                RestProviderError::Conflict { current_revision }
            }
            status => RestProviderError::ApiError {
                status_code: status,
                message: response.text_lossy(),
            },
        }
    }

    fn is_retryable_status(status: u16) -> bool {
        status == 429 || (500..600).contains(&status)
    }

    /// Execute a read with retry logic
    ///
    /// Implements exponential backoff for rate limiting and transient errors.
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn execute_read(
        &self,
        request: HttpRequest,
        playlist_id: Option<&PlaylistId>,
    ) -> Result<HttpResponse> {
        let mut attempt = 0;

        loop {
            match self.http_client.execute(request.clone()).await {
                Ok(response) if response.is_success() => {
                    debug!("API request succeeded: status={}", response.status);
                    return Ok(response);
                }
                Ok(response) if Self::is_retryable_status(response.status) => {
                    attempt += 1;
                    if attempt >= self.read_attempts {
                        warn!(
                            "API request failed after {} attempts: status={}",
                            attempt, response.status
                        );
                        return Err(Self::classify(&response, playlist_id));
                    }

                    let backoff_ms = 100u64 * 2u64.pow(attempt);
                    warn!(
                        "API request failed (attempt {}/{}): status={}, retrying in {}ms",
                        attempt, self.read_attempts, response.status, backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Ok(response) => {
                    warn!("API request failed: status={}", response.status);
                    return Err(Self::classify(&response, playlist_id));
                }
                Err(e) if e.is_transient() => {
                    attempt += 1;
                    if attempt >= self.read_attempts {
                        warn!("API request failed after {} attempts: {}", attempt, e);
                        return Err(e.into());
                    }

                    let backoff_ms = 100u64 * 2u64.pow(attempt);
                    warn!(
                        "API request failed (attempt {}/{}): {}, retrying in {}ms",
                        attempt, self.read_attempts, e, backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Execute a mutation exactly once.
    #[instrument(
        skip(self, request),
        fields(method = request.method.as_str(), url = %request.url)
    )]
    async fn execute_mutation(
        &self,
        request: HttpRequest,
        playlist_id: Option<&PlaylistId>,
    ) -> Result<HttpResponse> {
        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            debug!("API mutation succeeded: status={}", response.status);
            Ok(response)
        } else {
            warn!("API mutation failed: status={}", response.status);
            Err(Self::classify(&response, playlist_id))
        }
    }

    fn parse_playlist(response: &HttpResponse) -> Result<Playlist> {
        let resource: PlaylistResource = response
            .json()
            .map_err(|e| RestProviderError::ParseError(e.to_string()))?;
        resource.into_playlist()
    }

    async fn send_mutation(
        &self,
        request: Result<HttpRequest>,
        id: Option<&PlaylistId>,
    ) -> RemoteResult<Playlist> {
        let response = self.execute_mutation(request?, id).await?;
        Ok(Self::parse_playlist(&response)?)
    }
}

#[async_trait]
impl RemotePlaylistService for RestPlaylistService {
    #[instrument(skip(self, credential))]
    async fn fetch_playlists(&self, credential: &Credential) -> RemoteResult<Vec<Playlist>> {
        info!("Listing playlists");
        let request = self.request(HttpMethod::Get, self.playlists_url(), credential);
        let response = self.execute_read(request, None).await?;

        let list: PlaylistListResponse = response
            .json()
            .map_err(|e| RestProviderError::ParseError(e.to_string()))?;
        let playlists = list
            .playlists
            .into_iter()
            .map(PlaylistResource::into_playlist)
            .collect::<Result<Vec<_>>>()?;

        info!("Fetched {} playlists", playlists.len());
        Ok(playlists)
    }

    #[instrument(skip(self, credential), fields(playlist_id = %id))]
    async fn fetch_playlist(
        &self,
        credential: &Credential,
        id: &PlaylistId,
    ) -> RemoteResult<Playlist> {
        let request = self.request(HttpMethod::Get, self.playlist_url(id), credential);
        let response = self.execute_read(request, Some(id)).await?;
        Ok(Self::parse_playlist(&response)?)
    }

    async fn create_playlist(
        &self,
        ctx: &RemoteCallContext,
        request: &NewPlaylist,
    ) -> RemoteResult<Playlist> {
        let body = CreatePlaylistBody {
            name: request.name.trim(),
            description: request.description.as_deref(),
            is_favorites: request.is_favorites,
        };
        let http_request = self
            .mutation(HttpMethod::Post, self.playlists_url(), ctx)
            .json(&body)
            .map_err(RestProviderError::from);
        self.send_mutation(http_request, None).await
    }

    async fn rename_playlist(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        name: &str,
    ) -> RemoteResult<Playlist> {
        let http_request = self
            .mutation(HttpMethod::Patch, self.playlist_url(id), ctx)
            .json(&RenamePlaylistBody { name })
            .map_err(RestProviderError::from);
        self.send_mutation(http_request, Some(id)).await
    }

    async fn update_playlist_details(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        name: &str,
        description: Option<&str>,
    ) -> RemoteResult<Playlist> {
        let http_request = self
            .mutation(HttpMethod::Put, self.playlist_url(id), ctx)
            .json(&UpdateDetailsBody { name, description })
            .map_err(RestProviderError::from);
        self.send_mutation(http_request, Some(id)).await
    }

    async fn delete_playlist(&self, ctx: &RemoteCallContext, id: &PlaylistId) -> RemoteResult<()> {
        let request = self.mutation(HttpMethod::Delete, self.playlist_url(id), ctx);
        self.execute_mutation(request, Some(id)).await?;
        Ok(())
    }

    async fn add_track(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        track_id: &TrackId,
        position: Option<usize>,
    ) -> RemoteResult<Playlist> {
        let url = format!("{}/tracks", self.playlist_url(id));
        let body = AddTrackBody {
            track_id: track_id.as_str(),
            position,
        };
        let http_request = self
            .mutation(HttpMethod::Post, url, ctx)
            .json(&body)
            .map_err(RestProviderError::from);
        self.send_mutation(http_request, Some(id)).await
    }

    async fn add_tracks(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        track_ids: &[TrackId],
        position: Option<usize>,
    ) -> RemoteResult<Playlist> {
        let url = format!("{}/tracks/batch", self.playlist_url(id));
        let body = AddTracksBody {
            track_ids: track_ids.iter().map(TrackId::as_str).collect(),
            position,
        };
        let http_request = self
            .mutation(HttpMethod::Post, url, ctx)
            .json(&body)
            .map_err(RestProviderError::from);
        self.send_mutation(http_request, Some(id)).await
    }

    async fn remove_track(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        track_id: &TrackId,
        position: usize,
    ) -> RemoteResult<Playlist> {
        let url = format!(
            "{}/tracks/{}?trackId={}",
            self.playlist_url(id),
            position,
            urlencoding::encode(track_id.as_str())
        );
        let request = self.mutation(HttpMethod::Delete, url, ctx);
        self.send_mutation(Ok(request), Some(id)).await
    }

    async fn reorder_track(
        &self,
        ctx: &RemoteCallContext,
        id: &PlaylistId,
        from: usize,
        to: usize,
    ) -> RemoteResult<Playlist> {
        let url = format!("{}/reorder", self.playlist_url(id));
        let http_request = self
            .mutation(HttpMethod::Post, url, ctx)
            .json(&ReorderBody { from, to })
            .map_err(RestProviderError::from);
        self.send_mutation(http_request, Some(id)).await
    }
}
