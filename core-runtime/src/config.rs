//! # Core Configuration Module
//!
//! Configuration for the playlist synchronization core.
//!
//! ## Overview
//!
//! A builder assembles a [`CoreConfig`] holding the tunables of the
//! synchronization layer (remote call timeout, credential refresh buffer,
//! event buffer size) and the optional REST wiring (base URL plus an
//! injected [`HttpClient`]). `build()` validates everything up front so a
//! misconfigured host fails at startup instead of on the first command.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .remote_timeout(Duration::from_secs(10))
//!     .api_base_url("https://api.example.com/v1")
//!     .http_client(Arc::new(MyHttpClient))
//!     .ensure_favorites_on_start(true)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::HttpClient;
use std::sync::Arc;
use std::time::Duration;

/// Default bound on a single remote playlist call.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default margin before expiry at which a credential is treated as stale.
pub const DEFAULT_CREDENTIAL_REFRESH_BUFFER: Duration = Duration::from_secs(60);

/// Default capacity of the event bus ring buffer.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Default number of attempts for idempotent reads against the REST provider.
pub const DEFAULT_READ_ATTEMPTS: u32 = 3;

const MAX_REMOTE_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_CREDENTIAL_REFRESH_BUFFER: Duration = Duration::from_secs(3600);
const MAX_EVENT_BUFFER_SIZE: usize = 65_536;
const MAX_READ_ATTEMPTS: u32 = 10;

/// Core configuration for the playlist synchronization core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Upper bound on a remote call when the caller supplies no timeout
    pub remote_timeout: Duration,

    /// Credentials expiring within this window are refreshed before use
    pub credential_refresh_buffer: Duration,

    /// Capacity of the broadcast event bus
    pub event_buffer_size: usize,

    /// Attempts for read requests (list/fetch) issued by the REST provider
    pub read_attempts: u32,

    /// Base URL of the remote playlist API (REST provider only)
    pub api_base_url: Option<String>,

    /// HTTP client used by the REST provider
    pub http_client: Option<Arc<dyn HttpClient>>,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("remote_timeout", &self.remote_timeout)
            .field("credential_refresh_buffer", &self.credential_refresh_buffer)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("read_attempts", &self.read_attempts)
            .field("api_base_url", &self.api_base_url)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags for optional behaviour of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Make sure a favorites playlist exists once the core starts
    pub ensure_favorites_on_start: bool,

    /// Emit playlist and auth events on the event bus
    pub emit_events: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            ensure_favorites_on_start: false,
            emit_events: true,
        }
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Remote timeout is within 1 ms and 5 minutes
    /// - Credential refresh buffer does not exceed one hour
    /// - Event buffer size is non-zero and bounded
    /// - Read attempts are within 1 and 10
    /// - The API base URL, when given, is an http(s) URL
    pub fn validate(&self) -> Result<()> {
        if self.remote_timeout.is_zero() {
            return Err(Error::Config(
                "Remote timeout must be greater than 0".to_string(),
            ));
        }

        if self.remote_timeout > MAX_REMOTE_TIMEOUT {
            return Err(Error::Config(format!(
                "Remote timeout exceeds maximum of {} seconds",
                MAX_REMOTE_TIMEOUT.as_secs()
            )));
        }

        if self.credential_refresh_buffer > MAX_CREDENTIAL_REFRESH_BUFFER {
            return Err(Error::Config(
                "Credential refresh buffer exceeds maximum of 1 hour".to_string(),
            ));
        }

        if self.event_buffer_size == 0 || self.event_buffer_size > MAX_EVENT_BUFFER_SIZE {
            return Err(Error::Config(format!(
                "Event buffer size must be between 1 and {}",
                MAX_EVENT_BUFFER_SIZE
            )));
        }

        if self.read_attempts == 0 || self.read_attempts > MAX_READ_ATTEMPTS {
            return Err(Error::Config(format!(
                "Read attempts must be between 1 and {}",
                MAX_READ_ATTEMPTS
            )));
        }

        if let Some(url) = &self.api_base_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(Error::Config(format!(
                    "API base URL must start with http:// or https://, got '{}'",
                    url
                )));
            }
        }

        Ok(())
    }

    /// Returns the HTTP client, failing with an actionable message when the
    /// host did not inject one.
    pub fn require_http_client(&self) -> Result<Arc<dyn HttpClient>> {
        self.http_client
            .clone()
            .ok_or_else(|| Error::CapabilityMissing {
                capability: "HttpClient".to_string(),
                message: "No HTTP client implementation provided. \
                          Inject one with CoreConfigBuilder::http_client or supply \
                          a custom RemotePlaylistService."
                    .to_string(),
            })
    }

    /// Returns the API base URL without a trailing slash.
    pub fn require_api_base_url(&self) -> Result<String> {
        self.api_base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| {
                Error::Config(
                    "API base URL is required when using the REST playlist provider".to_string(),
                )
            })
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    remote_timeout: Option<Duration>,
    credential_refresh_buffer: Option<Duration>,
    event_buffer_size: Option<usize>,
    read_attempts: Option<u32>,
    api_base_url: Option<String>,
    http_client: Option<Arc<dyn HttpClient>>,
    features: FeatureFlags,
}

impl CoreConfigBuilder {
    pub fn remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = Some(timeout);
        self
    }

    pub fn credential_refresh_buffer(mut self, buffer: Duration) -> Self {
        self.credential_refresh_buffer = Some(buffer);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn read_attempts(mut self, attempts: u32) -> Self {
        self.read_attempts = Some(attempts);
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn ensure_favorites_on_start(mut self, enable: bool) -> Self {
        self.features.ensure_favorites_on_start = enable;
        self
    }

    pub fn emit_events(mut self, enable: bool) -> Self {
        self.features.emit_events = enable;
        self
    }

    /// Builds the configuration, applying defaults for unset values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if any value fails [`CoreConfig::validate`].
    pub fn build(self) -> Result<CoreConfig> {
        let config = CoreConfig {
            remote_timeout: self.remote_timeout.unwrap_or(DEFAULT_REMOTE_TIMEOUT),
            credential_refresh_buffer: self
                .credential_refresh_buffer
                .unwrap_or(DEFAULT_CREDENTIAL_REFRESH_BUFFER),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            read_attempts: self.read_attempts.unwrap_or(DEFAULT_READ_ATTEMPTS),
            api_base_url: self.api_base_url,
            http_client: self.http_client,
            features: self.features,
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpRequest, HttpResponse};

    struct NoopHttpClient;

    #[async_trait]
    impl HttpClient for NoopHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse::new(204, ""))
        }
    }

    #[test]
    fn test_defaults() {
        let config = CoreConfig::builder().build().unwrap();

        assert_eq!(config.remote_timeout, DEFAULT_REMOTE_TIMEOUT);
        assert_eq!(
            config.credential_refresh_buffer,
            DEFAULT_CREDENTIAL_REFRESH_BUFFER
        );
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
        assert_eq!(config.read_attempts, DEFAULT_READ_ATTEMPTS);
        assert!(config.api_base_url.is_none());
        assert!(config.http_client.is_none());
        assert!(!config.features.ensure_favorites_on_start);
        assert!(config.features.emit_events);
    }

    #[test]
    fn test_builder_overrides() {
        let config = CoreConfig::builder()
            .remote_timeout(Duration::from_millis(750))
            .credential_refresh_buffer(Duration::from_secs(5))
            .event_buffer_size(16)
            .read_attempts(1)
            .api_base_url("https://api.example.com/v1/")
            .http_client(Arc::new(NoopHttpClient))
            .ensure_favorites_on_start(true)
            .emit_events(false)
            .build()
            .unwrap();

        assert_eq!(config.remote_timeout, Duration::from_millis(750));
        assert_eq!(config.event_buffer_size, 16);
        assert!(config.features.ensure_favorites_on_start);
        assert!(!config.features.emit_events);
        assert_eq!(
            config.require_api_base_url().unwrap(),
            "https://api.example.com/v1"
        );
        assert!(config.require_http_client().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = CoreConfig::builder()
            .remote_timeout(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_excessive_timeout_rejected() {
        let err = CoreConfig::builder()
            .remote_timeout(Duration::from_secs(301))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Remote timeout"));
    }

    #[test]
    fn test_event_buffer_bounds() {
        assert!(CoreConfig::builder().event_buffer_size(0).build().is_err());
        assert!(CoreConfig::builder()
            .event_buffer_size(MAX_EVENT_BUFFER_SIZE + 1)
            .build()
            .is_err());
    }

    #[test]
    fn test_read_attempt_bounds() {
        assert!(CoreConfig::builder().read_attempts(0).build().is_err());
        assert!(CoreConfig::builder().read_attempts(11).build().is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        let err = CoreConfig::builder()
            .api_base_url("ftp://example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn test_missing_capabilities_are_actionable() {
        let config = CoreConfig::builder().build().unwrap();

        match config.require_http_client() {
            Err(Error::CapabilityMissing { capability, .. }) => {
                assert_eq!(capability, "HttpClient")
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            config.require_api_base_url(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_debug_hides_client() {
        let config = CoreConfig::builder()
            .http_client(Arc::new(NoopHttpClient))
            .build()
            .unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("HttpClient { ... }"));
    }
}
