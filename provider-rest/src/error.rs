//! Error types for the REST playlist provider

use core_library::Revision;
use core_sync::RemoteError;
use thiserror::Error;

/// REST provider errors
#[derive(Error, Debug)]
pub enum RestProviderError {
    /// The server rejected the credential (401/403)
    #[error("Authentication rejected (status {status_code})")]
    Unauthorized { status_code: u16 },

    /// Playlist does not exist (404)
    #[error("Playlist not found: {playlist_id}")]
    NotFound { playlist_id: String },

    /// Precondition failed or revision mismatch (409/412)
    #[error("Revision conflict (server revision {current_revision:?})")]
    Conflict { current_revision: Option<u64> },

    /// Any other non-success status
    #[error("Playlist API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Transport failure from the host HTTP client
    #[error(transparent)]
    BridgeError(#[from] bridge_traits::error::BridgeError),
}

/// Result type for REST provider operations
pub type Result<T> = std::result::Result<T, RestProviderError>;

impl From<RestProviderError> for RemoteError {
    fn from(error: RestProviderError) -> Self {
        match error {
            RestProviderError::Unauthorized { .. } => RemoteError::Unauthenticated,
            RestProviderError::NotFound { .. } => RemoteError::NotFound,
            RestProviderError::Conflict { current_revision } => RemoteError::Conflict {
                current_revision: current_revision.map(Revision),
            },
            other => RemoteError::Unavailable(other.to_string()),
        }
    }
}
