use core_auth::AuthError;
use core_library::{LibraryError, Revision};
use std::time::Duration;
use thiserror::Error;

use crate::remote::RemoteError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Not authenticated: {0}")]
    Unauthenticated(String),

    #[error("Playlist {playlist_id} already has a mutation in flight")]
    Busy { playlist_id: String },

    #[error("Playlist not found: {playlist_id}")]
    NotFound { playlist_id: String },

    #[error("Revision conflict on playlist {playlist_id}: based on {expected:?}, server has {current:?}")]
    Conflict {
        playlist_id: String,
        expected: Option<Revision>,
        current: Option<Revision>,
    },

    #[error("Remote playlist service unavailable: {0}")]
    Unavailable(String),

    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command cancelled before dispatch")]
    Cancelled,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),
}

/// Flat classification of [`SyncError`] for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthenticated,
    Busy,
    NotFound,
    Conflict,
    Unavailable,
    Timeout,
    Cancelled,
    InvalidCommand,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            SyncError::Busy { .. } => ErrorKind::Busy,
            SyncError::NotFound { .. } => ErrorKind::NotFound,
            SyncError::Conflict { .. } => ErrorKind::Conflict,
            SyncError::Unavailable(_) => ErrorKind::Unavailable,
            SyncError::Timeout(_) => ErrorKind::Timeout,
            SyncError::Cancelled => ErrorKind::Cancelled,
            SyncError::InvalidCommand(_) => ErrorKind::InvalidCommand,
        }
    }

    /// Whether resubmitting the same command (with the same idempotency
    /// token) may succeed without user intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Busy { .. } | SyncError::Unavailable(_) | SyncError::Timeout(_)
        )
    }

    /// Short lowercase label used in events and logs.
    pub fn label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Busy => "busy",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidCommand => "invalid_command",
        }
    }

    pub(crate) fn from_remote(error: RemoteError, playlist_id: &str) -> Self {
        match error {
            RemoteError::Unauthenticated => {
                SyncError::Unauthenticated("remote rejected the credential".to_string())
            }
            RemoteError::NotFound => SyncError::NotFound {
                playlist_id: playlist_id.to_string(),
            },
            RemoteError::Conflict { current_revision } => SyncError::Conflict {
                playlist_id: playlist_id.to_string(),
                expected: None,
                current: current_revision,
            },
            RemoteError::Unavailable(message) => SyncError::Unavailable(message),
        }
    }
}

impl From<AuthError> for SyncError {
    fn from(error: AuthError) -> Self {
        if error.requires_sign_in() {
            SyncError::Unauthenticated(error.to_string())
        } else {
            SyncError::Unavailable(error.to_string())
        }
    }
}

impl From<LibraryError> for SyncError {
    fn from(error: LibraryError) -> Self {
        match error {
            LibraryError::NotFound { id } => SyncError::NotFound { playlist_id: id },
            other => SyncError::InvalidCommand(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(SyncError::Busy {
            playlist_id: "p1".into()
        }
        .is_retryable());
        assert!(SyncError::Unavailable("down".into()).is_retryable());
        assert!(SyncError::Timeout(Duration::from_secs(1)).is_retryable());

        assert!(!SyncError::Cancelled.is_retryable());
        assert!(!SyncError::Unauthenticated("x".into()).is_retryable());
        assert!(!SyncError::InvalidCommand("x".into()).is_retryable());
    }

    #[test]
    fn test_auth_error_mapping() {
        assert_eq!(
            SyncError::from(AuthError::NotAuthenticated).kind(),
            ErrorKind::Unauthenticated
        );
        assert_eq!(
            SyncError::from(AuthError::CredentialExpired {
                subject: "u1".into()
            })
            .kind(),
            ErrorKind::Unauthenticated
        );
        assert_eq!(
            SyncError::from(AuthError::ProviderUnavailable("keychain locked".into())).kind(),
            ErrorKind::Unavailable
        );
    }

    #[test]
    fn test_library_error_mapping() {
        assert_eq!(
            SyncError::from(LibraryError::NotFound { id: "p1".into() }),
            SyncError::NotFound {
                playlist_id: "p1".into()
            }
        );
        assert_eq!(
            SyncError::from(LibraryError::IndexOutOfRange { index: 4, len: 3 }).kind(),
            ErrorKind::InvalidCommand
        );
    }

    #[test]
    fn test_remote_error_mapping() {
        let conflict = SyncError::from_remote(
            RemoteError::Conflict {
                current_revision: Some(Revision(9)),
            },
            "p1",
        );
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
        assert_eq!(conflict.label(), "conflict");
        assert_eq!(
            SyncError::from_remote(RemoteError::NotFound, "p1").label(),
            "not_found"
        );
    }
}
