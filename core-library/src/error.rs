use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LibraryError {
    #[error("Playlist not found: {id}")]
    NotFound { id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Track {track_id} is not in playlist {playlist_id}")]
    TrackNotInPlaylist {
        playlist_id: String,
        track_id: String,
    },

    #[error("Index {index} out of range for playlist of {len} tracks")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Subscription closed")]
    SubscriptionClosed,
}

impl LibraryError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        LibraryError::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
