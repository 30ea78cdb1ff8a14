use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),
}

impl CoreError {
    /// Classified playlist error, when this wraps one.
    pub fn sync_kind(&self) -> Option<core_sync::ErrorKind> {
        match self {
            CoreError::Sync(error) => Some(error.kind()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
