use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Credential for {subject} expired")]
    CredentialExpired { subject: String },

    #[error("Credential provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl AuthError {
    /// Whether the failure means the user must sign in again, as opposed to a
    /// transient problem reaching the credential source.
    pub fn requires_sign_in(&self) -> bool {
        !matches!(self, AuthError::ProviderUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
