use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{AuthError, Result};
use crate::types::Credential;

/// Source of credentials for remote playlist calls.
///
/// Implemented by the host's authentication layer. The core never refreshes
/// tokens itself; it asks for the current credential before each remote call
/// and reports back when the remote rejected it.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Returns a credential that is valid right now.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotAuthenticated`] when no user is signed in
    /// - [`AuthError::ProviderUnavailable`] when the credential source could not be reached
    async fn current_credential(&self) -> Result<Credential>;

    /// Called after the remote service rejected the credential returned by
    /// [`current_credential`](Self::current_credential).
    async fn invalidate(&self) {}
}

/// Credential provider holding whatever credential the host last pushed.
///
/// Suitable for hosts whose sign-in flow lives entirely outside the core:
/// call [`set`](Self::set) after sign-in or refresh and [`clear`](Self::clear)
/// on sign-out.
#[derive(Debug, Default)]
pub struct StaticCredentialProvider {
    credential: RwLock<Option<Credential>>,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: RwLock::new(Some(credential)),
        }
    }

    pub async fn set(&self, credential: Credential) {
        debug!(subject = %credential.subject, "Credential updated");
        *self.credential.write().await = Some(credential);
    }

    pub async fn clear(&self) {
        debug!("Credential cleared");
        *self.credential.write().await = None;
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn current_credential(&self) -> Result<Credential> {
        self.credential
            .read()
            .await
            .clone()
            .ok_or(AuthError::NotAuthenticated)
    }
}
