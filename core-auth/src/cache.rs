//! Credential caching in front of a [`CredentialProvider`].

use async_trait::async_trait;
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::provider::CredentialProvider;
use crate::types::Credential;

/// Reuses a credential until it enters the refresh buffer.
///
/// Concurrent callers share one provider request: the cache slot is guarded
/// by an async mutex held across the refresh, so a burst of commands issued
/// while the credential is stale triggers a single call to the provider.
///
/// A credential the provider hands back already expired is never returned;
/// the call fails with [`AuthError::CredentialExpired`] instead.
pub struct CredentialCache {
    provider: Arc<dyn CredentialProvider>,
    clock: Arc<dyn Clock>,
    refresh_buffer: Duration,
    cached: Mutex<Option<Credential>>,
    event_bus: Option<EventBus>,
}

impl CredentialCache {
    pub fn new(provider: Arc<dyn CredentialProvider>, refresh_buffer: Duration) -> Self {
        Self {
            provider,
            clock: Arc::new(SystemClock),
            refresh_buffer,
            cached: Mutex::new(None),
            event_bus: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Auth(event));
        }
    }

    #[instrument(skip(self, slot))]
    async fn refresh(&self, slot: &mut Option<Credential>) -> Result<Credential> {
        let fresh = match self.provider.current_credential().await {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Credential provider failed");
                *slot = None;
                self.emit(AuthEvent::CredentialRejected {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };

        if fresh.is_expired_at(self.clock.now(), Duration::ZERO) {
            warn!(subject = %fresh.subject, "Provider returned an expired credential");
            *slot = None;
            self.emit(AuthEvent::CredentialRejected {
                message: format!("credential for {} already expired", fresh.subject),
            });
            return Err(AuthError::CredentialExpired {
                subject: fresh.subject,
            });
        }

        info!(subject = %fresh.subject, "Credential refreshed");
        self.emit(AuthEvent::CredentialRefreshed {
            subject: fresh.subject.clone(),
            expires_at: fresh.expires_at.timestamp(),
        });
        *slot = Some(fresh.clone());
        Ok(fresh)
    }
}

#[async_trait]
impl CredentialProvider for CredentialCache {
    async fn current_credential(&self) -> Result<Credential> {
        let mut slot = self.cached.lock().await;

        if let Some(credential) = slot.as_ref() {
            if !credential.is_expired_at(self.clock.now(), self.refresh_buffer) {
                debug!(subject = %credential.subject, "Using cached credential");
                return Ok(credential.clone());
            }
            debug!(subject = %credential.subject, "Cached credential inside refresh buffer");
        }

        self.refresh(&mut slot).await
    }

    async fn invalidate(&self) {
        let dropped = self.cached.lock().await.take();
        if let Some(credential) = dropped {
            warn!(subject = %credential.subject, "Credential invalidated after remote rejection");
            self.emit(AuthEvent::CredentialRejected {
                message: format!("remote rejected credential for {}", credential.subject),
            });
        }
        self.provider.invalidate().await;
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("refresh_buffer", &self.refresh_buffer)
            .field("has_event_bus", &self.event_bus.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use mockall::mock;
    use std::sync::Mutex as StdMutex;

    mock! {
        pub Provider {}

        #[async_trait]
        impl CredentialProvider for Provider {
            async fn current_credential(&self) -> Result<Credential>;
            async fn invalidate(&self);
        }
    }

    struct ManualClock(StdMutex<DateTime<Utc>>);

    impl ManualClock {
        fn new(now: DateTime<Utc>) -> Self {
            Self(StdMutex::new(now))
        }

        fn advance(&self, by: chrono::Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    fn credential(token: &str, expires_at: DateTime<Utc>) -> Credential {
        Credential::new(token, "listener-1", expires_at)
    }

    #[tokio::test]
    async fn test_reuses_credential_outside_buffer() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));

        let mut provider = MockProvider::new();
        let issued = credential("tok-1", start + chrono::Duration::minutes(10));
        let returned = issued.clone();
        provider
            .expect_current_credential()
            .times(1)
            .returning(move || Ok(returned.clone()));

        let cache = CredentialCache::new(Arc::new(provider), Duration::from_secs(60))
            .with_clock(clock.clone());

        assert_eq!(cache.current_credential().await.unwrap(), issued);
        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(cache.current_credential().await.unwrap(), issued);
    }

    #[tokio::test]
    async fn test_refreshes_inside_buffer() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));

        let mut provider = MockProvider::new();
        let first = credential("tok-1", start + chrono::Duration::minutes(2));
        let second = credential("tok-2", start + chrono::Duration::minutes(30));
        let mut sequence = vec![second.clone(), first.clone()];
        provider
            .expect_current_credential()
            .times(2)
            .returning(move || Ok(sequence.pop().unwrap()));

        let cache = CredentialCache::new(Arc::new(provider), Duration::from_secs(60))
            .with_clock(clock.clone());

        assert_eq!(cache.current_credential().await.unwrap().token, "tok-1");
        clock.advance(chrono::Duration::seconds(90));
        assert_eq!(cache.current_credential().await.unwrap().token, "tok-2");
    }

    #[tokio::test]
    async fn test_rejects_already_expired_credential() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let bus = EventBus::new(8);
        let mut events = bus.subscribe();

        let mut provider = MockProvider::new();
        let stale = credential("tok-old", start - chrono::Duration::seconds(1));
        provider
            .expect_current_credential()
            .returning(move || Ok(stale.clone()));

        let cache = CredentialCache::new(Arc::new(provider), Duration::from_secs(60))
            .with_clock(clock)
            .with_event_bus(bus);

        let err = cache.current_credential().await.unwrap_err();
        assert!(matches!(err, AuthError::CredentialExpired { .. }));
        assert!(err.requires_sign_in());
        assert!(matches!(
            events.try_recv().unwrap(),
            CoreEvent::Auth(AuthEvent::CredentialRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let mut provider = MockProvider::new();
        provider
            .expect_current_credential()
            .returning(|| Err(AuthError::NotAuthenticated));

        let cache = CredentialCache::new(Arc::new(provider), Duration::from_secs(60));
        assert_eq!(
            cache.current_credential().await.unwrap_err(),
            AuthError::NotAuthenticated
        );
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh_and_notifies_provider() {
        let start = Utc::now();
        let mut provider = MockProvider::new();
        let issued = credential("tok-1", start + chrono::Duration::hours(1));
        provider
            .expect_current_credential()
            .times(2)
            .returning(move || Ok(issued.clone()));
        provider.expect_invalidate().times(1).return_const(());

        let bus = EventBus::new(8);
        let mut events = bus.subscribe();
        let cache = CredentialCache::new(Arc::new(provider), Duration::from_secs(60))
            .with_event_bus(bus);

        cache.current_credential().await.unwrap();
        cache.invalidate().await;
        cache.current_credential().await.unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert_eq!(kinds.len(), 3);
        assert!(matches!(
            kinds[1],
            CoreEvent::Auth(AuthEvent::CredentialRejected { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_refresh() {
        let start = Utc::now();
        let mut provider = MockProvider::new();
        let issued = credential("tok-1", start + chrono::Duration::hours(1));
        provider
            .expect_current_credential()
            .times(1)
            .returning(move || Ok(issued.clone()));

        let cache = Arc::new(CredentialCache::new(
            Arc::new(provider),
            Duration::from_secs(60),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.current_credential().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap().token, "tok-1");
        }
    }
}
