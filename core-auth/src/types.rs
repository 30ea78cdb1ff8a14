use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Bearer credential attached to every remote playlist call.
///
/// # Security
///
/// The token is never logged. The `Debug` implementation redacts it.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use core_auth::Credential;
///
/// let credential = Credential::new("ya29.a0...", "listener-1", Utc::now() + Duration::hours(1));
/// assert!(!credential.is_expired_at(Utc::now(), std::time::Duration::from_secs(60)));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque bearer token
    pub token: String,
    /// Account the credential was issued for
    pub subject: String,
    /// When the token stops being accepted (UTC)
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        token: impl Into<String>,
        subject: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            subject: subject.into(),
            expires_at,
        }
    }

    /// Whether the credential is expired at `now`, or will be within `buffer`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        let buffer_ms = i64::try_from(buffer.as_millis()).unwrap_or(i64::MAX);
        now + chrono::Duration::milliseconds(buffer_ms) >= self.expires_at
    }

    /// Time left before expiry, `None` once expired.
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        if now >= self.expires_at {
            None
        } else {
            Some(self.expires_at - now)
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("subject", &self.subject)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
