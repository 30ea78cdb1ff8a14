//! # Event Bus System
//!
//! Typed, broadcast-based notifications about what the synchronization core
//! is doing, built on `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The per-playlist state publisher tells a UI *what* a playlist looks like.
//! The event bus tells observers *what happened*: a command started, was
//! committed, was rolled back, hit a conflict. Hosts use it for toasts,
//! analytics and diagnostics.
//!
//! ```text
//! ┌───────────────────┐    emit     ┌──────────┐   subscribe   ┌────────────┐
//! │ PlaylistRepository├────────────>│          ├──────────────>│ Subscriber │
//! └───────────────────┘             │ EventBus │               └────────────┘
//! ┌───────────────────┐    emit     │          │   subscribe   ┌────────────┐
//! │ CredentialCache   ├────────────>│          ├──────────────>│ Subscriber │
//! └───────────────────┘             └──────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaylistEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(64);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playlist(PlaylistEvent::Committed {
//!     playlist_id: "p1".to_string(),
//!     command: "rename".to_string(),
//!     revision: 6,
//! }))
//! .ok();
//!
//! if let Ok(event) = stream.recv().await {
//!     assert_eq!(event.description(), "Playlist change committed");
//! }
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n` events.
//!   Non-fatal; keep receiving.
//! - **`RecvError::Closed`**: every sender was dropped. Treat as shutdown.
//!
//! Emitting with no subscribers returns an error that producers ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Credential lifecycle events
    Auth(AuthEvent),
    /// Playlist command lifecycle events
    Playlist(PlaylistEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Playlist(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::CredentialRejected { .. }) => EventSeverity::Error,
            CoreEvent::Playlist(PlaylistEvent::RolledBack { .. }) => EventSeverity::Warning,
            CoreEvent::Playlist(PlaylistEvent::ConflictDetected { .. }) => EventSeverity::Warning,
            CoreEvent::Playlist(PlaylistEvent::Committed { .. }) => EventSeverity::Info,
            CoreEvent::Playlist(PlaylistEvent::Refreshed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events related to the credential used for remote calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// A fresh credential was obtained from the provider.
    CredentialRefreshed {
        /// Account the credential was issued for.
        subject: String,
        /// Expiry as Unix epoch seconds.
        expires_at: i64,
    },
    /// No usable credential could be obtained, or the remote rejected it.
    CredentialRejected {
        /// Human-readable reason.
        message: String,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::CredentialRefreshed { .. } => "Credential refreshed",
            AuthEvent::CredentialRejected { .. } => "Credential rejected",
        }
    }
}

// ============================================================================
// Playlist Events
// ============================================================================

/// Events describing the lifecycle of playlist commands.
///
/// `command` is the lowercase command name (`create`, `rename`, `delete`,
/// `add_track`, `remove_track`, `reorder`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaylistEvent {
    /// The optimistic change was applied locally and the remote call is about
    /// to be dispatched.
    CommandStarted {
        playlist_id: String,
        command: String,
    },
    /// The remote accepted the change; the local view now mirrors the server.
    Committed {
        playlist_id: String,
        command: String,
        /// Server revision after the change.
        revision: u64,
    },
    /// The remote call failed and the pre-command state was restored.
    RolledBack {
        playlist_id: String,
        command: String,
        /// Classified failure reason.
        reason: String,
    },
    /// The server held a newer revision than the one the change was based on.
    ConflictDetected {
        playlist_id: String,
        command: String,
        expected_revision: u64,
        current_revision: Option<u64>,
    },
    /// The playlist no longer exists server-side and was dropped locally.
    Evicted { playlist_id: String },
    /// A bulk refresh replaced the local view of the playlist collection.
    Refreshed {
        /// Number of playlists reported by the server.
        playlist_count: usize,
        /// Playlists skipped because a command was in flight for them.
        skipped_pending: usize,
    },
}

impl PlaylistEvent {
    fn description(&self) -> &str {
        match self {
            PlaylistEvent::CommandStarted { .. } => "Playlist command started",
            PlaylistEvent::Committed { .. } => "Playlist change committed",
            PlaylistEvent::RolledBack { .. } => "Playlist change rolled back",
            PlaylistEvent::ConflictDetected { .. } => "Playlist revision conflict",
            PlaylistEvent::Evicted { .. } => "Playlist removed remotely",
            PlaylistEvent::Refreshed { .. } => "Playlists refreshed",
        }
    }

    /// Identifier of the playlist the event concerns, if any.
    pub fn playlist_id(&self) -> Option<&str> {
        match self {
            PlaylistEvent::CommandStarted { playlist_id, .. }
            | PlaylistEvent::Committed { playlist_id, .. }
            | PlaylistEvent::RolledBack { playlist_id, .. }
            | PlaylistEvent::ConflictDetected { playlist_id, .. }
            | PlaylistEvent::Evicted { playlist_id } => Some(playlist_id),
            PlaylistEvent::Refreshed { .. } => None,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for core events.
///
/// Cloning is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus.
    ///
    /// `capacity` is the number of events buffered per subscriber before it
    /// starts receiving `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates an independent receiver for all future events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream, PlaylistEvent};
///
/// let bus = EventBus::new(16);
/// let rollbacks = EventStream::new(bus.subscribe()).filter(|event| {
///     matches!(event, CoreEvent::Playlist(PlaylistEvent::RolledBack { .. }))
/// });
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Receives without waiting; `None` when nothing matching is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.matches(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
