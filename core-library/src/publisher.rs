//! Reactive playlist state
//!
//! One `tokio::sync::watch` channel per playlist id plus one for the summary
//! index. Watch channels hold only the latest value, so a slow observer
//! never sees a backlog: it wakes up and reads whatever is current.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::cache::sort_for_display;
use crate::error::{LibraryError, Result};
use crate::models::{Playlist, PlaylistId, PlaylistSummary};

/// Publishes playlist snapshots to observers.
///
/// Cloning yields a handle to the same channels. `publish` and
/// `publish_removed` are the only operations that change observable state.
#[derive(Clone, Default)]
pub struct PlaylistStatePublisher {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    index: watch::Sender<Vec<PlaylistSummary>>,
}

impl Default for Inner {
    fn default() -> Self {
        let (index, _) = watch::channel(Vec::new());
        Self {
            state: Mutex::new(State::default()),
            index,
        }
    }
}

#[derive(Default)]
struct State {
    channels: HashMap<PlaylistId, watch::Sender<Option<Playlist>>>,
    summaries: HashMap<PlaylistId, PlaylistSummary>,
}

impl PlaylistStatePublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // State holds plain maps, so a panic elsewhere cannot leave it torn.
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the observable value for `playlist.id`.
    pub fn publish(&self, playlist: &Playlist) {
        let mut state = self.state();
        trace!(playlist_id = %playlist.id, revision = %playlist.revision, "publish");

        match state.channels.get(&playlist.id) {
            Some(sender) => {
                sender.send_replace(Some(playlist.clone()));
            }
            None => {
                let (sender, _) = watch::channel(Some(playlist.clone()));
                state.channels.insert(playlist.id.clone(), sender);
            }
        }

        state
            .summaries
            .insert(playlist.id.clone(), playlist.summary());
        self.publish_index(&state);
    }

    /// Tell observers the playlist no longer exists.
    pub fn publish_removed(&self, id: &PlaylistId) {
        let mut state = self.state();
        trace!(playlist_id = %id, "publish removal");

        if let Some(sender) = state.channels.get(id) {
            sender.send_replace(None);
            if sender.receiver_count() == 0 {
                state.channels.remove(id);
            }
        }

        if state.summaries.remove(id).is_some() {
            self.publish_index(&state);
        }
    }

    fn publish_index(&self, state: &State) {
        let mut summaries: Vec<PlaylistSummary> = state.summaries.values().cloned().collect();
        sort_for_display(&mut summaries, |s| (s.is_favorites, &s.name, &s.id));
        self.inner.index.send_replace(summaries);
    }

    /// Last published value for `id`.
    pub fn current(&self, id: &PlaylistId) -> Option<Playlist> {
        self.state()
            .channels
            .get(id)
            .and_then(|sender| sender.borrow().clone())
    }

    /// Observe one playlist. The subscription starts at the latest value
    /// (`None` if nothing was published yet or the playlist was removed).
    pub fn subscribe(&self, id: &PlaylistId) -> PlaylistSubscription {
        let mut state = self.state();
        let sender = state
            .channels
            .entry(id.clone())
            .or_insert_with(|| watch::channel(None).0);

        debug!(playlist_id = %id, "subscribed");
        PlaylistSubscription {
            id: id.clone(),
            receiver: Some(sender.subscribe()),
        }
    }

    /// Observe the summary index used by list views.
    pub fn subscribe_index(&self) -> watch::Receiver<Vec<PlaylistSummary>> {
        self.inner.index.subscribe()
    }

    pub fn subscriber_count(&self, id: &PlaylistId) -> usize {
        self.state()
            .channels
            .get(id)
            .map_or(0, |sender| sender.receiver_count())
    }
}

impl std::fmt::Debug for PlaylistStatePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("PlaylistStatePublisher")
            .field("channels", &state.channels.len())
            .field("playlists", &state.summaries.len())
            .finish()
    }
}

/// Handle on one playlist's observable state.
#[derive(Debug)]
pub struct PlaylistSubscription {
    id: PlaylistId,
    receiver: Option<watch::Receiver<Option<Playlist>>>,
}

impl PlaylistSubscription {
    pub fn playlist_id(&self) -> &PlaylistId {
        &self.id
    }

    /// Latest value without waiting. `None` after unsubscribing.
    pub fn current(&self) -> Option<Playlist> {
        self.receiver
            .as_ref()
            .and_then(|receiver| receiver.borrow().clone())
    }

    /// Wait until a value newer than the last one seen is published and
    /// return it.
    ///
    /// # Errors
    ///
    /// [`LibraryError::SubscriptionClosed`] after [`unsubscribe`](Self::unsubscribe)
    /// or once the publisher is dropped.
    pub async fn changed(&mut self) -> Result<Option<Playlist>> {
        let receiver = self
            .receiver
            .as_mut()
            .ok_or(LibraryError::SubscriptionClosed)?;

        receiver
            .changed()
            .await
            .map_err(|_| LibraryError::SubscriptionClosed)?;
        Ok(receiver.borrow_and_update().clone())
    }

    /// Stop observing. Calling it again has no effect.
    pub fn unsubscribe(&mut self) {
        if self.receiver.take().is_some() {
            debug!(playlist_id = %self.id, "unsubscribed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn playlist(id: &str, revision: u64) -> Playlist {
        Playlist::new(PlaylistId::new(id), format!("List {}", id), "u1")
            .with_tracks(["t1", "t2"])
            .with_revision(revision)
    }

    #[tokio::test]
    async fn test_subscriber_sees_latest_value() {
        let publisher = PlaylistStatePublisher::new();
        publisher.publish(&playlist("p1", 1));

        let mut subscription = publisher.subscribe(&PlaylistId::new("p1"));
        assert_eq!(subscription.current().unwrap().revision.value(), 1);

        publisher.publish(&playlist("p1", 2));
        let next = subscription.changed().await.unwrap().unwrap();
        assert_eq!(next.revision.value(), 2);
    }

    #[tokio::test]
    async fn test_replace_on_write_drops_intermediate_values() {
        let publisher = PlaylistStatePublisher::new();
        let id = PlaylistId::new("p1");
        let mut subscription = publisher.subscribe(&id);
        assert!(subscription.current().is_none());

        for revision in 1..=5 {
            publisher.publish(&playlist("p1", revision));
        }

        let seen = subscription.changed().await.unwrap().unwrap();
        assert_eq!(seen.revision.value(), 5);

        let pending = tokio::time::timeout(Duration::from_millis(20), subscription.changed()).await;
        assert!(pending.is_err(), "no backlog expected");
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let publisher = PlaylistStatePublisher::new();
        let id = PlaylistId::new("p1");
        publisher.publish(&playlist("p1", 1));

        let mut subscription = publisher.subscribe(&id);
        assert_eq!(publisher.subscriber_count(&id), 1);

        subscription.unsubscribe();
        subscription.unsubscribe();

        assert!(!subscription.is_active());
        assert!(subscription.current().is_none());
        assert_eq!(publisher.subscriber_count(&id), 0);
        assert_eq!(
            subscription.changed().await.unwrap_err(),
            LibraryError::SubscriptionClosed
        );
    }

    #[tokio::test]
    async fn test_removal_is_published_as_none() {
        let publisher = PlaylistStatePublisher::new();
        let id = PlaylistId::new("p1");
        publisher.publish(&playlist("p1", 1));
        let mut subscription = publisher.subscribe(&id);

        publisher.publish_removed(&id);

        assert_eq!(subscription.changed().await.unwrap(), None);
        assert!(publisher.current(&id).is_none());
    }

    #[test]
    fn test_index_tracks_publishes_and_removals() {
        let publisher = PlaylistStatePublisher::new();
        let index = publisher.subscribe_index();

        publisher.publish(&playlist("p2", 1));
        publisher.publish(&playlist("p1", 1).as_favorites());
        let ids: Vec<String> = index.borrow().iter().map(|s| s.id.to_string()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);

        publisher.publish_removed(&PlaylistId::new("p2"));
        assert_eq!(index.borrow().len(), 1);
    }

    #[test]
    fn test_removed_channel_without_subscribers_is_dropped() {
        let publisher = PlaylistStatePublisher::new();
        let id = PlaylistId::new("p1");
        publisher.publish(&playlist("p1", 1));
        publisher.publish_removed(&id);

        assert_eq!(publisher.subscriber_count(&id), 0);
        assert!(publisher.current(&id).is_none());
        assert!(format!("{:?}", publisher).contains("channels: 0"));
    }
}
