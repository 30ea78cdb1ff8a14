//! In-memory playlist cache
//!
//! The local authoritative view of playlists. Pure data structure: no I/O,
//! no interior locking. Callers that share it across tasks wrap it in a mutex
//! and are responsible for ordering.

use std::collections::HashMap;
use tracing::trace;

use crate::error::{LibraryError, Result};
use crate::models::{Playlist, PlaylistId};

#[derive(Debug, Default, Clone)]
pub struct PlaylistCache {
    entries: HashMap<PlaylistId, Playlist>,
}

impl PlaylistCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &PlaylistId) -> Option<Playlist> {
        self.entries.get(id).cloned()
    }

    pub fn contains(&self, id: &PlaylistId) -> bool {
        self.entries.contains_key(id)
    }

    /// Insert or replace the entry keyed by `playlist.id`, returning the
    /// previous value. The revision is taken as given.
    pub fn put(&mut self, playlist: Playlist) -> Option<Playlist> {
        trace!(playlist_id = %playlist.id, revision = %playlist.revision, "cache put");
        self.entries.insert(playlist.id.clone(), playlist)
    }

    /// Apply `transform` to the entry and store its result.
    ///
    /// When the transform fails the entry is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`LibraryError::NotFound`] if no entry exists for `id`
    /// - Whatever the transform returns
    /// - [`LibraryError::InvalidInput`] if the transform changed the identifier
    pub fn mutate<F>(&mut self, id: &PlaylistId, transform: F) -> Result<Playlist>
    where
        F: FnOnce(&Playlist) -> Result<Playlist>,
    {
        let current = self
            .entries
            .get(id)
            .ok_or_else(|| LibraryError::NotFound { id: id.to_string() })?;

        let next = transform(current)?;
        if &next.id != id {
            return Err(LibraryError::invalid(
                "id",
                format!("transform changed playlist id from {} to {}", id, next.id),
            ));
        }

        trace!(playlist_id = %id, "cache mutate");
        self.entries.insert(id.clone(), next.clone());
        Ok(next)
    }

    /// Immutable copy of the entry, used as a rollback pre-image.
    pub fn snapshot(&self, id: &PlaylistId) -> Result<Playlist> {
        self.get(id)
            .ok_or_else(|| LibraryError::NotFound { id: id.to_string() })
    }

    pub fn remove(&mut self, id: &PlaylistId) -> Option<Playlist> {
        trace!(playlist_id = %id, "cache remove");
        self.entries.remove(id)
    }

    pub fn ids(&self) -> Vec<PlaylistId> {
        self.entries.keys().cloned().collect()
    }

    /// All playlists, favorites first, then by case-insensitive name.
    pub fn list(&self) -> Vec<Playlist> {
        let mut playlists: Vec<Playlist> = self.entries.values().cloned().collect();
        sort_for_display(&mut playlists, |p| (p.is_favorites, &p.name, &p.id));
        playlists
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Shared ordering for playlist lists: favorites first, then name, then id.
pub(crate) fn sort_for_display<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (bool, &String, &PlaylistId),
{
    items.sort_by(|a, b| {
        let (a_fav, a_name, a_id) = key(a);
        let (b_fav, b_name, b_id) = key(b);
        b_fav
            .cmp(&a_fav)
            .then_with(|| a_name.to_lowercase().cmp(&b_name.to_lowercase()))
            .then_with(|| a_id.cmp(b_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrackId;

    fn playlist(id: &str, name: &str) -> Playlist {
        Playlist::new(PlaylistId::new(id), name, "u1")
            .with_tracks(["t1", "t2", "t3"])
            .with_revision(5)
    }

    #[test]
    fn test_put_get_replace() {
        let mut cache = PlaylistCache::new();
        assert!(cache.put(playlist("p1", "A")).is_none());

        let replaced = cache.put(playlist("p1", "B")).unwrap();
        assert_eq!(replaced.name, "A");
        assert_eq!(cache.get(&PlaylistId::new("p1")).unwrap().name, "B");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_mutate_applies_transform() {
        let mut cache = PlaylistCache::new();
        cache.put(playlist("p1", "A"));
        let id = PlaylistId::new("p1");

        let next = cache
            .mutate(&id, |p| p.without_track(&TrackId::new("t2")))
            .unwrap();

        assert_eq!(next.track_count(), 2);
        assert_eq!(cache.get(&id).unwrap(), next);
    }

    #[test]
    fn test_failed_transform_leaves_entry() {
        let mut cache = PlaylistCache::new();
        cache.put(playlist("p1", "A"));
        let id = PlaylistId::new("p1");
        let before = cache.snapshot(&id).unwrap();

        let err = cache.mutate(&id, |p| p.with_track_moved(0, 9)).unwrap_err();

        assert!(matches!(err, LibraryError::IndexOutOfRange { .. }));
        assert_eq!(cache.get(&id).unwrap(), before);
    }

    #[test]
    fn test_mutate_rejects_id_change() {
        let mut cache = PlaylistCache::new();
        cache.put(playlist("p1", "A"));
        let id = PlaylistId::new("p1");

        let err = cache
            .mutate(&id, |p| {
                let mut other = p.clone();
                other.id = PlaylistId::new("p2");
                Ok(other)
            })
            .unwrap_err();

        assert!(matches!(err, LibraryError::InvalidInput { .. }));
        assert!(!cache.contains(&PlaylistId::new("p2")));
    }

    #[test]
    fn test_missing_entries() {
        let mut cache = PlaylistCache::new();
        let id = PlaylistId::new("nope");

        assert!(matches!(
            cache.snapshot(&id),
            Err(LibraryError::NotFound { .. })
        ));
        assert!(matches!(
            cache.mutate(&id, |p| Ok(p.clone())),
            Err(LibraryError::NotFound { .. })
        ));
        assert!(cache.remove(&id).is_none());
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let mut cache = PlaylistCache::new();
        cache.put(playlist("p1", "A"));
        let id = PlaylistId::new("p1");

        let snapshot = cache.snapshot(&id).unwrap();
        cache.mutate(&id, |p| p.renamed("Z")).unwrap();

        assert_eq!(snapshot.name, "A");
        assert_eq!(cache.get(&id).unwrap().name, "Z");
    }

    #[test]
    fn test_list_puts_favorites_first() {
        let mut cache = PlaylistCache::new();
        cache.put(playlist("p1", "zeta"));
        cache.put(playlist("p2", "Alpha"));
        cache.put(playlist("fav", "Favorites").as_favorites());

        let names: Vec<String> = cache.list().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Favorites", "Alpha", "zeta"]);

        cache.clear();
        assert!(cache.is_empty());
    }
}
