//! Per-playlist mutation exclusion
//!
//! At most one command may be in flight per playlist. A second command on
//! the same id is rejected rather than queued.
//!
//! The table also stamps every acquisition with a generation number so that
//! a bulk refresh can tell which playlists were written while its fetch was
//! in flight.

use core_library::PlaylistId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

#[derive(Debug, Default)]
struct LockTable {
    held: HashSet<PlaylistId>,
    generation: u64,
    /// Generation of the latest acquisition or touch per id.
    stamped: HashMap<PlaylistId, u64>,
}

impl LockTable {
    fn stamp(&mut self, id: &PlaylistId) {
        self.generation += 1;
        self.stamped.insert(id.clone(), self.generation);
    }
}

#[derive(Debug, Clone, Default)]
pub struct MutationLocks {
    table: Arc<Mutex<LockTable>>,
}

impl MutationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the lock for `id`, or `None` if a command already holds it.
    pub fn try_acquire(&self, id: &PlaylistId) -> Option<MutationLease> {
        let mut table = self.table();
        if !table.held.insert(id.clone()) {
            return None;
        }
        table.stamp(id);
        trace!(playlist_id = %id, generation = table.generation, "mutation lock acquired");
        Some(MutationLease {
            id: id.clone(),
            table: Arc::clone(&self.table),
        })
    }

    /// Record a write to `id` made without holding its lock, e.g. the
    /// server playlist adopted by a create.
    pub fn touch(&self, id: &PlaylistId) {
        self.table().stamp(id);
    }

    pub fn is_held(&self, id: &PlaylistId) -> bool {
        self.table().held.contains(id)
    }

    pub fn held_ids(&self) -> HashSet<PlaylistId> {
        self.table().held.clone()
    }

    /// Current generation. Pair with [`busy_since`](Self::busy_since).
    pub fn generation(&self) -> u64 {
        self.table().generation
    }

    /// Ids that are held now or were acquired or touched after `generation`.
    pub fn busy_since(&self, generation: u64) -> HashSet<PlaylistId> {
        let table = self.table();
        let mut busy = table.held.clone();
        busy.extend(
            table
                .stamped
                .iter()
                .filter(|(_, stamp)| **stamp > generation)
                .map(|(id, _)| id.clone()),
        );
        busy
    }
}

/// Releases the playlist's lock when dropped, including on early return
/// and when the owning future is dropped.
#[derive(Debug)]
pub struct MutationLease {
    id: PlaylistId,
    table: Arc<Mutex<LockTable>>,
}

impl MutationLease {
    pub fn playlist_id(&self) -> &PlaylistId {
        &self.id
    }
}

impl Drop for MutationLease {
    fn drop(&mut self) {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .held
            .remove(&self.id);
        trace!(playlist_id = %self.id, "mutation lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_rejected() {
        let locks = MutationLocks::new();
        let id = PlaylistId::new("p1");

        let lease = locks.try_acquire(&id).unwrap();
        assert!(locks.try_acquire(&id).is_none());
        assert!(locks.is_held(&id));

        // Other playlists are independent.
        assert!(locks.try_acquire(&PlaylistId::new("p2")).is_some());

        drop(lease);
        assert!(!locks.is_held(&id));
        assert!(locks.try_acquire(&id).is_some());
    }

    #[test]
    fn test_clones_share_state() {
        let locks = MutationLocks::new();
        let other = locks.clone();
        let _lease = locks.try_acquire(&PlaylistId::new("p1")).unwrap();

        assert!(other.try_acquire(&PlaylistId::new("p1")).is_none());
        assert_eq!(other.held_ids().len(), 1);
    }

    #[test]
    fn test_busy_since_reports_released_and_touched_ids() {
        let locks = MutationLocks::new();
        let early = PlaylistId::new("early");
        drop(locks.try_acquire(&early).unwrap());

        let start = locks.generation();
        assert!(locks.busy_since(start).is_empty());

        let held = PlaylistId::new("held");
        let released = PlaylistId::new("released");
        let touched = PlaylistId::new("touched");
        let _lease = locks.try_acquire(&held).unwrap();
        drop(locks.try_acquire(&released).unwrap());
        locks.touch(&touched);

        let busy = locks.busy_since(start);
        assert_eq!(busy.len(), 3);
        assert!(busy.contains(&held));
        assert!(busy.contains(&released));
        assert!(busy.contains(&touched));
        assert!(!busy.contains(&early));
    }
}
