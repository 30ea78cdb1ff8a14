//! # Playlist Library Module
//!
//! Local, in-memory view of the user's playlists and the reactive surface
//! that exposes it to UI layers.
//!
//! ## Overview
//!
//! This module manages:
//! - Playlist domain models with track order and server revisions
//! - [`PlaylistCache`], the authoritative local copy keyed by playlist id
//! - [`PlaylistStatePublisher`], replace-on-write channels per playlist plus
//!   a summary index for list views
//!
//! Neither the cache nor the publisher perform I/O or locking of their own
//! beyond what keeps them memory-safe; ordering and rollback are the job of
//! the synchronization layer in `core-sync`.

pub mod cache;
pub mod error;
pub mod models;
pub mod publisher;

pub use cache::PlaylistCache;
pub use error::{LibraryError, Result};
pub use models::{NewPlaylist, Playlist, PlaylistId, PlaylistSummary, Revision, TrackId, TrackRef};
pub use publisher::{PlaylistStatePublisher, PlaylistSubscription};
