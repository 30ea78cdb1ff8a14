//! # REST Playlist Provider
//!
//! Implements `RemotePlaylistService` for a JSON playlist API.
//!
//! ## Overview
//!
//! This module provides:
//! - Route mapping for list, fetch, create, rename, details update, delete and track edits
//! - Bearer authentication, `Idempotency-Key` and `If-Match` headers
//! - Status classification into the remote error taxonomy
//! - Exponential backoff for reads on rate limiting and server errors
//!
//! ## Routes
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `fetch_playlists` | `GET {base}/playlists` |
//! | `fetch_playlist` | `GET {base}/playlists/{id}` |
//! | `create_playlist` | `POST {base}/playlists` |
//! | `rename_playlist` | `PATCH {base}/playlists/{id}` |
//! | `update_playlist_details` | `PUT {base}/playlists/{id}` |
//! | `delete_playlist` | `DELETE {base}/playlists/{id}` |
//! | `add_track` | `POST {base}/playlists/{id}/tracks` |
//! | `add_tracks` | `POST {base}/playlists/{id}/tracks/batch` |
//! | `remove_track` | `DELETE {base}/playlists/{id}/tracks/{position}?trackId=` |
//! | `reorder_track` | `POST {base}/playlists/{id}/reorder` |

pub mod error;
pub mod service;
pub mod types;

pub use error::{RestProviderError, Result};
pub use service::RestPlaylistService;
