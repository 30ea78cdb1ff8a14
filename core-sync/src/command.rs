//! Playlist commands and their per-call options

use core_library::{NewPlaylist, Playlist, PlaylistId, TrackId};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::remote::IdempotencyToken;

/// A user intent against one playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PlaylistCommand {
    Create(NewPlaylist),
    Rename {
        id: PlaylistId,
        name: String,
    },
    /// Replace name and description together. `None` clears the description.
    UpdateDetails {
        id: PlaylistId,
        name: String,
        description: Option<String>,
    },
    Delete {
        id: PlaylistId,
    },
    AddTrack {
        id: PlaylistId,
        track_id: TrackId,
        /// Insert position; `None` appends.
        position: Option<usize>,
    },
    /// Add several tracks in one remote call, keeping their order.
    AddTracks {
        id: PlaylistId,
        track_ids: Vec<TrackId>,
        /// Insert position of the first track; `None` appends.
        position: Option<usize>,
    },
    RemoveTrack {
        id: PlaylistId,
        track_id: TrackId,
    },
    Reorder {
        id: PlaylistId,
        from: usize,
        to: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Create,
    Rename,
    UpdateDetails,
    Delete,
    AddTrack,
    AddTracks,
    RemoveTrack,
    Reorder,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Create => "create",
            CommandKind::Rename => "rename",
            CommandKind::UpdateDetails => "update_details",
            CommandKind::Delete => "delete",
            CommandKind::AddTrack => "add_track",
            CommandKind::AddTracks => "add_tracks",
            CommandKind::RemoveTrack => "remove_track",
            CommandKind::Reorder => "reorder",
        }
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PlaylistCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            PlaylistCommand::Create(_) => CommandKind::Create,
            PlaylistCommand::Rename { .. } => CommandKind::Rename,
            PlaylistCommand::UpdateDetails { .. } => CommandKind::UpdateDetails,
            PlaylistCommand::Delete { .. } => CommandKind::Delete,
            PlaylistCommand::AddTrack { .. } => CommandKind::AddTrack,
            PlaylistCommand::AddTracks { .. } => CommandKind::AddTracks,
            PlaylistCommand::RemoveTrack { .. } => CommandKind::RemoveTrack,
            PlaylistCommand::Reorder { .. } => CommandKind::Reorder,
        }
    }

    /// Existing playlist the command targets. `None` for create.
    pub fn target(&self) -> Option<&PlaylistId> {
        match self {
            PlaylistCommand::Create(_) => None,
            PlaylistCommand::Rename { id, .. }
            | PlaylistCommand::UpdateDetails { id, .. }
            | PlaylistCommand::Delete { id }
            | PlaylistCommand::AddTrack { id, .. }
            | PlaylistCommand::AddTracks { id, .. }
            | PlaylistCommand::RemoveTrack { id, .. }
            | PlaylistCommand::Reorder { id, .. } => Some(id),
        }
    }

    pub(crate) fn into_route(self) -> Route {
        let (id, edit) = match self {
            PlaylistCommand::Create(request) => return Route::Create(request),
            PlaylistCommand::Rename { id, name } => (id, Edit::Rename { name }),
            PlaylistCommand::UpdateDetails {
                id,
                name,
                description,
            } => (id, Edit::UpdateDetails { name, description }),
            PlaylistCommand::Delete { id } => (id, Edit::Delete),
            PlaylistCommand::AddTrack {
                id,
                track_id,
                position,
            } => (id, Edit::AddTrack { track_id, position }),
            PlaylistCommand::AddTracks {
                id,
                track_ids,
                position,
            } => (
                id,
                Edit::AddTracks {
                    track_ids,
                    position,
                },
            ),
            PlaylistCommand::RemoveTrack { id, track_id } => (id, Edit::RemoveTrack { track_id }),
            PlaylistCommand::Reorder { id, from, to } => (id, Edit::Reorder { from, to }),
        };
        Route::Existing { id, edit }
    }
}

/// A command split by whether it targets an existing playlist.
pub(crate) enum Route {
    Create(NewPlaylist),
    Existing { id: PlaylistId, edit: Edit },
}

/// Change to an existing playlist, before it is checked against the cache.
#[derive(Debug, Clone)]
pub(crate) enum Edit {
    Rename {
        name: String,
    },
    UpdateDetails {
        name: String,
        description: Option<String>,
    },
    Delete,
    AddTrack {
        track_id: TrackId,
        position: Option<usize>,
    },
    AddTracks {
        track_ids: Vec<TrackId>,
        position: Option<usize>,
    },
    RemoveTrack {
        track_id: TrackId,
    },
    Reorder {
        from: usize,
        to: usize,
    },
}

/// Remote call for an existing playlist with every argument resolved
/// against the pre-image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RemoteCall {
    Rename {
        name: String,
    },
    UpdateDetails {
        name: String,
        description: Option<String>,
    },
    Delete,
    AddTrack {
        track_id: TrackId,
        position: Option<usize>,
    },
    AddTracks {
        track_ids: Vec<TrackId>,
        position: Option<usize>,
    },
    RemoveTrack {
        track_id: TrackId,
        position: usize,
    },
    Reorder {
        from: usize,
        to: usize,
    },
}

/// Optimistic local value and the remote call that should confirm it.
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    /// `None` for delete, whose optimistic effect is removal.
    pub optimistic: Option<Playlist>,
    pub call: RemoteCall,
}

impl Edit {
    /// Check the edit against `current` and compute its local effect.
    pub(crate) fn plan(&self, current: &Playlist) -> core_library::Result<Plan> {
        let plan = match self {
            Edit::Rename { name } => {
                let next = current.renamed(name)?;
                Plan {
                    call: RemoteCall::Rename {
                        name: next.name.clone(),
                    },
                    optimistic: Some(next),
                }
            }
            Edit::UpdateDetails { name, description } => {
                let next = current.with_details(name, description.as_deref())?;
                Plan {
                    call: RemoteCall::UpdateDetails {
                        name: next.name.clone(),
                        description: next.description.clone(),
                    },
                    optimistic: Some(next),
                }
            }
            Edit::Delete => Plan {
                optimistic: None,
                call: RemoteCall::Delete,
            },
            Edit::AddTrack { track_id, position } => Plan {
                optimistic: Some(current.with_track_added(track_id, *position)?),
                call: RemoteCall::AddTrack {
                    track_id: track_id.clone(),
                    position: *position,
                },
            },
            Edit::AddTracks {
                track_ids,
                position,
            } => Plan {
                optimistic: Some(current.with_tracks_added(track_ids, *position)?),
                call: RemoteCall::AddTracks {
                    track_ids: track_ids.clone(),
                    position: *position,
                },
            },
            Edit::RemoveTrack { track_id } => {
                let (position, next) = current.track_removal(track_id)?;
                Plan {
                    optimistic: Some(next),
                    call: RemoteCall::RemoveTrack {
                        track_id: track_id.clone(),
                        position,
                    },
                }
            }
            Edit::Reorder { from, to } => Plan {
                optimistic: Some(current.with_track_moved(*from, *to)?),
                call: RemoteCall::Reorder {
                    from: *from,
                    to: *to,
                },
            },
        };
        Ok(plan)
    }
}

/// Per-call options.
///
/// Reusing the same [`IdempotencyToken`] when retrying a failed command lets
/// the server drop duplicates.
#[derive(Debug, Clone, Default)]
pub struct CommandOptions {
    pub idempotency_token: IdempotencyToken,
    /// Overrides the repository's default remote timeout.
    pub timeout: Option<Duration>,
    /// Honoured up to the moment the remote call is dispatched.
    pub cancellation: Option<CancellationToken>,
}

impl CommandOptions {
    pub fn new(idempotency_token: IdempotencyToken) -> Self {
        Self {
            idempotency_token,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

/// A command whose optimistic effect is visible locally and whose remote
/// call has not settled yet.
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub command: PlaylistCommand,
    /// Cache entry before the optimistic change. `None` for create.
    pub pre_image: Option<Playlist>,
    pub token: IdempotencyToken,
}

/// Settled result of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Authoritative playlist returned by the server.
    Playlist(Playlist),
    Deleted(PlaylistId),
}

impl CommandOutcome {
    pub fn playlist(&self) -> Option<&Playlist> {
        match self {
            CommandOutcome::Playlist(playlist) => Some(playlist),
            CommandOutcome::Deleted(_) => None,
        }
    }

    pub fn into_playlist(self) -> Option<Playlist> {
        match self {
            CommandOutcome::Playlist(playlist) => Some(playlist),
            CommandOutcome::Deleted(_) => None,
        }
    }
}
