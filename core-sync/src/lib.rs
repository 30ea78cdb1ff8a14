//! # Playlist Sync Module
//!
//! Optimistic playlist mutations reconciled against a remote playlist store.
//!
//! ## Overview
//!
//! This module manages:
//! - Applying playlist commands locally before the server confirms them
//! - Restoring the pre-command state when the remote call fails
//! - Re-fetching the authoritative playlist on revision conflicts
//! - Rejecting concurrent commands for the same playlist with `Busy`
//! - Carrying idempotency tokens so retried commands apply once remotely
//!
//! ## Components
//!
//! - **Commands** (`command`): Command payloads, per-call options and outcomes
//! - **Mutation Locks** (`lock`): One in-flight command per playlist
//! - **Remote Contract** (`remote`): The `RemotePlaylistService` boundary
//! - **Repository** (`repository`): Orchestrates cache, publisher, credentials
//!   and remote calls

pub mod command;
pub mod error;
pub mod lock;
pub mod remote;
pub mod repository;

pub use command::{CommandKind, CommandOptions, CommandOutcome, PendingOperation, PlaylistCommand};
pub use error::{ErrorKind, Result, SyncError};
pub use lock::{MutationLease, MutationLocks};
pub use remote::{
    IdempotencyToken, RemoteCallContext, RemoteError, RemotePlaylistService, RemoteResult,
};
pub use repository::{PlaylistRepository, RepositoryConfig};
