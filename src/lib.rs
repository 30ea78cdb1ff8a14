//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (e.g., `core-service`, `provider-rest`). Host applications
//! can depend on `playlist-sync-workspace` and enable the documented features
//! without needing to wire each crate individually.

pub use core_service::*;
