//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the playlist synchronization core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its logging conventions,
//! its validated [`CoreConfig`](config::CoreConfig) and the broadcast
//! [`EventBus`](events::EventBus) used to report command outcomes.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
