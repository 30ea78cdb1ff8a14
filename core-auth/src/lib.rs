//! # Authentication Module
//!
//! Credential contracts for authenticated playlist calls.
//!
//! ## Overview
//!
//! Sign-in and token refresh live outside the core. The host exposes them
//! through [`CredentialProvider`], and the core only ever asks for "a valid
//! credential right now". [`CredentialCache`] sits in front of a provider so
//! the same credential is reused until it enters the refresh buffer.
//!
//! ## Features
//!
//! - Bearer credentials with expiry and redacted `Debug`
//! - Single-flight credential refresh shared by concurrent commands
//! - Rejection of credentials that are already past expiry
//! - Invalidation after the remote rejects a credential
//! - Auth events on the core event bus

pub mod cache;
pub mod error;
pub mod provider;
pub mod types;

pub use cache::CredentialCache;
pub use error::{AuthError, Result};
pub use provider::{CredentialProvider, StaticCredentialProvider};
pub use types::Credential;
