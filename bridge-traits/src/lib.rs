//! # Host Bridge Traits
//!
//! Capabilities the playlist core needs from its host but does not implement itself.
//!
//! ## Overview
//!
//! The synchronization core never opens sockets, reads the wall clock directly or
//! writes to a platform log. Each of those concerns is expressed here as a trait and
//! injected by the host application (or by a test double).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP execution used by REST playlist providers
//! - [`Clock`](time::Clock) - Time source, replaceable for deterministic tests
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations should
//! convert platform-specific failures into it and keep messages actionable.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared across
//! async tasks behind an `Arc`.
//!
//! ## Example
//!
//! ```ignore
//! use async_trait::async_trait;
//! use bridge_traits::error::Result;
//! use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
//!
//! pub struct MyHttpClient {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl HttpClient for MyHttpClient {
//!     async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
//!         // Translate request, send, and collect the response body
//!         todo!()
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
