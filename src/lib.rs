//! # bearer-session
//!
//! HTTP client layer that keeps a short-lived bearer access token valid for
//! every outgoing request and refreshes it transparently when the server
//! answers `401 Unauthorized`.
//!
//! ## Overview
//!
//! - **Interceptor pipeline**: [`SessionClient`] attaches
//!   `Authorization: Bearer <access_token>` to each request. When a response
//!   comes back 401, the request is marked as retried, a new access token is
//!   obtained, and the request is replayed once.
//! - **Single-flight refresh**: the [`RefreshCoordinator`] lets only one
//!   refresh exchange run at a time. Requests that fail while it runs wait in
//!   a queue and receive the same new token, or the same error.
//! - **Pluggable storage**: credentials live behind the
//!   [`CredentialStore`](auth::CredentialStore) trait, with in-memory and
//!   on-disk implementations.
//! - **Session invalidation**: when the refresh token is missing or rejected,
//!   both tokens are cleared and the configured
//!   [`LoginRedirect`](callbacks::LoginRedirect) is invoked.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bearer_session::{ClientConfig, SessionClient};
//! use bearer_session::auth::FileStore;
//! use bearer_session::callbacks::FnLoginRedirect;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = SessionClient::builder()
//!         .config(ClientConfig::from_env())
//!         .store(Arc::new(FileStore::new()))
//!         .redirect(Arc::new(FnLoginRedirect::new(|| {
//!             eprintln!("Please log in again");
//!         })))
//!         .build()?;
//!
//!     if !client.is_authenticated() {
//!         client.login("user@example.com", "secret").await?;
//!     }
//!
//!     let response = client.send(client.get("/products")).await?;
//!     println!("{}", response.status());
//!     Ok(())
//! }
//! ```
//!
//! ## Refresh Policy
//!
//! Transient failures of the refresh endpoint (connection errors, 5xx,
//! timeouts) clear the session by default, like a rejected refresh token.
//! [`RefreshPolicy`] can keep the session instead, retry with a linear
//! backoff inside the same flight, and bound how long an exchange or a
//! queued caller may take:
//!
//! ```
//! use bearer_session::{ClientConfig, NetworkFailurePolicy, RefreshPolicy};
//! use std::time::Duration;
//!
//! let config = ClientConfig::builder()
//!     .base_url("https://api.example.com")
//!     .refresh(
//!         RefreshPolicy::builder()
//!             .network_failure(NetworkFailurePolicy::PreserveSession)
//!             .max_network_retries(2)
//!             .refresh_timeout(Duration::from_secs(10))
//!             .build(),
//!     )
//!     .build();
//! assert_eq!(config.refresh.max_network_retries, 2);
//! ```
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Tracing events are always emitted but are zero-cost when no subscriber is attached.
//! To see logs, attach a tracing subscriber in your application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```
//!
//! ## Error Handling
//!
//! Client operations return [`Result<T, SessionError>`](Result). Refresh
//! failures are shared between all waiting requests as a cloneable
//! [`RefreshError`]:
//!
//! ```no_run
//! # use bearer_session::{RefreshError, SessionClient, SessionError};
//! # async fn example(client: SessionClient) {
//! match client.send(client.get("/cart")).await {
//!     Ok(response) => { /* ... */ }
//!     Err(SessionError::Refresh(RefreshError::NoRefreshToken)) => {
//!         eprintln!("Not logged in");
//!     }
//!     Err(e) => {
//!         eprintln!("Error: {}", e);
//!     }
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod callbacks;
pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod refresh;
pub mod utils;

// Re-export commonly used types
pub use auth::{CredentialPair, CredentialStore, FileStore, MemoryStore, Token, TokenKind};
pub use callbacks::{FnLoginRedirect, LogOnlyRedirect, LoginRedirect, SharedLoginRedirect};
pub use client::{AuthRequest, SessionClient, SessionClientBuilder};
pub use config::{ClientConfig, NetworkFailurePolicy, RefreshPolicy};
pub use error::{RefreshError, Result, SessionError};
pub use guard::{Navigation, RouteGuard};
pub use refresh::{HttpRefreshExecutor, RefreshCoordinator, RefreshExecutor, RefreshGrant};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
