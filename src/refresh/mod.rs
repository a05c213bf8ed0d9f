//! Access token refresh
//!
//! - [`RefreshExecutor`] performs one exchange of a refresh token for a new
//!   access token. [`HttpRefreshExecutor`] is the JSON-over-HTTP
//!   implementation.
//! - [`RefreshCoordinator`] makes sure concurrent callers share a single
//!   exchange and all observe its outcome.

mod coordinator;
mod executor;

pub use coordinator::RefreshCoordinator;
pub use executor::{HttpRefreshExecutor, RefreshExecutor, RefreshGrant};

pub(crate) use executor::error_message;
