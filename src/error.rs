//! Error types for bearer-session

use std::time::Duration;

use thiserror::Error;

use crate::auth::StoreError;

/// Failure of a refresh flight.
///
/// Every caller that shared a flight receives a clone of the same value, so
/// this type carries only owned, cloneable data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh token is stored
    #[error("No refresh token found")]
    NoRefreshToken,

    /// The refresh endpoint refused the refresh token
    #[error("Refresh token rejected (status {status}): {message}")]
    Rejected {
        /// HTTP status returned by the refresh endpoint
        status: u16,
        /// Server supplied reason
        message: String,
    },

    /// The refresh endpoint could not be reached or failed server-side
    #[error("Network failure during refresh: {0}")]
    Network(String),

    /// The refresh endpoint answered with a body we could not use
    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    /// A single refresh attempt exceeded the configured timeout
    #[error("Refresh timed out after {0:?}")]
    Timeout(Duration),

    /// The new credential could not be persisted
    #[error("Credential storage error: {0}")]
    Storage(String),

    /// The flight was abandoned before it produced an outcome
    #[error("Refresh interrupted before completion")]
    Interrupted,
}

impl RefreshError {
    /// Create a rejection error
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Whether the failure may succeed on a later attempt with the same
    /// refresh token.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

/// Main error type for bearer-session
#[derive(Error, Debug)]
pub enum SessionError {
    /// Refreshing the access token failed
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    /// The request was still unauthorized after its single refresh-and-retry
    #[error("Unauthorized (status {status}): {url}: {message}")]
    Unauthorized {
        /// Request URL
        url: String,
        /// HTTP status of the final response
        status: u16,
        /// Headers of the final response, e.g. `WWW-Authenticate`
        headers: reqwest::header::HeaderMap,
        /// Response body (truncated)
        message: String,
    },

    /// The login endpoint rejected the supplied credentials
    #[error("Login rejected (status {status}): {message}")]
    LoginRejected {
        /// HTTP status returned by the login endpoint
        status: u16,
        /// Server supplied reason
        message: String,
    },

    /// HTTP client error
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Credential store error
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    /// A stored token cannot be sent as an `Authorization` header
    #[error("Invalid stored token: {0}")]
    InvalidToken(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid response from a non-refresh endpoint
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type alias for bearer-session operations
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Create an unauthorized error
    pub fn unauthorized(
        url: impl Into<String>,
        status: u16,
        headers: reqwest::header::HeaderMap,
        message: impl Into<String>,
    ) -> Self {
        Self::Unauthorized {
            url: url.into(),
            status,
            headers,
            message: message.into(),
        }
    }

    /// Create a login rejected error
    pub fn login_rejected(status: u16, message: impl Into<String>) -> Self {
        Self::LoginRejected {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// The refresh failure behind this error, if any
    #[must_use]
    pub fn as_refresh(&self) -> Option<&RefreshError> {
        match self {
            Self::Refresh(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the caller should treat the session as gone
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::Refresh(_))
    }
}
