//! Client and refresh configuration

use std::time::Duration;

use reqwest::Url;
use typed_builder::TypedBuilder;

use crate::error::{Result, SessionError};
use crate::utils::join_path;

/// Base URL used when none is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
/// Password login endpoint, relative to the base URL
pub const DEFAULT_LOGIN_PATH: &str = "/users/token";
/// Refresh exchange endpoint, relative to the base URL
pub const DEFAULT_REFRESH_PATH: &str = "/users/refresh_token";
/// Environment variable read by [`ClientConfig::from_env`]
pub const BASE_URL_ENV: &str = "API_BASE_URL";

/// What a transient refresh failure does to the stored session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFailurePolicy {
    /// Clear both tokens and redirect to login, same as a rejected refresh
    #[default]
    InvalidateSession,
    /// Keep the refresh token so a later request can try again
    PreserveSession,
}

/// Tuning for the refresh coordinator
#[derive(Debug, Clone, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for RefreshPolicy"),
    builder_type(doc = "Builder for RefreshPolicy", vis = "pub"),
    build_method(doc = "Build the RefreshPolicy")
)]
pub struct RefreshPolicy {
    /// Session handling when the refresh endpoint is unreachable
    #[builder(default)]
    pub network_failure: NetworkFailurePolicy,

    /// Extra attempts for transient failures, inside the same flight
    #[builder(default)]
    pub max_network_retries: u32,

    /// Delay before retry `n` is `n * retry_backoff`
    #[builder(default = Duration::from_millis(500))]
    pub retry_backoff: Duration,

    /// Upper bound for a single exchange with the refresh endpoint
    #[builder(default, setter(strip_option))]
    pub refresh_timeout: Option<Duration>,

    /// Upper bound for a queued caller waiting on someone else's flight
    #[builder(default, setter(strip_option))]
    pub wait_timeout: Option<Duration>,

    /// Store a refresh token returned by the refresh endpoint
    #[builder(default)]
    pub rotate_refresh_token: bool,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RefreshPolicy {
    /// Whether `err` should clear the session under this policy
    #[must_use]
    pub fn invalidates_on(&self, err: &crate::RefreshError) -> bool {
        use crate::RefreshError;

        match err {
            RefreshError::Storage(_) | RefreshError::Interrupted => false,
            e if e.is_transient() => {
                self.network_failure == NetworkFailurePolicy::InvalidateSession
            }
            _ => true,
        }
    }
}

/// Configuration for [`SessionClient`](crate::SessionClient)
#[derive(Debug, Clone, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for ClientConfig"),
    builder_type(doc = "Builder for ClientConfig", vis = "pub"),
    build_method(doc = "Build the ClientConfig")
)]
pub struct ClientConfig {
    /// Base URL every relative request path is joined onto
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    pub base_url: String,

    /// Password login endpoint
    #[builder(default = DEFAULT_LOGIN_PATH.to_string(), setter(into))]
    pub login_path: String,

    /// Refresh exchange endpoint
    #[builder(default = DEFAULT_REFRESH_PATH.to_string(), setter(into))]
    pub refresh_path: String,

    /// Per-request timeout applied by the HTTP client
    #[builder(default, setter(strip_option))]
    pub request_timeout: Option<Duration>,

    /// Custom User-Agent header
    #[builder(default, setter(strip_option, into))]
    pub user_agent: Option<String>,

    /// Refresh coordinator tuning
    #[builder(default)]
    pub refresh: RefreshPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ClientConfig {
    /// Default configuration with the base URL taken from `API_BASE_URL`
    /// when set.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(BASE_URL_ENV) {
            Ok(base_url) if !base_url.trim().is_empty() => {
                Self::builder().base_url(base_url.trim()).build()
            }
            _ => Self::default(),
        }
    }

    /// Resolve a path against the base URL
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidConfig` if the result is not a valid URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = join_path(&self.base_url, path);
        Url::parse(&joined)
            .map_err(|e| SessionError::invalid_config(format!("invalid URL '{joined}': {e}")))
    }

    /// Full URL of the refresh endpoint
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidConfig` if the URL is invalid.
    pub fn refresh_url(&self) -> Result<Url> {
        self.endpoint(&self.refresh_path)
    }

    /// Full URL of the login endpoint
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidConfig` if the URL is invalid.
    pub fn login_url(&self) -> Result<Url> {
        self.endpoint(&self.login_path)
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(ref agent) = self.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        builder
            .build()
            .map_err(|e| SessionError::invalid_config(format!("HTTP client: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RefreshError;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.login_path, "/users/token");
        assert_eq!(config.refresh_path, "/users/refresh_token");
        assert_eq!(config.refresh.max_network_retries, 0);
        assert!(config.refresh.wait_timeout.is_none());
        assert!(!config.refresh.rotate_refresh_token);
    }

    #[test]
    fn test_endpoint_joining() {
        let config = ClientConfig::builder()
            .base_url("http://api.test/api/")
            .build();
        assert_eq!(
            config.refresh_url().unwrap().as_str(),
            "http://api.test/api/users/refresh_token"
        );
        assert_eq!(
            config.endpoint("products").unwrap().as_str(),
            "http://api.test/api/products"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let config = ClientConfig::builder().base_url("/api").build();
        assert!(matches!(
            config.login_url(),
            Err(SessionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_invalidation_policy() {
        let reference = RefreshPolicy::default();
        assert!(reference.invalidates_on(&RefreshError::NoRefreshToken));
        assert!(reference.invalidates_on(&RefreshError::rejected(401, "expired")));
        assert!(reference.invalidates_on(&RefreshError::network("refused")));
        assert!(!reference.invalidates_on(&RefreshError::Interrupted));
        assert!(!reference.invalidates_on(&RefreshError::Storage("disk full".into())));

        let lenient = RefreshPolicy::builder()
            .network_failure(NetworkFailurePolicy::PreserveSession)
            .build();
        assert!(!lenient.invalidates_on(&RefreshError::network("refused")));
        assert!(!lenient.invalidates_on(&RefreshError::Timeout(Duration::from_secs(5))));
        assert!(lenient.invalidates_on(&RefreshError::rejected(401, "expired")));
    }
}
