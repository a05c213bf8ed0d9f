//! HTTP client with bearer credentials and transparent refresh
//!
//! [`SessionClient`] wraps a [`reqwest::Client`] with a two-stage request
//! pipeline:
//!
//! ```text
//! ┌──────────────┐   outbound: attach    ┌────────┐
//! │    caller    │ ─── Bearer <access> ─► │ server │
//! └──────────────┘                        └────────┘
//!        ▲                                    │
//!        │        inbound: 401?               │
//!        │   ┌──────────────────────────┐     │
//!        └───┤ mark retried, refresh via ├◄────┘
//!            │ RefreshCoordinator, replay│
//!            └──────────────────────────┘
//! ```
//!
//! Any status other than 401 is handed back untouched. A 401 triggers at
//! most one refresh-and-replay per request; a replayed request that is
//! still unauthorized fails with [`SessionError::Unauthorized`].
//!
//! # Example
//!
//! ```no_run
//! use bearer_session::{ClientConfig, SessionClient};
//! use bearer_session::auth::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> bearer_session::Result<()> {
//! let client = SessionClient::builder()
//!     .config(ClientConfig::builder().base_url("http://localhost:8000").build())
//!     .store(Arc::new(MemoryStore::new()))
//!     .build()?;
//!
//! client.login("user@example.com", "hunter2").await?;
//!
//! // Expired access tokens are refreshed behind the scenes
//! let products: serde_json::Value = client.get_json("/products").await?;
//! println!("{products}");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::auth::{CredentialPair, CredentialStore, FileStore, Token, TokenKind};
use crate::callbacks::{LogOnlyRedirect, SharedLoginRedirect};
use crate::config::ClientConfig;
use crate::error::{Result, SessionError};
use crate::refresh::{HttpRefreshExecutor, RefreshCoordinator, RefreshExecutor, error_message};
use crate::utils::join_path;

/// Outgoing request plus its retry marker.
///
/// The marker is set when the request is replayed after a refresh and is
/// never cleared. A marked request that receives 401 fails instead of
/// triggering another refresh.
#[derive(Debug)]
pub struct AuthRequest {
    request: Request,
    retried: bool,
}

impl AuthRequest {
    /// Wrap a request that has not been retried yet
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    /// Wrap a request that already went through its refresh-and-retry
    #[must_use]
    pub fn retried(request: Request) -> Self {
        Self {
            request,
            retried: true,
        }
    }

    /// Whether the retry marker is set
    #[must_use]
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    /// Get the wrapped request
    #[must_use]
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Unwrap the request
    #[must_use]
    pub fn into_inner(self) -> Request {
        self.request
    }
}

impl From<Request> for AuthRequest {
    fn from(request: Request) -> Self {
        Self::new(request)
    }
}

/// Response from the password login endpoint
#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

/// Builder for [`SessionClient`]
#[derive(Default)]
pub struct SessionClientBuilder {
    config: Option<ClientConfig>,
    store: Option<Arc<dyn CredentialStore>>,
    redirect: Option<SharedLoginRedirect>,
    executor: Option<Arc<dyn RefreshExecutor>>,
    http_client: Option<reqwest::Client>,
}

impl SessionClientBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom client configuration
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set custom credential storage (default: [`FileStore`])
    #[must_use]
    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the callback run when the session is invalidated
    #[must_use]
    pub fn redirect(mut self, redirect: SharedLoginRedirect) -> Self {
        self.redirect = Some(redirect);
        self
    }

    /// Replace the HTTP refresh exchange
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn RefreshExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Use a preconfigured HTTP client; `request_timeout` and `user_agent`
    /// from the config are then ignored.
    #[must_use]
    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Build the session client
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidConfig` if the base URL or HTTP client
    /// settings are invalid.
    pub fn build(self) -> Result<SessionClient> {
        let config = self.config.unwrap_or_default();
        let http_client = match self.http_client {
            Some(client) => client,
            None => config.http_client()?,
        };
        let executor: Arc<dyn RefreshExecutor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(HttpRefreshExecutor::new(
                http_client.clone(),
                config.refresh_url()?,
            )),
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(FileStore::new()) as Arc<dyn CredentialStore>);
        let redirect = self
            .redirect
            .unwrap_or_else(|| Arc::new(LogOnlyRedirect) as SharedLoginRedirect);

        let coordinator = RefreshCoordinator::new(store.clone(), executor)
            .with_redirect(redirect)
            .with_policy(config.refresh.clone());

        Ok(SessionClient {
            config,
            http_client,
            store,
            coordinator: Arc::new(coordinator),
        })
    }
}

/// HTTP client that keeps a bearer session alive
#[derive(Clone)]
pub struct SessionClient {
    config: ClientConfig,
    http_client: reqwest::Client,
    store: Arc<dyn CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("config", &self.config)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl SessionClient {
    /// Create a client with the given configuration and default collaborators
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidConfig` if the configuration is invalid.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    /// Create a builder for custom configuration
    #[must_use]
    pub fn builder() -> SessionClientBuilder {
        SessionClientBuilder::new()
    }

    /// Get the client configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the credential store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Get the refresh coordinator shared by every request of this client
    #[must_use]
    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Start a request to a path relative to the base URL
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, join_path(&self.config.base_url, path))
    }

    /// Start a GET request
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    /// Start a POST request
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    /// Start a PUT request
    pub fn put(&self, path: &str) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    /// Start a DELETE request
    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Build and send a request through the session pipeline
    ///
    /// # Errors
    ///
    /// See [`SessionClient::dispatch`].
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let request = builder.build()?;
        self.execute(request).await
    }

    /// Send a request that has not been retried yet
    ///
    /// # Errors
    ///
    /// See [`SessionClient::dispatch`].
    pub async fn execute(&self, request: Request) -> Result<Response> {
        self.dispatch(AuthRequest::new(request)).await
    }

    /// GET a path and decode a successful JSON body
    ///
    /// # Errors
    ///
    /// Pipeline errors as in [`SessionClient::dispatch`], plus
    /// `SessionError::Http` for non-success statuses or undecodable bodies.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.get(path)).await?.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Outbound stage: attach the stored access token, if any.
    ///
    /// Returns the token that was attached so the inbound stage can tell
    /// whether it went stale in the meantime.
    ///
    /// # Errors
    ///
    /// `SessionError::Store` if the store cannot be read,
    /// `SessionError::InvalidToken` if the token is not a valid header value.
    pub fn authorize(&self, request: &mut Request) -> Result<Option<Token>> {
        let token = self.store.get(TokenKind::Access)?;
        if let Some(ref token) = token {
            set_bearer(request, token)?;
        }
        Ok(token)
    }

    /// Run a request through both pipeline stages.
    ///
    /// Responses with any status other than 401 are returned as `Ok`.
    ///
    /// # Errors
    ///
    /// - `SessionError::Unauthorized` when a 401 cannot be recovered: the
    ///   request was already retried, its replay was unauthorized too, or its
    ///   body cannot be cloned for a replay
    /// - `SessionError::Refresh` when obtaining a new access token failed;
    ///   the session has been invalidated by then
    /// - `SessionError::Http` for transport errors
    pub async fn dispatch(&self, request: AuthRequest) -> Result<Response> {
        let AuthRequest {
            mut request,
            retried,
        } = request;
        let sent_with = self.authorize(&mut request)?;
        let replay = if retried { None } else { request.try_clone() };
        let method = request.method().clone();
        let url = request.url().to_string();

        let response = self.http_client.execute(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if retried {
            tracing::debug!(%method, %url, "Retried request unauthorized again");
            return Err(unauthorized(&url, response).await);
        }
        let Some(mut replay) = replay else {
            tracing::warn!(%method, %url, "Unauthorized request cannot be replayed (streaming body)");
            return Err(unauthorized(&url, response).await);
        };

        let token = self.fresh_token(sent_with.as_ref()).await?;
        set_bearer(&mut replay, &token)?;

        tracing::debug!(%method, %url, "Replaying request with refreshed access token");
        let response = self.http_client.execute(replay).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!(%method, %url, "Replayed request still unauthorized");
            return Err(unauthorized(&url, response).await);
        }
        Ok(response)
    }

    async fn fresh_token(&self, sent_with: Option<&Token>) -> Result<Token> {
        // a flight that finished after this request left already replaced the token
        if let Some(current) = self.store.get(TokenKind::Access)? {
            if sent_with != Some(&current) {
                tracing::debug!("Access token changed since request was sent; reusing it");
                return Ok(current);
            }
        }
        Ok(self.coordinator.request_refresh().await?)
    }

    /// Log in with a username and password and store the issued credentials.
    ///
    /// The request is form-encoded and bypasses the refresh pipeline.
    ///
    /// # Errors
    ///
    /// `SessionError::LoginRejected` for 4xx responses, `InvalidResponse`
    /// for unexpected bodies or statuses, and transport/store errors.
    pub async fn login(&self, username: &str, password: &str) -> Result<CredentialPair> {
        let url = self.config.login_url()?;
        tracing::debug!(%url, username, "Logging in");

        let response = self
            .http_client
            .post(url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_client_error() {
            return Err(SessionError::login_rejected(
                status.as_u16(),
                error_message(&body),
            ));
        }
        if !status.is_success() {
            return Err(SessionError::invalid_response(format!(
                "login endpoint returned {status}: {}",
                error_message(&body)
            )));
        }

        let parsed: LoginResponse = serde_json::from_str(&body).map_err(|e| {
            SessionError::invalid_response(format!("Failed to parse login response: {e}"))
        })?;

        let pair = CredentialPair::new(parsed.access_token, parsed.refresh_token);
        self.store.set_pair(pair.clone())?;
        tracing::info!(username, "Logged in");

        Ok(pair)
    }

    /// Log out: clear stored credentials and run the login redirect
    pub fn logout(&self) {
        self.coordinator.invalidate_session();
        tracing::info!("Logged out");
    }

    /// Check if an access token is stored
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current_token().is_some()
    }

    /// Get the stored access token without refreshing.
    ///
    /// An unreadable store counts as logged out; the error is logged.
    #[must_use]
    pub fn current_token(&self) -> Option<Token> {
        match self.store.get(TokenKind::Access) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read access token from credential store");
                None
            }
        }
    }
}

fn set_bearer(request: &mut Request, token: &Token) -> Result<()> {
    let mut value = HeaderValue::from_str(&token.bearer()).map_err(|_| {
        SessionError::InvalidToken(
            "access token contains characters not allowed in a header".to_string(),
        )
    })?;
    value.set_sensitive(true);
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(())
}

async fn unauthorized(url: &str, response: Response) -> SessionError {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let message = match response.text().await {
        Ok(body) => error_message(&body),
        Err(e) => {
            tracing::warn!(url, error = %e, "Failed to read unauthorized response body");
            String::new()
        }
    };
    SessionError::unauthorized(url, status, headers, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryStore;

    fn client_with(store: Arc<MemoryStore>) -> SessionClient {
        SessionClient::builder()
            .config(ClientConfig::builder().base_url("http://api.test").build())
            .store(store)
            .build()
            .unwrap()
    }

    #[test]
    fn test_authorize_attaches_bearer() {
        let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("acc", "ref")));
        let client = client_with(store);

        let mut request = client.get("/items").build().unwrap();
        let attached = client.authorize(&mut request).unwrap();

        assert_eq!(attached, Some(Token::new("acc")));
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer acc");
        assert!(request.headers()[AUTHORIZATION].is_sensitive());
        assert_eq!(request.url().as_str(), "http://api.test/items");
    }

    #[test]
    fn test_authorize_without_token_leaves_request_alone() {
        let client = client_with(Arc::new(MemoryStore::new()));

        let mut request = client.get("/items").build().unwrap();
        assert!(client.authorize(&mut request).unwrap().is_none());
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_authorize_replaces_existing_header() {
        let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("acc", "ref")));
        let client = client_with(store);

        let mut request = client
            .get("/items")
            .header(AUTHORIZATION, "Bearer caller-set")
            .build()
            .unwrap();
        client.authorize(&mut request).unwrap();
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer acc");
    }

    #[test]
    fn test_retry_marker() {
        let client = client_with(Arc::new(MemoryStore::new()));
        let request = client.get("/items").build().unwrap();

        assert!(!AuthRequest::from(request.try_clone().unwrap()).is_retried());
        assert!(AuthRequest::retried(request).is_retried());
    }

    #[test]
    fn test_invalid_header_token() {
        let store = Arc::new(MemoryStore::with_pair(CredentialPair::new("bad\ntoken", "ref")));
        let client = client_with(store);

        let mut request = client.get("/items").build().unwrap();
        assert!(matches!(
            client.authorize(&mut request),
            Err(SessionError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_unreadable_store_counts_as_logged_out() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");
        std::fs::write(&path, "{not json").unwrap();

        let client = SessionClient::builder()
            .config(ClientConfig::builder().base_url("http://api.test").build())
            .store(Arc::new(FileStore::with_path(path)))
            .build()
            .unwrap();

        assert!(client.current_token().is_none());
        assert!(!client.is_authenticated());

        let mut request = client.get("/items").build().unwrap();
        assert!(matches!(
            client.authorize(&mut request),
            Err(SessionError::Store(_))
        ));
    }

    #[test]
    fn test_is_authenticated() {
        let store = Arc::new(MemoryStore::new());
        let client = client_with(store.clone());
        assert!(!client.is_authenticated());

        store.set(TokenKind::Access, Token::new("a")).unwrap();
        assert!(client.is_authenticated());
        assert_eq!(client.current_token(), Some(Token::new("a")));
    }
}
