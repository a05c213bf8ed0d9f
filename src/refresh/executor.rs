//! Refresh exchange against the remote token endpoint

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::auth::Token;
use crate::error::RefreshError;
use crate::utils::truncate_body;

/// Longest server message kept in an error
const MAX_ERROR_BODY: usize = 512;

/// Result of a successful refresh exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshGrant {
    /// New access token
    pub access_token: Token,
    /// Replacement refresh token, when the endpoint rotates them
    pub refresh_token: Option<Token>,
}

impl RefreshGrant {
    /// Grant carrying only a new access token
    pub fn access(token: impl Into<Token>) -> Self {
        Self {
            access_token: token.into(),
            refresh_token: None,
        }
    }
}

/// Performs one refresh exchange.
///
/// Implementations are stateless per call and know nothing about queued
/// callers; the [`RefreshCoordinator`](super::RefreshCoordinator) decides
/// when to call them.
#[async_trait]
pub trait RefreshExecutor: Send + Sync {
    /// Trade a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// `RefreshError::Rejected` when the endpoint refuses the refresh token,
    /// `RefreshError::Network` for transport failures.
    async fn exchange(&self, refresh_token: &Token) -> Result<RefreshGrant, RefreshError>;
}

#[async_trait]
impl<T: RefreshExecutor + ?Sized> RefreshExecutor for std::sync::Arc<T> {
    async fn exchange(&self, refresh_token: &Token) -> Result<RefreshGrant, RefreshError> {
        (**self).exchange(refresh_token).await
    }
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    token_type: Option<String>,
}

/// Error body shapes seen from token endpoints
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl ErrorResponse {
    fn message(self) -> Option<String> {
        let detail = self.detail.map(|d| match d {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        self.error_description.or(detail).or(self.error)
    }
}

/// Best human-readable reason from an error response body
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(ErrorResponse::message)
        .unwrap_or_else(|| truncate_body(body.trim(), MAX_ERROR_BODY))
}

/// Refresh executor that POSTs `{"refresh_token": ...}` as JSON
#[derive(Debug, Clone)]
pub struct HttpRefreshExecutor {
    http_client: reqwest::Client,
    refresh_url: Url,
}

impl HttpRefreshExecutor {
    /// Create an executor for the given endpoint
    #[must_use]
    pub fn new(http_client: reqwest::Client, refresh_url: Url) -> Self {
        Self {
            http_client,
            refresh_url,
        }
    }

    /// The endpoint this executor talks to
    #[must_use]
    pub fn refresh_url(&self) -> &Url {
        &self.refresh_url
    }
}

#[async_trait]
impl RefreshExecutor for HttpRefreshExecutor {
    async fn exchange(&self, refresh_token: &Token) -> Result<RefreshGrant, RefreshError> {
        tracing::debug!(url = %self.refresh_url, "Exchanging refresh token");

        let response = self
            .http_client
            .post(self.refresh_url.clone())
            .json(&RefreshRequest {
                refresh_token: refresh_token.as_str(),
            })
            .send()
            .await
            .map_err(|e| RefreshError::network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RefreshError::network(format!("reading refresh response: {e}")))?;

        if status.is_client_error() {
            return Err(RefreshError::rejected(status.as_u16(), error_message(&body)));
        }
        if !status.is_success() {
            return Err(RefreshError::network(format!(
                "refresh endpoint returned {status}: {}",
                error_message(&body)
            )));
        }

        let parsed: RefreshResponse = serde_json::from_str(&body).map_err(|e| {
            RefreshError::invalid_response(format!(
                "Failed to parse refresh response: {e} - Response: {}",
                truncate_body(&body, MAX_ERROR_BODY)
            ))
        })?;

        if parsed.access_token.is_empty() {
            return Err(RefreshError::invalid_response("empty access_token"));
        }

        Ok(RefreshGrant {
            access_token: Token::new(parsed.access_token),
            refresh_token: parsed.refresh_token.filter(|t| !t.is_empty()).map(Token::new),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn executor_for(server: &MockServer) -> HttpRefreshExecutor {
        let url = Url::parse(&format!("{}/users/refresh_token", server.uri())).unwrap();
        HttpRefreshExecutor::new(reqwest::Client::new(), url)
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"detail":"Could not validate refresh token"}"#),
            "Could not validate refresh token"
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"expired"}"#),
            "expired"
        );
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/refresh_token"))
            .and(body_json(serde_json::json!({"refresh_token": "r1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new_token_123",
                "token_type": "bearer",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let grant = executor_for(&server)
            .exchange(&Token::new("r1"))
            .await
            .unwrap();
        assert_eq!(grant, RefreshGrant::access("new_token_123"));
    }

    #[tokio::test]
    async fn test_exchange_surfaces_rotated_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "a2",
                "refresh_token": "r2",
            })))
            .mount(&server)
            .await;

        let grant = executor_for(&server)
            .exchange(&Token::new("r1"))
            .await
            .unwrap();
        assert_eq!(grant.refresh_token, Some(Token::new("r2")));
    }

    #[tokio::test]
    async fn test_exchange_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "detail": "Could not validate refresh token",
            })))
            .mount(&server)
            .await;

        let err = executor_for(&server)
            .exchange(&Token::new("stale"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RefreshError::rejected(401, "Could not validate refresh token")
        );
    }

    #[tokio::test]
    async fn test_exchange_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = executor_for(&server)
            .exchange(&Token::new("r1"))
            .await
            .unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn test_exchange_garbage_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = executor_for(&server)
            .exchange(&Token::new("r1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RefreshError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_exchange_unreachable() {
        // port 9 (discard) on localhost is not listening in test environments
        let url = Url::parse("http://127.0.0.1:9/users/refresh_token").unwrap();
        let executor = HttpRefreshExecutor::new(reqwest::Client::new(), url);

        let err = executor.exchange(&Token::new("r1")).await.unwrap_err();
        assert!(matches!(err, RefreshError::Network(_)));
    }
}
