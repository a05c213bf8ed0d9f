//! Credential value types

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// Opaque bearer credential.
///
/// The `Debug` impl never prints the secret so tokens can sit inside
/// structs that end up in log lines.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Create a new token
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the token as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Token(***)")
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which of the two session credentials a value is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Short-lived token attached to every request
    Access,
    /// Longer-lived token used only to obtain a new access token
    Refresh,
}

impl TokenKind {
    /// Fixed key this credential is persisted under
    #[must_use]
    pub fn storage_key(self) -> &'static str {
        match self {
            TokenKind::Access => "access_token",
            TokenKind::Refresh => "refresh_token",
        }
    }
}

/// Access and refresh credentials of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    /// Access token
    pub access_token: Token,
    /// Refresh token
    pub refresh_token: Token,
}

impl CredentialPair {
    /// Create a new credential pair
    pub fn new(access_token: impl Into<Token>, refresh_token: impl Into<Token>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let token = Token::new("secret-value");
        assert_eq!(format!("{token:?}"), "Token(***)");

        let pair = CredentialPair::new("a", "r");
        assert!(!format!("{pair:?}").contains("\"a\""));
    }

    #[test]
    fn test_bearer_header() {
        assert_eq!(Token::new("abc").bearer(), "Bearer abc");
    }

    #[test]
    fn test_storage_keys() {
        assert_eq!(TokenKind::Access.storage_key(), "access_token");
        assert_eq!(TokenKind::Refresh.storage_key(), "refresh_token");
    }

    #[test]
    fn test_pair_wire_format() {
        let pair: CredentialPair = serde_json::from_value(serde_json::json!({
            "access_token": "acc",
            "refresh_token": "ref",
        }))
        .unwrap();
        assert_eq!(pair.access_token.as_str(), "acc");
        assert_eq!(pair.refresh_token.as_str(), "ref");
    }
}
