//! Navigation guard for unauthenticated users
//!
//! Every path that is not explicitly public requires a stored access token;
//! without one the guard answers with a redirect to the login path.

use crate::auth::{CredentialStore, StoreError, TokenKind};

/// Default login entry point
pub const DEFAULT_LOGIN_ROUTE: &str = "/login";

/// Outcome of a guard check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Navigation may continue
    Proceed,
    /// Navigation must go to the given path instead
    Redirect(String),
}

/// Decides which paths need an authenticated session
#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
    public_paths: Vec<String>,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_ROUTE)
    }
}

impl RouteGuard {
    /// Create a guard whose only public path is the login path itself
    pub fn new(login_path: impl Into<String>) -> Self {
        let login_path = login_path.into();
        Self {
            public_paths: vec![login_path.clone()],
            login_path,
        }
    }

    /// Allow a path without authentication
    #[must_use]
    pub fn with_public_path(mut self, path: impl Into<String>) -> Self {
        self.public_paths.push(path.into());
        self
    }

    /// Get the login path
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Whether `path` needs an authenticated session.
    ///
    /// Query strings and fragments are ignored; the remaining path must
    /// match a public path exactly.
    #[must_use]
    pub fn requires_auth(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        !self.public_paths.iter().any(|public| public == path)
    }

    /// Check navigation to `path` against the session in `store`
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn check(&self, path: &str, store: &dyn CredentialStore) -> Result<Navigation, StoreError> {
        if !self.requires_auth(path) {
            return Ok(Navigation::Proceed);
        }
        if store.get(TokenKind::Access)?.is_some() {
            Ok(Navigation::Proceed)
        } else {
            tracing::debug!(path, "Unauthenticated navigation redirected to login");
            Ok(Navigation::Redirect(self.login_path.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryStore, Token};

    #[test]
    fn test_public_paths() {
        let guard = RouteGuard::default().with_public_path("/register");
        assert!(!guard.requires_auth("/login"));
        assert!(!guard.requires_auth("/login?next=/cart"));
        assert!(!guard.requires_auth("/register"));
        assert!(guard.requires_auth("/"));
        assert!(guard.requires_auth("/cart"));
        assert!(guard.requires_auth("/login/extra"));
    }

    #[test]
    fn test_unauthenticated_redirects() {
        let guard = RouteGuard::default();
        let store = MemoryStore::new();

        assert_eq!(
            guard.check("/cart", &store).unwrap(),
            Navigation::Redirect("/login".to_string())
        );
        assert_eq!(guard.check("/login", &store).unwrap(), Navigation::Proceed);
    }

    #[test]
    fn test_authenticated_proceeds() {
        let guard = RouteGuard::default();
        let store = MemoryStore::new();
        store.set(TokenKind::Access, Token::new("a")).unwrap();

        assert_eq!(guard.check("/", &store).unwrap(), Navigation::Proceed);
    }
}
