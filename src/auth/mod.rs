//! Session credentials and their storage
//!
//! A session holds at most one pair of credentials: a short-lived access
//! token attached to every request and a longer-lived refresh token used
//! only to obtain a new access token.
//!
//! # Storage
//!
//! Storage sits behind the [`CredentialStore`] trait so the refresh machinery
//! never touches a global. Two backends ship with the crate:
//!
//! - [`MemoryStore`] - in-process, for tests and short-lived tools
//! - [`FileStore`] - JSON file in the platform config directory
//!   (e.g., `~/.config/bearer-session/credentials.json` on Linux),
//!   written with user-only permissions (600)
//!
//! # Example
//!
//! ```
//! use bearer_session::auth::{CredentialPair, CredentialStore, MemoryStore, TokenKind};
//!
//! let store = MemoryStore::with_pair(CredentialPair::new("access", "refresh"));
//! assert_eq!(store.get(TokenKind::Access).unwrap().unwrap().as_str(), "access");
//!
//! store.clear().unwrap();
//! assert!(store.pair().unwrap().is_none());
//! ```

mod store;
mod token;

pub use store::{CredentialStore, FileStore, MemoryStore, StoreError};
pub use token::{CredentialPair, Token, TokenKind};
