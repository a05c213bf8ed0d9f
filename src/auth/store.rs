//! Credential storage backends

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::io::Write;
use std::sync::RwLock;

use thiserror::Error;

use super::token::{CredentialPair, Token, TokenKind};

/// Errors that can occur during credential storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error during storage operations
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A lock guarding the store was poisoned by a panicking writer
    #[error("Credential store lock poisoned")]
    Poisoned,
}

/// Key-value storage for the session's access and refresh tokens.
///
/// Implementations do not validate token contents. At most one value is
/// held per [`TokenKind`], so the store holds zero or one credential pair.
pub trait CredentialStore: Send + Sync {
    /// Read a credential
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, kind: TokenKind) -> Result<Option<Token>, StoreError>;

    /// Replace a credential
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, kind: TokenKind, token: Token) -> Result<(), StoreError>;

    /// Remove both credentials
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn clear(&self) -> Result<(), StoreError>;

    /// Read both credentials, if both are present
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn pair(&self) -> Result<Option<CredentialPair>, StoreError> {
        let access = self.get(TokenKind::Access)?;
        let refresh = self.get(TokenKind::Refresh)?;
        Ok(access.zip(refresh).map(|(access_token, refresh_token)| CredentialPair {
            access_token,
            refresh_token,
        }))
    }

    /// Store both credentials
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set_pair(&self, pair: CredentialPair) -> Result<(), StoreError> {
        self.set(TokenKind::Access, pair.access_token)?;
        self.set(TokenKind::Refresh, pair.refresh_token)
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<T> {
    fn get(&self, kind: TokenKind) -> Result<Option<Token>, StoreError> {
        (**self).get(kind)
    }

    fn set(&self, kind: TokenKind, token: Token) -> Result<(), StoreError> {
        (**self).set(kind, token)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

/// In-process credential store
#[derive(Debug, Default)]
pub struct MemoryStore {
    tokens: RwLock<HashMap<TokenKind, Token>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with a credential pair
    #[must_use]
    pub fn with_pair(pair: CredentialPair) -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(TokenKind::Access, pair.access_token);
        tokens.insert(TokenKind::Refresh, pair.refresh_token);
        Self {
            tokens: RwLock::new(tokens),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, kind: TokenKind) -> Result<Option<Token>, StoreError> {
        let tokens = self.tokens.read().map_err(|_| StoreError::Poisoned)?;
        Ok(tokens.get(&kind).cloned())
    }

    fn set(&self, kind: TokenKind, token: Token) -> Result<(), StoreError> {
        let mut tokens = self.tokens.write().map_err(|_| StoreError::Poisoned)?;
        tokens.insert(kind, token);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.tokens
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .clear();
        Ok(())
    }
}

/// Credential store persisted as a JSON object on disk.
///
/// Values live under the fixed keys of [`TokenKind::storage_key`], so the
/// file stays readable across process restarts. Writes replace the file
/// atomically, so readers in this or another process see either the old
/// or the new contents, never a partial file.
#[derive(Debug)]
pub struct FileStore {
    storage_path: PathBuf,
    // readers share, read-modify-write cycles within this process are exclusive
    lock: RwLock<()>,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore {
    /// Create a file store at the default path (platform-specific config directory)
    #[must_use]
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bearer-session");

        Self::with_path(config_dir.join("credentials.json"))
    }

    /// Create a file store with a custom path
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            storage_path: path,
            lock: RwLock::new(()),
        }
    }

    /// Get the storage path
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.storage_path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.storage_path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(&self.storage_path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let parent = match self.storage_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let content = serde_json::to_string_pretty(entries)?;

        // same directory, so the rename below never crosses filesystems
        let mut staged = tempfile::NamedTempFile::new_in(&parent)?;
        staged.write_all(content.as_bytes())?;
        staged.as_file().sync_all()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(staged.path(), perms)?;
        }

        staged
            .persist(&self.storage_path)
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, kind: TokenKind) -> Result<Option<Token>, StoreError> {
        let _guard = self.lock.read().map_err(|_| StoreError::Poisoned)?;
        let entries = self.load()?;
        Ok(entries.get(kind.storage_key()).map(|v| Token::new(v.as_str())))
    }

    fn set(&self, kind: TokenKind, token: Token) -> Result<(), StoreError> {
        let _guard = self.lock.write().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.load()?;
        entries.insert(kind.storage_key().to_string(), token.as_str().to_string());
        self.save(&entries)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.write().map_err(|_| StoreError::Poisoned)?;
        if self.storage_path.exists() {
            std::fs::remove_file(&self.storage_path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.get(TokenKind::Access).unwrap().is_none());

        store.set(TokenKind::Access, Token::new("acc")).unwrap();
        assert_eq!(store.get(TokenKind::Access).unwrap(), Some(Token::new("acc")));
        // half a pair is not a pair
        assert!(store.pair().unwrap().is_none());

        store.set(TokenKind::Refresh, Token::new("ref")).unwrap();
        assert_eq!(store.pair().unwrap(), Some(CredentialPair::new("acc", "ref")));

        store.clear().unwrap();
        assert!(store.get(TokenKind::Access).unwrap().is_none());
        assert!(store.get(TokenKind::Refresh).unwrap().is_none());
    }

    #[test]
    fn test_memory_store_set_replaces() {
        let store = MemoryStore::with_pair(CredentialPair::new("old", "ref"));
        store.set(TokenKind::Access, Token::new("new")).unwrap();
        assert_eq!(store.get(TokenKind::Access).unwrap(), Some(Token::new("new")));
        assert_eq!(store.get(TokenKind::Refresh).unwrap(), Some(Token::new("ref")));
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("credentials.json");

        let store = FileStore::with_path(path.clone());
        store
            .set_pair(CredentialPair::new("test_access", "test_refresh"))
            .unwrap();

        let reopened = FileStore::with_path(path.clone());
        assert_eq!(
            reopened.pair().unwrap(),
            Some(CredentialPair::new("test_access", "test_refresh"))
        );

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["access_token"], "test_access");
        assert_eq!(raw["refresh_token"], "test_refresh");
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::with_path(temp_dir.path().join("nonexistent.json"));

        assert!(store.get(TokenKind::Refresh).unwrap().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_clear_removes_both() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");
        let store = FileStore::with_path(path.clone());

        store.set_pair(CredentialPair::new("a", "r")).unwrap();
        store.clear().unwrap();

        assert!(!path.exists());
        assert!(store.pair().unwrap().is_none());
    }

    #[test]
    fn test_file_store_reads_never_see_partial_writes() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");
        let writer = FileStore::with_path(path.clone());
        writer.set_pair(CredentialPair::new("a0", "r1")).unwrap();

        let shared_reader = &writer;
        // a second handle shares no lock with the writer, like another process
        let foreign_reader = FileStore::with_path(path);
        let done = AtomicBool::new(false);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                let mut i = 0u64;
                while !done.load(Ordering::SeqCst) {
                    i += 1;
                    writer
                        .set(TokenKind::Access, Token::new(format!("a{i}")))
                        .unwrap();
                }
            });

            let expected = Some(Token::new("r1"));
            let misses = (0..2_000)
                .filter(|_| {
                    shared_reader.get(TokenKind::Refresh).ok() != Some(expected.clone())
                        || foreign_reader.get(TokenKind::Refresh).ok() != Some(expected.clone())
                })
                .count();
            done.store(true, Ordering::SeqCst);
            assert_eq!(misses, 0);
        });

        let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("credentials.json")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("credentials.json");
        let store = FileStore::with_path(path.clone());
        store.set(TokenKind::Access, Token::new("a")).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
