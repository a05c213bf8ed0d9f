//! Environment-driven settings for the demo

use bearer_session::auth::FileStore;
use std::path::PathBuf;

/// Override for the credentials file location
pub const CREDENTIALS_ENV: &str = "BEARER_SESSION_CREDENTIALS";

/// Password source when `--password` is omitted
pub const PASSWORD_ENV: &str = "BEARER_SESSION_PASSWORD";

/// Open the credentials file: explicit flag, then environment, then the
/// library default.
pub fn credentials_store(flag: Option<PathBuf>) -> FileStore {
    flag.or_else(|| std::env::var_os(CREDENTIALS_ENV).map(PathBuf::from))
        .map_or_else(FileStore::new, FileStore::with_path)
}

/// Password from the environment, if set
pub fn password_from_env() -> Option<String> {
    std::env::var(PASSWORD_ENV).ok().filter(|p| !p.is_empty())
}

/// Check if NO_COLOR environment variable is set
pub fn no_color() -> bool {
    std::env::var("NO_COLOR").is_ok()
}
