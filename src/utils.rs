//! Small string helpers shared by the client and the refresh executor

/// Truncate a string at a UTF-8 character boundary.
///
/// Returns at most `max_bytes` bytes, with "..." appended if anything was
/// cut. Used to keep server error bodies out of log lines and error
/// messages at full length.
///
/// # Example
/// ```
/// use bearer_session::utils::truncate_body;
///
/// assert_eq!(truncate_body("Not authenticated", 7), "Not aut...");
/// // 'é' is 2 bytes; cutting inside it backs off to the previous boundary
/// assert_eq!(truncate_body("café", 4), "caf...");
/// ```
#[must_use]
pub fn truncate_body(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }

    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }

    format!("{}...", &s[..boundary])
}

/// Join a base URL and a path with exactly one `/` between them.
///
/// # Example
/// ```
/// use bearer_session::utils::join_path;
///
/// assert_eq!(join_path("http://h/api/", "/users"), "http://h/api/users");
/// assert_eq!(join_path("http://h", "users"), "http://h/users");
/// ```
#[must_use]
pub fn join_path(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
