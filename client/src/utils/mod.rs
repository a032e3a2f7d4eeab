//! Shared helpers that do not belong to a single component.

pub mod jwt;

/// Joins a base URL and an endpoint path with exactly one slash between them.
pub fn join_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// True if `path` equals `prefix` or continues it with a new path segment or
/// query string. `/courses` matches `/courses/4` but not `/coursesX`.
pub fn path_has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'),
        None => false,
    }
}
