//! Route matching logic.
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A prefix only matches on a segment boundary (`/auth` does not match `/authz`)
//! - No regex to guarantee O(n) matching

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. A trailing slash is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        Self {
            prefix: if trimmed.is_empty() { "/".to_string() } else { trimmed.to_string() },
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if `path` falls under this prefix.
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher() {
        let matcher = PathPrefixMatcher::new("/auth");

        assert!(matcher.matches("/auth"));
        assert!(matcher.matches("/auth/"));
        assert!(matcher.matches("/auth/login"));
        assert!(!matcher.matches("/authz"));
        assert!(!matcher.matches("/AUTH/login"));
        assert!(!matcher.matches("/api/auth"));
    }

    #[test]
    fn trailing_slash_in_prefix_is_ignored() {
        let matcher = PathPrefixMatcher::new("/analytics/");
        assert_eq!(matcher.prefix(), "/analytics");
        assert!(matcher.matches("/analytics/daily"));
    }

    #[test]
    fn root_prefix_matches_everything() {
        let matcher = PathPrefixMatcher::new("/");
        assert!(matcher.matches("/"));
        assert!(matcher.matches("/anything/at/all"));
    }
}
