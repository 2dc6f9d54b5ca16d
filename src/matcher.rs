//! Path template matching
//!
//! A template such as `/user/:id/posts` is split into `/`-delimited segments,
//! ignoring empty ones. A path matches when it has the same number of
//! segments, every literal segment is equal, and every `:name` segment binds
//! the (percent-decoded) path segment under `name`.

use crate::params::{decode_uri_component, ParamMap};

/// A single segment in a route template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Static text that must match exactly
    Static(String),
    /// Parameter that captures a value
    Param(String),
}

impl Segment {
    /// Parse a segment from string
    ///
    /// - `"users"` -> `Static("users")`
    /// - `":id"` -> `Param("id")`
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix(':') {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Static(s.to_string()),
        }
    }

    /// Parameter name, if this is a parameter segment
    pub fn param_name(&self) -> Option<&str> {
        match self {
            Segment::Param(name) => Some(name),
            Segment::Static(_) => None,
        }
    }
}

/// Split a path into its non-empty `/`-delimited segments.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// A parsed route template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    /// Pattern segments
    pub segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a template like `/users/:id`
    pub fn from_path(path: &str) -> Self {
        Self {
            segments: split_segments(path).into_iter().map(Segment::parse).collect(),
        }
    }

    /// Parameter names in declaration order
    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(Segment::param_name)
    }

    /// Match this pattern against a path.
    ///
    /// Returns extracted path parameters if matched.
    pub fn matches(&self, path: &str) -> Option<ParamMap> {
        self.match_segments(&split_segments(path))
    }

    /// Match against raw (still percent-encoded) path segments.
    ///
    /// Literals compare against the decoded segment, so `caf%C3%A9` matches
    /// a `café` template.
    pub fn match_segments(&self, path_segments: &[&str]) -> Option<ParamMap> {
        if path_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = ParamMap::new();
        for (segment, raw) in self.segments.iter().zip(path_segments) {
            match segment {
                Segment::Static(expected) => {
                    if expected != raw && *expected != decode_uri_component(raw) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    params.insert(name.clone(), decode_uri_component(raw));
                }
            }
        }

        Some(params)
    }

    /// Whether some concrete path could be matched by both patterns.
    ///
    /// Two templates overlap when they have the same length and every
    /// position either holds a parameter on one side or equal literals.
    pub fn overlaps(&self, other: &RoutePattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Static(a), Segment::Static(b)) => a == b,
                    _ => true,
                })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_parsing() {
        assert_eq!(
            Segment::parse("users"),
            Segment::Static("users".to_string())
        );
        assert_eq!(Segment::parse(":id"), Segment::Param("id".to_string()));
    }

    #[test]
    fn test_split_ignores_empty_segments() {
        assert_eq!(split_segments("/user/42/"), vec!["user", "42"]);
        assert_eq!(split_segments("//user//42"), vec!["user", "42"]);
        assert!(split_segments("/").is_empty());
    }

    #[test]
    fn test_root_matching() {
        let pattern = RoutePattern::from_path("/");

        assert_eq!(pattern.matches("/"), Some(ParamMap::new()));
        assert_eq!(pattern.matches(""), Some(ParamMap::new()));
        assert!(pattern.matches("/home").is_none());
    }

    #[test]
    fn test_static_route_matching() {
        let pattern = RoutePattern::from_path("/users");

        assert!(pattern.matches("/users").is_some());
        assert!(pattern.matches("/users/").is_some());
        assert!(pattern.matches("/posts").is_none());
        assert!(pattern.matches("/users/123").is_none());
    }

    #[test]
    fn test_dynamic_route_matching() {
        let pattern = RoutePattern::from_path("/users/:id");

        let params = pattern.matches("/users/123").unwrap();
        assert_eq!(params.get("id"), Some(&"123".to_string()));

        assert!(pattern.matches("/users").is_none());
        assert!(pattern.matches("/users/123/posts").is_none());
    }

    #[test]
    fn test_param_values_are_decoded() {
        let pattern = RoutePattern::from_path("/search/:term");

        let params = pattern.matches("/search/hello%20world").unwrap();
        assert_eq!(params.get("term"), Some(&"hello world".to_string()));
    }

    #[test]
    fn test_complex_pattern() {
        let pattern = RoutePattern::from_path("/api/users/:userId/posts/:postId");

        let params = pattern.matches("/api/users/42/posts/7").unwrap();
        assert_eq!(params.get("userId"), Some(&"42".to_string()));
        assert_eq!(params.get("postId"), Some(&"7".to_string()));
        assert_eq!(
            pattern.param_names().collect::<Vec<_>>(),
            vec!["userId", "postId"]
        );
    }

    #[test]
    fn test_overlap_detection() {
        let by_id = RoutePattern::from_path("/user/:id");
        let new_user = RoutePattern::from_path("/user/new");
        let settings = RoutePattern::from_path("/settings/:tab");

        assert!(by_id.overlaps(&new_user));
        assert!(new_user.overlaps(&by_id));
        assert!(!by_id.overlaps(&settings));
        assert!(!by_id.overlaps(&RoutePattern::from_path("/user")));
    }

    #[test]
    fn test_literal_matches_encoded_segment() {
        let pattern = RoutePattern::from_path("/café/:id");

        let params = pattern.matches("/caf%C3%A9/a%2Fb").unwrap();
        assert_eq!(params["id"], "a/b");
        assert!(pattern.matches("/café/1").is_some());
        assert!(pattern.matches("/cafe/1").is_none());
    }
}
