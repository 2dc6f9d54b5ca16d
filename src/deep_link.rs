//! Deep link matching
//!
//! Resolves a URI to a catalog route plus the parameters it carries. Only the
//! URI path takes part in matching, segment by segment as written: scheme and
//! host are left to the platform layer, and the query string is passed
//! through untouched.

#[cfg(feature = "cache")]
use crate::cache::{CacheStats, CachedMatch, MatchCache};
use crate::matcher::split_segments;
use crate::params::{ParamMap, QueryParams};
use crate::route::{RouteCatalog, RouteDefinition};
use crate::trace_log;
#[cfg(feature = "cache")]
use parking_lot::Mutex;
#[cfg(feature = "cache")]
use std::num::NonZeroUsize;
use url::{ParseError, Url};

/// A URI resolved against the route catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDeepLink {
    /// Matched route
    pub route: RouteDefinition,
    /// The URI as it was handed in
    pub uri: String,
    /// Parameters bound by `:name` segments
    pub path_params: ParamMap,
    /// Query string parameters (first value wins for repeated keys)
    pub query_params: ParamMap,
}

/// Matches URIs against an immutable route catalog.
///
/// Routes are tried in declaration order and the first structural match
/// wins, so `/user/:id` declared before `/user/new` captures `new` as an id.
///
/// # Example
///
/// ```
/// use app_navigator::{DeepLinkParser, RouteCatalog, RouteDefinition};
///
/// let catalog = RouteCatalog::new([
///     RouteDefinition::new("home", "/"),
///     RouteDefinition::new("profile", "/user/:id"),
/// ])
/// .unwrap();
/// let parser = DeepLinkParser::new(catalog);
///
/// let link = parser.parse_str("/user/77?tab=posts").unwrap();
/// assert_eq!(link.route.name, "profile");
/// assert_eq!(link.path_params["id"], "77");
/// assert_eq!(link.query_params["tab"], "posts");
///
/// assert!(parser.parse_str("/nonexistent").is_none());
/// ```
#[derive(Debug)]
pub struct DeepLinkParser {
    catalog: RouteCatalog,
    #[cfg(feature = "cache")]
    cache: Option<Mutex<MatchCache>>,
}

impl DeepLinkParser {
    /// Create an uncached parser
    pub fn new(catalog: RouteCatalog) -> Self {
        Self {
            catalog,
            #[cfg(feature = "cache")]
            cache: None,
        }
    }

    /// Create a parser that remembers up to `capacity` resolved paths
    #[cfg(feature = "cache")]
    pub fn with_cache(catalog: RouteCatalog, capacity: NonZeroUsize) -> Self {
        Self {
            catalog,
            cache: Some(Mutex::new(MatchCache::with_capacity(capacity))),
        }
    }

    /// The catalog this parser matches against
    pub fn catalog(&self) -> &RouteCatalog {
        &self.catalog
    }

    /// Cache statistics, if caching is enabled
    #[cfg(feature = "cache")]
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.lock().stats().clone())
    }

    /// Match a bare (percent-encoded) path against the catalog
    pub fn match_path(&self, path: &str) -> Option<(RouteDefinition, ParamMap)> {
        #[cfg(feature = "cache")]
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.lock().get(path) {
                return match cached {
                    CachedMatch::Hit { index, path_params } => {
                        Some((self.catalog.routes()[index].clone(), path_params))
                    }
                    CachedMatch::Miss => None,
                };
            }
        }

        let found = self.find(path);

        #[cfg(feature = "cache")]
        if let Some(cache) = &self.cache {
            let entry = match &found {
                Some((index, path_params)) => CachedMatch::Hit {
                    index: *index,
                    path_params: path_params.clone(),
                },
                None => CachedMatch::Miss,
            };
            cache.lock().insert(path.to_string(), entry);
        }

        found.map(|(index, path_params)| (self.catalog.routes()[index].clone(), path_params))
    }

    fn find(&self, path: &str) -> Option<(usize, ParamMap)> {
        let segments = split_segments(path);

        self.catalog
            .iter()
            .enumerate()
            .find_map(|(index, (route, pattern))| {
                let params = pattern.match_segments(&segments)?;
                trace_log!("Path '{}' matched route '{}'", path, route.name);
                Some((index, params))
            })
    }

    /// Resolve a parsed URI.
    ///
    /// `Url` has already removed dot segments from the path, so links that
    /// may carry `.` or `..` as parameter values should go through
    /// [`parse_str`](Self::parse_str) instead.
    pub fn parse(&self, uri: &Url) -> Option<ParsedDeepLink> {
        self.parse_str(uri.as_str())
    }

    /// Resolve a URI string, absolute (`myapp://host/user/1`) or a bare path
    /// (`/user/1?tab=posts`). Malformed input yields `None`.
    ///
    /// The path is matched exactly as written: dot segments are not resolved,
    /// so `/admin/../user/7` is a four-segment path.
    pub fn parse_str(&self, uri: &str) -> Option<ParsedDeepLink> {
        let (path, query) = split_uri(uri)?;
        let (route, path_params) = self.match_path(path)?;
        let query_params = QueryParams::from_query_string(query).to_param_map();

        Some(ParsedDeepLink {
            route,
            uri: uri.to_string(),
            path_params,
            query_params,
        })
    }
}

/// Split `uri` into its raw path and query.
///
/// Absolute URIs are only checked for well-formedness; the path is sliced
/// from the original text after the scheme and authority.
fn split_uri(uri: &str) -> Option<(&str, &str)> {
    let rest = match Url::parse(uri) {
        Ok(_) => {
            let (_, after_scheme) = uri.split_once(':')?;
            match after_scheme.strip_prefix("//") {
                Some(authority) => authority
                    .find(['/', '?', '#'])
                    .map_or("", |end| &authority[end..]),
                None => after_scheme,
            }
        }
        Err(ParseError::RelativeUrlWithoutBase) => uri,
        Err(error) => {
            trace_log!("Malformed deep link '{}': {}", uri, error);
            return None;
        }
    };

    let rest = rest.split_once('#').map_or(rest, |(before, _)| before);
    Some(rest.split_once('?').unwrap_or((rest, "")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::MapParams;
    use crate::route::build_uri;

    fn catalog() -> RouteCatalog {
        RouteCatalog::new([
            RouteDefinition::new("home", "/"),
            RouteDefinition::new("profile", "/user/:id").requires_auth(),
            RouteDefinition::new("new_user", "/user/new"),
            RouteDefinition::new("post", "/user/:id/posts/:postId"),
        ])
        .unwrap()
    }

    #[test]
    fn test_parse_path_and_query() {
        let parser = DeepLinkParser::new(catalog());
        let link = parser.parse_str("/user/77?tab=posts").unwrap();

        assert_eq!(link.route.name, "profile");
        assert_eq!(link.uri, "/user/77?tab=posts");
        assert_eq!(
            link.path_params,
            ParamMap::from([("id".to_string(), "77".to_string())])
        );
        assert_eq!(
            link.query_params,
            ParamMap::from([("tab".to_string(), "posts".to_string())])
        );
    }

    #[test]
    fn test_parse_absolute_uri_uses_path_only() {
        let parser = DeepLinkParser::new(catalog());
        let url = Url::parse("https://example.com/user/5/posts/9").unwrap();
        let link = parser.parse(&url).unwrap();

        assert_eq!(link.route.name, "post");
        assert_eq!(link.path_params["id"], "5");
        assert_eq!(link.path_params["postId"], "9");
        assert!(link.query_params.is_empty());
    }

    #[test]
    fn test_root_and_trailing_slash() {
        let parser = DeepLinkParser::new(catalog());

        assert_eq!(parser.parse_str("/").unwrap().route.name, "home");
        assert_eq!(parser.parse_str("/user/3/").unwrap().route.name, "profile");
    }

    #[test]
    fn test_first_declared_route_wins() {
        let parser = DeepLinkParser::new(catalog());
        let link = parser.parse_str("/user/new").unwrap();

        assert_eq!(link.route.name, "profile");
        assert_eq!(link.path_params["id"], "new");
    }

    #[test]
    fn test_unmatched_and_malformed() {
        let parser = DeepLinkParser::new(catalog());

        assert!(parser.parse_str("/nonexistent").is_none());
        assert!(parser.parse_str("/user").is_none());
        assert!(parser.parse_str("http://[::1").is_none());
    }

    #[test]
    fn test_round_trip_through_build_uri() {
        let catalog = catalog();
        let profile = catalog.by_name("profile").unwrap().clone();
        let parser = DeepLinkParser::new(catalog);

        let params = MapParams::new().path("id", "42").query("q", "a b&c");
        let uri = build_uri(&profile, &params).unwrap();
        let link = parser.parse_str(&uri).unwrap();

        assert_eq!(link.route, profile);
        assert_eq!(&link.path_params, params.path_params());
        assert_eq!(&link.query_params, params.query_params());
    }

    #[test]
    fn test_dot_segments_are_not_resolved() {
        let parser = DeepLinkParser::new(catalog());

        let link = parser.parse_str("/user/..").unwrap();
        assert_eq!(link.route.name, "profile");
        assert_eq!(link.path_params["id"], "..");

        let link = parser.parse_str("myapp://host/user/.?tab=x").unwrap();
        assert_eq!(link.route.name, "profile");
        assert_eq!(link.path_params["id"], ".");
        assert_eq!(link.query_params["tab"], "x");

        assert_eq!(parser.parse_str("/user/%2E%2E").unwrap().path_params["id"], "..");
        assert!(parser.parse_str("/admin/../user/7").is_none());
        assert!(parser.parse_str("https://example.com/admin/../user/7").is_none());
    }

    #[test]
    fn test_dot_values_round_trip() {
        let catalog = catalog();
        let profile = catalog.by_name("profile").unwrap().clone();
        let parser = DeepLinkParser::new(catalog);

        for value in [".", ".."] {
            let uri = build_uri(&profile, &MapParams::new().path("id", value)).unwrap();
            let link = parser.parse_str(&uri).unwrap();
            assert_eq!(link.route, profile);
            assert_eq!(link.path_params["id"], value);
        }
    }

    #[test]
    fn test_literals_match_decoded_segments() {
        let cafe = RouteDefinition::new("cafe", "/café");
        let page = RouteDefinition::new("page", "/my page/:id");
        let parser = DeepLinkParser::new(RouteCatalog::new([cafe.clone(), page.clone()]).unwrap());

        assert_eq!(parser.parse_str("/café").unwrap().route, cafe);
        assert_eq!(parser.parse_str("/caf%C3%A9").unwrap().route, cafe);
        assert_eq!(parser.parse_str("myapp://host/caf%C3%A9").unwrap().route, cafe);

        let link = parser.parse_str("/my%20page/7").unwrap();
        assert_eq!(link.route, page);
        assert_eq!(link.path_params["id"], "7");
        assert_eq!(parser.parse_str("/my page/7").unwrap().route, page);

        let uri = build_uri(&page, &MapParams::new().path("id", "7")).unwrap();
        assert_eq!(uri, "/my%20page/7");
        assert_eq!(parser.parse_str(&uri).unwrap().route, page);
    }

    #[test]
    fn test_fragment_is_ignored() {
        let parser = DeepLinkParser::new(catalog());
        let link = parser.parse_str("/user/4?tab=a#top").unwrap();

        assert_eq!(link.path_params["id"], "4");
        assert_eq!(link.query_params["tab"], "a");
        assert_eq!(parser.parse_str("myapp://host").unwrap().route.name, "home");
    }

    #[cfg(feature = "cache")]
    #[test]
    fn test_cached_parser() {
        let parser = DeepLinkParser::with_cache(catalog(), NonZeroUsize::new(8).unwrap());

        let first = parser.parse_str("/user/1").unwrap();
        let second = parser.parse_str("/user/1?x=1").unwrap();
        assert_eq!(first.route, second.route);
        assert!(parser.parse_str("/missing").is_none());
        assert!(parser.parse_str("/missing").is_none());

        let stats = parser.cache_stats().unwrap();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
    }

    #[test]
    fn test_parser_without_cache_has_no_stats() {
        let parser = DeepLinkParser::new(catalog());
        #[cfg(feature = "cache")]
        assert!(parser.cache_stats().is_none());
        assert_eq!(parser.catalog().len(), 4);
    }
}
