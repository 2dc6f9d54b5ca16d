//! Route definitions and the route catalog

use crate::error::{ConfigError, NavigationResult};
use crate::matcher::{RoutePattern, Segment};
use crate::params::{check_path_params, encode_uri_component, QueryParams, RouteParams};
use crate::warn_log;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

// ============================================================================
// RouteDefinition
// ============================================================================

/// A named, path-templated navigable destination.
///
/// Equality and hashing consider only `(path, name)`.
///
/// # Example
///
/// ```
/// use app_navigator::RouteDefinition;
///
/// let profile = RouteDefinition::new("profile", "/user/:id")
///     .requires_auth()
///     .meta("title", "Profile");
///
/// assert_eq!(profile.param_names(), vec!["id".to_string()]);
/// assert!(profile.requires_auth);
/// ```
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    /// Path template with `:name` placeholders
    pub path: String,
    /// Unique key within the catalog
    pub name: String,
    /// Whether authentication guards should protect this route
    pub requires_auth: bool,
    /// Opaque metadata
    pub metadata: HashMap<String, String>,
}

impl RouteDefinition {
    /// Create a route that does not require authentication
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            requires_auth: false,
            metadata: HashMap::new(),
        }
    }

    /// Mark the route as requiring authentication
    pub fn requires_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Add metadata
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Parsed template
    pub fn pattern(&self) -> RoutePattern {
        RoutePattern::from_path(&self.path)
    }

    /// Parameter names declared by the template, in order
    pub fn param_names(&self) -> Vec<String> {
        self.pattern().param_names().map(str::to_string).collect()
    }
}

impl PartialEq for RouteDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.name == other.name
    }
}

impl Eq for RouteDefinition {}

impl Hash for RouteDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.name.hash(state);
    }
}

/// A route hosting a persistent frame (a tab bar, say) around child routes.
///
/// Each child is the root of one tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRouteDefinition {
    pub route: RouteDefinition,
    pub children: Vec<RouteDefinition>,
}

impl ShellRouteDefinition {
    pub fn new(route: RouteDefinition, children: Vec<RouteDefinition>) -> Self {
        Self { route, children }
    }

    /// Child route for a tab index
    pub fn child(&self, index: usize) -> Option<&RouteDefinition> {
        self.children.get(index)
    }

    /// Tab index of the child named `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|child| child.name == name)
    }
}

// ============================================================================
// Route Validation
// ============================================================================

/// Validate a route path template
///
/// # Validation Rules
///
/// - No consecutive slashes ('//')
/// - Trailing slashes are allowed (empty segments are ignored when matching)
/// - Parameter names must be alphanumeric/underscore and not empty
/// - No duplicate parameter names
pub fn validate_route_path(path: &str) -> Result<(), String> {
    if path.contains("//") {
        return Err("Route path cannot contain consecutive slashes".to_string());
    }

    let mut param_names = HashSet::new();
    for segment in path.split('/') {
        if let Some(param) = segment.strip_prefix(':') {
            if param.is_empty() {
                return Err("Route parameter name cannot be empty".to_string());
            }

            if !param.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(format!(
                    "Route parameter '{}' must contain only alphanumeric characters and underscores",
                    param
                ));
            }

            if !param_names.insert(param) {
                return Err(format!("Duplicate route parameter: '{}'", param));
            }
        }
    }

    Ok(())
}

// ============================================================================
// RouteCatalog
// ============================================================================

/// How the catalog treats templates that can match the same path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverlapPolicy {
    /// Log each overlap; the earlier declaration wins at match time
    #[default]
    Warn,
    /// Refuse to build the catalog
    Deny,
}

/// Ordered, validated set of route definitions.
///
/// Declaration order matters: the deep link matcher returns the first route
/// whose template fits.
#[derive(Debug, Clone, Default)]
pub struct RouteCatalog {
    routes: Vec<RouteDefinition>,
    patterns: Vec<RoutePattern>,
    overlaps: Vec<(String, String)>,
}

impl RouteCatalog {
    /// Build a catalog, warning about overlapping templates
    pub fn new(routes: impl IntoIterator<Item = RouteDefinition>) -> Result<Self, ConfigError> {
        Self::with_policy(routes, OverlapPolicy::Warn)
    }

    /// Build a catalog with an explicit overlap policy
    pub fn with_policy(
        routes: impl IntoIterator<Item = RouteDefinition>,
        policy: OverlapPolicy,
    ) -> Result<Self, ConfigError> {
        let routes: Vec<RouteDefinition> = routes.into_iter().collect();

        let mut names = HashSet::new();
        for route in &routes {
            validate_route_path(&route.path).map_err(|message| ConfigError::InvalidPath {
                path: route.path.clone(),
                message,
            })?;
            if !names.insert(route.name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    name: route.name.clone(),
                });
            }
        }

        let patterns: Vec<RoutePattern> = routes.iter().map(RouteDefinition::pattern).collect();

        let mut overlaps = Vec::new();
        for (i, first) in patterns.iter().enumerate() {
            for (j, second) in patterns.iter().enumerate().skip(i + 1) {
                if first.overlaps(second) {
                    overlaps.push((routes[i].name.clone(), routes[j].name.clone()));
                }
            }
        }

        for (first, second) in &overlaps {
            if policy == OverlapPolicy::Deny {
                return Err(ConfigError::OverlappingRoutes {
                    first: first.clone(),
                    second: second.clone(),
                });
            }
            warn_log!(
                "Route '{}' overlaps '{}'; '{}' wins because it is declared first",
                first,
                second,
                first
            );
        }

        Ok(Self {
            routes,
            patterns,
            overlaps,
        })
    }

    /// Routes in declaration order
    pub fn routes(&self) -> &[RouteDefinition] {
        &self.routes
    }

    /// Iterate routes together with their parsed templates
    pub fn iter(&self) -> impl Iterator<Item = (&RouteDefinition, &RoutePattern)> {
        self.routes.iter().zip(&self.patterns)
    }

    /// Look up a route by name
    pub fn by_name(&self, name: &str) -> Option<&RouteDefinition> {
        self.routes.iter().find(|route| route.name == name)
    }

    /// Check if a route is part of the catalog
    pub fn contains(&self, route: &RouteDefinition) -> bool {
        self.routes.contains(route)
    }

    /// Pairs of route names whose templates overlap, earlier declaration first
    pub fn overlaps(&self) -> &[(String, String)] {
        &self.overlaps
    }

    /// Generate a URI for a named route
    pub fn url_for(&self, name: &str, params: &dyn RouteParams) -> Option<NavigationResult<String>> {
        self.by_name(name).map(|route| build_uri(route, params))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

// ============================================================================
// Path building
// ============================================================================

/// Substitute path parameters into the route template.
///
/// Every declared parameter must be bound and no undeclared key may appear.
/// Values are percent-encoded.
pub fn build_path(route: &RouteDefinition, params: &dyn RouteParams) -> NavigationResult<String> {
    let path_params = params.to_path_params();
    check_path_params(route, &path_params)?;

    let segments: Vec<String> = route
        .pattern()
        .segments
        .iter()
        .map(|segment| match segment {
            Segment::Static(text) => encode_uri_component(text),
            Segment::Param(name) => encode_uri_component(&path_params[name]),
        })
        .collect();

    Ok(format!("/{}", segments.join("/")))
}

/// Build the full URI (`path?query`) for a route.
///
/// # Example
///
/// ```
/// use app_navigator::{build_uri, MapParams, RouteDefinition};
///
/// let profile = RouteDefinition::new("profile", "/user/:id");
/// let params = MapParams::new().path("id", "42").query("tab", "posts");
///
/// assert_eq!(build_uri(&profile, &params).unwrap(), "/user/42?tab=posts");
/// ```
pub fn build_uri(route: &RouteDefinition, params: &dyn RouteParams) -> NavigationResult<String> {
    let path = build_path(route, params)?;
    let query = QueryParams::from(&params.to_query_params());

    if query.is_empty() {
        Ok(path)
    } else {
        Ok(format!("{}?{}", path, query.to_query_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{MapParams, NoParams};

    fn catalog() -> RouteCatalog {
        RouteCatalog::new([
            RouteDefinition::new("home", "/"),
            RouteDefinition::new("profile", "/user/:id").requires_auth(),
            RouteDefinition::new("settings", "/settings"),
        ])
        .unwrap()
    }

    #[test]
    fn test_equality_ignores_auth_and_metadata() {
        let a = RouteDefinition::new("profile", "/user/:id");
        let b = RouteDefinition::new("profile", "/user/:id")
            .requires_auth()
            .meta("title", "Profile");
        let c = RouteDefinition::new("profile", "/users/:id");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<RouteDefinition> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_validate_route_path() {
        assert!(validate_route_path("/").is_ok());
        assert!(validate_route_path("/users/:id/").is_ok());
        assert!(validate_route_path("/users//x").is_err());
        assert!(validate_route_path("/users/:").is_err());
        assert!(validate_route_path("/users/:id-x").is_err());
        assert_eq!(
            validate_route_path("/a/:id/b/:id"),
            Err("Duplicate route parameter: 'id'".to_string())
        );
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = catalog();

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.by_name("settings").unwrap().path, "/settings");
        assert!(catalog.by_name("missing").is_none());
        assert!(catalog.contains(&RouteDefinition::new("home", "/")));
        assert!(catalog.overlaps().is_empty());
    }

    #[test]
    fn test_catalog_rejects_duplicate_names() {
        let result = RouteCatalog::new([
            RouteDefinition::new("home", "/"),
            RouteDefinition::new("home", "/home"),
        ]);
        assert_eq!(
            result.unwrap_err(),
            ConfigError::DuplicateName {
                name: "home".to_string()
            }
        );
    }

    #[test]
    fn test_catalog_rejects_invalid_paths() {
        let result = RouteCatalog::new([RouteDefinition::new("bad", "/x//y")]);
        assert!(matches!(result, Err(ConfigError::InvalidPath { .. })));
    }

    #[test]
    fn test_catalog_overlap_policy() {
        let routes = [
            RouteDefinition::new("user", "/user/:id"),
            RouteDefinition::new("new_user", "/user/new"),
        ];

        let catalog = RouteCatalog::new(routes.clone()).unwrap();
        assert_eq!(
            catalog.overlaps(),
            &[("user".to_string(), "new_user".to_string())]
        );

        let denied = RouteCatalog::with_policy(routes, OverlapPolicy::Deny);
        assert!(matches!(
            denied,
            Err(ConfigError::OverlappingRoutes { .. })
        ));
    }

    #[test]
    fn test_build_path_and_uri() {
        let catalog = catalog();
        let profile = catalog.by_name("profile").unwrap();

        let params = MapParams::new().path("id", "a b").query("tab", "posts");
        assert_eq!(build_path(profile, &params).unwrap(), "/user/a%20b");
        assert_eq!(build_uri(profile, &params).unwrap(), "/user/a%20b?tab=posts");

        let home = catalog.by_name("home").unwrap();
        assert_eq!(build_uri(home, &NoParams).unwrap(), "/");

        assert!(build_path(profile, &NoParams).is_err());
    }

    #[test]
    fn test_url_for() {
        let catalog = catalog();
        let params = MapParams::new().path("id", "42");

        assert_eq!(
            catalog.url_for("profile", &params).unwrap().unwrap(),
            "/user/42"
        );
        assert!(catalog.url_for("missing", &params).is_none());
    }

    #[test]
    fn test_shell_route() {
        let shell = ShellRouteDefinition::new(
            RouteDefinition::new("shell", "/tabs"),
            vec![
                RouteDefinition::new("feed", "/feed"),
                RouteDefinition::new("inbox", "/inbox"),
            ],
        );

        assert_eq!(shell.index_of("inbox"), Some(1));
        assert_eq!(shell.child(0).unwrap().name, "feed");
        assert!(shell.child(2).is_none());
    }
}
