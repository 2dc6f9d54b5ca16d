//! Route parameters and query string handling
//!
//! Application code hands the router a [`RouteParams`] value; the router only
//! ever sees the two string maps it produces. Path parameters fill the `:name`
//! slots of the destination template, query parameters become `?k=v` pairs.

use crate::error::{NavigationError, NavigationResult};
use crate::route::RouteDefinition;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// Raw string key/value pairs for a path or a query string
pub type ParamMap = HashMap<String, String>;

/// Conversion from application parameters to raw path and query maps.
///
/// Implement this for typed parameter structs; [`NoParams`] and [`MapParams`]
/// cover the untyped cases.
///
/// # Example
///
/// ```
/// use app_navigator::{ParamMap, RouteParams};
///
/// #[derive(Debug)]
/// struct ProfileParams {
///     user_id: u64,
///     tab: Option<String>,
/// }
///
/// impl RouteParams for ProfileParams {
///     fn to_path_params(&self) -> ParamMap {
///         ParamMap::from([("id".to_string(), self.user_id.to_string())])
///     }
///
///     fn to_query_params(&self) -> ParamMap {
///         self.tab
///             .iter()
///             .map(|tab| ("tab".to_string(), tab.clone()))
///             .collect()
///     }
/// }
///
/// let params = ProfileParams { user_id: 42, tab: None };
/// assert_eq!(params.to_path_params().get("id"), Some(&"42".to_string()));
/// assert!(params.to_query_params().is_empty());
/// ```
pub trait RouteParams: Debug + Send + Sync {
    /// Values substituted into the `:name` slots of the template
    fn to_path_params(&self) -> ParamMap;

    /// Values appended as the query string
    fn to_query_params(&self) -> ParamMap {
        ParamMap::new()
    }
}

/// Parameters as the router stores and forwards them
pub type SharedParams = Arc<dyn RouteParams>;

/// Wrap parameters for a navigation call
///
/// ```
/// use app_navigator::{shared_params, MapParams};
///
/// let params = shared_params(MapParams::new().path("id", "7"));
/// assert_eq!(params.unwrap().to_path_params()["id"], "7");
/// ```
pub fn shared_params(params: impl RouteParams + 'static) -> Option<SharedParams> {
    Some(Arc::new(params))
}

/// Reverse direction of [`RouteParams`]: rebuild typed parameters from the
/// maps extracted out of a path or deep link.
pub trait FromRouteParams: Sized {
    fn from_route_params(path: &ParamMap, query: &ParamMap) -> NavigationResult<Self>;
}

/// Parameters for routes that take none
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoParams;

impl RouteParams for NoParams {
    fn to_path_params(&self) -> ParamMap {
        ParamMap::new()
    }
}

/// Map-based route parameters
///
/// # Example
///
/// ```
/// use app_navigator::{MapParams, RouteParams};
///
/// let params = MapParams::new().path("id", "123").query("tab", "posts");
///
/// assert_eq!(params.get("id"), Some(&"123".to_string()));
/// assert_eq!(params.get_as::<i32>("id"), Some(123));
/// assert_eq!(params.to_query_params().get("tab"), Some(&"posts".to_string()));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapParams {
    path: ParamMap,
    query: ParamMap,
}

impl MapParams {
    /// Create new empty params
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from already-split maps
    pub fn from_maps(path: ParamMap, query: ParamMap) -> Self {
        Self { path, query }
    }

    /// Add a path parameter
    pub fn path(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Get a path parameter value
    pub fn get(&self, key: &str) -> Option<&String> {
        self.path.get(key)
    }

    /// Get a query parameter value
    pub fn get_query(&self, key: &str) -> Option<&String> {
        self.query.get(key)
    }

    /// Get a path parameter and parse it as a specific type
    ///
    /// Returns `None` if the parameter doesn't exist or cannot be parsed.
    pub fn get_as<T>(&self, key: &str) -> Option<T>
    where
        T: std::str::FromStr,
    {
        self.path.get(key)?.parse().ok()
    }

    /// Path parameters
    pub fn path_params(&self) -> &ParamMap {
        &self.path
    }

    /// Query parameters
    pub fn query_params(&self) -> &ParamMap {
        &self.query
    }

    /// Check if both maps are empty
    pub fn is_empty(&self) -> bool {
        self.path.is_empty() && self.query.is_empty()
    }
}

impl RouteParams for MapParams {
    fn to_path_params(&self) -> ParamMap {
        self.path.clone()
    }

    fn to_query_params(&self) -> ParamMap {
        self.query.clone()
    }
}

impl FromRouteParams for MapParams {
    fn from_route_params(path: &ParamMap, query: &ParamMap) -> NavigationResult<Self> {
        Ok(Self::from_maps(path.clone(), query.clone()))
    }
}

/// Verify that `params` binds exactly the parameters `route` declares.
///
/// Undeclared path keys and missing bindings both yield
/// [`NavigationError::InvalidParams`].
pub fn check_path_params(route: &RouteDefinition, params: &ParamMap) -> NavigationResult<()> {
    let declared = route.param_names();

    if let Some(extra) = params
        .keys()
        .find(|key| !declared.iter().any(|name| name == *key))
    {
        return Err(NavigationError::invalid_params(
            &route.name,
            format!("'{}' is not a parameter of '{}'", extra, route.path),
        ));
    }

    if let Some(missing) = declared.iter().find(|name| !params.contains_key(*name)) {
        return Err(NavigationError::invalid_params(
            &route.name,
            format!("missing value for ':{}'", missing),
        ));
    }

    Ok(())
}

// ============================================================================
// Query Parameters
// ============================================================================

/// Query parameters parsed from URL query string
///
/// Supports multiple values for the same key.
///
/// # Example
///
/// ```
/// use app_navigator::QueryParams;
///
/// let query = QueryParams::from_query_string("page=1&sort=name&tag=rust&tag=ui");
///
/// assert_eq!(query.get("page"), Some(&"1".to_string()));
/// assert_eq!(query.get_as::<i32>("page"), Some(1));
/// assert_eq!(query.get_all("tag").unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: HashMap<String, Vec<String>>,
}

impl QueryParams {
    /// Create new empty query params
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from query string (without the leading `?`)
    pub fn from_query_string(query: &str) -> Self {
        let mut params = HashMap::new();

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            params
                .entry(decode_query_component(key))
                .or_insert_with(Vec::new)
                .push(decode_query_component(value));
        }

        Self { params }
    }

    /// Get first value for a parameter
    pub fn get(&self, key: &str) -> Option<&String> {
        self.params.get(key)?.first()
    }

    /// Get all values for a parameter
    pub fn get_all(&self, key: &str) -> Option<&Vec<String>> {
        self.params.get(key)
    }

    /// Get parameter as a specific type
    ///
    /// Returns the first value parsed as type T.
    pub fn get_as<T>(&self, key: &str) -> Option<T>
    where
        T: std::str::FromStr,
    {
        self.get(key)?.parse().ok()
    }

    /// Insert a parameter
    ///
    /// If the key already exists, the value is appended to the list.
    pub fn insert(&mut self, key: String, value: String) {
        self.params.entry(key).or_default().push(value);
    }

    /// Check if parameter exists
    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// Collapse to a single-valued map, keeping the first value of each key
    pub fn to_param_map(&self) -> ParamMap {
        self.params
            .iter()
            .filter_map(|(key, values)| Some((key.clone(), values.first()?.clone())))
            .collect()
    }

    /// Convert to query string, keys sorted for a stable output
    pub fn to_query_string(&self) -> String {
        let mut keys: Vec<&String> = self.params.keys().collect();
        keys.sort();

        keys.into_iter()
            .flat_map(|key| {
                self.params[key].iter().map(move |value| {
                    format!(
                        "{}={}",
                        encode_uri_component(key),
                        encode_uri_component(value)
                    )
                })
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Check if parameters are empty
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Get number of unique parameter keys
    pub fn len(&self) -> usize {
        self.params.len()
    }
}

impl From<&ParamMap> for QueryParams {
    fn from(map: &ParamMap) -> Self {
        let mut query = QueryParams::new();
        for (key, value) in map {
            query.insert(key.clone(), value.clone());
        }
        query
    }
}

// Unreserved characters per RFC 3986 stay as-is.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode a path segment or query component
pub fn encode_uri_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

/// Percent-decode a path segment; invalid UTF-8 is replaced lossily
pub fn decode_uri_component(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Query components additionally treat `+` as a space
fn decode_query_component(s: &str) -> String {
    decode_uri_component(&s.replace('+', " "))
}

// ============================================================================
// Tests
// ============================================================================
