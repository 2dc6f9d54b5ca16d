//! Navigation events
//!
//! One immutable snapshot per lifecycle transition, handed to observers and
//! published on the event stream.

use crate::params::ParamMap;
use crate::route::RouteDefinition;
use chrono::{DateTime, Utc};

/// Snapshot of a navigation transition
///
/// For started and failed notifications `route` is the destination that was
/// attempted; for completed ones it is the route now on top of the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    /// Route navigated to
    pub route: RouteDefinition,
    /// Route on top of the stack before the transition
    pub previous_route: Option<RouteDefinition>,
    /// Path parameters of `route`
    pub path_params: ParamMap,
    /// Query parameters of `route`
    pub query_params: ParamMap,
    /// Originating URI, when there was one
    pub uri: Option<String>,
    /// When the event was created
    pub timestamp: DateTime<Utc>,
    /// The top entry was swapped rather than pushed
    pub is_replacement: bool,
    /// The transition removed entries from the stack
    pub is_pop: bool,
}

impl NavigationEvent {
    /// Create an event for a push to `route`, stamped with the current time
    pub fn new(route: RouteDefinition, previous_route: Option<RouteDefinition>) -> Self {
        Self {
            route,
            previous_route,
            path_params: ParamMap::new(),
            query_params: ParamMap::new(),
            uri: None,
            timestamp: Utc::now(),
            is_replacement: false,
            is_pop: false,
        }
    }

    /// Attach the resolved parameters
    pub fn with_params(mut self, path_params: ParamMap, query_params: ParamMap) -> Self {
        self.path_params = path_params;
        self.query_params = query_params;
        self
    }

    /// Attach the originating URI
    pub fn with_uri(mut self, uri: Option<String>) -> Self {
        self.uri = uri;
        self
    }

    /// Mark as a replacement of the top entry
    pub fn replacement(mut self) -> Self {
        self.is_replacement = true;
        self
    }

    /// Mark as a pop
    pub fn pop(mut self) -> Self {
        self.is_pop = true;
        self
    }

    /// Whether the transition added a new entry on top of the previous one
    pub fn is_push(&self) -> bool {
        !self.is_replacement && !self.is_pop
    }
}
