//! Router configuration
//!
//! Everything an [`InMemoryRouter`](crate::InMemoryRouter) needs at
//! construction, validated once by [`RouterConfigBuilder::build`].

use crate::error::ConfigError;
use crate::guards::{boxed, BoxedGuard, RouteGuard};
use crate::observer::{EventStream, SharedObserver};
use crate::route::{OverlapPolicy, RouteCatalog, RouteDefinition, ShellRouteDefinition};
use std::fmt;
#[cfg(feature = "cache")]
use std::num::NonZeroUsize;
use std::time::Duration;
use url::Url;

/// Schemes and domains the app answers deep links for.
///
/// Only the platform binding layer consults this; the matcher looks at the
/// URI path alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeepLinkConfig {
    pub schemes: Vec<String>,
    pub domains: Vec<String>,
}

impl DeepLinkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a custom scheme such as `myapp`
    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.schemes.push(scheme.into());
        self
    }

    /// Accept links on an (https) domain
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domains.push(domain.into());
        self
    }

    /// Whether `url` carries one of the configured schemes or domains.
    ///
    /// An empty configuration accepts everything.
    pub fn accepts(&self, url: &Url) -> bool {
        if self.schemes.is_empty() && self.domains.is_empty() {
            return true;
        }

        self.schemes.iter().any(|scheme| scheme == url.scheme())
            || url
                .host_str()
                .is_some_and(|host| self.domains.iter().any(|domain| domain == host))
    }
}

/// Validated router configuration
pub struct RouterConfig {
    pub(crate) catalog: RouteCatalog,
    pub(crate) initial_route: RouteDefinition,
    pub(crate) not_found_route: Option<RouteDefinition>,
    pub(crate) shell: Option<ShellRouteDefinition>,
    pub(crate) global_guards: Vec<BoxedGuard>,
    pub(crate) observers: Vec<SharedObserver>,
    pub(crate) deep_links: DeepLinkConfig,
    pub(crate) guard_timeout: Option<Duration>,
    pub(crate) event_capacity: usize,
    pub(crate) bypass_guards: bool,
    #[cfg(feature = "cache")]
    pub(crate) match_cache: Option<NonZeroUsize>,
}

impl RouterConfig {
    /// Start a configuration
    pub fn builder() -> RouterConfigBuilder {
        RouterConfigBuilder::default()
    }

    /// Shortcut for a catalog plus initial route with every other setting at
    /// its default
    pub fn new(
        routes: impl IntoIterator<Item = RouteDefinition>,
        initial_route: RouteDefinition,
    ) -> Result<Self, ConfigError> {
        Self::builder()
            .routes(routes)
            .initial_route(initial_route)
            .build()
    }

    pub fn catalog(&self) -> &RouteCatalog {
        &self.catalog
    }

    pub fn initial_route(&self) -> &RouteDefinition {
        &self.initial_route
    }

    pub fn not_found_route(&self) -> Option<&RouteDefinition> {
        self.not_found_route.as_ref()
    }

    pub fn shell(&self) -> Option<&ShellRouteDefinition> {
        self.shell.as_ref()
    }

    pub fn deep_links(&self) -> &DeepLinkConfig {
        &self.deep_links
    }

    pub fn guard_timeout(&self) -> Option<Duration> {
        self.guard_timeout
    }

    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }

    pub fn bypass_guards(&self) -> bool {
        self.bypass_guards
    }
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field("routes", &self.catalog.len())
            .field("initial_route", &self.initial_route.name)
            .field(
                "not_found_route",
                &self.not_found_route.as_ref().map(|route| &route.name),
            )
            .field("shell", &self.shell.as_ref().map(|shell| &shell.route.name))
            .field(
                "global_guards",
                &self
                    .global_guards
                    .iter()
                    .map(|guard| guard.name().to_string())
                    .collect::<Vec<_>>(),
            )
            .field("observers", &self.observers.len())
            .field("deep_links", &self.deep_links)
            .field("guard_timeout", &self.guard_timeout)
            .field("event_capacity", &self.event_capacity)
            .field("bypass_guards", &self.bypass_guards)
            .finish()
    }
}

/// Builder for [`RouterConfig`]
///
/// # Example
///
/// ```
/// use app_navigator::{AuthGuard, RouteDefinition, RouterConfig};
/// use std::time::Duration;
///
/// let home = RouteDefinition::new("home", "/");
/// let profile = RouteDefinition::new("profile", "/user/:id").requires_auth();
///
/// let config = RouterConfig::builder()
///     .routes([home.clone(), profile])
///     .initial_route(home)
///     .guard(AuthGuard::new(|| false))
///     .guard_timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
///
/// assert_eq!(config.initial_route().name, "home");
/// ```
pub struct RouterConfigBuilder {
    routes: Vec<RouteDefinition>,
    overlap_policy: OverlapPolicy,
    initial_route: Option<RouteDefinition>,
    not_found_route: Option<RouteDefinition>,
    shell: Option<ShellRouteDefinition>,
    global_guards: Vec<BoxedGuard>,
    observers: Vec<SharedObserver>,
    deep_links: DeepLinkConfig,
    guard_timeout: Option<Duration>,
    event_capacity: usize,
    bypass_guards: bool,
    #[cfg(feature = "cache")]
    match_cache: Option<NonZeroUsize>,
}

impl Default for RouterConfigBuilder {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            overlap_policy: OverlapPolicy::default(),
            initial_route: None,
            not_found_route: None,
            shell: None,
            global_guards: Vec::new(),
            observers: Vec::new(),
            deep_links: DeepLinkConfig::default(),
            guard_timeout: None,
            event_capacity: EventStream::DEFAULT_CAPACITY,
            bypass_guards: false,
            #[cfg(feature = "cache")]
            match_cache: None,
        }
    }
}

impl RouterConfigBuilder {
    /// Append routes to the catalog, in declaration order
    pub fn routes(mut self, routes: impl IntoIterator<Item = RouteDefinition>) -> Self {
        self.routes.extend(routes);
        self
    }

    /// Append one route to the catalog
    pub fn route(mut self, route: RouteDefinition) -> Self {
        self.routes.push(route);
        self
    }

    /// How overlapping templates are treated
    pub fn overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.overlap_policy = policy;
        self
    }

    /// Route the stack starts with
    pub fn initial_route(mut self, route: RouteDefinition) -> Self {
        self.initial_route = Some(route);
        self
    }

    /// Route shown for paths nothing matches
    pub fn not_found_route(mut self, route: RouteDefinition) -> Self {
        self.not_found_route = Some(route);
        self
    }

    /// Enable tab navigation, one stack per child of `shell`
    pub fn shell(mut self, shell: ShellRouteDefinition) -> Self {
        self.shell = Some(shell);
        self
    }

    /// Add a global guard
    pub fn guard<G: RouteGuard>(self, guard: G) -> Self {
        self.boxed_guard(boxed(guard))
    }

    /// Add an already boxed global guard
    pub fn boxed_guard(mut self, guard: BoxedGuard) -> Self {
        self.global_guards.push(guard);
        self
    }

    /// Register an observer from the start
    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn deep_links(mut self, deep_links: DeepLinkConfig) -> Self {
        self.deep_links = deep_links;
        self
    }

    /// Fail a guard that takes longer than `timeout`.
    ///
    /// Timers come from tokio, so navigations driven outside a tokio runtime
    /// fail with `Unknown` while a timeout is set.
    pub fn guard_timeout(mut self, timeout: Duration) -> Self {
        self.guard_timeout = Some(timeout);
        self
    }

    /// Events retained for slow event-stream subscribers
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Start with guard evaluation switched off
    pub fn bypass_guards(mut self, bypass: bool) -> Self {
        self.bypass_guards = bypass;
        self
    }

    /// Cache up to `capacity` path matches
    #[cfg(feature = "cache")]
    pub fn match_cache(mut self, capacity: NonZeroUsize) -> Self {
        self.match_cache = Some(capacity);
        self
    }

    /// Validate and assemble the configuration
    pub fn build(self) -> Result<RouterConfig, ConfigError> {
        let catalog = RouteCatalog::with_policy(self.routes, self.overlap_policy)?;
        let initial_route = self.initial_route.ok_or(ConfigError::MissingInitialRoute)?;

        let require = |route: &RouteDefinition| {
            if catalog.contains(route) {
                Ok(())
            } else {
                Err(ConfigError::UnknownRoute {
                    name: route.name.clone(),
                })
            }
        };

        require(&initial_route)?;
        if let Some(not_found) = &self.not_found_route {
            require(not_found)?;
        }

        if let Some(shell) = &self.shell {
            let invalid = |message: &str| ConfigError::InvalidShell {
                name: shell.route.name.clone(),
                message: message.to_string(),
            };

            if shell.children.is_empty() {
                return Err(invalid("a shell needs at least one child"));
            }
            for child in &shell.children {
                require(child)?;
            }
            if shell.index_of(&initial_route.name).is_none() {
                return Err(invalid("the initial route must be one of the shell's children"));
            }
        }

        Ok(RouterConfig {
            catalog,
            initial_route,
            not_found_route: self.not_found_route,
            shell: self.shell,
            global_guards: self.global_guards,
            observers: self.observers,
            deep_links: self.deep_links,
            guard_timeout: self.guard_timeout,
            event_capacity: self.event_capacity,
            bypass_guards: self.bypass_guards,
            #[cfg(feature = "cache")]
            match_cache: self.match_cache,
        })
    }
}
