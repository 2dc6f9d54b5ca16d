//! # App Navigator
//!
//! A router-agnostic navigation core for apps that need the same navigation
//! rules no matter which UI router ends up drawing the screens:
//!
//! - **Route Catalog** - Named, path-templated routes validated at startup
//! - **Deep Links** - Resolve URIs to routes plus path and query parameters
//! - **Route Guards** - Async allow/redirect/reject checks, global or per route
//! - **Observers** - Started/completed/failed callbacks and a broadcast of completed navigations
//! - **Result Awaiting** - Push a route and await the value it is popped with
//! - **Tabs** - One stack per tab of a shell route
//! - **Error Model** - A closed [`NavigationError`] taxonomy returned, never thrown
//!
//! # Quick Start
//!
//! ```
//! use app_navigator::*;
//!
//! # pollster::block_on(async {
//! let home = RouteDefinition::new("home", "/");
//! let profile = RouteDefinition::new("profile", "/user/:id").requires_auth();
//!
//! let config = RouterConfig::builder()
//!     .routes([home.clone(), profile.clone()])
//!     .initial_route(home.clone())
//!     .guard(AuthGuard::new(|| false))
//!     .build()
//!     .unwrap();
//! let router = InMemoryRouter::new(config);
//!
//! let result = router.go_to(&profile, None).await;
//! assert!(result.is_failure_of(ErrorKind::GuardRejected));
//! assert_eq!(router.current_route(), home);
//! # });
//! ```
//!
//! # Deep Links
//!
//! ```
//! use app_navigator::*;
//!
//! # pollster::block_on(async {
//! let home = RouteDefinition::new("home", "/");
//! let profile = RouteDefinition::new("profile", "/user/:id");
//! let router = InMemoryRouter::new(RouterConfig::new([home.clone(), profile], home).unwrap());
//!
//! let link = router.handle_deep_link("/user/77?tab=posts").await.unwrap();
//! assert_eq!(link.route.name, "profile");
//! assert_eq!(router.current_query_params()["tab"], "posts");
//! # });
//! ```
//!
//! # Feature Flags
//!
//! - `log` (default) - Uses the standard `log` crate for logging
//! - `tracing` - Uses the `tracing` crate for structured logging (mutually exclusive with `log`)
//! - `cache` (default) - LRU cache for deep link matches

#![doc(html_root_url = "https://docs.rs/app-navigator/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
// Lints are configured in Cargo.toml [lints] section

// Logging abstraction
pub mod logging;

// Cache (optional)
#[cfg(feature = "cache")]
pub mod cache;

// Routes and matching
pub mod deep_link;
pub mod matcher;
pub mod params;
pub mod route;

// Error handling
pub mod error;

// Guards
pub mod guards;

// Observers and events
pub mod event;
pub mod observer;

// Navigation
pub mod config;
pub mod memory;
pub mod router;
pub mod stack;

// Re-export main types for convenient access
#[cfg(feature = "cache")]
pub use cache::{CacheStats, MatchCache};
pub use config::{DeepLinkConfig, RouterConfig, RouterConfigBuilder};
pub use deep_link::{DeepLinkParser, ParsedDeepLink};
pub use error::{
    ConfigError, ErrorHandler, ErrorKind, NavigationError, NavigationResult, NavigationResultExt,
};
pub use event::NavigationEvent;
pub use guards::{
    boxed, evaluate_guards, guard_fn, AlwaysAllow, AlwaysReject, AuthGuard, BoxedGuard,
    EvaluationOptions, FnGuard, GuardContext, GuardOutcome, GuardRegistry, GuardResult, NotGuard,
    RouteGuard,
};
pub use matcher::RoutePattern;
pub use memory::{InMemoryRouter, MAX_REDIRECTS};
pub use observer::{EventStream, LoggingObserver, NavigationObserver, ObserverList, SharedObserver};
pub use params::{
    check_path_params, shared_params, FromRouteParams, MapParams, NoParams, ParamMap, QueryParams,
    RouteParams, SharedParams,
};
pub use route::{
    build_path, build_uri, validate_route_path, OverlapPolicy, RouteCatalog, RouteDefinition,
    ShellRouteDefinition,
};
pub use router::{AppRouter, AppRouterExt};
pub use stack::{NavigationStack, ResultValue, StackEntry, TabStacks};
