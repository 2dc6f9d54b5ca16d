//! The navigation contract
//!
//! [`AppRouter`] is what adapters for concrete UI routers implement and what
//! application code talks to. It is object safe, so `Arc<dyn AppRouter>` can
//! be handed around; the typed result helpers live on [`AppRouterExt`].

use crate::deep_link::ParsedDeepLink;
use crate::error::{ErrorHandler, NavigationError, NavigationResult};
use crate::event::NavigationEvent;
use crate::guards::BoxedGuard;
use crate::observer::SharedObserver;
use crate::params::{ParamMap, SharedParams};
use crate::route::RouteDefinition;
use crate::stack::ResultValue;
use async_trait::async_trait;
use std::any::{type_name, Any};
use tokio::sync::broadcast;

/// Navigation operations every router offers.
///
/// Methods that may run guards are async; the rest act on the stack
/// immediately. Expected failures come back as `Err`, never as panics.
#[async_trait]
pub trait AppRouter: Send + Sync {
    /// Push `route` after its guards allow it
    async fn go_to(&self, route: &RouteDefinition, params: Option<SharedParams>) -> NavigationResult;

    /// Push `route` and wait until its entry is popped.
    ///
    /// Resolves with the value passed to `go_back_with_result`, or fails with
    /// `NavigationCancelled` when the entry leaves the stack without one.
    async fn go_to_and_await_any(
        &self,
        route: &RouteDefinition,
        params: Option<SharedParams>,
    ) -> NavigationResult<ResultValue>;

    /// Resolve `path` against the catalog and push the match
    async fn go_to_path(&self, path: &str) -> NavigationResult;

    /// Swap the top entry for `route` without changing the stack length
    async fn replace_with(&self, route: &RouteDefinition, params: Option<SharedParams>) -> NavigationResult;

    /// Discard the whole stack and make `route` its only entry
    async fn clear_stack_and_go_to(
        &self,
        route: &RouteDefinition,
        params: Option<SharedParams>,
    ) -> NavigationResult;

    /// Pop the top entry; `Ok(false)` when only the root is left
    fn go_back(&self) -> NavigationResult<bool>;

    /// Pop the top entry, handing `value` to whoever awaits it
    fn go_back_with_result_any(&self, value: ResultValue) -> NavigationResult<bool>;

    fn can_go_back(&self) -> bool;

    /// Pop until `predicate` holds for the top route or only the root is
    /// left; returns whether the final top satisfies `predicate`
    fn pop_until(&self, predicate: &dyn Fn(&RouteDefinition) -> bool) -> bool;

    /// Resolve `uri` and navigate to the matched route with its parameters
    async fn handle_deep_link(&self, uri: &str) -> NavigationResult<ParsedDeepLink>;

    /// Make tab `index` active, restoring its stack
    fn switch_to_tab(&self, index: usize) -> NavigationResult;

    /// Top route of tab `index`
    fn current_route_for_tab(&self, index: usize) -> Option<RouteDefinition>;

    /// Top route of the active stack
    fn current_route(&self) -> RouteDefinition;

    fn current_path_params(&self) -> ParamMap;

    fn current_query_params(&self) -> ParamMap;

    fn add_global_guard(&self, guard: BoxedGuard);

    fn add_guard_for_route(&self, route: &RouteDefinition, guard: BoxedGuard);

    fn add_observer(&self, observer: SharedObserver);

    /// Remove an observer by identity
    fn remove_observer(&self, observer: &SharedObserver) -> bool;

    /// Install (or with `None`, remove) the error callback
    fn set_error_handler(&self, handler: Option<ErrorHandler>);

    /// Skip guard evaluation entirely while set
    fn set_bypass_guards(&self, bypass: bool);

    /// Subscribe to completed navigations from now on
    fn events(&self) -> broadcast::Receiver<NavigationEvent>;
}

/// Typed wrappers around the type-erased result calls of [`AppRouter`]
///
/// # Example
///
/// ```
/// use app_navigator::{AppRouter, AppRouterExt, InMemoryRouter, RouteDefinition, RouterConfig};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let home = RouteDefinition::new("home", "/");
/// let picker = RouteDefinition::new("picker", "/pick");
/// let router = InMemoryRouter::new(RouterConfig::new([home.clone(), picker.clone()], home).unwrap());
///
/// let waiting = tokio::spawn({
///     let router = router.clone();
///     async move { router.go_to_and_await::<String>(&picker, None).await }
/// });
/// while router.stack_len() < 2 {
///     tokio::task::yield_now().await;
/// }
///
/// router.go_back_with_result("blue".to_string()).unwrap();
/// assert_eq!(waiting.await.unwrap().unwrap(), "blue");
/// # });
/// ```
#[async_trait]
pub trait AppRouterExt: AppRouter {
    /// Push `route` and wait for a result of type `T`
    async fn go_to_and_await<T: Any + Send>(
        &self,
        route: &RouteDefinition,
        params: Option<SharedParams>,
    ) -> NavigationResult<T> {
        let value = self.go_to_and_await_any(route, params).await?;

        value.downcast::<T>().map(|value| *value).map_err(|_| {
            NavigationError::unknown(
                format!("go_to_and_await '{}'", route.name),
                format!("result is not a {}", type_name::<T>()),
            )
        })
    }

    /// Pop the top entry with a typed result
    fn go_back_with_result<T: Any + Send>(&self, value: T) -> NavigationResult<bool> {
        self.go_back_with_result_any(Box::new(value))
    }
}

impl<R: AppRouter + ?Sized> AppRouterExt for R {}
