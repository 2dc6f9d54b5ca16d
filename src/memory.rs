//! In-memory navigator
//!
//! [`InMemoryRouter`] keeps the navigation stacks itself and implements every
//! [`AppRouter`] operation against them. It backs tests and headless use, and
//! it is the reference for how adapters drive guards, observers and pending
//! results.

use crate::config::{DeepLinkConfig, RouterConfig};
use crate::deep_link::{DeepLinkParser, ParsedDeepLink};
use crate::error::{ErrorHandler, NavigationError, NavigationResult};
use crate::event::NavigationEvent;
use crate::guards::{evaluate_guards, panic_message, BoxedGuard, EvaluationOptions, GuardContext, GuardOutcome, GuardRegistry};
use crate::observer::{EventStream, ObserverList, SharedObserver};
use crate::params::{MapParams, ParamMap, SharedParams};
use crate::route::{RouteCatalog, RouteDefinition, ShellRouteDefinition};
use crate::router::AppRouter;
use crate::stack::{NavigationStack, PendingResult, ResultValue, StackEntry, TabStacks};
use crate::{debug_log, error_log, info_log, warn_log};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Redirect chains longer than this are treated as a loop
pub const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Push,
    Replace,
    Clear,
}

impl Mode {
    fn label(self) -> &'static str {
        match self {
            Mode::Push => "go_to",
            Mode::Replace => "replace_with",
            Mode::Clear => "clear_stack_and_go_to",
        }
    }
}

/// One navigation attempt in flight
struct Request {
    route: RouteDefinition,
    params: Option<SharedParams>,
    path_params: ParamMap,
    query_params: ParamMap,
    uri: Option<String>,
    mode: Mode,
    pending: Option<PendingResult>,
}

impl Request {
    fn new(route: RouteDefinition, params: Option<SharedParams>, mode: Mode) -> Self {
        let (path_params, query_params) = params
            .as_ref()
            .map(|params| (params.to_path_params(), params.to_query_params()))
            .unwrap_or_default();

        Self {
            route,
            params,
            path_params,
            query_params,
            uri: None,
            mode,
            pending: None,
        }
    }

    fn with_uri(mut self, uri: &str) -> Self {
        self.uri = Some(uri.to_string());
        self
    }

    fn event(&self, previous: RouteDefinition) -> NavigationEvent {
        let event = NavigationEvent::new(self.route.clone(), Some(previous))
            .with_params(self.path_params.clone(), self.query_params.clone())
            .with_uri(self.uri.clone());

        match self.mode {
            Mode::Push => event,
            Mode::Replace | Mode::Clear => event.replacement(),
        }
    }

    fn context(&self, current: RouteDefinition) -> GuardContext {
        GuardContext {
            destination: self.route.clone(),
            params: self.params.clone(),
            current_route: Some(current),
            path_params: self.path_params.clone(),
            query_params: self.query_params.clone(),
            uri: self.uri.clone(),
        }
    }

    /// Stack entry for this request, taking over its pending handle
    fn take_entry(&mut self) -> StackEntry {
        let entry = StackEntry::new(self.route.clone())
            .with_params(self.path_params.clone(), self.query_params.clone())
            .with_uri(self.uri.clone());

        match self.pending.take() {
            Some(pending) => entry.with_pending(pending),
            None => entry,
        }
    }
}

enum Attempt {
    Finished(NavigationResult),
    Redirected { error: NavigationError, next: Request },
}

/// Mutable router state, only touched while the lock is held
struct State {
    tabs: TabStacks,
    guards: GuardRegistry,
    observers: ObserverList,
    error_handler: Option<ErrorHandler>,
    bypass_guards: bool,
    cancel: CancellationToken,
}

struct Shared {
    parser: DeepLinkParser,
    not_found_route: Option<RouteDefinition>,
    shell: Option<ShellRouteDefinition>,
    deep_links: DeepLinkConfig,
    guard_timeout: Option<Duration>,
    events: EventStream,
    state: Mutex<State>,
}

/// Navigator that owns its stacks in memory.
///
/// Clones share state, so one task can await a result while another pops
/// it. The state lock is never held across an `.await`, and observers, guards
/// and the error handler run outside it, so callbacks may call back into the
/// router.
///
/// # Example
///
/// ```
/// use app_navigator::{shared_params, AppRouter, InMemoryRouter, MapParams, RouteDefinition, RouterConfig};
///
/// # pollster::block_on(async {
/// let home = RouteDefinition::new("home", "/");
/// let profile = RouteDefinition::new("profile", "/user/:id");
/// let router = InMemoryRouter::new(RouterConfig::new([home, profile.clone()], RouteDefinition::new("home", "/")).unwrap());
///
/// router
///     .go_to(&profile, shared_params(MapParams::new().path("id", "123")))
///     .await
///     .unwrap();
///
/// assert_eq!(router.current_route(), profile);
/// assert_eq!(router.current_path_params()["id"], "123");
/// assert_eq!(router.stack_len(), 2);
/// # });
/// ```
#[derive(Clone)]
pub struct InMemoryRouter {
    shared: Arc<Shared>,
}

impl InMemoryRouter {
    /// Create a router from a validated configuration
    pub fn new(config: RouterConfig) -> Self {
        let initial_route = config.initial_route;

        let tabs = config
            .shell
            .as_ref()
            .and_then(|shell| {
                let active = shell.index_of(&initial_route.name)?;
                let roots = shell.children.iter().cloned().map(StackEntry::new).collect();
                TabStacks::from_roots(roots, active)
            })
            .unwrap_or_else(|| TabStacks::single(NavigationStack::new(StackEntry::new(initial_route.clone()))));

        let mut guards = GuardRegistry::new();
        for guard in config.global_guards {
            guards.add_global(guard);
        }

        let mut observers = ObserverList::new();
        for observer in config.observers {
            observers.add(observer);
        }

        #[cfg(feature = "cache")]
        let parser = match config.match_cache {
            Some(capacity) => DeepLinkParser::with_cache(config.catalog, capacity),
            None => DeepLinkParser::new(config.catalog),
        };
        #[cfg(not(feature = "cache"))]
        let parser = DeepLinkParser::new(config.catalog);

        info_log!(
            "Router ready: {} route(s), initial '{}', {} tab(s)",
            parser.catalog().len(),
            initial_route.name,
            tabs.len()
        );

        Self {
            shared: Arc::new(Shared {
                parser,
                not_found_route: config.not_found_route,
                shell: config.shell,
                deep_links: config.deep_links,
                guard_timeout: config.guard_timeout,
                events: EventStream::new(config.event_capacity),
                state: Mutex::new(State {
                    tabs,
                    guards,
                    observers,
                    error_handler: None,
                    bypass_guards: config.bypass_guards,
                    cancel: CancellationToken::new(),
                }),
            }),
        }
    }

    pub fn catalog(&self) -> &RouteCatalog {
        self.shared.parser.catalog()
    }

    /// Deep link schemes and domains for the platform layer
    pub fn deep_links(&self) -> &DeepLinkConfig {
        &self.shared.deep_links
    }

    /// Length of the active stack
    pub fn stack_len(&self) -> usize {
        self.shared.state.lock().tabs.active().len()
    }

    /// Routes of the active stack, root first
    pub fn stack_routes(&self) -> Vec<RouteDefinition> {
        self.shared.state.lock().tabs.active().routes()
    }

    /// Index of the active tab (0 without a shell)
    pub fn active_tab(&self) -> usize {
        self.shared.state.lock().tabs.active_index()
    }

    pub fn tab_count(&self) -> usize {
        self.shared.state.lock().tabs.len()
    }

    /// Drop every guard registered for `route`
    pub fn remove_guards_for_route(&self, route: &RouteDefinition) -> usize {
        self.shared.state.lock().guards.remove_for_route(route)
    }

    /// Drop every registered guard
    pub fn clear_guards(&self) {
        self.shared.state.lock().guards.clear();
    }

    /// Cancel every guard pipeline currently running.
    ///
    /// Affected navigations fail with `NavigationCancelled`; later ones are
    /// unaffected.
    pub fn cancel_in_flight(&self) {
        let mut state = self.shared.state.lock();
        debug_log!("Cancelling in-flight navigations");
        state.cancel.cancel();
        state.cancel = CancellationToken::new();
    }

    async fn navigate(&self, mut request: Request) -> NavigationResult {
        let mut rejection = None;

        for _ in 0..=MAX_REDIRECTS {
            match self.attempt(request).await {
                Attempt::Finished(result) => {
                    return match (result, rejection) {
                        (Ok(()), Some(error)) => Err(error),
                        (result, _) => result,
                    };
                }
                Attempt::Redirected { error, next } => {
                    rejection.get_or_insert(error);
                    request = next;
                }
            }
        }

        let error = NavigationError::unknown(
            request.mode.label(),
            format!(
                "more than {} redirects, stopped before '{}'",
                MAX_REDIRECTS, request.route.name
            ),
        );
        error_log!("{}", error);
        Err(self.refuse(&request, error))
    }

    /// Fail a request that never reaches its guards, with a matching
    /// started/failed pair for observers
    fn refuse(&self, request: &Request, error: NavigationError) -> NavigationError {
        let (observers, current) = self.snapshot();
        let started = request.event(current);
        observers.notify_started(&started);
        observers.notify_failed(&started, &error);
        self.fail(error, Some(&request.route))
    }

    async fn attempt(&self, request: Request) -> Attempt {
        if !self.catalog().contains(&request.route) {
            let error = NavigationError::RouteNotFound {
                path: request.route.path.clone(),
            };
            warn_log!("{}", error);
            return Attempt::Finished(Err(self.refuse(&request, error)));
        }

        let (observers, guards, options, current) = {
            let state = self.shared.state.lock();
            (
                state.observers.clone(),
                state.guards.guards_for(&request.route),
                EvaluationOptions {
                    bypass: state.bypass_guards,
                    timeout: self.shared.guard_timeout,
                    cancel: state.cancel.clone(),
                },
                state.tabs.active().top().route.clone(),
            )
        };

        debug_log!("{} '{}'", request.mode.label(), request.route.name);
        let started = request.event(current.clone());
        observers.notify_started(&started);

        let outcome = evaluate_guards(&guards, &request.context(current), &options).await;

        let Some(error) = outcome.to_error(&request.route) else {
            self.commit(request);
            return Attempt::Finished(Ok(()));
        };

        warn_log!("{}", error);
        observers.notify_failed(&started, &error);
        let error = self.fail(error, Some(&request.route));

        match outcome {
            GuardOutcome::Redirect { to, params, .. } => Attempt::Redirected {
                error,
                next: Request::new(to, params, request.mode),
            },
            _ => Attempt::Finished(Err(error)),
        }
    }

    /// Apply an allowed request to the active stack as it is now
    fn commit(&self, mut request: Request) {
        let entry = request.take_entry();

        let (discarded, previous, observers) = {
            let mut state = self.shared.state.lock();
            let previous = state.tabs.active().top().route.clone();
            let stack = state.tabs.active_mut();
            let discarded = match request.mode {
                Mode::Push => {
                    stack.push(entry);
                    Vec::new()
                }
                Mode::Replace => vec![stack.replace_top(entry)],
                Mode::Clear => stack.reset(entry),
            };
            (discarded, previous, state.observers.clone())
        };

        for entry in discarded {
            entry.settle(None);
        }

        self.complete(&observers, request.event(previous));
    }

    fn complete(&self, observers: &ObserverList, event: NavigationEvent) {
        observers.notify_completed(&event);
        self.shared.events.publish(event);
    }

    /// Pop the top entry of the active stack, settling its pending result
    fn pop_top(&self, value: Option<ResultValue>) -> NavigationResult<bool> {
        let (popped, event, observers) = {
            let mut state = self.shared.state.lock();
            let Some(popped) = state.tabs.active_mut().pop() else {
                debug_log!("go_back ignored, only the root entry is left");
                return Ok(false);
            };
            let event = top_event(state.tabs.active().top(), popped.route.clone());
            (popped, event, state.observers.clone())
        };

        debug_log!("go_back from '{}'", popped.route.name);
        popped.settle(value);
        self.complete(&observers, event);
        Ok(true)
    }

    fn snapshot(&self) -> (ObserverList, RouteDefinition) {
        let state = self.shared.state.lock();
        (state.observers.clone(), state.tabs.active().top().route.clone())
    }

    /// Hand `error` to the error handler and give it back for returning
    fn fail(&self, error: NavigationError, route: Option<&RouteDefinition>) -> NavigationError {
        let handler = self.shared.state.lock().error_handler.clone();

        if let Some(handler) = handler {
            if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| handler(&error, route))) {
                error_log!("Error handler panicked: {}", panic_message(panic.as_ref()));
            }
        }

        error
    }
}

/// Completed pop event for the entry now on top
fn top_event(top: &StackEntry, previous: RouteDefinition) -> NavigationEvent {
    NavigationEvent::new(top.route.clone(), Some(previous))
        .with_params(top.path_params.clone(), top.query_params.clone())
        .with_uri(top.uri.clone())
        .pop()
}

#[async_trait]
impl AppRouter for InMemoryRouter {
    async fn go_to(&self, route: &RouteDefinition, params: Option<SharedParams>) -> NavigationResult {
        self.navigate(Request::new(route.clone(), params, Mode::Push))
            .await
    }

    async fn go_to_and_await_any(
        &self,
        route: &RouteDefinition,
        params: Option<SharedParams>,
    ) -> NavigationResult<ResultValue> {
        let (pending, receiver) = PendingResult::new(route);
        let request = Request {
            pending: Some(pending),
            ..Request::new(route.clone(), params, Mode::Push)
        };

        self.navigate(request).await?;

        match receiver.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(self.fail(error, Some(route))),
            Err(_) => Err(self.fail(
                NavigationError::cancelled(&route.name, "result handle dropped"),
                Some(route),
            )),
        }
    }

    async fn go_to_path(&self, path: &str) -> NavigationResult {
        debug_log!("go_to_path '{}'", path);

        if let Some(link) = self.shared.parser.parse_str(path) {
            let params: SharedParams = Arc::new(MapParams::from_maps(link.path_params, link.query_params));
            return self
                .navigate(Request::new(link.route, Some(params), Mode::Push).with_uri(path))
                .await;
        }

        let error = self.fail(
            NavigationError::RouteNotFound {
                path: path.to_string(),
            },
            None,
        );

        if let Some(not_found) = self.shared.not_found_route.clone() {
            if let Err(fallback) = self
                .navigate(Request::new(not_found, None, Mode::Push).with_uri(path))
                .await
            {
                warn_log!("Could not show the not-found route: {}", fallback);
            }
        }

        Err(error)
    }

    async fn replace_with(&self, route: &RouteDefinition, params: Option<SharedParams>) -> NavigationResult {
        self.navigate(Request::new(route.clone(), params, Mode::Replace))
            .await
    }

    async fn clear_stack_and_go_to(
        &self,
        route: &RouteDefinition,
        params: Option<SharedParams>,
    ) -> NavigationResult {
        self.navigate(Request::new(route.clone(), params, Mode::Clear))
            .await
    }

    fn go_back(&self) -> NavigationResult<bool> {
        self.pop_top(None)
    }

    fn go_back_with_result_any(&self, value: ResultValue) -> NavigationResult<bool> {
        self.pop_top(Some(value))
    }

    fn can_go_back(&self) -> bool {
        self.shared.state.lock().tabs.active().can_pop()
    }

    fn pop_until(&self, predicate: &dyn Fn(&RouteDefinition) -> bool) -> bool {
        let mut discarded = Vec::new();

        loop {
            if predicate(&self.current_route()) {
                break;
            }
            match self.shared.state.lock().tabs.active_mut().pop() {
                Some(entry) => discarded.push(entry),
                None => break,
            }
        }

        let reached = predicate(&self.current_route());

        if let Some(first) = discarded.first() {
            debug_log!("pop_until removed {} entries", discarded.len());
            let previous = first.route.clone();
            let (event, observers) = {
                let state = self.shared.state.lock();
                (
                    top_event(state.tabs.active().top(), previous),
                    state.observers.clone(),
                )
            };
            for entry in discarded {
                entry.settle(None);
            }
            self.complete(&observers, event);
        }

        reached
    }

    async fn handle_deep_link(&self, uri: &str) -> NavigationResult<ParsedDeepLink> {
        debug_log!("handle_deep_link '{}'", uri);

        if let Ok(url) = Url::parse(uri) {
            if !self.shared.deep_links.accepts(&url) {
                return Err(self.fail(
                    NavigationError::DeepLink {
                        uri: uri.to_string(),
                        message: format!("scheme '{}' or host is not accepted", url.scheme()),
                    },
                    None,
                ));
            }
        }

        let Some(link) = self.shared.parser.parse_str(uri) else {
            return Err(self.fail(
                NavigationError::DeepLink {
                    uri: uri.to_string(),
                    message: "malformed or no route matches".to_string(),
                },
                None,
            ));
        };

        let params: SharedParams = Arc::new(MapParams::from_maps(
            link.path_params.clone(),
            link.query_params.clone(),
        ));
        self.navigate(Request::new(link.route.clone(), Some(params), Mode::Push).with_uri(uri))
            .await?;

        Ok(link)
    }

    fn switch_to_tab(&self, index: usize) -> NavigationResult {
        let switched = {
            let mut state = self.shared.state.lock();
            let before = state.tabs.active_index();
            let previous = state.tabs.active().top().route.clone();

            if !state.tabs.switch_to(index) {
                Err(state.tabs.len())
            } else if before == index {
                Ok(None)
            } else {
                let top = state.tabs.active().top();
                let event = NavigationEvent::new(top.route.clone(), Some(previous))
                    .with_params(top.path_params.clone(), top.query_params.clone())
                    .with_uri(top.uri.clone());
                Ok(Some((event, state.observers.clone())))
            }
        };

        match switched {
            Ok(Some((event, observers))) => {
                debug_log!("Switched to tab {} ('{}')", index, event.route.name);
                self.complete(&observers, event);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(tabs) => {
                let shell = self
                    .shared
                    .shell
                    .as_ref()
                    .map_or("tabs", |shell| shell.route.name.as_str());
                Err(self.fail(
                    NavigationError::invalid_params(
                        shell,
                        format!("no tab at index {} ({} tab(s))", index, tabs),
                    ),
                    None,
                ))
            }
        }
    }

    fn current_route_for_tab(&self, index: usize) -> Option<RouteDefinition> {
        self.shared
            .state
            .lock()
            .tabs
            .get(index)
            .map(|stack| stack.top().route.clone())
    }

    fn current_route(&self) -> RouteDefinition {
        self.shared.state.lock().tabs.active().top().route.clone()
    }

    fn current_path_params(&self) -> ParamMap {
        self.shared.state.lock().tabs.active().top().path_params.clone()
    }

    fn current_query_params(&self) -> ParamMap {
        self.shared.state.lock().tabs.active().top().query_params.clone()
    }

    fn add_global_guard(&self, guard: BoxedGuard) {
        self.shared.state.lock().guards.add_global(guard);
    }

    fn add_guard_for_route(&self, route: &RouteDefinition, guard: BoxedGuard) {
        self.shared.state.lock().guards.add_for_route(route, guard);
    }

    fn add_observer(&self, observer: SharedObserver) {
        self.shared.state.lock().observers.add(observer);
    }

    fn remove_observer(&self, observer: &SharedObserver) -> bool {
        self.shared.state.lock().observers.remove(observer)
    }

    fn set_error_handler(&self, handler: Option<ErrorHandler>) {
        self.shared.state.lock().error_handler = handler;
    }

    fn set_bypass_guards(&self, bypass: bool) {
        debug_log!("Guard bypass {}", if bypass { "on" } else { "off" });
        self.shared.state.lock().bypass_guards = bypass;
    }

    fn events(&self) -> broadcast::Receiver<NavigationEvent> {
        self.shared.events.subscribe()
    }
}

impl fmt::Debug for InMemoryRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("InMemoryRouter")
            .field("current_route", &state.tabs.active().top().route.name)
            .field("stack_len", &state.tabs.active().len())
            .field("active_tab", &state.tabs.active_index())
            .field("guards", &state.guards)
            .field("observers", &state.observers)
            .field("bypass_guards", &state.bypass_guards)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::guards::{boxed, guard_fn, GuardResult};

    fn home() -> RouteDefinition {
        RouteDefinition::new("home", "/")
    }

    fn login() -> RouteDefinition {
        RouteDefinition::new("login", "/login")
    }

    fn router() -> InMemoryRouter {
        InMemoryRouter::new(RouterConfig::new([home(), login()], home()).unwrap())
    }

    #[tokio::test]
    async fn test_redirect_loop_is_cut() {
        let router = router();
        router.add_global_guard(boxed(guard_fn("pingpong", |context| {
            let target = if context.destination.name == "home" { login() } else { home() };
            async move { GuardResult::redirect(target) }
        })));

        let error = router.go_to(&login(), None).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Unknown);
        assert_eq!(router.stack_len(), 1);
        assert_eq!(router.current_route(), home());
    }

    #[tokio::test]
    async fn test_deep_link_outside_accepted_schemes() {
        let config = RouterConfig::builder()
            .routes([home(), login()])
            .initial_route(home())
            .deep_links(DeepLinkConfig::new().scheme("myapp"))
            .build()
            .unwrap();
        let router = InMemoryRouter::new(config);

        let error = router.handle_deep_link("otherapp://host/login").await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::DeepLink);
        assert_eq!(router.stack_len(), 1);

        router.handle_deep_link("myapp://host/login").await.unwrap();
        router.handle_deep_link("/login").await.unwrap();
        assert_eq!(router.stack_len(), 3);
    }

    #[tokio::test]
    async fn test_route_outside_catalog_is_not_found() {
        let router = router();
        let stranger = RouteDefinition::new("stranger", "/stranger");

        let error = router.go_to(&stranger, None).await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::RouteNotFound);
        assert_eq!(router.stack_len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_in_flight() {
        let router = router();
        let entered = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = entered.clone();
        router.add_guard_for_route(
            &login(),
            boxed(guard_fn("stalled", move |_| {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                futures::future::pending::<GuardResult>()
            })),
        );

        let pending = tokio::spawn({
            let router = router.clone();
            async move { router.go_to(&login(), None).await }
        });
        while !entered.load(std::sync::atomic::Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        router.cancel_in_flight();

        let error = pending.await.unwrap().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NavigationCancelled);
        assert_eq!(router.current_route(), home());

        router.clear_guards();
        assert!(router.go_to(&login(), None).await.is_ok());
    }

    #[test]
    fn test_debug_output() {
        let debug = format!("{:?}", router());
        assert!(debug.contains("home"));
        assert!(debug.contains("stack_len"));
    }
}
