//! Route guards and the guard evaluation pipeline
//!
//! Guards decide whether a navigation may proceed, must go elsewhere, or must
//! stop. Global guards run before route-specific ones; evaluation is strictly
//! sequential and stops at the first guard that does not allow.

use crate::error::NavigationError;
use crate::params::{ParamMap, SharedParams};
use crate::route::RouteDefinition;
use crate::{error_log, trace_log};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Guard context and result
// ============================================================================

/// Everything a guard may look at for one evaluation.
///
/// Built fresh for every navigation attempt.
#[derive(Debug, Clone)]
pub struct GuardContext {
    /// Route being navigated to
    pub destination: RouteDefinition,
    /// Parameters as the caller supplied them
    pub params: Option<SharedParams>,
    /// Top of the active stack; `None` before the first navigation
    pub current_route: Option<RouteDefinition>,
    /// Resolved path parameters
    pub path_params: ParamMap,
    /// Resolved query parameters
    pub query_params: ParamMap,
    /// Full URI when the navigation came from a deep link or path
    pub uri: Option<String>,
}

impl GuardContext {
    /// Create a context for navigating to `destination` without parameters
    pub fn new(destination: RouteDefinition) -> Self {
        Self {
            destination,
            params: None,
            current_route: None,
            path_params: ParamMap::new(),
            query_params: ParamMap::new(),
            uri: None,
        }
    }

    /// Attach caller parameters, resolving them into the path/query maps
    pub fn with_params(mut self, params: Option<SharedParams>) -> Self {
        if let Some(params) = &params {
            self.path_params = params.to_path_params();
            self.query_params = params.to_query_params();
        }
        self.params = params;
        self
    }

    /// Set the route navigation starts from
    pub fn with_current_route(mut self, current: Option<RouteDefinition>) -> Self {
        self.current_route = current;
        self
    }

    /// Set the originating URI
    pub fn with_uri(mut self, uri: Option<String>) -> Self {
        self.uri = uri;
        self
    }

    /// Get a path parameter of the destination
    pub fn param(&self, key: &str) -> Option<&String> {
        self.path_params.get(key)
    }

    /// Get a query parameter of the destination
    pub fn query(&self, key: &str) -> Option<&String> {
        self.query_params.get(key)
    }
}

/// Decision of a single guard
#[derive(Debug, Clone)]
pub enum GuardResult {
    /// Allow navigation to proceed
    Allow,

    /// Stop and navigate to another route instead
    Redirect {
        /// Route to navigate to
        to: RouteDefinition,
        /// Parameters for the redirect target
        params: Option<SharedParams>,
    },

    /// Stop without navigating
    Reject {
        /// Reason for rejecting navigation
        reason: Option<String>,
    },
}

impl GuardResult {
    /// Create an allow result
    pub fn allow() -> Self {
        GuardResult::Allow
    }

    /// Create a reject result with a reason
    pub fn reject(reason: impl Into<String>) -> Self {
        GuardResult::Reject {
            reason: Some(reason.into()),
        }
    }

    /// Create a redirect result
    pub fn redirect(to: RouteDefinition) -> Self {
        GuardResult::Redirect { to, params: None }
    }

    /// Create a redirect result carrying parameters for the target
    pub fn redirect_with(to: RouteDefinition, params: SharedParams) -> Self {
        GuardResult::Redirect {
            to,
            params: Some(params),
        }
    }

    /// Check if result is allow
    pub fn is_allow(&self) -> bool {
        matches!(self, GuardResult::Allow)
    }

    /// Check if result is reject
    pub fn is_reject(&self) -> bool {
        matches!(self, GuardResult::Reject { .. })
    }

    /// Check if result is redirect
    pub fn is_redirect(&self) -> bool {
        matches!(self, GuardResult::Redirect { .. })
    }

    /// Get redirect target if this is a redirect
    pub fn redirect_target(&self) -> Option<&RouteDefinition> {
        match self {
            GuardResult::Redirect { to, .. } => Some(to),
            _ => None,
        }
    }
}

// ============================================================================
// RouteGuard trait
// ============================================================================

/// Trait for route guards
///
/// Guards use an associated `Future` type so concrete guards avoid boxing;
/// the registry stores them type-erased as [`BoxedGuard`].
///
/// # Example
///
/// ```
/// use app_navigator::{GuardContext, GuardResult, RouteGuard};
/// use futures::future::{ready, Ready};
///
/// struct MaintenanceGuard {
///     down: bool,
/// }
///
/// impl RouteGuard for MaintenanceGuard {
///     type Future = Ready<GuardResult>;
///
///     fn check(&self, _context: &GuardContext) -> Self::Future {
///         ready(if self.down {
///             GuardResult::reject("down for maintenance")
///         } else {
///             GuardResult::allow()
///         })
///     }
///
///     fn name(&self) -> &str {
///         "MaintenanceGuard"
///     }
/// }
/// ```
pub trait RouteGuard: Send + Sync + 'static {
    /// The future returned by check
    type Future: Future<Output = GuardResult> + Send + 'static;

    /// Decide on one navigation attempt.
    ///
    /// The returned future may suspend (an auth service round trip, say); the
    /// pipeline awaits it before moving to the next guard.
    fn check(&self, context: &GuardContext) -> Self::Future;

    /// Get guard name (for logs and [`NavigationError::GuardRejected`])
    fn name(&self) -> &str {
        "RouteGuard"
    }
}

/// Future type of a type-erased guard
pub type GuardFuture = BoxFuture<'static, GuardResult>;

/// Shared, type-erased route guard
pub type BoxedGuard = Arc<dyn RouteGuard<Future = GuardFuture>>;

/// Erase a guard's concrete future type
pub fn boxed<G: RouteGuard>(guard: G) -> BoxedGuard {
    Arc::new(Boxed(guard))
}

struct Boxed<G>(G);

impl<G: RouteGuard> RouteGuard for Boxed<G> {
    type Future = GuardFuture;

    fn check(&self, context: &GuardContext) -> Self::Future {
        self.0.check(context).boxed()
    }

    fn name(&self) -> &str {
        self.0.name()
    }
}

/// Create a guard from a closure returning a future
///
/// # Example
///
/// ```
/// use app_navigator::{guard_fn, GuardResult, RouteGuard};
///
/// let guard = guard_fn("BetaGuard", |context| {
///     let beta = context.query("beta").is_some();
///     async move {
///         if beta {
///             GuardResult::allow()
///         } else {
///             GuardResult::reject("beta only")
///         }
///     }
/// });
/// assert_eq!(guard.name(), "BetaGuard");
/// ```
pub fn guard_fn<F, Fut>(name: impl Into<String>, f: F) -> FnGuard<F>
where
    F: Fn(&GuardContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = GuardResult> + Send + 'static,
{
    FnGuard {
        name: name.into(),
        f,
    }
}

/// Guard created from a function or closure
pub struct FnGuard<F> {
    name: String,
    f: F,
}

impl<F, Fut> RouteGuard for FnGuard<F>
where
    F: Fn(&GuardContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = GuardResult> + Send + 'static,
{
    type Future = Fut;

    fn check(&self, context: &GuardContext) -> Self::Future {
        (self.f)(context)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Built-in guards
// ============================================================================

/// Type alias for authentication check function.
pub type AuthCheckFn = Box<dyn Fn() -> bool + Send + Sync>;

/// Protects routes flagged with `requires_auth`.
///
/// Routes without the flag always pass. For protected routes the check
/// function decides; failures redirect when a login route is configured and
/// reject otherwise.
///
/// # Example
///
/// ```
/// use app_navigator::{AuthGuard, RouteDefinition};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let logged_in = Arc::new(AtomicBool::new(false));
/// let flag = logged_in.clone();
/// let guard = AuthGuard::new(move || flag.load(Ordering::SeqCst))
///     .redirect_to(RouteDefinition::new("login", "/login"));
/// ```
pub struct AuthGuard {
    check_fn: AuthCheckFn,
    redirect: Option<RouteDefinition>,
}

impl AuthGuard {
    /// Create a new auth guard with a custom check function
    pub fn new<F>(check_fn: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            check_fn: Box::new(check_fn),
            redirect: None,
        }
    }

    /// Redirect here instead of rejecting
    pub fn redirect_to(mut self, login: RouteDefinition) -> Self {
        self.redirect = Some(login);
        self
    }
}

impl RouteGuard for AuthGuard {
    type Future = futures::future::Ready<GuardResult>;

    fn check(&self, context: &GuardContext) -> Self::Future {
        let result = if !context.destination.requires_auth || (self.check_fn)() {
            GuardResult::allow()
        } else if let Some(login) = &self.redirect {
            GuardResult::redirect(login.clone())
        } else {
            GuardResult::reject("Authentication required")
        };

        futures::future::ready(result)
    }

    fn name(&self) -> &str {
        "AuthGuard"
    }
}

/// Guard that allows every navigation
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAllow;

impl RouteGuard for AlwaysAllow {
    type Future = futures::future::Ready<GuardResult>;

    fn check(&self, _context: &GuardContext) -> Self::Future {
        futures::future::ready(GuardResult::allow())
    }

    fn name(&self) -> &str {
        "AlwaysAllow"
    }
}

/// Guard that rejects every navigation
#[derive(Debug, Clone, Default)]
pub struct AlwaysReject {
    reason: Option<String>,
}

impl AlwaysReject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }
}

impl RouteGuard for AlwaysReject {
    type Future = futures::future::Ready<GuardResult>;

    fn check(&self, _context: &GuardContext) -> Self::Future {
        futures::future::ready(GuardResult::Reject {
            reason: self.reason.clone(),
        })
    }

    fn name(&self) -> &str {
        "AlwaysReject"
    }
}

/// Inverts a guard result
///
/// Allow becomes Reject, Reject becomes Allow, Redirect is preserved.
///
/// ```
/// use app_navigator::{AuthGuard, NotGuard};
///
/// // Only guests may open the sign-up flow
/// let guests_only = NotGuard::new(AuthGuard::new(|| true));
/// ```
pub struct NotGuard {
    guard: BoxedGuard,
}

impl NotGuard {
    pub fn new<G: RouteGuard>(guard: G) -> Self {
        Self {
            guard: boxed(guard),
        }
    }

    pub fn from_boxed(guard: BoxedGuard) -> Self {
        Self { guard }
    }
}

impl RouteGuard for NotGuard {
    type Future = GuardFuture;

    fn check(&self, context: &GuardContext) -> Self::Future {
        let future = self.guard.check(context);

        Box::pin(async move {
            match future.await {
                GuardResult::Allow => GuardResult::reject("Inverted: guard allowed"),
                GuardResult::Reject { .. } => GuardResult::Allow,
                redirect @ GuardResult::Redirect { .. } => redirect,
            }
        })
    }

    fn name(&self) -> &str {
        "NotGuard"
    }
}

// ============================================================================
// Guard registry
// ============================================================================

/// Global guards plus per-route guards keyed by route name.
#[derive(Clone, Default)]
pub struct GuardRegistry {
    global: Vec<BoxedGuard>,
    per_route: HashMap<String, Vec<BoxedGuard>>,
}

impl GuardRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a guard that applies to every route
    pub fn add_global(&mut self, guard: BoxedGuard) {
        self.global.push(guard);
    }

    /// Append a guard for one route
    pub fn add_for_route(&mut self, route: &RouteDefinition, guard: BoxedGuard) {
        self.per_route
            .entry(route.name.clone())
            .or_default()
            .push(guard);
    }

    /// Drop every guard registered for `route`, returning how many were removed
    pub fn remove_for_route(&mut self, route: &RouteDefinition) -> usize {
        self.per_route.remove(&route.name).map_or(0, |guards| guards.len())
    }

    /// Remove all guards
    pub fn clear(&mut self) {
        self.global.clear();
        self.per_route.clear();
    }

    /// Guards applying to `route`: global ones first, then route-specific,
    /// each in registration order.
    pub fn guards_for(&self, route: &RouteDefinition) -> Vec<BoxedGuard> {
        self.global
            .iter()
            .chain(self.per_route.get(&route.name).into_iter().flatten())
            .cloned()
            .collect()
    }

    /// Total number of registered guards
    pub fn len(&self) -> usize {
        self.global.len() + self.per_route.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evaluate the guards applying to `context.destination`
    pub async fn evaluate(&self, context: &GuardContext, options: &EvaluationOptions) -> GuardOutcome {
        evaluate_guards(&self.guards_for(&context.destination), context, options).await
    }
}

impl fmt::Debug for GuardRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = |guards: &[BoxedGuard]| -> Vec<String> {
            guards.iter().map(|g| g.name().to_string()).collect()
        };
        f.debug_struct("GuardRegistry")
            .field("global", &names(&self.global))
            .field(
                "per_route",
                &self
                    .per_route
                    .iter()
                    .map(|(route, guards)| (route.clone(), names(guards)))
                    .collect::<HashMap<_, _>>(),
            )
            .finish()
    }
}

// ============================================================================
// Evaluation
// ============================================================================

/// Knobs for one pipeline run
#[derive(Debug, Clone, Default)]
pub struct EvaluationOptions {
    /// Skip every guard
    pub bypass: bool,
    /// Upper bound for a single guard; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Cancelling this token aborts the pipeline at its next suspension
    pub cancel: CancellationToken,
}

/// Outcome of a guard pipeline
#[derive(Debug, Clone)]
pub enum GuardOutcome {
    /// No guard objected
    Proceed,
    /// `guard` asked to navigate to `to` instead
    Redirect {
        guard: String,
        to: RouteDefinition,
        params: Option<SharedParams>,
    },
    /// `guard` rejected the navigation
    Reject {
        guard: String,
        reason: Option<String>,
    },
    /// A guard panicked, timed out, or the pipeline was cancelled
    Failed(NavigationError),
}

impl GuardOutcome {
    pub fn is_proceed(&self) -> bool {
        matches!(self, GuardOutcome::Proceed)
    }

    /// Error describing why navigation to `route` did not happen
    pub fn to_error(&self, route: &RouteDefinition) -> Option<NavigationError> {
        match self {
            GuardOutcome::Proceed => None,
            GuardOutcome::Redirect { guard, to, .. } => Some(NavigationError::GuardRejected {
                guard: guard.clone(),
                route: route.name.clone(),
                reason: None,
                redirect_to: Some(to.clone()),
            }),
            GuardOutcome::Reject { guard, reason } => Some(NavigationError::GuardRejected {
                guard: guard.clone(),
                route: route.name.clone(),
                reason: reason.clone(),
                redirect_to: None,
            }),
            GuardOutcome::Failed(error) => Some(error.clone()),
        }
    }
}

enum Step {
    Decided(GuardResult),
    Panicked(String),
    TimedOut,
    Cancelled,
}

/// Run `guards` in order against `context`.
///
/// The bypass flag is honoured before any guard runs. Each guard is awaited
/// before the next one starts, and the first non-allow decision ends the run.
pub async fn evaluate_guards(
    guards: &[BoxedGuard],
    context: &GuardContext,
    options: &EvaluationOptions,
) -> GuardOutcome {
    let route = &context.destination.name;

    if options.bypass {
        trace_log!("Guards bypassed for '{}'", route);
        return GuardOutcome::Proceed;
    }

    if options.timeout.is_some()
        && !guards.is_empty()
        && tokio::runtime::Handle::try_current().is_err()
    {
        error_log!("Guard timeout for '{}' needs a tokio runtime, none is running", route);
        return GuardOutcome::Failed(NavigationError::unknown(
            format!("guards for '{}'", route),
            "a guard timeout is configured but no tokio runtime is running",
        ));
    }

    for guard in guards {
        let name = guard.name().to_string();

        if options.cancel.is_cancelled() {
            return GuardOutcome::Failed(NavigationError::cancelled(
                route,
                format!("cancelled before guard '{}'", name),
            ));
        }

        let step = match std::panic::catch_unwind(AssertUnwindSafe(|| guard.check(context))) {
            Err(panic) => Step::Panicked(panic_message(panic.as_ref())),
            Ok(future) => {
                let run = async {
                    let guarded = AssertUnwindSafe(future).catch_unwind();
                    let result = match options.timeout {
                        Some(limit) => match tokio::time::timeout(limit, guarded).await {
                            Ok(result) => result,
                            Err(_) => return Step::TimedOut,
                        },
                        None => guarded.await,
                    };
                    match result {
                        Ok(decision) => Step::Decided(decision),
                        Err(panic) => Step::Panicked(panic_message(panic.as_ref())),
                    }
                };

                tokio::select! {
                    biased;
                    () = options.cancel.cancelled() => Step::Cancelled,
                    step = run => step,
                }
            }
        };

        match step {
            Step::Decided(GuardResult::Allow) => {
                trace_log!("Guard '{}' allowed '{}'", name, route);
            }
            Step::Decided(GuardResult::Redirect { to, params }) => {
                trace_log!("Guard '{}' redirected '{}' to '{}'", name, route, to.name);
                return GuardOutcome::Redirect {
                    guard: name,
                    to,
                    params,
                };
            }
            Step::Decided(GuardResult::Reject { reason }) => {
                trace_log!("Guard '{}' rejected '{}'", name, route);
                return GuardOutcome::Reject {
                    guard: name,
                    reason,
                };
            }
            Step::Panicked(message) => {
                error_log!("Guard '{}' panicked while checking '{}': {}", name, route, message);
                return GuardOutcome::Failed(NavigationError::unknown(
                    format!("guard '{}'", name),
                    format!("guard panicked: {}", message),
                ));
            }
            Step::TimedOut => {
                return GuardOutcome::Failed(NavigationError::unknown(
                    format!("guard '{}'", name),
                    format!(
                        "no decision within {:?}",
                        options.timeout.unwrap_or_default()
                    ),
                ));
            }
            Step::Cancelled => {
                return GuardOutcome::Failed(NavigationError::cancelled(
                    route,
                    format!("cancelled while guard '{}' was pending", name),
                ));
            }
        }
    }

    GuardOutcome::Proceed
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::params::MapParams;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn profile() -> RouteDefinition {
        RouteDefinition::new("profile", "/user/:id").requires_auth()
    }

    fn counting(name: &str, counter: Arc<AtomicUsize>, result: GuardResult) -> BoxedGuard {
        boxed(guard_fn(name, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(result.clone())
        }))
    }

    #[test]
    fn test_guard_result_variants() {
        let allow = GuardResult::allow();
        assert!(allow.is_allow());
        assert!(!allow.is_reject());
        assert!(!allow.is_redirect());
        assert!(allow.redirect_target().is_none());

        let reject = GuardResult::reject("Not authorized");
        assert!(reject.is_reject());
        match reject {
            GuardResult::Reject { reason } => {
                assert_eq!(reason.as_deref(), Some("Not authorized"));
            }
            _ => panic!("Expected Reject"),
        }

        let login = RouteDefinition::new("login", "/login");
        let redirect = GuardResult::redirect(login.clone());
        assert!(redirect.is_redirect());
        assert_eq!(redirect.redirect_target(), Some(&login));
    }

    #[test]
    fn test_guard_context() {
        let params: SharedParams = Arc::new(MapParams::new().path("id", "123").query("page", "1"));
        let ctx = GuardContext::new(profile())
            .with_params(Some(params))
            .with_current_route(Some(RouteDefinition::new("home", "/")))
            .with_uri(Some("/user/123?page=1".to_string()));

        assert_eq!(ctx.current_route.as_ref().unwrap().name, "home");
        assert_eq!(ctx.param("id"), Some(&"123".to_string()));
        assert_eq!(ctx.query("page"), Some(&"1".to_string()));
        assert_eq!(ctx.param("missing"), None);
        assert!(ctx.params.is_some());
    }

    #[test]
    fn test_auth_guard() {
        let open = RouteDefinition::new("home", "/");

        let guard = AuthGuard::new(|| false);
        assert_eq!(guard.name(), "AuthGuard");
        assert!(pollster::block_on(guard.check(&GuardContext::new(open))).is_allow());
        assert!(pollster::block_on(guard.check(&GuardContext::new(profile()))).is_reject());

        let login = RouteDefinition::new("login", "/login");
        let guard = AuthGuard::new(|| false).redirect_to(login.clone());
        let result = pollster::block_on(guard.check(&GuardContext::new(profile())));
        assert_eq!(result.redirect_target(), Some(&login));

        let guard = AuthGuard::new(|| true);
        assert!(pollster::block_on(guard.check(&GuardContext::new(profile()))).is_allow());
    }

    #[test]
    fn test_not_guard() {
        let guard = NotGuard::new(AlwaysAllow);
        assert!(pollster::block_on(guard.check(&GuardContext::new(profile()))).is_reject());

        let guard = NotGuard::new(AlwaysReject::new());
        assert!(pollster::block_on(guard.check(&GuardContext::new(profile()))).is_allow());
    }

    #[test]
    fn test_registry_ordering() {
        let mut registry = GuardRegistry::new();
        registry.add_for_route(&profile(), boxed(guard_fn("route-1", |_| async { GuardResult::allow() })));
        registry.add_global(boxed(guard_fn("global-1", |_| async { GuardResult::allow() })));
        registry.add_global(boxed(guard_fn("global-2", |_| async { GuardResult::allow() })));
        registry.add_for_route(&profile(), boxed(guard_fn("route-2", |_| async { GuardResult::allow() })));

        let names: Vec<String> = registry
            .guards_for(&profile())
            .iter()
            .map(|g| g.name().to_string())
            .collect();
        assert_eq!(names, vec!["global-1", "global-2", "route-1", "route-2"]);

        let home = RouteDefinition::new("home", "/");
        assert_eq!(registry.guards_for(&home).len(), 2);
        assert_eq!(registry.len(), 4);

        assert_eq!(registry.remove_for_route(&profile()), 2);
        assert_eq!(registry.guards_for(&profile()).len(), 2);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_short_circuit_on_reject() {
        let second_calls = Arc::new(AtomicUsize::new(0));
        let mut registry = GuardRegistry::new();
        registry.add_for_route(&profile(), boxed(AlwaysReject::with_reason("no")));
        registry.add_for_route(&profile(), counting("second", second_calls.clone(), GuardResult::allow()));

        let outcome = pollster::block_on(
            registry.evaluate(&GuardContext::new(profile()), &EvaluationOptions::default()),
        );

        match outcome {
            GuardOutcome::Reject { guard, reason } => {
                assert_eq!(guard, "AlwaysReject");
                assert_eq!(reason.as_deref(), Some("no"));
            }
            other => panic!("Expected Reject, got {:?}", other),
        }
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_short_circuit_on_redirect() {
        let calls = Arc::new(AtomicUsize::new(0));
        let login = RouteDefinition::new("login", "/login");
        let guards = vec![
            counting("first", calls.clone(), GuardResult::allow()),
            counting("redirector", calls.clone(), GuardResult::redirect(login.clone())),
            counting("never", calls.clone(), GuardResult::allow()),
        ];

        let outcome = pollster::block_on(evaluate_guards(
            &guards,
            &GuardContext::new(profile()),
            &EvaluationOptions::default(),
        ));

        let error = outcome.to_error(&profile()).unwrap();
        assert_eq!(error.redirect_target(), Some(&login));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_bypass_skips_every_guard() {
        let calls = Arc::new(AtomicUsize::new(0));
        let guards = vec![counting("reject", calls.clone(), GuardResult::reject("no"))];
        let options = EvaluationOptions {
            bypass: true,
            ..EvaluationOptions::default()
        };

        let outcome = pollster::block_on(evaluate_guards(&guards, &GuardContext::new(profile()), &options));

        assert!(outcome.is_proceed());
        assert!(outcome.to_error(&profile()).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    fn async_boom() -> GuardResult {
        panic!("async boom")
    }

    #[test]
    fn test_panicking_guard_is_contained() {
        let sync_panic = boxed(guard_fn("sync", |_| -> futures::future::Ready<GuardResult> {
            panic!("sync boom")
        }));
        let async_panic = boxed(guard_fn("async", |_| async { async_boom() }));

        for guard in [sync_panic, async_panic] {
            let outcome = pollster::block_on(evaluate_guards(
                &[guard],
                &GuardContext::new(profile()),
                &EvaluationOptions::default(),
            ));
            match outcome {
                GuardOutcome::Failed(error) => {
                    assert_eq!(error.kind(), ErrorKind::Unknown);
                    assert!(error.to_string().contains("boom"));
                }
                other => panic!("Expected Failed, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        let options = EvaluationOptions::default();
        options.cancel.cancel();

        let outcome = pollster::block_on(evaluate_guards(
            &[boxed(AlwaysAllow)],
            &GuardContext::new(profile()),
            &options,
        ));
        match outcome {
            GuardOutcome::Failed(error) => assert_eq!(error.kind(), ErrorKind::NavigationCancelled),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_pending_guard() {
        let options = EvaluationOptions::default();
        let token = options.cancel.clone();
        let stalled = boxed(guard_fn("stalled", |_| futures::future::pending::<GuardResult>()));

        let guards = [stalled];
        let context = GuardContext::new(profile());
        let (outcome, ()) = tokio::join!(
            evaluate_guards(&guards, &context, &options),
            async move {
                tokio::task::yield_now().await;
                token.cancel();
            }
        );

        match outcome {
            GuardOutcome::Failed(error) => assert_eq!(error.kind(), ErrorKind::NavigationCancelled),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_guard_timeout() {
        let stalled = boxed(guard_fn("stalled", |_| futures::future::pending::<GuardResult>()));
        let options = EvaluationOptions {
            timeout: Some(Duration::from_millis(20)),
            ..EvaluationOptions::default()
        };

        let outcome = evaluate_guards(&[stalled], &GuardContext::new(profile()), &options).await;

        match outcome {
            GuardOutcome::Failed(error) => {
                assert_eq!(error.kind(), ErrorKind::Unknown);
                assert!(error.to_string().contains("stalled"));
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_guard_timeout_outside_tokio_fails() {
        let options = EvaluationOptions {
            timeout: Some(Duration::from_millis(20)),
            ..EvaluationOptions::default()
        };

        let outcome = pollster::block_on(evaluate_guards(
            &[boxed(AlwaysAllow)],
            &GuardContext::new(profile()),
            &options,
        ));

        match outcome {
            GuardOutcome::Failed(error) => {
                assert_eq!(error.kind(), ErrorKind::Unknown);
                assert!(error.to_string().contains("tokio runtime"));
            }
            other => panic!("Expected Failed, got {:?}", other),
        }

        let empty = pollster::block_on(evaluate_guards(&[], &GuardContext::new(profile()), &options));
        assert!(empty.is_proceed());
    }

    #[test]
    fn test_registry_debug_lists_names() {
        let mut registry = GuardRegistry::new();
        registry.add_global(boxed(AlwaysAllow));
        let debug = format!("{:?}", registry);
        assert!(debug.contains("AlwaysAllow"));
    }
}
