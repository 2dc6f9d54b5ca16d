//! Navigation observers and the completed-event stream
//!
//! Observers get synchronous started/completed/failed callbacks in
//! registration order. A panicking observer is logged and skipped; the rest
//! of the fan-out still runs. External subscribers that only care about
//! finished navigations can attach to an [`EventStream`] instead.

use crate::error::NavigationError;
use crate::event::NavigationEvent;
use crate::guards::panic_message;
use crate::{debug_log, error_log, trace_log, warn_log};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Receives navigation lifecycle callbacks.
///
/// All methods default to doing nothing, so implementors override only what
/// they need.
///
/// # Example
///
/// ```
/// use app_navigator::{NavigationEvent, NavigationObserver};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// #[derive(Default)]
/// struct PageViews(AtomicUsize);
///
/// impl NavigationObserver for PageViews {
///     fn on_navigation_completed(&self, _event: &NavigationEvent) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait NavigationObserver: Send + Sync {
    /// Called before guards run
    fn on_navigation_started(&self, _event: &NavigationEvent) {}

    /// Called after the stack changed
    fn on_navigation_completed(&self, _event: &NavigationEvent) {}

    /// Called when a navigation did not happen
    fn on_navigation_failed(&self, _event: &NavigationEvent, _error: &NavigationError) {}
}

/// Shared observer handle; identity is the `Arc` allocation
pub type SharedObserver = Arc<dyn NavigationObserver>;

/// Observer that writes every callback to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl NavigationObserver for LoggingObserver {
    fn on_navigation_started(&self, event: &NavigationEvent) {
        debug_log!("Navigating to '{}' ({})", event.route.name, event.route.path);
    }

    fn on_navigation_completed(&self, event: &NavigationEvent) {
        debug_log!(
            "Navigated to '{}' (replacement: {}, pop: {})",
            event.route.name,
            event.is_replacement,
            event.is_pop
        );
    }

    fn on_navigation_failed(&self, event: &NavigationEvent, error: &NavigationError) {
        warn_log!("Navigation to '{}' failed: {}", event.route.name, error);
    }
}

/// Observers in registration order
///
/// Cloning is cheap; the router clones the list before notifying so that
/// callbacks may register or remove observers themselves.
#[derive(Clone, Default)]
pub struct ObserverList {
    observers: Vec<SharedObserver>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, observer: SharedObserver) {
        self.observers.push(observer);
    }

    /// Remove `observer` by identity, returning whether it was registered
    pub fn remove(&mut self, observer: &SharedObserver) -> bool {
        let before = self.observers.len();
        self.observers.retain(|existing| !Arc::ptr_eq(existing, observer));
        before != self.observers.len()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn notify_started(&self, event: &NavigationEvent) {
        self.each("on_navigation_started", |observer| {
            observer.on_navigation_started(event);
        });
    }

    pub fn notify_completed(&self, event: &NavigationEvent) {
        self.each("on_navigation_completed", |observer| {
            observer.on_navigation_completed(event);
        });
    }

    pub fn notify_failed(&self, event: &NavigationEvent, error: &NavigationError) {
        self.each("on_navigation_failed", |observer| {
            observer.on_navigation_failed(event, error);
        });
    }

    fn each(&self, callback: &str, f: impl Fn(&dyn NavigationObserver)) {
        for (index, observer) in self.observers.iter().enumerate() {
            if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| f(observer.as_ref()))) {
                error_log!(
                    "Observer #{} panicked in {}: {}",
                    index,
                    callback,
                    panic_message(panic.as_ref())
                );
            }
        }
    }
}

impl fmt::Debug for ObserverList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("len", &self.observers.len())
            .finish()
    }
}

/// Broadcast of completed navigations
///
/// Subscribers only see events published after they subscribed. A
/// subscriber that falls more than `capacity` events behind gets
/// `RecvError::Lagged` and resumes with the oldest retained event.
#[derive(Debug, Clone)]
pub struct EventStream {
    sender: broadcast::Sender<NavigationEvent>,
}

impl EventStream {
    /// Default number of events retained for slow subscribers
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Attach a new subscriber
    pub fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.sender.subscribe()
    }

    /// Publish a completed navigation to current subscribers
    pub fn publish(&self, event: NavigationEvent) {
        match self.sender.send(event) {
            Ok(receivers) => {
                trace_log!("Published navigation event to {} subscriber(s)", receivers);
            }
            Err(_) => {
                trace_log!("Navigation event dropped, no subscribers");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
