//! Navigation stacks
//!
//! A [`NavigationStack`] always holds at least its root entry: the root is
//! stored apart from the entries above it, so no sequence of operations can
//! leave the stack empty. [`TabStacks`] keeps one such stack per tab.

use crate::error::{NavigationError, NavigationResult};
use crate::params::ParamMap;
use crate::route::RouteDefinition;
use crate::trace_log;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

/// Type-erased value passed back by `go_back_with_result`
pub type ResultValue = Box<dyn Any + Send>;

static NEXT_PENDING_ID: AtomicU64 = AtomicU64::new(1);

/// Handle resolved when the entry awaiting a result leaves the stack
pub(crate) struct PendingResult {
    key: String,
    sender: oneshot::Sender<NavigationResult<ResultValue>>,
}

impl PendingResult {
    /// Create a handle for `route` plus the receiver its awaiting task holds
    pub(crate) fn new(
        route: &RouteDefinition,
    ) -> (Self, oneshot::Receiver<NavigationResult<ResultValue>>) {
        let (sender, receiver) = oneshot::channel();
        let key = format!(
            "{}#{}",
            route.name,
            NEXT_PENDING_ID.fetch_add(1, Ordering::Relaxed)
        );
        (Self { key, sender }, receiver)
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }
}

/// One frame of navigation history
pub struct StackEntry {
    /// Route shown by this entry
    pub route: RouteDefinition,
    /// Resolved path parameters
    pub path_params: ParamMap,
    /// Resolved query parameters
    pub query_params: ParamMap,
    /// URI the entry was opened from, if any
    pub uri: Option<String>,
    pending: Option<PendingResult>,
}

impl StackEntry {
    /// Create an entry without parameters
    pub fn new(route: RouteDefinition) -> Self {
        Self {
            route,
            path_params: ParamMap::new(),
            query_params: ParamMap::new(),
            uri: None,
            pending: None,
        }
    }

    /// Set the resolved parameters
    pub fn with_params(mut self, path_params: ParamMap, query_params: ParamMap) -> Self {
        self.path_params = path_params;
        self.query_params = query_params;
        self
    }

    /// Set the originating URI
    pub fn with_uri(mut self, uri: Option<String>) -> Self {
        self.uri = uri;
        self
    }

    pub(crate) fn with_pending(mut self, pending: PendingResult) -> Self {
        self.pending = Some(pending);
        self
    }

    /// Whether a caller is awaiting a result from this entry
    pub fn has_pending_result(&self) -> bool {
        self.pending.is_some()
    }

    /// Resolve the pending handle, if any, as the entry leaves the stack.
    ///
    /// `Some(value)` completes the awaiting caller successfully; `None`
    /// fails it with [`NavigationError::NavigationCancelled`].
    /// Returns whether a handle was resolved.
    pub(crate) fn settle(self, value: Option<ResultValue>) -> bool {
        let Some(pending) = self.pending else {
            return false;
        };

        let outcome = match value {
            Some(value) => Ok(value),
            None => Err(NavigationError::cancelled(
                &self.route.name,
                "entry left the stack without a result",
            )),
        };

        trace_log!("Settling pending result '{}'", pending.key());
        // The awaiting task may be gone already; nobody left to tell.
        let _ = pending.sender.send(outcome);
        true
    }
}

impl fmt::Debug for StackEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackEntry")
            .field("route", &self.route.name)
            .field("path_params", &self.path_params)
            .field("query_params", &self.query_params)
            .field("uri", &self.uri)
            .field("pending", &self.pending.as_ref().map(PendingResult::key))
            .finish()
    }
}

/// Ordered navigation history that is never empty
#[derive(Debug)]
pub struct NavigationStack {
    root: StackEntry,
    above: Vec<StackEntry>,
}

impl NavigationStack {
    /// Create a stack holding only `root`
    pub fn new(root: StackEntry) -> Self {
        Self {
            root,
            above: Vec::new(),
        }
    }

    /// Topmost entry
    pub fn top(&self) -> &StackEntry {
        self.above.last().unwrap_or(&self.root)
    }

    /// Number of entries, always at least one
    pub fn len(&self) -> usize {
        self.above.len() + 1
    }

    /// Whether an entry above the root exists
    pub fn can_pop(&self) -> bool {
        !self.above.is_empty()
    }

    /// Entries from root to top
    pub fn entries(&self) -> impl Iterator<Item = &StackEntry> {
        std::iter::once(&self.root).chain(self.above.iter())
    }

    /// Routes from root to top
    pub fn routes(&self) -> Vec<RouteDefinition> {
        self.entries().map(|entry| entry.route.clone()).collect()
    }

    pub fn push(&mut self, entry: StackEntry) {
        self.above.push(entry);
    }

    /// Remove the top entry; the root is never removed
    pub fn pop(&mut self) -> Option<StackEntry> {
        self.above.pop()
    }

    /// Swap the top entry for `entry` in one step, returning the old top
    pub fn replace_top(&mut self, entry: StackEntry) -> StackEntry {
        match self.above.last_mut() {
            Some(top) => std::mem::replace(top, entry),
            None => std::mem::replace(&mut self.root, entry),
        }
    }

    /// Make `entry` the only entry, returning the discarded ones top first
    pub fn reset(&mut self, entry: StackEntry) -> Vec<StackEntry> {
        let mut discarded: Vec<StackEntry> = self.above.drain(..).rev().collect();
        discarded.push(std::mem::replace(&mut self.root, entry));
        discarded
    }
}

/// One navigation stack per tab with a single active tab
#[derive(Debug)]
pub struct TabStacks {
    stacks: Vec<NavigationStack>,
    active: usize,
}

impl TabStacks {
    /// Tab-less navigation: a single stack
    pub fn single(stack: NavigationStack) -> Self {
        Self {
            stacks: vec![stack],
            active: 0,
        }
    }

    /// One stack per root with `active` selected; `None` when `roots` is
    /// empty or `active` is out of range
    pub fn from_roots(roots: Vec<StackEntry>, active: usize) -> Option<Self> {
        if active >= roots.len() {
            return None;
        }

        Some(Self {
            stacks: roots.into_iter().map(NavigationStack::new).collect(),
            active,
        })
    }

    pub fn active(&self) -> &NavigationStack {
        &self.stacks[self.active]
    }

    pub fn active_mut(&mut self) -> &mut NavigationStack {
        &mut self.stacks[self.active]
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Stack of tab `index`
    pub fn get(&self, index: usize) -> Option<&NavigationStack> {
        self.stacks.get(index)
    }

    /// Make tab `index` active, leaving every stack untouched
    pub fn switch_to(&mut self, index: usize) -> bool {
        if index < self.stacks.len() {
            self.active = index;
            true
        } else {
            false
        }
    }

    /// Number of tabs
    pub fn len(&self) -> usize {
        self.stacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn entry(name: &str) -> StackEntry {
        StackEntry::new(RouteDefinition::new(name, format!("/{}", name)))
    }

    fn names(stack: &NavigationStack) -> Vec<String> {
        stack.routes().into_iter().map(|route| route.name).collect()
    }

    #[test]
    fn test_stack_never_pops_root() {
        let mut stack = NavigationStack::new(entry("home"));
        assert_eq!(stack.len(), 1);
        assert!(!stack.can_pop());
        assert!(stack.pop().is_none());

        stack.push(entry("settings"));
        assert!(stack.can_pop());
        assert_eq!(stack.top().route.name, "settings");
        assert_eq!(stack.pop().unwrap().route.name, "settings");
        assert!(stack.pop().is_none());
        assert_eq!(stack.top().route.name, "home");
    }

    #[test]
    fn test_replace_top_keeps_length() {
        let mut stack = NavigationStack::new(entry("home"));
        let old = stack.replace_top(entry("login"));
        assert_eq!(old.route.name, "home");
        assert_eq!(stack.len(), 1);

        stack.push(entry("a"));
        let old = stack.replace_top(entry("b"));
        assert_eq!(old.route.name, "a");
        assert_eq!(names(&stack), vec!["login", "b"]);
    }

    #[test]
    fn test_reset_discards_top_first() {
        let mut stack = NavigationStack::new(entry("login"));
        stack.push(entry("home"));
        stack.push(entry("settings"));

        let discarded = stack.reset(entry("login"));

        assert_eq!(stack.len(), 1);
        assert_eq!(stack.top().route.name, "login");
        let discarded: Vec<String> = discarded.into_iter().map(|e| e.route.name).collect();
        assert_eq!(discarded, vec!["settings", "home", "login"]);
    }

    #[test]
    fn test_settle_with_value() {
        let route = RouteDefinition::new("picker", "/picker");
        let (pending, mut receiver) = PendingResult::new(&route);
        let entry = StackEntry::new(route).with_pending(pending);
        assert!(entry.has_pending_result());

        assert!(entry.settle(Some(Box::new(7_u32))));

        let value = receiver.try_recv().unwrap().unwrap();
        assert_eq!(value.downcast_ref::<u32>(), Some(&7));
    }

    #[test]
    fn test_settle_without_value_cancels() {
        let route = RouteDefinition::new("picker", "/picker");
        let (pending, mut receiver) = PendingResult::new(&route);

        assert!(StackEntry::new(route).with_pending(pending).settle(None));

        let error = receiver.try_recv().unwrap().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NavigationCancelled);
    }

    #[test]
    fn test_settle_without_handle() {
        assert!(!entry("home").settle(None));
    }

    #[test]
    fn test_pending_keys_are_unique() {
        let route = RouteDefinition::new("picker", "/picker");
        let (first, _a) = PendingResult::new(&route);
        let (second, _b) = PendingResult::new(&route);
        assert_ne!(first.key(), second.key());
        assert!(first.key().starts_with("picker#"));
    }

    #[test]
    fn test_tabs_preserve_stacks() {
        let mut tabs = TabStacks::from_roots(vec![entry("feed"), entry("search")], 0).unwrap();
        tabs.active_mut().push(entry("post"));

        assert!(tabs.switch_to(1));
        assert_eq!(tabs.active().top().route.name, "search");
        assert!(!tabs.switch_to(2));
        assert_eq!(tabs.active_index(), 1);

        assert!(tabs.switch_to(0));
        assert_eq!(tabs.active().top().route.name, "post");
        assert_eq!(tabs.get(1).unwrap().len(), 1);
        assert_eq!(tabs.len(), 2);
    }

    #[test]
    fn test_tabs_reject_bad_roots() {
        assert!(TabStacks::from_roots(Vec::new(), 0).is_none());
        assert!(TabStacks::from_roots(vec![entry("feed")], 1).is_none());
        assert_eq!(TabStacks::single(NavigationStack::new(entry("home"))).len(), 1);
    }
}
