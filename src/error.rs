//! Error handling for navigation
//!
//! Every public navigation operation returns a [`NavigationResult`]. Expected
//! failures (a guard said no, a path did not match) travel as
//! [`NavigationError`] values; nothing in the public surface panics for them.

use crate::route::RouteDefinition;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Navigation Result Types
// ============================================================================

/// Result of a navigation operation.
pub type NavigationResult<T = ()> = Result<T, NavigationError>;

/// Shared, cloneable error source carried by [`NavigationError::Unknown`].
pub type ErrorSource = Arc<dyn StdError + Send + Sync + 'static>;

/// Closed taxonomy of navigation failures.
#[derive(Debug, Clone, Error)]
pub enum NavigationError {
    /// No catalog entry matches the requested path
    #[error("Route not found: {path}")]
    RouteNotFound { path: String },

    /// A guard rejected the navigation or redirected it elsewhere
    #[error("Navigation to '{route}' blocked by guard '{guard}'{}", describe_rejection(.reason, .redirect_to))]
    GuardRejected {
        /// Name of the guard that stopped the navigation
        guard: String,
        /// Name of the route that was requested
        route: String,
        /// Human-readable reason, if the guard gave one
        reason: Option<String>,
        /// Redirect target, if the guard redirected
        redirect_to: Option<RouteDefinition>,
    },

    /// Parameters are missing required bindings or hold invalid values
    #[error("Invalid parameters for '{route}': {message}")]
    InvalidParams { route: String, message: String },

    /// A pending navigation was abandoned before it produced a value
    #[error("Navigation to '{route}' cancelled: {reason}")]
    NavigationCancelled { route: String, reason: String },

    /// A URI could not be resolved to any route
    #[error("Cannot handle deep link '{uri}': {message}")]
    DeepLink { uri: String, message: String },

    /// Anything else, with the original cause kept for diagnostics
    #[error("Navigation failed during {context}: {message}")]
    Unknown {
        message: String,
        /// Operation that was running when the failure happened
        context: String,
        #[source]
        source: Option<ErrorSource>,
    },
}

fn describe_rejection(reason: &Option<String>, redirect_to: &Option<RouteDefinition>) -> String {
    match (reason, redirect_to) {
        (Some(reason), Some(target)) => format!(": {} (redirect to '{}')", reason, target.name),
        (Some(reason), None) => format!(": {}", reason),
        (None, Some(target)) => format!(" (redirect to '{}')", target.name),
        (None, None) => String::new(),
    }
}

/// Fieldless discriminant of [`NavigationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    RouteNotFound,
    GuardRejected,
    InvalidParams,
    NavigationCancelled,
    DeepLink,
    Unknown,
}

impl NavigationError {
    /// Build a [`NavigationError::Unknown`] without a source.
    pub fn unknown(context: impl Into<String>, message: impl Into<String>) -> Self {
        NavigationError::Unknown {
            message: message.into(),
            context: context.into(),
            source: None,
        }
    }

    /// Build a [`NavigationError::Unknown`] wrapping an underlying error.
    pub fn unknown_with_source<E>(context: impl Into<String>, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        NavigationError::Unknown {
            message: source.to_string(),
            context: context.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Build a [`NavigationError::NavigationCancelled`].
    pub fn cancelled(route: impl Into<String>, reason: impl Into<String>) -> Self {
        NavigationError::NavigationCancelled {
            route: route.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`NavigationError::InvalidParams`].
    pub fn invalid_params(route: impl Into<String>, message: impl Into<String>) -> Self {
        NavigationError::InvalidParams {
            route: route.into(),
            message: message.into(),
        }
    }

    /// Discriminant of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            NavigationError::RouteNotFound { .. } => ErrorKind::RouteNotFound,
            NavigationError::GuardRejected { .. } => ErrorKind::GuardRejected,
            NavigationError::InvalidParams { .. } => ErrorKind::InvalidParams,
            NavigationError::NavigationCancelled { .. } => ErrorKind::NavigationCancelled,
            NavigationError::DeepLink { .. } => ErrorKind::DeepLink,
            NavigationError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// Whether the router state is untouched and the caller may simply retry
    /// or take another path.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, NavigationError::Unknown { .. })
    }

    /// Redirect target if a guard redirected
    pub fn redirect_target(&self) -> Option<&RouteDefinition> {
        match self {
            NavigationError::GuardRejected { redirect_to, .. } => redirect_to.as_ref(),
            _ => None,
        }
    }
}

/// Helpers for consuming a [`NavigationResult`].
pub trait NavigationResultExt<T> {
    /// Collapse success and failure into one value.
    fn fold<R>(self, on_success: impl FnOnce(T) -> R, on_failure: impl FnOnce(NavigationError) -> R)
        -> R;

    /// Check if this failed with the given kind
    fn is_failure_of(&self, kind: ErrorKind) -> bool;
}

impl<T> NavigationResultExt<T> for NavigationResult<T> {
    fn fold<R>(
        self,
        on_success: impl FnOnce(T) -> R,
        on_failure: impl FnOnce(NavigationError) -> R,
    ) -> R {
        match self {
            Ok(value) => on_success(value),
            Err(error) => on_failure(error),
        }
    }

    fn is_failure_of(&self, kind: ErrorKind) -> bool {
        matches!(self, Err(error) if error.kind() == kind)
    }
}

// ============================================================================
// Error Handlers
// ============================================================================

/// Secondary failure channel, invoked on every failure path.
///
/// Receives the error and the route the failing operation targeted, if any.
pub type ErrorHandler = Arc<dyn Fn(&NavigationError, Option<&RouteDefinition>) + Send + Sync>;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Errors raised while assembling a route catalog or router configuration.
///
/// These are programmer errors surfaced once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid route path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    #[error("Duplicate route name '{name}'")]
    DuplicateName { name: String },

    #[error("Route templates '{first}' and '{second}' overlap")]
    OverlappingRoutes { first: String, second: String },

    #[error("Route '{name}' is not part of the catalog")]
    UnknownRoute { name: String },

    #[error("Initial route is required")]
    MissingInitialRoute,

    #[error("Shell route '{name}' is invalid: {message}")]
    InvalidShell { name: String, message: String },
}

// ============================================================================
// Tests
// ============================================================================
