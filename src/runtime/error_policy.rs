//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loops.
//! This module handles reconciliation errors and controller stream errors.

use crate::controller::reconciler::{backoff_key, Context, ReconcilerError};
use crate::observability;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{error, info, warn};

/// How a failed reconciliation is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// The record vanished; its next event restarts reconciliation
    Gone,
    /// Retrying cannot help until the record or configuration changes
    AwaitChange,
    /// Worth retrying with backoff
    Backoff,
}

/// Classify a reconciliation error for the retry policy
#[must_use]
pub fn classify(error: &ReconcilerError) -> RetryClass {
    match error {
        e if e.is_not_found() => RetryClass::Gone,
        ReconcilerError::Configuration(_) => RetryClass::AwaitChange,
        _ => RetryClass::Backoff,
    }
}

/// Handle reconciliation errors with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing record never delays
/// another.
pub fn handle_reconciliation_error<K>(
    kind: &'static str,
    obj: &Arc<K>,
    error: &ReconcilerError,
    ctx: &Arc<Context>,
) -> Action
where
    K: Resource,
{
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = kind,
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    match classify(error) {
        RetryClass::Gone => {
            info!("{} {}/{} no longer exists", kind, namespace, name);
            ctx.forget_backoff(&backoff_key(kind, &namespace, &name));
            return Action::await_change();
        }
        RetryClass::AwaitChange => {
            warn!("Reconciliation of {} {}/{} cannot proceed: {}", kind, namespace, name, error);
            observability::metrics::increment_reconciliation_errors(kind);
            return Action::await_change();
        }
        RetryClass::Backoff => {}
    }

    error!("Reconciliation error for {} {}/{}: {:?}", kind, namespace, name, error);
    observability::metrics::increment_reconciliation_errors(kind);

    let (delay, error_count) = ctx.next_backoff(&backoff_key(kind, &namespace, &name));
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {})",
        delay.as_secs(),
        error_count
    );
    info!(
        "Next retry scheduled: {} (in {}s)",
        next_trigger_time.to_rfc3339(),
        delay.as_secs()
    );

    observability::metrics::increment_requeues("error_backoff");
    Action::requeue(delay)
}

/// Classification of errors surfaced by a controller stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    Unauthorized,
    ResourceVersionExpired,
    Throttled,
    NotFound,
    Other,
}

/// Classify a controller stream error from its debug rendering
///
/// 404 is checked before 401: a plain-text 404 body surfaces as a decode
/// error whose chain also mentions the failed watch.
#[must_use]
pub fn classify_stream_error(error_string: &str) -> StreamErrorKind {
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_401 = (error_string.contains("401") || error_string.contains("Unauthorized"))
        && !is_not_found;

    if is_401 {
        StreamErrorKind::Unauthorized
    } else if error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone")
    {
        StreamErrorKind::ResourceVersionExpired
    } else if error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests")
    {
        StreamErrorKind::Throttled
    } else if is_not_found {
        StreamErrorKind::NotFound
    } else {
        StreamErrorKind::Other
    }
}

/// Log a controller stream error at the level its class deserves
pub fn handle_stream_error(kind: &'static str, error_string: &str) -> StreamErrorKind {
    let error_span = tracing::span!(
        tracing::Level::WARN,
        "controller.watch.error",
        resource.kind = kind,
        error = %error_string
    );
    let _error_guard = error_span.enter();

    let class = classify_stream_error(error_string);
    match class {
        StreamErrorKind::Unauthorized => {
            error!(
                "Watch on {} failed with 401 Unauthorized; check the operator's ClusterRole and ServiceAccount token",
                kind
            );
        }
        StreamErrorKind::ResourceVersionExpired => {
            warn!(error_type = "410", "Watch resource version expired, watch will restart");
        }
        StreamErrorKind::Throttled => {
            warn!(error_type = "429", "API server throttling or reinitializing storage");
        }
        StreamErrorKind::NotFound => {
            warn!(
                "{} not found (404); the resource was deleted or its CRD is not installed: {}",
                kind, error_string
            );
        }
        StreamErrorKind::Other => {
            error!("Controller stream error for {}: {}", kind, error_string);
        }
    }
    class
}
