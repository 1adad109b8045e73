//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::{env_var_or_default, env_var_non_empty};
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// How long to wait for the HTTP server to bind (seconds)
    pub server_startup_timeout_secs: u64,
    /// Poll interval while waiting for the HTTP server (milliseconds)
    pub server_poll_interval_ms: u64,
    /// Maximum concurrent reconciliations per kind
    pub max_concurrent_reconciliations: u16,
    /// Upper bound for a single reconciliation (seconds)
    pub reconcile_timeout_secs: u64,
    /// Requeue delay once a resource has converged (seconds)
    pub steady_state_requeue_secs: u64,
    /// Requeue delay while a long-running operation is in flight (seconds)
    pub operation_poll_requeue_secs: u64,
    /// Requeue delay while waiting on child records (seconds)
    pub child_wait_requeue_secs: u64,
    /// Fibonacci backoff floor for transient errors (seconds)
    pub backoff_min_secs: u64,
    /// Fibonacci backoff ceiling for transient errors (seconds)
    pub backoff_max_secs: u64,
    /// Timeout for outbound HTTP calls (seconds)
    pub http_timeout_secs: u64,
    /// Namespace to watch; `None` watches all namespaces
    pub watch_namespace: Option<String>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            steady_state_requeue_secs: DEFAULT_STEADY_STATE_REQUEUE_SECS,
            operation_poll_requeue_secs: DEFAULT_OPERATION_POLL_REQUEUE_SECS,
            child_wait_requeue_secs: DEFAULT_CHILD_WAIT_REQUEUE_SECS,
            backoff_min_secs: DEFAULT_BACKOFF_MIN_SECS,
            backoff_max_secs: DEFAULT_BACKOFF_MAX_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            watch_namespace: None,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            server_startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            server_poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            reconcile_timeout_secs: env_var_or_default(
                "RECONCILE_TIMEOUT_SECS",
                DEFAULT_RECONCILE_TIMEOUT_SECS,
            ),
            steady_state_requeue_secs: env_var_or_default(
                "STEADY_STATE_REQUEUE_SECS",
                DEFAULT_STEADY_STATE_REQUEUE_SECS,
            ),
            operation_poll_requeue_secs: env_var_or_default(
                "OPERATION_POLL_REQUEUE_SECS",
                DEFAULT_OPERATION_POLL_REQUEUE_SECS,
            ),
            child_wait_requeue_secs: env_var_or_default(
                "CHILD_WAIT_REQUEUE_SECS",
                DEFAULT_CHILD_WAIT_REQUEUE_SECS,
            ),
            backoff_min_secs: env_var_or_default("BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS),
            backoff_max_secs: env_var_or_default("BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS),
            http_timeout_secs: env_var_or_default("HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS),
            watch_namespace: env_var_non_empty("WATCH_NAMESPACE"),
        }
    }

    /// Get reconciliation timeout duration
    #[must_use]
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Get steady-state requeue duration
    #[must_use]
    pub fn steady_state_requeue(&self) -> Duration {
        Duration::from_secs(self.steady_state_requeue_secs)
    }

    /// Get in-flight operation requeue duration
    #[must_use]
    pub fn operation_poll_requeue(&self) -> Duration {
        Duration::from_secs(self.operation_poll_requeue_secs)
    }

    /// Get child wait requeue duration
    #[must_use]
    pub fn child_wait_requeue(&self) -> Duration {
        Duration::from_secs(self.child_wait_requeue_secs)
    }

    /// Get outbound HTTP timeout duration
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
