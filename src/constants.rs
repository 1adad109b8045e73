//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group shared by every custom resource kind
pub const API_GROUP: &str = "apim.azure.stilas.418.cloud";

/// API version shared by every custom resource kind
pub const API_VERSION: &str = "v1alpha1";

/// Finalizer guarding `Api` records (version set plus owned versions)
pub const API_FINALIZER: &str = "api.finalizers.stilas.418.cloud";

/// Finalizer guarding `ApiVersion` records
pub const API_VERSION_FINALIZER: &str = "apiversion.finalizers.stilas.418.cloud";

/// Finalizer guarding `Backend` records
pub const BACKEND_FINALIZER: &str = "backend.finalizers.stilas.418.cloud";

/// Finalizer guarding `ProductApi` records
pub const PRODUCT_API_FINALIZER: &str = "productapi.finalizers.stilas.418.cloud";

/// Finalizer guarding `ProductApiVersion` records
pub const PRODUCT_API_VERSION_FINALIZER: &str = "productapiversion.finalizers.stilas.418.cloud";

/// Annotation carrying the remote version-set ID produced by a `ProductApiVersion`
/// onto its owning `ProductApi`
pub const PRODUCT_API_VERSION_ANNOTATION: &str = "apim.azure.stilas.418.cloud/productapiversion";

/// Version specifier used when a version declares none
pub const DEFAULT_VERSION_SPECIFIER: &str = "default";

/// Match token accepted by Azure for unconditional deletes
pub const MATCH_ANY: &str = "*";

/// Azure Resource Manager endpoint
pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

/// OAuth scope for Azure Resource Manager tokens
pub const ARM_TOKEN_SCOPE: &str = "https://management.azure.com/.default";

/// API Management REST API version
pub const APIM_API_VERSION: &str = "2022-08-01";

/// Header name used for `Header` versioning schemes when none is configured
pub const DEFAULT_VERSION_HEADER_NAME: &str = "Api-Version";

/// Query parameter used for `Query` versioning schemes when none is configured
pub const DEFAULT_VERSION_QUERY_NAME: &str = "api-version";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Requeue delay once a resource has converged (periodic drift check)
pub const DEFAULT_STEADY_STATE_REQUEUE_SECS: u64 = 60;

/// Requeue delay while a long-running operation is in flight
pub const DEFAULT_OPERATION_POLL_REQUEUE_SECS: u64 = 5;

/// Requeue delay while waiting on child records (creation or termination)
pub const DEFAULT_CHILD_WAIT_REQUEUE_SECS: u64 = 10;

/// Upper bound for a single reconciliation
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 120;

/// Timeout for individual outbound HTTP calls
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Fibonacci backoff floor for transient errors (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Fibonacci backoff ceiling for transient errors (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Maximum concurrent reconciliations per kind
pub const DEFAULT_MAX_CONCURRENT_RECONCILIATIONS: u16 = 10;

/// Attempts made for a single store write before surfacing a conflict
pub const STORE_WRITE_ATTEMPTS: usize = 3;
