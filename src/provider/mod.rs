//! # Provider Modules
//!
//! The remote provisioning gateway: a typed facade over Azure API Management.
//!
//! - [`ApimGateway`] exposes get / create-or-update / delete per resource kind
//! - [`OperationPoller`] drives one long-running create-or-update
//! - [`azure`] implements both over the Azure Resource Manager REST API

use async_trait::async_trait;
use thiserror::Error;

pub mod azure;
pub mod models;

pub use models::{
    ApiContract, ApiProperties, BackendContract, BackendProperties, BackendTls, ContactContract,
    PolicyContract, PolicyProperties, VersionSetContract, VersionSetProperties,
};

/// Result of a gateway call
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway failures
///
/// `NotFound` is kept distinct from every other failure so callers can use
/// lookups as existence probes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("remote resource not found")]
    NotFound,
    /// Network failure, timeout, throttling or a 5xx response
    #[error("transient APIM failure: {0}")]
    Transient(String),
    /// Any other non-success response
    #[error("APIM rejected the request ({status}): {code}: {message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
    },
    /// A long-running operation reached a failed or cancelled terminal state
    #[error("long-running operation failed: {0}")]
    OperationFailed(String),
    #[error("failed to acquire Azure credential: {0}")]
    Credential(String),
    #[error("invalid resume token: {0}")]
    InvalidResumeToken(String),
    #[error("failed to decode APIM response: {0}")]
    Decode(String),
}

impl GatewayError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound)
    }

    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient(_) | GatewayError::Credential(_))
    }

    /// Classify a non-success HTTP status
    #[must_use]
    pub fn from_status(status: u16, code: Option<String>, message: Option<String>) -> Self {
        match status {
            404 => GatewayError::NotFound,
            408 | 429 | 500..=599 => GatewayError::Transient(format!(
                "HTTP {status}: {}",
                message.unwrap_or_else(|| "no error details".to_string())
            )),
            _ => GatewayError::Remote {
                status,
                code: code.unwrap_or_else(|| "Unknown".to_string()),
                message: message.unwrap_or_default(),
            },
        }
    }
}

/// Outcome of a delete call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Status reported by one poll of a long-running operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    InProgress,
    Succeeded,
    Failed(String),
}

/// Handle to a long-running create-or-update
///
/// A poller holds no state beyond what its resume token encodes, so a poller
/// rebuilt from [`OperationPoller::resume_token`] continues the same remote
/// operation.
#[async_trait]
pub trait OperationPoller<T>: Send {
    /// Perform one status round trip
    async fn poll(&mut self) -> GatewayResult<PollState>;

    /// Whether the last poll reached a terminal state
    fn is_done(&self) -> bool;

    /// Terminal result; only meaningful once [`OperationPoller::is_done`]
    async fn result(&mut self) -> GatewayResult<T>;

    /// Serializable continuation for this operation
    fn resume_token(&self) -> GatewayResult<String>;
}

/// Azure API Management operations used by the reconcilers
///
/// `get_*` return `Ok(None)` for absent resources. `delete_*` take an
/// entity-tag match token (`*` matches anything) and report absence as
/// [`DeleteOutcome::NotFound`].
#[async_trait]
pub trait ApimGateway: Send + Sync {
    async fn get_version_set(&self, id: &str) -> GatewayResult<Option<VersionSetContract>>;

    async fn create_or_update_version_set(
        &self,
        id: &str,
        payload: &VersionSetContract,
    ) -> GatewayResult<VersionSetContract>;

    async fn delete_version_set(&self, id: &str, match_token: &str) -> GatewayResult<DeleteOutcome>;

    async fn get_api(&self, id: &str) -> GatewayResult<Option<ApiContract>>;

    /// Start a create-or-update, or rebuild the poller of an in-flight one
    ///
    /// When `resume_token` is present no new request is issued; the returned
    /// poller continues the operation the token identifies.
    async fn begin_create_or_update_api(
        &self,
        id: &str,
        payload: &ApiContract,
        resume_token: Option<&str>,
    ) -> GatewayResult<Box<dyn OperationPoller<ApiContract>>>;

    async fn delete_api(&self, id: &str, match_token: &str) -> GatewayResult<DeleteOutcome>;

    async fn get_api_policy(&self, api_id: &str) -> GatewayResult<Option<PolicyContract>>;

    async fn create_or_update_api_policy(
        &self,
        api_id: &str,
        payload: &PolicyContract,
    ) -> GatewayResult<PolicyContract>;

    async fn delete_api_policy(&self, api_id: &str, match_token: &str) -> GatewayResult<DeleteOutcome>;

    /// Publish an API in a product
    async fn link_product_api(&self, product_id: &str, api_id: &str) -> GatewayResult<()>;

    async fn get_backend(&self, id: &str) -> GatewayResult<Option<BackendContract>>;

    async fn create_or_update_backend(
        &self,
        id: &str,
        payload: &BackendContract,
    ) -> GatewayResult<BackendContract>;

    async fn delete_backend(&self, id: &str, match_token: &str) -> GatewayResult<DeleteOutcome>;
}
