//! # Declarative Store
//!
//! The reconcilers read and write custom resources through [`ObjectStore`],
//! so the same logic runs against the Kubernetes API server or an in-memory
//! store in tests.
//!
//! Every write is conditional on the `resourceVersion` carried by the object
//! being written. A stale version surfaces as [`StoreError::Conflict`]; the
//! caller decides whether to refetch and retry (see
//! `controller::reconciler::status`).

mod kube;

pub use self::kube::KubeStore;

use async_trait::async_trait;
use thiserror::Error;

/// Result of a store operation
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed object does not exist
    #[error("object {0} not found")]
    NotFound(String),
    /// The write carried a stale `resourceVersion`
    #[error("conflicting write to {0}: object was modified concurrently")]
    Conflict(String),
    /// The object is missing metadata required for the operation
    #[error("object is missing {0}")]
    MissingMetadata(&'static str),
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] ::kube::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Namespaced object storage with owner-reference lookups
///
/// `replace` writes metadata and spec, `replace_status` writes only the status
/// subresource. Both fail with [`StoreError::Conflict`] when the stored
/// `resourceVersion` differs from the one on the argument.
#[async_trait]
pub trait ObjectStore<K: Send + Sync>: Send + Sync {
    /// Fetch an object; `None` when it does not exist
    async fn get(&self, namespace: &str, name: &str) -> StoreResult<Option<K>>;

    /// Create an object in `namespace`
    async fn create(&self, namespace: &str, obj: &K) -> StoreResult<K>;

    /// Replace metadata and spec of an existing object
    async fn replace(&self, obj: &K) -> StoreResult<K>;

    /// Replace the status subresource of an existing object
    async fn replace_status(&self, obj: &K) -> StoreResult<K>;

    /// Request deletion; deleting an absent object succeeds
    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<()>;

    /// Objects in `namespace` carrying an owner reference with `owner_uid`
    async fn list_owned(&self, namespace: &str, owner_uid: &str) -> StoreResult<Vec<K>>;
}
