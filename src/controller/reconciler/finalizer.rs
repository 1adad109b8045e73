//! # Finalizers
//!
//! Each kind blocks erasure with its own finalizer until remote cleanup is
//! done.

use super::status::update_object;
use super::types::ReconcilerError;
use crate::store::ObjectStore;
use kube::{Resource, ResourceExt};

#[must_use]
pub fn has_finalizer<K: Resource>(obj: &K, finalizer: &str) -> bool {
    obj.finalizers().iter().any(|f| f == finalizer)
}

#[must_use]
pub fn is_being_deleted<K: Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}

/// Add `finalizer` if absent
///
/// # Errors
/// Store failures after conflict retries
pub async fn add_finalizer<K>(
    store: &dyn ObjectStore<K>,
    obj: &K,
    finalizer: &str,
) -> Result<K, ReconcilerError>
where
    K: Resource + Clone + Send + Sync,
{
    update_object(store, obj, |o: &mut K| {
        if !has_finalizer(o, finalizer) {
            o.finalizers_mut().push(finalizer.to_string());
        }
    })
    .await
}

/// Remove `finalizer`, letting the store erase the record
///
/// # Errors
/// Store failures after conflict retries
pub async fn remove_finalizer<K>(
    store: &dyn ObjectStore<K>,
    obj: &K,
    finalizer: &str,
) -> Result<K, ReconcilerError>
where
    K: Resource + Clone + Send + Sync,
{
    update_object(store, obj, |o: &mut K| {
        o.finalizers_mut().retain(|f| f != finalizer);
    })
    .await
}

/// Where a freshly read record stands relative to its finalizer
#[derive(Debug)]
pub enum Lifecycle<K> {
    /// The record no longer exists
    Absent,
    /// The finalizer was just added; reconcile again
    FinalizerAdded,
    /// Deletion requested and already cleaned up
    Released,
    /// Deletion requested; cleanup pending
    Terminating(K),
    Active(K),
}

/// Refetch `obj` and make sure it carries `finalizer` unless it is going away
///
/// # Errors
/// Store failures
pub async fn observe_lifecycle<K>(
    store: &dyn ObjectStore<K>,
    obj: &K,
    finalizer: &str,
) -> Result<Lifecycle<K>, ReconcilerError>
where
    K: Resource + Clone + Send + Sync,
{
    let namespace = obj
        .namespace()
        .ok_or(crate::store::StoreError::MissingMetadata("metadata.namespace"))?;
    let Some(current) = store.get(&namespace, &obj.name_any()).await? else {
        return Ok(Lifecycle::Absent);
    };

    match (is_being_deleted(&current), has_finalizer(&current, finalizer)) {
        (false, false) => {
            add_finalizer(store, &current, finalizer).await?;
            Ok(Lifecycle::FinalizerAdded)
        }
        (false, true) => Ok(Lifecycle::Active(current)),
        (true, true) => Ok(Lifecycle::Terminating(current)),
        (true, false) => Ok(Lifecycle::Released),
    }
}
