//! # Store Writes
//!
//! Conditional writes with conflict retry. A conflicting write refetches the
//! record, re-applies the same mutation and tries again, up to
//! [`STORE_WRITE_ATTEMPTS`] times within one reconciliation.

use super::types::ReconcilerError;
use crate::constants::STORE_WRITE_ATTEMPTS;
use crate::store::{ObjectStore, StoreError};
use kube::{Resource, ResourceExt};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteTarget {
    Object,
    Status,
}

async fn write_with_retry<K, F>(
    store: &dyn ObjectStore<K>,
    obj: &K,
    target: WriteTarget,
    mut mutate: F,
) -> Result<K, ReconcilerError>
where
    K: Resource + Clone + Send + Sync,
    F: FnMut(&mut K) + Send,
{
    let namespace = obj
        .namespace()
        .ok_or(StoreError::MissingMetadata("metadata.namespace"))?;
    let name = obj.name_any();
    let mut current = obj.clone();

    for attempt in 1..=STORE_WRITE_ATTEMPTS {
        mutate(&mut current);
        let written = match target {
            WriteTarget::Object => store.replace(&current).await,
            WriteTarget::Status => store.replace_status(&current).await,
        };
        match written {
            Ok(written) => return Ok(written),
            Err(e) if e.is_conflict() && attempt < STORE_WRITE_ATTEMPTS => {
                debug!(
                    resource.name = %name,
                    attempt,
                    write = ?target,
                    "Write conflict, refetching"
                );
                current = store
                    .get(&namespace, &name)
                    .await?
                    .ok_or_else(|| StoreError::NotFound(format!("{namespace}/{name}")))?;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(StoreError::Conflict(format!("{namespace}/{name}")).into())
}

/// Apply `mutate` to the status of `obj` and persist it
///
/// # Errors
/// The last store error once retries are exhausted
pub async fn write_status<K, F>(
    store: &dyn ObjectStore<K>,
    obj: &K,
    mutate: F,
) -> Result<K, ReconcilerError>
where
    K: Resource + Clone + Send + Sync,
    F: FnMut(&mut K) + Send,
{
    write_with_retry(store, obj, WriteTarget::Status, mutate).await
}

/// Apply `mutate` to the metadata or spec of `obj` and persist it
///
/// # Errors
/// The last store error once retries are exhausted
pub async fn update_object<K, F>(
    store: &dyn ObjectStore<K>,
    obj: &K,
    mutate: F,
) -> Result<K, ReconcilerError>
where
    K: Resource + Clone + Send + Sync,
    F: FnMut(&mut K) + Send,
{
    write_with_retry(store, obj, WriteTarget::Object, mutate).await
}
