//! # Cascading Deletion
//!
//! A terminating parent deletes its owned children and waits for them to be
//! erased before touching its own remote counterpart.

use super::finalizer::is_being_deleted;
use super::types::ReconcilerError;
use crate::store::ObjectStore;
use kube::{Resource, ResourceExt};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeProgress {
    /// Children still exist; check again later
    Pending { remaining: usize },
    /// No owned children remain
    Complete,
}

/// Request deletion of every child owned by `owner_uid` and report progress
///
/// # Errors
/// Store failures while listing or deleting
pub async fn cascade_children<K>(
    store: &dyn ObjectStore<K>,
    namespace: &str,
    owner_uid: &str,
) -> Result<CascadeProgress, ReconcilerError>
where
    K: Resource + Clone + Send + Sync,
{
    let children = store.list_owned(namespace, owner_uid).await?;
    if children.is_empty() {
        return Ok(CascadeProgress::Complete);
    }

    for child in children.iter().filter(|c| !is_being_deleted(*c)) {
        info!(child = %child.name_any(), "Deleting owned child");
        store.delete(namespace, &child.name_any()).await?;
    }

    Ok(CascadeProgress::Pending {
        remaining: children.len(),
    })
}
