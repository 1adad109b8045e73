//! # Reconciler
//!
//! One reconciler per kind, all driven by the same lifecycle:
//!
//! 1. Refetch the record; a vanished record needs nothing
//! 2. Add the kind's finalizer on first sight
//! 3. On deletion, clean up children first, then the remote counterpart,
//!    then release the finalizer
//! 4. Otherwise compare desired state with the remote counterpart and apply
//!    the difference, resuming any long-running operation in flight
//!
//! ## Linkage
//!
//! - `Api` owns one `ApiVersion` per declared version (owner reference),
//!   and hands down the version-set ID through the child's spec
//! - `ProductApi` owns a same-named `ProductApiVersion` and picks up its
//!   version-set ID through an annotation

pub mod api;
pub mod api_operation;
pub mod api_version;
pub mod backend;
pub mod cascade;
pub mod digest;
pub mod finalizer;
pub mod lro;
pub mod naming;
pub mod payload;
pub mod product_api;
pub mod product_api_version;
pub mod status;
pub mod types;

pub use api::reconcile_api;
pub use api_version::reconcile_api_version;
pub use backend::reconcile_backend;
pub use digest::{ContentDigester, ContentFetcher, DigestError, HttpContentFetcher};
pub use product_api::reconcile_product_api;
pub use product_api_version::reconcile_product_api_version;
pub use types::{backoff_key, BackoffState, Context, ReconcilerError, Stores};

use crate::observability::metrics;
use crate::provider::ApimGateway;
use crate::store::StoreError;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::warn;

/// Converged; look again later for out-of-band drift
pub(crate) fn requeue_steady(ctx: &Context) -> Action {
    metrics::increment_requeues("steady_state");
    Action::requeue(ctx.config.steady_state_requeue())
}

/// A long-running operation is still in flight
pub(crate) fn requeue_operation(ctx: &Context) -> Action {
    metrics::increment_requeues("operation_in_progress");
    Action::requeue(ctx.config.operation_poll_requeue())
}

/// Waiting on child records to provision or disappear
pub(crate) fn requeue_children(ctx: &Context) -> Action {
    metrics::increment_requeues("child_wait");
    Action::requeue(ctx.config.child_wait_requeue())
}

/// The configured gateway, or `None` after logging why there is none
pub(crate) fn configured_gateway(ctx: &Context, kind: &str, name: &str) -> Option<Arc<dyn ApimGateway>> {
    match ctx.gateway() {
        Ok(gateway) => Some(gateway),
        Err(e) => {
            warn!(kind, resource.name = name, error = %e, "Skipping reconciliation");
            None
        }
    }
}

/// Namespace, name and UID of a stored record
pub(crate) fn identity<K: Resource>(obj: &K) -> Result<(String, String, String), StoreError> {
    let namespace = obj
        .namespace()
        .ok_or(StoreError::MissingMetadata("metadata.namespace"))?;
    let uid = obj.uid().ok_or(StoreError::MissingMetadata("metadata.uid"))?;
    Ok((namespace, obj.name_any(), uid))
}

/// Whether `obj` carries an owner reference to `owner_uid`
pub(crate) fn is_owned_by<K: Resource>(obj: &K, owner_uid: &str) -> bool {
    obj.owner_references().iter().any(|r| r.uid == owner_uid)
}
