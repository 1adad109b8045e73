//! # Backend Reconciler

use super::finalizer::{is_being_deleted, observe_lifecycle, remove_finalizer, Lifecycle};
use super::naming::parent_remote_id;
use super::payload::backend_contract;
use super::status::write_status;
use super::types::{Context, ReconcilerError};
use super::{configured_gateway, identity, requeue_steady};
use crate::constants::{BACKEND_FINALIZER, MATCH_ANY};
use crate::crd::{Backend, BackendStatus, ProvisioningState};
use crate::provider::{ApimGateway, DeleteOutcome};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info};

/// Reconcile one `Backend`
///
/// # Errors
/// Store, gateway and transient failures; retried with backoff
pub async fn reconcile_backend(
    obj: Arc<Backend>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcilerError> {
    let store = ctx.stores.backends.as_ref();
    let backend = match observe_lifecycle(store, obj.as_ref(), BACKEND_FINALIZER).await? {
        Lifecycle::Absent | Lifecycle::Released => return Ok(Action::await_change()),
        Lifecycle::FinalizerAdded => return Ok(Action::requeue(std::time::Duration::ZERO)),
        Lifecycle::Terminating(backend) | Lifecycle::Active(backend) => backend,
    };

    let Some(gateway) = configured_gateway(&ctx, "Backend", &backend.name_any()) else {
        return Ok(Action::await_change());
    };

    if is_being_deleted(&backend) {
        finalize(&ctx, gateway.as_ref(), &backend).await
    } else {
        apply(&ctx, gateway.as_ref(), backend).await
    }
}

async fn apply(
    ctx: &Context,
    gateway: &dyn ApimGateway,
    backend: Backend,
) -> Result<Action, ReconcilerError> {
    let store = ctx.stores.backends.as_ref();
    let (namespace, name, _) = identity(&backend)?;
    let remote_id = parent_remote_id(&namespace, &name);
    let desired = backend_contract(&backend.spec);

    let contract = match gateway.get_backend(&remote_id).await? {
        Some(remote) if !desired.properties.differs_from(&remote.properties) => {
            debug!(backend = %remote_id, "Backend up to date");
            remote
        }
        existing => {
            info!(backend = %remote_id, create = existing.is_none(), "Applying backend");
            match gateway.create_or_update_backend(&remote_id, &desired).await {
                Ok(contract) => contract,
                Err(e) => {
                    if !e.is_transient() {
                        write_status(store, &backend, |b: &mut Backend| {
                            b.status
                                .get_or_insert_with(BackendStatus::default)
                                .provisioning_state = Some(ProvisioningState::Failed);
                        })
                        .await?;
                    }
                    return Err(e.into());
                }
            }
        }
    };

    let desired_status = BackendStatus {
        backend_id: Some(contract.id.unwrap_or(remote_id)),
        provisioning_state: Some(ProvisioningState::Succeeded),
    };
    if backend.status.as_ref() != Some(&desired_status) {
        write_status(store, &backend, |b: &mut Backend| {
            b.status = Some(desired_status.clone());
        })
        .await?;
    }
    Ok(requeue_steady(ctx))
}

async fn finalize(
    ctx: &Context,
    gateway: &dyn ApimGateway,
    backend: &Backend,
) -> Result<Action, ReconcilerError> {
    let (namespace, name, _) = identity(backend)?;
    let remote_id = parent_remote_id(&namespace, &name);

    match gateway.get_backend(&remote_id).await? {
        Some(remote) => {
            let match_token = remote.etag.as_deref().unwrap_or(MATCH_ANY);
            if gateway.delete_backend(&remote_id, match_token).await? == DeleteOutcome::NotFound {
                debug!(backend = %remote_id, "Backend already gone");
            }
        }
        None => debug!(backend = %remote_id, "Backend already gone"),
    }

    remove_finalizer(ctx.stores.backends.as_ref(), backend, BACKEND_FINALIZER).await?;
    info!(backend = %remote_id, "Backend deleted");
    Ok(Action::await_change())
}
