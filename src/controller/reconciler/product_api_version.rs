//! # ProductApiVersion Reconciler
//!
//! Maintains the version set behind a versioned `ProductApi`. The owning
//! `ProductApi` reads the resulting ID from this record's status.

use super::finalizer::{is_being_deleted, observe_lifecycle, remove_finalizer, Lifecycle};
use super::naming::parent_remote_id;
use super::payload::product_version_set;
use super::status::write_status;
use super::types::{Context, ReconcilerError};
use super::{configured_gateway, identity, requeue_steady};
use crate::constants::{MATCH_ANY, PRODUCT_API_VERSION_FINALIZER};
use crate::crd::{ProductApiVersion, ProductApiVersionStatus, ProvisioningState};
use crate::provider::{ApimGateway, DeleteOutcome};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info};

/// Reconcile one `ProductApiVersion`
///
/// # Errors
/// Store, gateway and transient failures; retried with backoff
pub async fn reconcile_product_api_version(
    obj: Arc<ProductApiVersion>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcilerError> {
    let store = ctx.stores.product_api_versions.as_ref();
    let version = match observe_lifecycle(store, obj.as_ref(), PRODUCT_API_VERSION_FINALIZER).await? {
        Lifecycle::Absent | Lifecycle::Released => return Ok(Action::await_change()),
        Lifecycle::FinalizerAdded => return Ok(Action::requeue(std::time::Duration::ZERO)),
        Lifecycle::Terminating(version) | Lifecycle::Active(version) => version,
    };

    let Some(gateway) = configured_gateway(&ctx, "ProductApiVersion", &version.name_any()) else {
        return Ok(Action::await_change());
    };

    if is_being_deleted(&version) {
        finalize(&ctx, gateway.as_ref(), &version).await
    } else {
        apply(&ctx, gateway.as_ref(), version).await
    }
}

async fn apply(
    ctx: &Context,
    gateway: &dyn ApimGateway,
    version: ProductApiVersion,
) -> Result<Action, ReconcilerError> {
    let store = ctx.stores.product_api_versions.as_ref();
    let (namespace, name, _) = identity(&version)?;
    let remote_id = parent_remote_id(&namespace, &name);
    let desired = product_version_set(&version.spec);

    let contract = match gateway.get_version_set(&remote_id).await? {
        Some(remote) if !desired.properties.differs_from(&remote.properties) => remote,
        existing => {
            info!(version_set = %remote_id, create = existing.is_none(), "Applying product version set");
            match gateway.create_or_update_version_set(&remote_id, &desired).await {
                Ok(contract) => contract,
                Err(e) => {
                    if !e.is_transient() {
                        write_status(store, &version, |v: &mut ProductApiVersion| {
                            v.status
                                .get_or_insert_with(ProductApiVersionStatus::default)
                                .provisioning_state = Some(ProvisioningState::Failed);
                        })
                        .await?;
                    }
                    return Err(e.into());
                }
            }
        }
    };

    let desired_status = ProductApiVersionStatus {
        api_version_set_id: Some(contract.id.unwrap_or(remote_id)),
        provisioning_state: Some(ProvisioningState::Succeeded),
    };
    if version.status.as_ref() != Some(&desired_status) {
        write_status(store, &version, |v: &mut ProductApiVersion| {
            v.status = Some(desired_status.clone());
        })
        .await?;
    }
    Ok(requeue_steady(ctx))
}

async fn finalize(
    ctx: &Context,
    gateway: &dyn ApimGateway,
    version: &ProductApiVersion,
) -> Result<Action, ReconcilerError> {
    let (namespace, name, _) = identity(version)?;
    let remote_id = parent_remote_id(&namespace, &name);

    if gateway.delete_version_set(&remote_id, MATCH_ANY).await? == DeleteOutcome::NotFound {
        debug!(version_set = %remote_id, "Version set already gone");
    }
    remove_finalizer(
        ctx.stores.product_api_versions.as_ref(),
        version,
        PRODUCT_API_VERSION_FINALIZER,
    )
    .await?;
    info!(version_set = %remote_id, "ProductApiVersion deleted");
    Ok(Action::await_change())
}
