//! # Api Reconciler
//!
//! Keeps the API version set in sync and derives one owned `ApiVersion`
//! record per declared version. Versions dropped from the spec are pruned;
//! on deletion the children go first and the version set last.

use super::cascade::{cascade_children, CascadeProgress};
use super::finalizer::{is_being_deleted, observe_lifecycle, remove_finalizer, Lifecycle};
use super::naming::{child_record_name, parent_remote_id};
use super::payload::{api_version_set, derived_api_version};
use super::status::{update_object, write_status};
use super::types::{Context, ReconcilerError};
use super::{configured_gateway, identity, is_owned_by, requeue_children, requeue_steady};
use crate::constants::{API_FINALIZER, MATCH_ANY};
use crate::crd::{Api, ApiStatus, ApiVersion, ProvisioningState};
use crate::provider::{ApimGateway, DeleteOutcome};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reconcile one `Api`
///
/// # Errors
/// Store, gateway and transient failures; retried with backoff
pub async fn reconcile_api(obj: Arc<Api>, ctx: Arc<Context>) -> Result<Action, ReconcilerError> {
    let store = ctx.stores.apis.as_ref();
    let api = match observe_lifecycle(store, obj.as_ref(), API_FINALIZER).await? {
        Lifecycle::Absent | Lifecycle::Released => return Ok(Action::await_change()),
        Lifecycle::FinalizerAdded => return Ok(Action::requeue(std::time::Duration::ZERO)),
        Lifecycle::Terminating(api) | Lifecycle::Active(api) => api,
    };

    let Some(gateway) = configured_gateway(&ctx, "Api", &api.name_any()) else {
        return Ok(Action::await_change());
    };

    if is_being_deleted(&api) {
        finalize(&ctx, gateway.as_ref(), &api).await
    } else {
        apply(&ctx, gateway.as_ref(), api).await
    }
}

async fn apply(ctx: &Context, gateway: &dyn ApimGateway, api: Api) -> Result<Action, ReconcilerError> {
    let store = ctx.stores.apis.as_ref();
    let (namespace, name, uid) = identity(&api)?;
    let remote_id = parent_remote_id(&namespace, &name);

    let desired = api_version_set(&api.spec);
    let version_set = match gateway.get_version_set(&remote_id).await? {
        Some(remote) if !desired.properties.differs_from(&remote.properties) => {
            debug!(version_set = %remote_id, "Version set up to date");
            remote
        }
        existing => {
            info!(
                version_set = %remote_id,
                create = existing.is_none(),
                "Applying version set"
            );
            match gateway.create_or_update_version_set(&remote_id, &desired).await {
                Ok(contract) => contract,
                Err(e) => {
                    if !e.is_transient() {
                        write_status(store, &api, |a: &mut Api| {
                            a.status.get_or_insert_with(ApiStatus::default).provisioning_state =
                                Some(ProvisioningState::Failed);
                        })
                        .await?;
                    }
                    return Err(e.into());
                }
            }
        }
    };
    let version_set_id = version_set.id.unwrap_or_else(|| remote_id.clone());

    let version_states = sync_children(ctx, &api, &namespace, &name, &uid, &version_set_id).await?;
    let children_ready = version_states
        .values()
        .all(|state| *state == ProvisioningState::Succeeded);

    let desired_status = ApiStatus {
        provisioning_state: Some(ProvisioningState::Succeeded),
        api_version_set_id: Some(version_set_id),
        version_states,
    };
    if api.status.as_ref() != Some(&desired_status) {
        write_status(store, &api, |a: &mut Api| {
            a.status = Some(desired_status.clone());
        })
        .await?;
    }

    Ok(if children_ready {
        requeue_steady(ctx)
    } else {
        requeue_children(ctx)
    })
}

/// Create, update and prune owned `ApiVersion` records; returns their states
async fn sync_children(
    ctx: &Context,
    api: &Api,
    namespace: &str,
    name: &str,
    uid: &str,
    version_set_id: &str,
) -> Result<BTreeMap<String, ProvisioningState>, ReconcilerError> {
    let children = ctx.stores.api_versions.as_ref();
    let mut states = BTreeMap::new();
    let mut declared = BTreeSet::new();

    for version in &api.spec.versions {
        let child_name = child_record_name(name, version.name.as_deref());
        if !declared.insert(child_name.clone()) {
            warn!(child = %child_name, "Duplicate version declared, ignoring");
            continue;
        }
        let desired_spec = derived_api_version(&api.spec, version_set_id, version);

        let state = match children.get(namespace, &child_name).await? {
            None => {
                let Some(owner) = api.controller_owner_ref(&()) else {
                    return Err(crate::store::StoreError::MissingMetadata("owner reference").into());
                };
                let mut child = ApiVersion::new(&child_name, desired_spec);
                child.metadata.namespace = Some(namespace.to_string());
                child.metadata.owner_references = Some(vec![owner]);
                info!(child = %child_name, "Creating ApiVersion");
                children.create(namespace, &child).await?;
                ProvisioningState::Provisioning
            }
            Some(existing) if !is_owned_by(&existing, uid) => {
                warn!(
                    child = %child_name,
                    "ApiVersion exists but is not owned by this Api, leaving it alone"
                );
                continue;
            }
            Some(existing) => {
                if existing.spec != desired_spec {
                    info!(child = %child_name, "Updating ApiVersion");
                    update_object(children, &existing, |c: &mut ApiVersion| {
                        c.spec = desired_spec.clone();
                    })
                    .await?;
                }
                existing
                    .status
                    .as_ref()
                    .and_then(|s| s.operation.provisioning_state)
                    .unwrap_or(ProvisioningState::Provisioning)
            }
        };
        states.insert(child_name, state);
    }

    for child in children.list_owned(namespace, uid).await? {
        let child_name = child.name_any();
        if !declared.contains(&child_name) && !is_being_deleted(&child) {
            info!(child = %child_name, "Pruning ApiVersion no longer declared");
            children.delete(namespace, &child_name).await?;
        }
    }

    Ok(states)
}

async fn finalize(ctx: &Context, gateway: &dyn ApimGateway, api: &Api) -> Result<Action, ReconcilerError> {
    let (namespace, name, uid) = identity(api)?;

    if let CascadeProgress::Pending { remaining } =
        cascade_children(ctx.stores.api_versions.as_ref(), &namespace, &uid).await?
    {
        info!(remaining, "Waiting for ApiVersions to be deleted");
        return Ok(requeue_children(ctx));
    }

    let remote_id = parent_remote_id(&namespace, &name);
    if gateway.delete_version_set(&remote_id, MATCH_ANY).await? == DeleteOutcome::NotFound {
        debug!(version_set = %remote_id, "Version set already gone");
    }
    remove_finalizer(ctx.stores.apis.as_ref(), api, API_FINALIZER).await?;
    info!(version_set = %remote_id, "Api deleted");
    Ok(Action::await_change())
}
