//! # ProductApi Reconciler
//!
//! A versioned `ProductApi` first provisions a same-named `ProductApiVersion`,
//! waits for its version set, and records the version-set ID in an
//! annotation. The API itself is then applied through the same long-running
//! operation flow as `ApiVersion`.

use super::api_operation::{
    digest_definition, drive_api_operation, link_products, mark_invalid, needs_apply, ApiApply,
    ApplyOutcome,
};
use super::cascade::{cascade_children, CascadeProgress};
use super::finalizer::{is_being_deleted, observe_lifecycle, remove_finalizer, Lifecycle};
use super::naming::parent_remote_id;
use super::payload::{effective_content_format, product_api_contract};
use super::status::update_object;
use super::types::{Context, ReconcilerError};
use super::{
    configured_gateway, identity, is_owned_by, requeue_children, requeue_operation, requeue_steady,
};
use crate::constants::{MATCH_ANY, PRODUCT_API_FINALIZER, PRODUCT_API_VERSION_ANNOTATION};
use crate::crd::{ProductApi, ProductApiVersion, ProductApiVersionSpec, ProvisioningState};
use crate::provider::{ApimGateway, DeleteOutcome};
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info};

/// Reconcile one `ProductApi`
///
/// # Errors
/// Store, gateway and transient failures; retried with backoff
pub async fn reconcile_product_api(
    obj: Arc<ProductApi>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcilerError> {
    let store = ctx.stores.product_apis.as_ref();
    let product_api = match observe_lifecycle(store, obj.as_ref(), PRODUCT_API_FINALIZER).await? {
        Lifecycle::Absent | Lifecycle::Released => return Ok(Action::await_change()),
        Lifecycle::FinalizerAdded => return Ok(Action::requeue(std::time::Duration::ZERO)),
        Lifecycle::Terminating(api) | Lifecycle::Active(api) => api,
    };

    let Some(gateway) = configured_gateway(&ctx, "ProductApi", &product_api.name_any()) else {
        return Ok(Action::await_change());
    };

    if is_being_deleted(&product_api) {
        finalize(&ctx, gateway.as_ref(), &product_api).await
    } else {
        apply(&ctx, gateway.as_ref(), product_api).await
    }
}

/// Where the owned `ProductApiVersion` stands
enum VersionChild {
    /// Provisioned; carries the remote version-set ID
    Ready(String),
    /// Created, updated or still provisioning
    Pending,
    /// A same-named record exists that this `ProductApi` does not own
    Foreign,
}

fn is_versioned(api: &ProductApi) -> bool {
    api.spec
        .api_version
        .as_deref()
        .is_some_and(|v| !v.trim().is_empty())
}

fn desired_version_spec(api: &ProductApi) -> ProductApiVersionSpec {
    ProductApiVersionSpec {
        name: api.spec.display_name.clone(),
        description: api.spec.description.clone(),
        versioning_scheme: api.spec.versioning_scheme,
    }
}

async fn ensure_version_child(
    ctx: &Context,
    api: &ProductApi,
    namespace: &str,
    name: &str,
    uid: &str,
) -> Result<VersionChild, ReconcilerError> {
    let children = ctx.stores.product_api_versions.as_ref();
    let desired_spec = desired_version_spec(api);

    let Some(existing) = children.get(namespace, name).await? else {
        let Some(owner) = api.controller_owner_ref(&()) else {
            return Err(crate::store::StoreError::MissingMetadata("owner reference").into());
        };
        let mut child = ProductApiVersion::new(name, desired_spec);
        child.metadata.namespace = Some(namespace.to_string());
        child.metadata.owner_references = Some(vec![owner]);
        info!(child = %name, "Creating ProductApiVersion");
        children.create(namespace, &child).await?;
        return Ok(VersionChild::Pending);
    };

    if !is_owned_by(&existing, uid) {
        return Ok(VersionChild::Foreign);
    }
    if existing.spec != desired_spec {
        info!(child = %name, "Updating ProductApiVersion");
        update_object(children, &existing, |c: &mut ProductApiVersion| {
            c.spec = desired_spec.clone();
        })
        .await?;
        return Ok(VersionChild::Pending);
    }

    Ok(existing
        .status
        .as_ref()
        .filter(|s| s.provisioning_state == Some(ProvisioningState::Succeeded))
        .and_then(|s| s.api_version_set_id.clone())
        .map_or(VersionChild::Pending, VersionChild::Ready))
}

async fn apply(
    ctx: &Context,
    gateway: &dyn ApimGateway,
    product_api: ProductApi,
) -> Result<Action, ReconcilerError> {
    let store = ctx.stores.product_apis.as_ref();
    let (namespace, name, uid) = identity(&product_api)?;
    let remote_id = parent_remote_id(&namespace, &name);
    let versioned = is_versioned(&product_api);

    let product_api = if versioned {
        let version_set_id =
            match ensure_version_child(ctx, &product_api, &namespace, &name, &uid).await? {
                VersionChild::Ready(id) => id,
                VersionChild::Pending => {
                    debug!(product_api = %name, "Waiting for ProductApiVersion");
                    return Ok(requeue_children(ctx));
                }
                VersionChild::Foreign => {
                    mark_invalid(
                        store,
                        &product_api,
                        "a ProductApiVersion with this name is owned by another resource",
                    )
                    .await?;
                    return Ok(Action::await_change());
                }
            };
        if product_api.annotations().get(PRODUCT_API_VERSION_ANNOTATION) == Some(&version_set_id) {
            product_api
        } else {
            update_object(store, &product_api, |p: &mut ProductApi| {
                p.annotations_mut()
                    .insert(PRODUCT_API_VERSION_ANNOTATION.to_string(), version_set_id.clone());
            })
            .await?
        }
    } else if product_api.annotations().contains_key(PRODUCT_API_VERSION_ANNOTATION) {
        update_object(store, &product_api, |p: &mut ProductApi| {
            p.annotations_mut().remove(PRODUCT_API_VERSION_ANNOTATION);
        })
        .await?
    } else {
        product_api
    };

    let version_set_id = product_api
        .annotations()
        .get(PRODUCT_API_VERSION_ANNOTATION)
        .cloned();
    let payload = product_api_contract(&product_api.spec, version_set_id.as_deref());

    let in_flight = product_api
        .status
        .as_ref()
        .and_then(|s| s.operation.resume_token())
        .is_some();

    if in_flight {
        let apply = ApiApply {
            remote_id: &remote_id,
            payload: &payload,
            digest: String::new(),
        };
        if let ApplyOutcome::InProgress =
            drive_api_operation(gateway, store, &product_api, apply).await?
        {
            return Ok(requeue_operation(ctx));
        }
    } else {
        let format = effective_content_format(product_api.spec.content_format);
        let Some(digest) = digest_definition(
            ctx,
            store,
            &product_api,
            product_api.spec.content.as_deref(),
            format.is_link(),
        )
        .await?
        else {
            return Ok(Action::await_change());
        };

        let remote = gateway.get_api(&remote_id).await?;
        if needs_apply(&product_api, &digest, &payload, remote.as_ref()) {
            let apply = ApiApply {
                remote_id: &remote_id,
                payload: &payload,
                digest,
            };
            if let ApplyOutcome::InProgress =
                drive_api_operation(gateway, store, &product_api, apply).await?
            {
                return Ok(requeue_operation(ctx));
            }
        } else {
            debug!(api = %remote_id, "Product API up to date");
        }
    }

    link_products(gateway, &remote_id, &product_api.spec.products).await?;
    if !versioned {
        prune_version_child(ctx, &namespace, &uid).await?;
    }
    Ok(requeue_steady(ctx))
}

/// Drop a version child left behind after versioning was switched off
///
/// Runs only once the API no longer references the version set.
async fn prune_version_child(ctx: &Context, namespace: &str, uid: &str) -> Result<(), ReconcilerError> {
    let children = ctx.stores.product_api_versions.as_ref();
    for child in children.list_owned(namespace, uid).await? {
        if !is_being_deleted(&child) {
            info!(child = %child.name_any(), "Pruning ProductApiVersion no longer needed");
            children.delete(namespace, &child.name_any()).await?;
        }
    }
    Ok(())
}

async fn finalize(
    ctx: &Context,
    gateway: &dyn ApimGateway,
    product_api: &ProductApi,
) -> Result<Action, ReconcilerError> {
    let (namespace, name, uid) = identity(product_api)?;
    let remote_id = parent_remote_id(&namespace, &name);

    // The API references the version set, so it goes first
    if gateway.delete_api(&remote_id, MATCH_ANY).await? == DeleteOutcome::NotFound {
        debug!(api = %remote_id, "Product API already gone");
    }

    if let CascadeProgress::Pending { remaining } =
        cascade_children(ctx.stores.product_api_versions.as_ref(), &namespace, &uid).await?
    {
        info!(remaining, "Waiting for ProductApiVersions to be deleted");
        return Ok(requeue_children(ctx));
    }

    remove_finalizer(ctx.stores.product_apis.as_ref(), product_api, PRODUCT_API_FINALIZER).await?;
    info!(api = %remote_id, "ProductApi deleted");
    Ok(Action::await_change())
}
