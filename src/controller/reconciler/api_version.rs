//! # ApiVersion Reconciler
//!
//! Applies one API definition through a long-running operation, then its
//! policy. Drift in the definition is detected by content digest, so linked
//! definitions are re-fetched on every pass.

use super::api_operation::{
    digest_definition, drive_api_operation, link_products, needs_apply, ApiApply, ApplyOutcome,
};
use super::finalizer::{is_being_deleted, observe_lifecycle, remove_finalizer, Lifecycle};
use super::naming::parent_remote_id;
use super::payload::{api_version_contract, effective_content_format, effective_policy_format, policy_contract};
use super::status::write_status;
use super::types::{Context, ReconcilerError};
use super::{configured_gateway, identity, requeue_operation, requeue_steady};
use crate::constants::{API_VERSION_FINALIZER, MATCH_ANY};
use crate::crd::{ApiVersion, ApiVersionStatus};
use crate::provider::{ApimGateway, DeleteOutcome};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use tracing::{debug, info};

/// Reconcile one `ApiVersion`
///
/// # Errors
/// Store, gateway and transient failures; retried with backoff
pub async fn reconcile_api_version(
    obj: Arc<ApiVersion>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcilerError> {
    let store = ctx.stores.api_versions.as_ref();
    let version = match observe_lifecycle(store, obj.as_ref(), API_VERSION_FINALIZER).await? {
        Lifecycle::Absent | Lifecycle::Released => return Ok(Action::await_change()),
        Lifecycle::FinalizerAdded => return Ok(Action::requeue(std::time::Duration::ZERO)),
        Lifecycle::Terminating(version) | Lifecycle::Active(version) => version,
    };

    let Some(gateway) = configured_gateway(&ctx, "ApiVersion", &version.name_any()) else {
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
    version: ApiVersion,
) -> Result<Action, ReconcilerError> {
    let store = ctx.stores.api_versions.as_ref();
    let (namespace, name, _) = identity(&version)?;
    let remote_id = parent_remote_id(&namespace, &name);
    let payload = api_version_contract(&version.spec);

    let in_flight = version
        .status
        .as_ref()
        .and_then(|s| s.operation.resume_token())
        .is_some();

    let version = if in_flight {
        let apply = ApiApply {
            remote_id: &remote_id,
            payload: &payload,
            digest: String::new(),
        };
        match drive_api_operation(gateway, store, &version, apply).await? {
            ApplyOutcome::InProgress => return Ok(requeue_operation(ctx)),
            ApplyOutcome::Settled(updated) => updated,
        }
    } else {
        let format = effective_content_format(version.spec.version.content_format);
        let Some(digest) = digest_definition(
            ctx,
            store,
            &version,
            version.spec.version.content.as_deref(),
            format.is_link(),
        )
        .await?
        else {
            return Ok(Action::await_change());
        };

        let remote = gateway.get_api(&remote_id).await?;
        if needs_apply(&version, &digest, &payload, remote.as_ref()) {
            let apply = ApiApply {
                remote_id: &remote_id,
                payload: &payload,
                digest,
            };
            match drive_api_operation(gateway, store, &version, apply).await? {
                ApplyOutcome::InProgress => return Ok(requeue_operation(ctx)),
                ApplyOutcome::Settled(updated) => updated,
            }
        } else {
            debug!(api = %remote_id, "API definition up to date");
            version
        }
    };

    link_products(gateway, &remote_id, &version.spec.version.products).await?;
    reconcile_policy(ctx, gateway, &version, &remote_id).await?;
    Ok(requeue_steady(ctx))
}

/// Put, refresh or remove the API policy
async fn reconcile_policy(
    ctx: &Context,
    gateway: &dyn ApimGateway,
    version: &ApiVersion,
    remote_id: &str,
) -> Result<(), ReconcilerError> {
    let store = ctx.stores.api_versions.as_ref();
    let last_applied = version
        .status
        .as_ref()
        .and_then(|s| s.last_applied_policy_sha.clone());

    let Some(policy) = policy_contract(version.spec.version.policy.as_ref()) else {
        if last_applied.is_some() {
            info!(api = remote_id, "Removing API policy");
            gateway.delete_api_policy(remote_id, MATCH_ANY).await?;
            write_status(store, version, |v: &mut ApiVersion| {
                v.status
                    .get_or_insert_with(ApiVersionStatus::default)
                    .last_applied_policy_sha = None;
            })
            .await?;
        }
        return Ok(());
    };

    let format = effective_policy_format(
        version
            .spec
            .version
            .policy
            .as_ref()
            .and_then(|p| p.policy_format),
    );
    let sha = ctx
        .digester
        .digest(Some(&policy.properties.value), format.is_link())
        .await?;
    let remote = gateway.get_api_policy(remote_id).await?;

    if remote.is_none() || last_applied.as_deref() != Some(sha.as_str()) {
        info!(api = remote_id, "Applying API policy");
        gateway.create_or_update_api_policy(remote_id, &policy).await?;
        write_status(store, version, |v: &mut ApiVersion| {
            v.status
                .get_or_insert_with(ApiVersionStatus::default)
                .last_applied_policy_sha = Some(sha.clone());
        })
        .await?;
    }
    Ok(())
}

async fn finalize(
    ctx: &Context,
    gateway: &dyn ApimGateway,
    version: &ApiVersion,
) -> Result<Action, ReconcilerError> {
    let (namespace, name, _) = identity(version)?;
    let remote_id = parent_remote_id(&namespace, &name);

    gateway.delete_api_policy(&remote_id, MATCH_ANY).await?;
    if gateway.delete_api(&remote_id, MATCH_ANY).await? == DeleteOutcome::NotFound {
        debug!(api = %remote_id, "API already gone");
    }
    remove_finalizer(ctx.stores.api_versions.as_ref(), version, API_VERSION_FINALIZER).await?;
    info!(api = %remote_id, "ApiVersion deleted");
    Ok(Action::await_change())
}
