//! # API Apply
//!
//! The create-or-update flow shared by `ApiVersion` and `ProductApi`: both
//! put an API definition through a long-running operation, persist its resume
//! token while it runs, and record the applied content digest once it ends.

use super::digest::DigestError;
use super::lro::{resume_operation, LroOutcome};
use super::status::write_status;
use super::types::{Context, ReconcilerError};
use crate::crd::{ApiVersion, OperationState, ProductApi};
use crate::provider::{ApiContract, ApimGateway};
use crate::store::ObjectStore;
use kube::{Resource, ResourceExt};
use tracing::{info, warn};

/// Kinds whose status carries an [`OperationState`]
pub trait OperationTracked: Resource + Clone + Send + Sync {
    fn operation(&self) -> Option<&OperationState>;
    fn operation_mut(&mut self) -> &mut OperationState;
}

impl OperationTracked for ApiVersion {
    fn operation(&self) -> Option<&OperationState> {
        self.status.as_ref().map(|s| &s.operation)
    }

    fn operation_mut(&mut self) -> &mut OperationState {
        &mut self.status.get_or_insert_with(Default::default).operation
    }
}

impl OperationTracked for ProductApi {
    fn operation(&self) -> Option<&OperationState> {
        self.status.as_ref().map(|s| &s.operation)
    }

    fn operation_mut(&mut self) -> &mut OperationState {
        &mut self.status.get_or_insert_with(Default::default).operation
    }
}

/// Where an apply ended up within this reconciliation
#[derive(Debug)]
pub enum ApplyOutcome<K> {
    /// Remote API matches the desired definition; carries the refreshed record
    Settled(K),
    /// Operation still running; the resume token is persisted
    InProgress,
}

/// One API create-or-update request
#[derive(Debug)]
pub struct ApiApply<'a> {
    pub remote_id: &'a str,
    pub payload: &'a ApiContract,
    /// Digest of the content being submitted
    pub digest: String,
}

/// Persist a terminal failure and hand back the error that caused it
async fn fail<K: OperationTracked>(
    store: &dyn ObjectStore<K>,
    obj: &K,
    error: ReconcilerError,
) -> ReconcilerError {
    if let Err(write_error) = write_status(store, obj, |o: &mut K| o.operation_mut().mark_failed()).await
    {
        warn!(error = %write_error, "Failed to persist Failed state");
    }
    error
}

/// Mark `obj` failed for an invalid desired record
///
/// # Errors
/// Store failures after conflict retries
pub async fn mark_invalid<K: OperationTracked>(
    store: &dyn ObjectStore<K>,
    obj: &K,
    reason: &str,
) -> Result<(), ReconcilerError> {
    warn!(resource.name = %obj.name_any(), reason, "Desired state cannot be applied");
    if obj.operation().and_then(|op| op.provisioning_state)
        != Some(crate::crd::ProvisioningState::Failed)
    {
        write_status(store, obj, |o: &mut K| o.operation_mut().mark_failed()).await?;
    }
    Ok(())
}

/// Start or resume the API operation for `obj` and persist where it stands
///
/// When the record carries a resume token no new request is issued.
///
/// # Errors
/// Transient failures keep the persisted token; terminal failures are
/// persisted as `Failed` before being returned.
pub async fn drive_api_operation<K: OperationTracked>(
    gateway: &dyn ApimGateway,
    store: &dyn ObjectStore<K>,
    obj: &K,
    apply: ApiApply<'_>,
) -> Result<ApplyOutcome<K>, ReconcilerError> {
    let resume_token = obj
        .operation()
        .and_then(OperationState::resume_token)
        .map(str::to_string);
    let resuming = resume_token.is_some();
    let pending_sha = obj
        .operation()
        .and_then(|op| op.pending_spec_sha.clone())
        .filter(|_| resuming)
        .unwrap_or(apply.digest);

    if resuming {
        info!(api = apply.remote_id, "Resuming in-flight APIM operation");
    } else {
        info!(api = apply.remote_id, "Starting APIM create-or-update");
    }

    let mut poller = match gateway
        .begin_create_or_update_api(apply.remote_id, apply.payload, resume_token.as_deref())
        .await
    {
        Ok(poller) => poller,
        Err(e) if e.is_transient() => return Err(e.into()),
        Err(e) => return Err(fail(store, obj, e.into()).await),
    };

    let outcome = match resume_operation(poller.as_mut()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            // Keep hold of a freshly started operation so the retry resumes it
            if !resuming {
                if let Ok(token) = poller.resume_token() {
                    let pending = pending_sha.clone();
                    write_status(store, obj, |o: &mut K| {
                        o.operation_mut().mark_in_progress(token.clone(), pending.clone());
                    })
                    .await?;
                }
            }
            return Err(e.into());
        }
    };

    match outcome {
        LroOutcome::Succeeded(_) => {
            let written = write_status(store, obj, |o: &mut K| {
                o.operation_mut().mark_succeeded(pending_sha.clone());
            })
            .await?;
            info!(api = apply.remote_id, "APIM operation succeeded");
            Ok(ApplyOutcome::Settled(written))
        }
        LroOutcome::InProgress(token) => {
            write_status(store, obj, |o: &mut K| {
                o.operation_mut()
                    .mark_in_progress(token.clone(), pending_sha.clone());
            })
            .await?;
            Ok(ApplyOutcome::InProgress)
        }
        LroOutcome::Failed(e) => {
            warn!(api = apply.remote_id, error = %e, "APIM operation failed");
            Err(fail(store, obj, e.into()).await)
        }
    }
}

/// Link the settled API to every declared product
///
/// Runs on every settled pass; the association PUT is idempotent.
///
/// # Errors
/// Gateway failures, retried with backoff
pub async fn link_products(
    gateway: &dyn ApimGateway,
    remote_id: &str,
    products: &[String],
) -> Result<(), ReconcilerError> {
    for product in products {
        gateway.link_product_api(product, remote_id).await?;
    }
    Ok(())
}

/// Digest the declared definition, persisting `Failed` when none is declared
///
/// Returns `Ok(None)` when the record is invalid and has been marked failed.
///
/// # Errors
/// Fetch failures for linked content, and store failures
pub async fn digest_definition<K: OperationTracked>(
    ctx: &Context,
    store: &dyn ObjectStore<K>,
    obj: &K,
    content: Option<&str>,
    is_link: bool,
) -> Result<Option<String>, ReconcilerError> {
    match ctx.digester.digest(content, is_link).await {
        Ok(digest) => Ok(Some(digest)),
        Err(DigestError::MissingContent) => {
            mark_invalid(store, obj, "no API definition content declared").await?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Whether the remote API must be (re)applied
#[must_use]
pub fn needs_apply<K: OperationTracked>(
    obj: &K,
    digest: &str,
    desired: &ApiContract,
    remote: Option<&ApiContract>,
) -> bool {
    let Some(remote) = remote else {
        return true;
    };
    let last_applied = obj
        .operation()
        .and_then(|op| op.last_applied_spec_sha.as_deref());
    last_applied != Some(digest) || desired.properties.differs_from(&remote.properties)
}

