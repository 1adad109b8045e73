//! Conditional store write tests

mod common;

use apim_operator::constants::STORE_WRITE_ATTEMPTS;
use apim_operator::controller::reconciler::status::write_status;
use apim_operator::controller::reconciler::{reconcile_backend, ReconcilerError};
use apim_operator::crd::{Backend, BackendSpec, BackendStatus, ProvisioningState};
use apim_operator::store::{ObjectStore, StoreError};
use common::{namespaced, Harness, MemoryStore};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;

const NS: &str = "payments";

fn ledger() -> Backend {
    namespaced(
        Backend::new(
            "ledger",
            BackendSpec {
                title: Some("Ledger".to_string()),
                url: "https://ledger.payments.svc.cluster.local".to_string(),
                ..Default::default()
            },
        ),
        NS,
    )
}

fn as_dyn(store: &MemoryStore<Backend>) -> &dyn ObjectStore<Backend> {
    store
}

fn succeeded(b: &mut Backend) {
    b.status = Some(BackendStatus {
        backend_id: Some("/backends/payments-ledger".to_string()),
        provisioning_state: Some(ProvisioningState::Succeeded),
    });
}

#[tokio::test]
async fn test_stale_write_lands_on_refetched_record() {
    let store = MemoryStore::<Backend>::default();
    let stale = store.seed(ledger());
    store.edit(NS, "ledger", |b| b.spec.title = Some("Ledger v2".to_string()));

    let written = write_status(as_dyn(&store), &stale, succeeded)
        .await
        .expect("write succeeds after refetch");

    assert_eq!(store.status_attempts(), 2);
    assert_eq!(written.spec.title.as_deref(), Some("Ledger v2"));
    let stored = store.fetch(NS, "ledger").unwrap();
    assert_eq!(stored.spec.title.as_deref(), Some("Ledger v2"));
    assert_eq!(
        stored.status.unwrap().provisioning_state,
        Some(ProvisioningState::Succeeded)
    );
}

#[tokio::test]
async fn test_single_conflict_is_absorbed() {
    let store = MemoryStore::<Backend>::default();
    let record = store.seed(ledger());
    store.conflict_status_writes(1);

    write_status(as_dyn(&store), &record, succeeded)
        .await
        .expect("second attempt succeeds");

    assert_eq!(store.status_attempts(), 2);
    assert!(store.fetch(NS, "ledger").unwrap().status.is_some());
}

#[tokio::test]
async fn test_conflicts_beyond_the_attempt_cap_surface() {
    let store = MemoryStore::<Backend>::default();
    let record = store.seed(ledger());
    store.conflict_status_writes(STORE_WRITE_ATTEMPTS);

    let result = write_status(as_dyn(&store), &record, succeeded).await;

    assert!(matches!(
        result,
        Err(ReconcilerError::Store(StoreError::Conflict(_)))
    ));
    assert_eq!(store.status_attempts(), STORE_WRITE_ATTEMPTS);
    assert!(store.fetch(NS, "ledger").unwrap().status.is_none());
}

#[tokio::test]
async fn test_reconcile_retries_status_after_exhausted_conflicts() {
    let harness = Harness::new();
    let h = &harness;
    h.backends.seed(ledger());
    let reconcile = || async move {
        let backend = h.backends.fetch(NS, "ledger").expect("backend exists");
        reconcile_backend(Arc::new(backend), Arc::clone(&h.ctx)).await
    };
    assert_eq!(reconcile().await.unwrap(), Action::requeue(Duration::ZERO));

    h.backends.conflict_status_writes(STORE_WRITE_ATTEMPTS);
    assert!(matches!(
        reconcile().await,
        Err(ReconcilerError::Store(StoreError::Conflict(_)))
    ));

    assert_eq!(
        reconcile().await.unwrap(),
        Action::requeue(h.ctx.config.steady_state_requeue())
    );
    assert_eq!(h.gateway.count("create_or_update_backend"), 1);
    assert_eq!(
        h.backends.fetch(NS, "ledger").unwrap().status.unwrap().provisioning_state,
        Some(ProvisioningState::Succeeded)
    );
}
