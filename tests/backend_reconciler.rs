//! Backend reconciler tests

mod common;

use apim_operator::constants::BACKEND_FINALIZER;
use apim_operator::controller::reconciler::{backoff_key, reconcile_backend, ReconcilerError};
use apim_operator::crd::{Backend, BackendSpec, ProvisioningState};
use apim_operator::runtime::error_policy::handle_reconciliation_error;
use apim_operator::store::{ObjectStore, StoreError};
use common::{namespaced, Harness};
use kube::ResourceExt;
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

async fn reconcile(h: &Harness) -> Action {
    let backend = h.backends.fetch(NS, "ledger").expect("backend exists");
    reconcile_backend(Arc::new(backend), Arc::clone(&h.ctx))
        .await
        .expect("reconcile succeeds")
}

#[tokio::test]
async fn test_backend_is_created_and_status_reported() {
    let h = Harness::new();
    h.backends.seed(ledger());

    assert_eq!(reconcile(&h).await, Action::requeue(Duration::ZERO));
    assert_eq!(reconcile(&h).await, Action::requeue(h.ctx.config.steady_state_requeue()));

    let backend = h.backends.fetch(NS, "ledger").unwrap();
    assert!(backend.finalizers().iter().any(|f| f == BACKEND_FINALIZER));
    let status = backend.status.unwrap();
    assert_eq!(status.backend_id.as_deref(), Some("/backends/payments-ledger"));
    assert_eq!(status.provisioning_state, Some(ProvisioningState::Succeeded));

    let state = h.gateway.state();
    let remote = &state.backends["payments-ledger"];
    assert_eq!(remote.properties.url, "https://ledger.payments.svc.cluster.local");
    assert_eq!(remote.properties.protocol, "http");
    assert!(remote.properties.tls.is_none());
}

#[tokio::test]
async fn test_backend_in_sync_is_not_rewritten() {
    let h = Harness::new();
    h.backends.seed(ledger());
    reconcile(&h).await;
    reconcile(&h).await;
    let version_before = h.backends.fetch(NS, "ledger").unwrap().resource_version();

    reconcile(&h).await;

    assert_eq!(h.gateway.count("create_or_update_backend"), 1);
    assert_eq!(
        h.backends.fetch(NS, "ledger").unwrap().resource_version(),
        version_before
    );
}

#[tokio::test]
async fn test_backend_drift_is_corrected() {
    let h = Harness::new();
    h.backends.seed(ledger());
    reconcile(&h).await;
    reconcile(&h).await;

    h.backends.edit(NS, "ledger", |b| {
        b.spec.url = "https://ledger-v2.payments.svc.cluster.local".to_string();
        b.spec.validate_certificate_name = Some(false);
    });
    reconcile(&h).await;

    assert_eq!(h.gateway.count("create_or_update_backend"), 2);
    let state = h.gateway.state();
    let remote = &state.backends["payments-ledger"];
    assert_eq!(remote.properties.url, "https://ledger-v2.payments.svc.cluster.local");
    let tls = remote.properties.tls.clone().unwrap();
    assert_eq!(tls.validate_certificate_name, Some(false));
    assert_eq!(tls.validate_certificate_chain, None);
}

#[tokio::test]
async fn test_backend_deletion_is_conditional_on_remote_etag() {
    let h = Harness::new();
    h.backends.seed(ledger());
    reconcile(&h).await;
    reconcile(&h).await;

    h.backends.delete(NS, "ledger").await.unwrap();
    assert_eq!(reconcile(&h).await, Action::await_change());

    assert!(h.backends.fetch(NS, "ledger").is_none());
    assert!(h.gateway.state().backends.is_empty());
    assert!(h
        .gateway
        .calls()
        .contains(&"delete_backend:payments-ledger:\"etag-1\"".to_string()));
}

#[tokio::test]
async fn test_backend_deletion_tolerates_missing_remote() {
    let h = Harness::new();
    h.backends.seed(ledger());
    reconcile(&h).await;
    h.backends.delete(NS, "ledger").await.unwrap();

    assert_eq!(reconcile(&h).await, Action::await_change());
    assert!(h.backends.fetch(NS, "ledger").is_none());
    assert_eq!(h.gateway.count("delete_backend"), 0);
}

#[tokio::test]
async fn test_backoff_is_dropped_once_the_record_is_gone() {
    let h = Harness::new();
    let backend = Arc::new(ledger());
    let key = backoff_key("Backend", NS, "ledger");

    assert_eq!(h.ctx.next_backoff(&key), (Duration::from_secs(5), 1));
    assert_eq!(h.ctx.next_backoff(&key), (Duration::from_secs(5), 2));

    let gone = ReconcilerError::Store(StoreError::NotFound("payments/ledger".to_string()));
    assert_eq!(
        handle_reconciliation_error("Backend", &backend, &gone, &h.ctx),
        Action::await_change()
    );
    assert!(h.ctx.backoff_states.lock().unwrap().is_empty());

    // A record that fails again starts from the floor
    assert_eq!(h.ctx.next_backoff(&key), (Duration::from_secs(5), 1));
    h.ctx.forget_backoff(&key);
    assert!(h.ctx.backoff_states.lock().unwrap().is_empty());
}
