//! Api reconciler tests
//!
//! Drive `reconcile_api` and `reconcile_api_version` against the in-memory
//! store and the scripted gateway.

mod common;

use apim_operator::constants::{API_FINALIZER, API_VERSION_FINALIZER};
use apim_operator::controller::reconciler::{reconcile_api, reconcile_api_version};
use apim_operator::crd::{Api, ApiSpec, ApiVersionSubSpec, ProvisioningState};
use apim_operator::store::ObjectStore;
use common::{namespaced, Harness};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;

const NS: &str = "team";

fn version(name: Option<&str>, display_name: &str) -> ApiVersionSubSpec {
    ApiVersionSubSpec {
        name: name.map(str::to_string),
        display_name: display_name.to_string(),
        content: Some(r#"{"openapi":"3.0.1"}"#.to_string()),
        ..Default::default()
    }
}

fn orders(versions: Vec<ApiVersionSubSpec>) -> Api {
    namespaced(
        Api::new(
            "orders",
            ApiSpec {
                display_name: "Orders API".to_string(),
                path: "orders".to_string(),
                versions,
                ..Default::default()
            },
        ),
        NS,
    )
}

async fn reconcile(h: &Harness, name: &str) -> Action {
    let api = h.apis.fetch(NS, name).expect("api exists");
    reconcile_api(Arc::new(api), Arc::clone(&h.ctx))
        .await
        .expect("api reconcile succeeds")
}

/// Reconcile every ApiVersion until it settles
async fn settle_versions(h: &Harness) {
    for name in h.api_versions.names(NS) {
        for _ in 0..3 {
            let Some(version) = h.api_versions.fetch(NS, &name) else {
                break;
            };
            let action = reconcile_api_version(Arc::new(version), Arc::clone(&h.ctx))
                .await
                .expect("api version reconcile succeeds");
            if action != Action::requeue(Duration::ZERO) {
                break;
            }
        }
    }
}

#[tokio::test]
async fn test_api_creates_version_set_and_reports_its_id() {
    let h = Harness::new();
    h.gateway.state().version_set_ids.push_back("abc123".to_string());
    h.apis.seed(orders(vec![]));

    assert_eq!(reconcile(&h, "orders").await, Action::requeue(Duration::ZERO));
    assert!(h
        .apis
        .fetch(NS, "orders")
        .is_some_and(|a| a.finalizers().iter().any(|f| f == API_FINALIZER)));

    let action = reconcile(&h, "orders").await;
    assert_eq!(action, Action::requeue(h.ctx.config.steady_state_requeue()));

    let api = h.apis.fetch(NS, "orders").unwrap();
    let status = api.status.unwrap();
    assert_eq!(status.provisioning_state, Some(ProvisioningState::Succeeded));
    assert_eq!(status.api_version_set_id.as_deref(), Some("abc123"));

    let state = h.gateway.state();
    let version_set = &state.version_sets["team-orders"];
    assert_eq!(version_set.properties.display_name, "Orders API");
    assert_eq!(version_set.properties.versioning_scheme, "Segment");
}

#[tokio::test]
async fn test_api_second_pass_is_a_no_op() {
    let h = Harness::new();
    h.apis.seed(orders(vec![]));
    reconcile(&h, "orders").await;
    reconcile(&h, "orders").await;
    let version_before = h.apis.fetch(NS, "orders").unwrap().resource_version();

    reconcile(&h, "orders").await;

    assert_eq!(h.gateway.count("create_or_update_version_set"), 1);
    assert_eq!(
        h.apis.fetch(NS, "orders").unwrap().resource_version(),
        version_before
    );
}

#[tokio::test]
async fn test_api_derives_owned_version_records() {
    let h = Harness::new();
    h.gateway.state().version_set_ids.push_back("abc123".to_string());
    let api = h.apis.seed(orders(vec![
        version(None, "Orders"),
        version(Some("v2"), "Orders v2"),
    ]));
    reconcile(&h, "orders").await;

    let action = reconcile(&h, "orders").await;
    assert_eq!(action, Action::requeue(h.ctx.config.child_wait_requeue()));
    assert_eq!(h.api_versions.names(NS), vec!["orders-default", "orders-v2"]);

    let child = h.api_versions.fetch(NS, "orders-v2").unwrap();
    assert_eq!(child.spec.api_version_set_id, "abc123");
    assert_eq!(child.spec.path, "orders");
    assert_eq!(child.spec.version.display_name, "Orders v2");
    assert_eq!(child.owner_references()[0].uid, api.uid().unwrap());

    settle_versions(&h).await;
    assert!(h.gateway.state().apis.contains_key("team-orders-default"));
    assert!(h.gateway.state().apis.contains_key("team-orders-v2"));

    let action = reconcile(&h, "orders").await;
    assert_eq!(action, Action::requeue(h.ctx.config.steady_state_requeue()));
    let states = h.apis.fetch(NS, "orders").unwrap().status.unwrap().version_states;
    assert_eq!(states.get("orders-v2"), Some(&ProvisioningState::Succeeded));
}

#[tokio::test]
async fn test_api_prunes_versions_dropped_from_spec() {
    let h = Harness::new();
    h.apis.seed(orders(vec![
        version(Some("v1"), "Orders v1"),
        version(Some("v2"), "Orders v2"),
    ]));
    reconcile(&h, "orders").await;
    reconcile(&h, "orders").await;
    settle_versions(&h).await;

    h.apis.edit(NS, "orders", |a| a.spec.versions.truncate(1));
    reconcile(&h, "orders").await;

    let pruned = h.api_versions.fetch(NS, "orders-v2").unwrap();
    assert!(pruned.metadata.deletion_timestamp.is_some());
    assert!(pruned.finalizers().iter().any(|f| f == API_VERSION_FINALIZER));

    settle_versions(&h).await;
    assert_eq!(h.api_versions.names(NS), vec!["orders-v1"]);
    assert!(h.gateway.calls().contains(&"delete_api:team-orders-v2".to_string()));
    assert!(!h.gateway.state().apis.contains_key("team-orders-v2"));
}

#[tokio::test]
async fn test_api_deletion_removes_children_before_version_set() {
    let h = Harness::new();
    h.apis.seed(orders(vec![version(None, "Orders")]));
    reconcile(&h, "orders").await;
    reconcile(&h, "orders").await;
    settle_versions(&h).await;

    h.apis.delete(NS, "orders").await.unwrap();

    let action = reconcile(&h, "orders").await;
    assert_eq!(action, Action::requeue(h.ctx.config.child_wait_requeue()));
    assert_eq!(h.gateway.count("delete_version_set"), 0);

    settle_versions(&h).await;
    assert!(h.api_versions.names(NS).is_empty());

    assert_eq!(reconcile(&h, "orders").await, Action::await_change());
    assert!(h.apis.fetch(NS, "orders").is_none());

    let api_deleted = h.gateway.position("delete_api:team-orders-default").unwrap();
    let set_deleted = h.gateway.position("delete_version_set:team-orders").unwrap();
    assert!(api_deleted < set_deleted);
}

#[tokio::test]
async fn test_api_without_apim_target_skips_remote_work() {
    let h = Harness::unconfigured();
    h.apis.seed(orders(vec![version(None, "Orders")]));

    assert_eq!(reconcile(&h, "orders").await, Action::requeue(Duration::ZERO));
    assert_eq!(reconcile(&h, "orders").await, Action::await_change());

    let api = h.apis.fetch(NS, "orders").unwrap();
    assert!(api.finalizers().iter().any(|f| f == API_FINALIZER));
    assert!(api.status.is_none());
    assert!(h.api_versions.names(NS).is_empty());
    assert!(h.gateway.calls().is_empty());
}
