//! # Watch Loop
//!
//! One controller per kind, run side by side. `Api` controllers also watch
//! the `ApiVersion` records they own, and `ProductApi` controllers the
//! `ProductApiVersion` records they own, so child progress re-triggers the
//! parent.

use crate::controller::reconciler::{
    backoff_key, reconcile_api, reconcile_api_version, reconcile_backend, reconcile_product_api,
    reconcile_product_api_version, Context, ReconcilerError,
};
use crate::controller::server::ServerState;
use crate::crd::{Api, ApiVersion, Backend, ProductApi, ProductApiVersion};
use crate::observability::metrics;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_stream_error};
use futures::StreamExt;
use k8s_openapi::NamespaceResourceScope;
use kube::{Client, Resource, ResourceExt};
use kube_runtime::{controller, controller::Action, watcher, Controller};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, Instrument};

/// Run every controller until a shutdown signal arrives
///
/// # Errors
/// Currently infallible once started; kept fallible for the caller's `?`
pub async fn run_watch_loop(
    client: Client,
    ctx: Arc<Context>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    info!("Starting controller watch loops...");

    // Mark not ready on SIGINT/SIGTERM; controllers drain via shutdown_on_signal
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, initiating graceful shutdown...");
            shutdown_state.mark_not_ready();
        }
    });

    let namespace = ctx.config.watch_namespace.clone();
    let ns = namespace.as_deref();
    let watcher_config = watcher::Config::default().any_semantic();
    let controller_config =
        controller::Config::default().concurrency(ctx.config.max_concurrent_reconciliations);

    let apis = Controller::new(api_for::<Api>(&client, ns), watcher_config.clone())
        .owns(api_for::<ApiVersion>(&client, ns), watcher_config.clone())
        .with_config(controller_config.clone())
        .shutdown_on_signal();
    let api_versions = Controller::new(api_for::<ApiVersion>(&client, ns), watcher_config.clone())
        .with_config(controller_config.clone())
        .shutdown_on_signal();
    let backends = Controller::new(api_for::<Backend>(&client, ns), watcher_config.clone())
        .with_config(controller_config.clone())
        .shutdown_on_signal();
    let product_apis = Controller::new(api_for::<ProductApi>(&client, ns), watcher_config.clone())
        .owns(api_for::<ProductApiVersion>(&client, ns), watcher_config.clone())
        .with_config(controller_config.clone())
        .shutdown_on_signal();
    let product_api_versions =
        Controller::new(api_for::<ProductApiVersion>(&client, ns), watcher_config)
            .with_config(controller_config)
            .shutdown_on_signal();

    futures::join!(
        drive("Api", apis, reconcile_api, Arc::clone(&ctx)),
        drive("ApiVersion", api_versions, reconcile_api_version, Arc::clone(&ctx)),
        drive("Backend", backends, reconcile_backend, Arc::clone(&ctx)),
        drive("ProductApi", product_apis, reconcile_product_api, Arc::clone(&ctx)),
        drive(
            "ProductApiVersion",
            product_api_versions,
            reconcile_product_api_version,
            Arc::clone(&ctx)
        ),
    );

    server_state.mark_not_ready();
    info!("Controllers stopped gracefully");
    Ok(())
}

fn api_for<K>(client: &Client, namespace: Option<&str>) -> kube::Api<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => kube::Api::namespaced(client.clone(), ns),
        None => kube::Api::all(client.clone()),
    }
}

/// Run one controller to completion
async fn drive<K, F, Fut>(kind: &'static str, controller: Controller<K>, reconcile: F, ctx: Arc<Context>)
where
    K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    F: Fn(Arc<K>, Arc<Context>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Action, ReconcilerError>> + Send + 'static,
{
    info!("Watching {} resources", kind);
    controller
        .run(
            move |obj, ctx| instrumented_reconcile(kind, obj, ctx, reconcile.clone()),
            move |obj, error, ctx| handle_reconciliation_error(kind, &obj, error, &ctx),
            ctx,
        )
        .for_each(|result| async move {
            match result {
                Ok((object_ref, _)) => debug!(kind, resource = %object_ref, "watch.event.success"),
                Err(e) => {
                    handle_stream_error(kind, &format!("{e:?}"));
                }
            }
        })
        .await;
    info!("{} controller stopped", kind);
}

/// Reconcile one record inside a span, bounded by the reconcile timeout
async fn instrumented_reconcile<K, F, Fut>(
    kind: &'static str,
    obj: Arc<K>,
    ctx: Arc<Context>,
    reconcile: F,
) -> Result<Action, ReconcilerError>
where
    K: Resource,
    F: Fn(Arc<K>, Arc<Context>) -> Fut,
    Fut: Future<Output = Result<Action, ReconcilerError>>,
{
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();
    let span = tracing::info_span!(
        "controller.watch.reconcile",
        resource.kind = kind,
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        resource.version = obj.resource_version().unwrap_or_default().as_str(),
    );

    metrics::increment_reconciliations(kind);
    let timeout = ctx.config.reconcile_timeout();
    let started = Instant::now();
    let result = tokio::time::timeout(timeout, reconcile(obj, Arc::clone(&ctx)))
        .instrument(span)
        .await
        .unwrap_or_else(|_| Err(ReconcilerError::Timeout(timeout)));
    metrics::observe_reconciliation_duration(kind, started.elapsed().as_secs_f64());

    if result.is_ok() {
        ctx.forget_backoff(&backoff_key(kind, &namespace, &name));
    }
    result
}
