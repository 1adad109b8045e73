//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, Kubernetes client setup and the shared reconciler context.

use crate::config::{ApimConfig, ControllerConfig};
use crate::controller::reconciler::{ContentDigester, Context, HttpContentFetcher, Stores};
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use crate::provider::azure::{build_credential, ArmApimGateway};
use crate::provider::ApimGateway;
use anyhow::{Context as _, Result};
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Initialization result containing all necessary components for the controller
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Shared reconciler context
    pub context: Arc<Context>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - APIM gateway and reconciler context setup
///
/// # Errors
/// Fails when the server cannot start, the cluster is unreachable, or an
/// Azure credential cannot be built for a configured target.
pub async fn initialize() -> Result<InitializationResult> {
    // Must run before anything touches rustls
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_installed| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apim_operator=info".into()),
        )
        .init();

    info!("Starting APIM operator");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let controller_config = ControllerConfig::from_env();
    let apim_config = ApimConfig::from_env();
    info!(
        watch_namespace = controller_config.watch_namespace.as_deref().unwrap_or("<all>"),
        concurrency = controller_config.max_concurrent_reconciliations,
        pact_mode = apim_config.pact_mode,
        "Configuration loaded"
    );

    let server_state = Arc::new(ServerState::new());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = controller_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &controller_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let gateway = build_gateway(&apim_config, &controller_config)?;
    let fetcher = HttpContentFetcher::new(controller_config.http_timeout())
        .context("Failed to build content fetcher")?;
    let context = Arc::new(Context::new(
        Stores::kube(&client),
        gateway,
        ContentDigester::new(Arc::new(fetcher)),
        controller_config,
    ));

    info!("Controller initialized, starting watch loops...");

    Ok(InitializationResult {
        client,
        context,
        server_state,
    })
}

/// Build the APIM gateway, or record why none is configured
///
/// A missing target is not fatal: the operator keeps running and every
/// reconciliation skips remote work until it is restarted with the target set.
fn build_gateway(
    apim: &ApimConfig,
    controller: &ControllerConfig,
) -> Result<Result<Arc<dyn ApimGateway>, crate::config::MissingConfiguration>> {
    let target = match apim.target() {
        Ok(target) => target,
        Err(missing) => {
            warn!("APIM target not configured ({}); reconcilers will not call Azure", missing);
            return Ok(Err(missing));
        }
    };
    info!(
        subscription = %target.subscription_id,
        resource_group = %target.resource_group,
        service = %target.service_name,
        "Targeting APIM service"
    );
    let credential = build_credential(apim)?;
    let gateway = ArmApimGateway::new(&target, apim, controller, credential)
        .context("Failed to build APIM gateway")?;
    Ok(Ok(Arc::new(gateway)))
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &ControllerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.server_startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.server_poll_interval_ms);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.ready() {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}
