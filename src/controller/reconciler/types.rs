//! # Types
//!
//! Shared reconciler context and error type.

use super::digest::{ContentDigester, DigestError};
use crate::config::{ControllerConfig, MissingConfiguration};
use crate::controller::backoff::FibonacciBackoff;
use crate::crd::{Api, ApiVersion, Backend, ProductApi, ProductApiVersion};
use crate::provider::{ApimGateway, GatewayError};
use crate::store::{KubeStore, ObjectStore, StoreError};
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Digest(#[from] DigestError),
    /// Required configuration is missing; not retried until the next event
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("reconciliation timed out after {0:?}")]
    Timeout(Duration),
}

impl ReconcilerError {
    /// Whether the failure is the record having disappeared mid-reconcile
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReconcilerError::Store(e) if e.is_not_found())
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_seconds, max_seconds),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }
}

/// Stores for every kind the operator manages
#[derive(Clone)]
pub struct Stores {
    pub apis: Arc<dyn ObjectStore<Api>>,
    pub api_versions: Arc<dyn ObjectStore<ApiVersion>>,
    pub backends: Arc<dyn ObjectStore<Backend>>,
    pub product_apis: Arc<dyn ObjectStore<ProductApi>>,
    pub product_api_versions: Arc<dyn ObjectStore<ProductApiVersion>>,
}

impl Stores {
    /// Stores backed by the Kubernetes API server
    #[must_use]
    pub fn kube(client: &Client) -> Self {
        Self {
            apis: Arc::new(KubeStore::new(client.clone())),
            api_versions: Arc::new(KubeStore::new(client.clone())),
            backends: Arc::new(KubeStore::new(client.clone())),
            product_apis: Arc::new(KubeStore::new(client.clone())),
            product_api_versions: Arc::new(KubeStore::new(client.clone())),
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores").finish_non_exhaustive()
    }
}

/// Everything a reconciliation needs, built once at startup
#[derive(Clone)]
pub struct Context {
    pub stores: Stores,
    /// `Err` when the APIM target is not configured; reconcilers then no-op
    pub gateway: Result<Arc<dyn ApimGateway>, MissingConfiguration>,
    pub digester: ContentDigester,
    pub config: ControllerConfig,
    // Backoff state per resource (identified by namespace/kind/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("gateway_configured", &self.gateway.is_ok())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Context {
    #[must_use]
    pub fn new(
        stores: Stores,
        gateway: Result<Arc<dyn ApimGateway>, MissingConfiguration>,
        digester: ContentDigester,
        config: ControllerConfig,
    ) -> Self {
        Self {
            stores,
            gateway,
            digester,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The configured gateway
    ///
    /// # Errors
    /// [`ReconcilerError::Configuration`] naming the missing settings
    pub fn gateway(&self) -> Result<Arc<dyn ApimGateway>, ReconcilerError> {
        self.gateway
            .as_ref()
            .map(Arc::clone)
            .map_err(|e| ReconcilerError::Configuration(e.to_string()))
    }

    /// Advance the backoff for `key`, returning the delay and error count
    pub fn next_backoff(&self, key: &str) -> (Duration, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(key.to_string()).or_insert_with(|| {
                    BackoffState::new(self.config.backoff_min_secs, self.config.backoff_max_secs)
                });
                state.increment_error();
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (Duration::from_secs(self.config.backoff_min_secs), 0)
            }
        }
    }

    /// Drop the backoff for `key`; the next failure starts from the floor
    pub fn forget_backoff(&self, key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(key);
        }
    }
}

/// Key identifying one resource in the backoff map
#[must_use]
pub fn backoff_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{namespace}/{kind}/{name}")
}
