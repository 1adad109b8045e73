//! Common test utilities
//!
//! - `MemoryStore`: an in-memory `ObjectStore` with `resourceVersion`
//!   compare-and-swap, finalizer-aware deletion, owner lookups and
//!   scripted status-write conflicts
//! - `FakeGateway`: a scripted `ApimGateway` that records every call
//! - `FakeFetcher`: serves linked content from a map
//! - `Harness`: a reconciler `Context` wired to the fakes

#![allow(dead_code, reason = "each test binary uses a different subset")]

use apim_operator::config::{ControllerConfig, MissingConfiguration};
use apim_operator::controller::reconciler::{
    ContentDigester, ContentFetcher, Context, DigestError, Stores,
};
use apim_operator::crd::{Api, ApiVersion, Backend, ProductApi, ProductApiVersion};
use apim_operator::provider::{
    ApiContract, ApimGateway, BackendContract, DeleteOutcome, GatewayError, GatewayResult,
    OperationPoller, PolicyContract, PollState, VersionSetContract,
};
use apim_operator::store::{ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{Resource, ResourceExt};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Once};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Kinds whose status subresource the memory store can copy
pub trait HasStatus {
    fn copy_status_from(&mut self, other: &Self);
}

macro_rules! has_status {
    ($($kind:ty),*) => {
        $(impl HasStatus for $kind {
            fn copy_status_from(&mut self, other: &Self) {
                self.status = other.status.clone();
            }
        })*
    };
}

has_status!(Api, ApiVersion, Backend, ProductApi, ProductApiVersion);

fn deletion_time() -> Time {
    serde_json::from_value(serde_json::json!("2026-10-19T00:00:00Z"))
        .expect("valid RFC 3339 timestamp")
}

struct MemoryInner<K> {
    objects: BTreeMap<(String, String), K>,
    next_version: u64,
    /// Status writes still to be rejected with a conflict
    status_conflicts: usize,
    status_attempts: usize,
}

/// In-memory object store
pub struct MemoryStore<K> {
    inner: Mutex<MemoryInner<K>>,
}

impl<K> Default for MemoryStore<K> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                objects: BTreeMap::new(),
                next_version: 1,
                status_conflicts: 0,
                status_attempts: 0,
            }),
        }
    }
}

fn key_of<K: Resource>(obj: &K) -> (String, String) {
    (obj.namespace().unwrap_or_default(), obj.name_any())
}

impl<K> MemoryStore<K>
where
    K: Resource + HasStatus + Clone + Send + Sync,
{
    fn lock(&self) -> MutexGuard<'_, MemoryInner<K>> {
        self.inner.lock().expect("memory store lock poisoned")
    }

    /// Insert a record as if a user had applied it
    pub fn seed(&self, mut obj: K) -> K {
        let mut inner = self.lock();
        if obj.meta().uid.is_none() {
            obj.meta_mut().uid = Some(format!("uid-{}", NEXT_UID.fetch_add(1, Ordering::Relaxed)));
        }
        obj.meta_mut().resource_version = Some(inner.next_version.to_string());
        inner.next_version += 1;
        inner.objects.insert(key_of(&obj), obj.clone());
        obj
    }

    pub fn fetch(&self, namespace: &str, name: &str) -> Option<K> {
        self.lock()
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn names(&self, namespace: &str) -> Vec<String> {
        self.lock()
            .objects
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Edit a stored record out of band, bumping its version
    pub fn edit(&self, namespace: &str, name: &str, mutate: impl FnOnce(&mut K)) {
        let mut inner = self.lock();
        let version = inner.next_version;
        inner.next_version += 1;
        let obj = inner
            .objects
            .get_mut(&(namespace.to_string(), name.to_string()))
            .expect("record to edit exists");
        mutate(obj);
        obj.meta_mut().resource_version = Some(version.to_string());
    }

    /// Reject the next `count` status writes as if another writer got there first
    pub fn conflict_status_writes(&self, count: usize) {
        self.lock().status_conflicts = count;
    }

    /// Status writes attempted so far, conflicting ones included
    pub fn status_attempts(&self) -> usize {
        self.lock().status_attempts
    }

    fn check_version(stored: &K, obj: &K) -> StoreResult<()> {
        if stored.resource_version() == obj.resource_version() {
            Ok(())
        } else {
            Err(StoreError::Conflict(obj.name_any()))
        }
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemoryStore<K>
where
    K: Resource + HasStatus + Clone + Send + Sync,
{
    async fn get(&self, namespace: &str, name: &str) -> StoreResult<Option<K>> {
        Ok(self.fetch(namespace, name))
    }

    async fn create(&self, namespace: &str, obj: &K) -> StoreResult<K> {
        let mut obj = obj.clone();
        obj.meta_mut().namespace = Some(namespace.to_string());
        if self.fetch(namespace, &obj.name_any()).is_some() {
            return Err(StoreError::Conflict(obj.name_any()));
        }
        Ok(self.seed(obj))
    }

    async fn replace(&self, obj: &K) -> StoreResult<K> {
        let mut inner = self.lock();
        let key = key_of(obj);
        let stored = inner
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.1.clone()))?;
        Self::check_version(&stored, obj)?;

        let mut written = obj.clone();
        written.copy_status_from(&stored);
        written.meta_mut().uid.clone_from(&stored.meta().uid);
        written
            .meta_mut()
            .deletion_timestamp
            .clone_from(&stored.meta().deletion_timestamp);
        written.meta_mut().resource_version = Some(inner.next_version.to_string());
        inner.next_version += 1;

        if written.meta().deletion_timestamp.is_some() && written.finalizers().is_empty() {
            inner.objects.remove(&key);
        } else {
            inner.objects.insert(key, written.clone());
        }
        Ok(written)
    }

    async fn replace_status(&self, obj: &K) -> StoreResult<K> {
        let mut inner = self.lock();
        inner.status_attempts += 1;
        if inner.status_conflicts > 0 {
            inner.status_conflicts -= 1;
            return Err(StoreError::Conflict(obj.name_any()));
        }
        let key = key_of(obj);
        let stored = inner
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.1.clone()))?;
        Self::check_version(&stored, obj)?;

        let mut written = stored;
        written.copy_status_from(obj);
        written.meta_mut().resource_version = Some(inner.next_version.to_string());
        inner.next_version += 1;
        inner.objects.insert(key, written.clone());
        Ok(written)
    }

    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<()> {
        let mut inner = self.lock();
        let key = (namespace.to_string(), name.to_string());
        let version = inner.next_version;
        let Some(stored) = inner.objects.get_mut(&key) else {
            return Ok(());
        };
        if stored.finalizers().is_empty() {
            inner.objects.remove(&key);
        } else if stored.meta().deletion_timestamp.is_none() {
            stored.meta_mut().deletion_timestamp = Some(deletion_time());
            stored.meta_mut().resource_version = Some(version.to_string());
            inner.next_version += 1;
        }
        Ok(())
    }

    async fn list_owned(&self, namespace: &str, owner_uid: &str) -> StoreResult<Vec<K>> {
        Ok(self
            .lock()
            .objects
            .iter()
            .filter(|((ns, _), obj)| {
                ns == namespace && obj.owner_references().iter().any(|r| r.uid == owner_uid)
            })
            .map(|(_, obj)| obj.clone())
            .collect())
    }
}

/// An API create-or-update the fake gateway has accepted but not finished
#[derive(Debug, Clone)]
pub struct PendingOperation {
    pub id: String,
    pub payload: ApiContract,
    pub remaining_polls: usize,
}

/// Remote state and call log of the fake gateway
#[derive(Debug, Default)]
pub struct GatewayState {
    pub version_sets: BTreeMap<String, VersionSetContract>,
    pub apis: BTreeMap<String, ApiContract>,
    pub policies: BTreeMap<String, PolicyContract>,
    pub backends: BTreeMap<String, BackendContract>,
    pub links: BTreeSet<(String, String)>,
    /// Every mutating call, as `operation:id`
    pub calls: Vec<String>,
    pub operations: HashMap<String, PendingOperation>,
    /// How many polls a new API operation reports in progress
    pub polls_before_done: usize,
    /// IDs handed out to newly created version sets, in order
    pub version_set_ids: VecDeque<String>,
    /// Reason every API operation fails with, when set
    pub fail_operations: Option<String>,
    /// Products that do not exist; linking to them returns NotFound
    pub missing_products: BTreeSet<String>,
    next_operation: u64,
    next_etag: u64,
}

/// Scripted in-memory APIM
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl FakeGateway {
    pub fn state(&self) -> MutexGuard<'_, GatewayState> {
        self.state.lock().expect("gateway lock poisoned")
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Number of recorded calls of `operation`
    pub fn count(&self, operation: &str) -> usize {
        let prefix = format!("{operation}:");
        self.state()
            .calls
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    /// Position of the first call equal to `call`
    pub fn position(&self, call: &str) -> Option<usize> {
        self.state().calls.iter().position(|c| c == call)
    }

    fn record(&self, operation: &str, id: &str) {
        self.state().calls.push(format!("{operation}:{id}"));
    }
}

fn removed<T>(map: &mut BTreeMap<String, T>, id: &str) -> DeleteOutcome {
    if map.remove(id).is_some() {
        DeleteOutcome::Deleted
    } else {
        DeleteOutcome::NotFound
    }
}

#[async_trait]
impl ApimGateway for FakeGateway {
    async fn get_version_set(&self, id: &str) -> GatewayResult<Option<VersionSetContract>> {
        Ok(self.state().version_sets.get(id).cloned())
    }

    async fn create_or_update_version_set(
        &self,
        id: &str,
        payload: &VersionSetContract,
    ) -> GatewayResult<VersionSetContract> {
        self.record("create_or_update_version_set", id);
        let mut state = self.state();
        let existing_id = state.version_sets.get(id).and_then(|v| v.id.clone());
        let remote_id = existing_id
            .or_else(|| state.version_set_ids.pop_front())
            .unwrap_or_else(|| format!("/apiVersionSets/{id}"));
        let mut contract = payload.clone();
        contract.id = Some(remote_id);
        contract.name = Some(id.to_string());
        state.version_sets.insert(id.to_string(), contract.clone());
        Ok(contract)
    }

    async fn delete_version_set(&self, id: &str, _match_token: &str) -> GatewayResult<DeleteOutcome> {
        self.record("delete_version_set", id);
        Ok(removed(&mut self.state().version_sets, id))
    }

    async fn get_api(&self, id: &str) -> GatewayResult<Option<ApiContract>> {
        Ok(self.state().apis.get(id).cloned())
    }

    async fn begin_create_or_update_api(
        &self,
        id: &str,
        payload: &ApiContract,
        resume_token: Option<&str>,
    ) -> GatewayResult<Box<dyn OperationPoller<ApiContract>>> {
        if let Some(token) = resume_token {
            self.record("resume_api", id);
            if !self.state().operations.contains_key(token) {
                return Err(GatewayError::InvalidResumeToken(token.to_string()));
            }
            return Ok(Box::new(FakePoller::new(self.clone(), token.to_string())));
        }

        self.record("create_or_update_api", id);
        let mut state = self.state();
        state.next_operation += 1;
        let token = format!("op-{}", state.next_operation);
        let remaining_polls = state.polls_before_done;
        state.operations.insert(
            token.clone(),
            PendingOperation {
                id: id.to_string(),
                payload: payload.clone(),
                remaining_polls,
            },
        );
        drop(state);
        Ok(Box::new(FakePoller::new(self.clone(), token)))
    }

    async fn delete_api(&self, id: &str, _match_token: &str) -> GatewayResult<DeleteOutcome> {
        self.record("delete_api", id);
        Ok(removed(&mut self.state().apis, id))
    }

    async fn get_api_policy(&self, api_id: &str) -> GatewayResult<Option<PolicyContract>> {
        Ok(self.state().policies.get(api_id).cloned())
    }

    async fn create_or_update_api_policy(
        &self,
        api_id: &str,
        payload: &PolicyContract,
    ) -> GatewayResult<PolicyContract> {
        self.record("create_or_update_api_policy", api_id);
        self.state()
            .policies
            .insert(api_id.to_string(), payload.clone());
        Ok(payload.clone())
    }

    async fn delete_api_policy(&self, api_id: &str, _match_token: &str) -> GatewayResult<DeleteOutcome> {
        self.record("delete_api_policy", api_id);
        Ok(removed(&mut self.state().policies, api_id))
    }

    async fn link_product_api(&self, product_id: &str, api_id: &str) -> GatewayResult<()> {
        self.record("link_product_api", &format!("{product_id}/{api_id}"));
        let mut state = self.state();
        if state.missing_products.contains(product_id) {
            return Err(GatewayError::NotFound);
        }
        state
            .links
            .insert((product_id.to_string(), api_id.to_string()));
        Ok(())
    }

    async fn get_backend(&self, id: &str) -> GatewayResult<Option<BackendContract>> {
        Ok(self.state().backends.get(id).cloned())
    }

    async fn create_or_update_backend(
        &self,
        id: &str,
        payload: &BackendContract,
    ) -> GatewayResult<BackendContract> {
        self.record("create_or_update_backend", id);
        let mut state = self.state();
        state.next_etag += 1;
        let mut contract = payload.clone();
        contract.id = Some(format!("/backends/{id}"));
        contract.name = Some(id.to_string());
        contract.etag = Some(format!("\"etag-{}\"", state.next_etag));
        state.backends.insert(id.to_string(), contract.clone());
        Ok(contract)
    }

    async fn delete_backend(&self, id: &str, match_token: &str) -> GatewayResult<DeleteOutcome> {
        self.record("delete_backend", &format!("{id}:{match_token}"));
        Ok(removed(&mut self.state().backends, id))
    }
}

/// Poller over one pending operation of the fake gateway
pub struct FakePoller {
    gateway: FakeGateway,
    token: String,
    last: Option<PollState>,
    result: Option<ApiContract>,
}

impl FakePoller {
    fn new(gateway: FakeGateway, token: String) -> Self {
        Self {
            gateway,
            token,
            last: None,
            result: None,
        }
    }
}

#[async_trait]
impl OperationPoller<ApiContract> for FakePoller {
    async fn poll(&mut self) -> GatewayResult<PollState> {
        let mut state = self.gateway.state();
        let failure = state.fail_operations.clone();
        let Some(operation) = state.operations.get_mut(&self.token) else {
            return Err(GatewayError::InvalidResumeToken(self.token.clone()));
        };

        let polled = if let Some(reason) = failure {
            state.operations.remove(&self.token);
            PollState::Failed(reason)
        } else if operation.remaining_polls > 0 {
            operation.remaining_polls -= 1;
            PollState::InProgress
        } else {
            let operation = state
                .operations
                .remove(&self.token)
                .expect("operation present");
            let mut contract = operation.payload;
            contract.id = Some(format!("/apis/{}", operation.id));
            contract.name = Some(operation.id.clone());
            contract.properties.provisioning_state = Some("Succeeded".to_string());
            state.apis.insert(operation.id, contract.clone());
            self.result = Some(contract);
            PollState::Succeeded
        };
        self.last = Some(polled.clone());
        Ok(polled)
    }

    fn is_done(&self) -> bool {
        matches!(self.last, Some(PollState::Succeeded | PollState::Failed(_)))
    }

    async fn result(&mut self) -> GatewayResult<ApiContract> {
        self.result.clone().ok_or(GatewayError::NotFound)
    }

    fn resume_token(&self) -> GatewayResult<String> {
        Ok(self.token.clone())
    }
}

/// Content fetcher serving bytes from a map
#[derive(Debug, Clone, Default)]
pub struct FakeFetcher {
    content: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl FakeFetcher {
    pub fn serve(&self, url: &str, bytes: &[u8]) {
        self.content
            .lock()
            .expect("fetcher lock poisoned")
            .insert(url.to_string(), bytes.to_vec());
    }
}

#[async_trait]
impl ContentFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, DigestError> {
        self.content
            .lock()
            .expect("fetcher lock poisoned")
            .get(url)
            .cloned()
            .ok_or_else(|| DigestError::Fetch {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            })
    }
}

/// A reconciler context over memory stores and fakes
pub struct Harness {
    pub ctx: Arc<Context>,
    pub gateway: FakeGateway,
    pub fetcher: FakeFetcher,
    pub apis: Arc<MemoryStore<Api>>,
    pub api_versions: Arc<MemoryStore<ApiVersion>>,
    pub backends: Arc<MemoryStore<Backend>>,
    pub product_apis: Arc<MemoryStore<ProductApi>>,
    pub product_api_versions: Arc<MemoryStore<ProductApiVersion>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(true)
    }

    /// A harness whose APIM target is not configured
    pub fn unconfigured() -> Self {
        Self::build(false)
    }

    fn build(configured: bool) -> Self {
        let gateway = FakeGateway::default();
        let fetcher = FakeFetcher::default();
        let apis = Arc::new(MemoryStore::default());
        let api_versions = Arc::new(MemoryStore::default());
        let backends = Arc::new(MemoryStore::default());
        let product_apis = Arc::new(MemoryStore::default());
        let product_api_versions = Arc::new(MemoryStore::default());

        let stores = Stores {
            apis: Arc::clone(&apis) as Arc<dyn ObjectStore<Api>>,
            api_versions: Arc::clone(&api_versions) as Arc<dyn ObjectStore<ApiVersion>>,
            backends: Arc::clone(&backends) as Arc<dyn ObjectStore<Backend>>,
            product_apis: Arc::clone(&product_apis) as Arc<dyn ObjectStore<ProductApi>>,
            product_api_versions: Arc::clone(&product_api_versions)
                as Arc<dyn ObjectStore<ProductApiVersion>>,
        };
        let remote: Result<Arc<dyn ApimGateway>, MissingConfiguration> = if configured {
            Ok(Arc::new(gateway.clone()))
        } else {
            Err(MissingConfiguration {
                missing: vec!["STILAS_AZ_APIM_NAME"],
            })
        };
        let ctx = Arc::new(Context::new(
            stores,
            remote,
            ContentDigester::new(Arc::new(fetcher.clone())),
            ControllerConfig::default(),
        ));

        Self {
            ctx,
            gateway,
            fetcher,
            apis,
            api_versions,
            backends,
            product_apis,
            product_api_versions,
        }
    }
}

/// Give `obj` a namespace
pub fn namespaced<K: Resource>(mut obj: K, namespace: &str) -> K {
    obj.meta_mut().namespace = Some(namespace.to_string());
    obj
}
