//! # Kubernetes-backed Store
//!
//! [`ObjectStore`] over `kube::Api`. Owner lookups list the namespace and
//! filter on owner reference UIDs, matching what the garbage collector keys on.

use super::{ObjectStore, StoreError, StoreResult};
use async_trait::async_trait;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// Store backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Map API server status codes onto store errors
fn classify(err: kube::Error, key: &str) -> StoreError {
    match &err {
        kube::Error::Api(response) if response.code == 404 => StoreError::NotFound(key.to_string()),
        kube::Error::Api(response) if response.code == 409 => StoreError::Conflict(key.to_string()),
        _ => StoreError::Kube(err),
    }
}

fn object_key<K: Resource>(obj: &K) -> StoreResult<(String, String)> {
    let namespace = obj
        .meta()
        .namespace
        .clone()
        .ok_or(StoreError::MissingMetadata("metadata.namespace"))?;
    let name = obj
        .meta()
        .name
        .clone()
        .ok_or(StoreError::MissingMetadata("metadata.name"))?;
    Ok((namespace, name))
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, namespace: &str, name: &str) -> StoreResult<Option<K>> {
        let key = format!("{namespace}/{name}");
        self.api::<K>(namespace)
            .get_opt(name)
            .await
            .map_err(|e| classify(e, &key))
    }

    async fn create(&self, namespace: &str, obj: &K) -> StoreResult<K> {
        let key = format!("{namespace}/{}", obj.name_any());
        self.api::<K>(namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| classify(e, &key))
    }

    async fn replace(&self, obj: &K) -> StoreResult<K> {
        let (namespace, name) = object_key(obj)?;
        let key = format!("{namespace}/{name}");
        self.api::<K>(&namespace)
            .replace(&name, &PostParams::default(), obj)
            .await
            .map_err(|e| classify(e, &key))
    }

    async fn replace_status(&self, obj: &K) -> StoreResult<K> {
        let (namespace, name) = object_key(obj)?;
        let key = format!("{namespace}/{name}");
        let body = serde_json::to_vec(obj).map_err(|e| StoreError::Kube(kube::Error::SerdeError(e)))?;
        self.api::<K>(&namespace)
            .replace_status(&name, &PostParams::default(), body)
            .await
            .map_err(|e| classify(e, &key))
    }

    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<()> {
        let key = format!("{namespace}/{name}");
        match self
            .api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => match classify(e, &key) {
                StoreError::NotFound(_) => {
                    debug!("delete of {} skipped: already gone", key);
                    Ok(())
                }
                other => Err(other),
            },
        }
    }

    async fn list_owned(&self, namespace: &str, owner_uid: &str) -> StoreResult<Vec<K>> {
        let key = format!("{namespace}/*");
        let list = self
            .api::<K>(namespace)
            .list(&ListParams::default())
            .await
            .map_err(|e| classify(e, &key))?;
        Ok(list
            .items
            .into_iter()
            .filter(|obj| obj.owner_references().iter().any(|o| o.uid == owner_uid))
            .collect())
    }
}
