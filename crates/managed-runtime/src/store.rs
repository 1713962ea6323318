//! Persistence of managed resources
//!
//! The loop works on an owned copy of the resource and hands both the copy it read
//! and the copy it changed to [`ManagedStore::update`], which writes only what moved.

use std::marker::PhantomData;

use async_trait::async_trait;
use crds::Managed;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use serde_json::json;
use tracing::debug;

use crate::context::ObjectKey;
use crate::error::StoreError;

/// Reads and writes managed resources of one kind
#[async_trait]
pub trait ManagedStore<K: Managed>: Send + Sync {
    /// Current state of the resource, `None` if it no longer exists
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError>;

    /// Persist the difference between `original` and `updated`, returning the stored object
    async fn update(&self, original: &K, updated: &K) -> Result<K, StoreError>;
}

/// What changed between two versions of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Changes {
    pub spec_or_metadata: bool,
    pub status: bool,
}

impl Changes {
    /// Compare two versions of a resource section by section
    pub fn between<K: Managed>(original: &K, updated: &K) -> Result<Self, StoreError> {
        let before = serde_json::to_value(original)?;
        let after = serde_json::to_value(updated)?;
        Ok(Self {
            spec_or_metadata: before["spec"] != after["spec"] || original.finalizers() != updated.finalizers(),
            status: before["status"] != after["status"],
        })
    }

    /// Anything at all changed
    pub fn any(&self) -> bool {
        self.spec_or_metadata || self.status
    }
}

fn map_write_error(key: &str, err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict(key.to_string()),
        kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound(key.to_string()),
        other => StoreError::Kube(other),
    }
}

/// Kubernetes-backed store
///
/// Spec and finalizers are merge-patched with the resourceVersion that was read, so a
/// concurrent writer causes a conflict instead of a lost update. Status goes through
/// the status subresource and is only written when it changed.
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> KubeStore<K> {
    /// Store over the API server
    pub fn new(client: Client) -> Self {
        Self {
            client,
            _kind: PhantomData,
        }
    }
}

#[async_trait]
impl<K: Managed> ManagedStore<K> for KubeStore<K> {
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        let api: Api<K> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn update(&self, original: &K, updated: &K) -> Result<K, StoreError> {
        let changes = Changes::between(original, updated)?;
        if !changes.any() {
            return Ok(updated.clone());
        }

        let name = updated.name_any();
        let namespace = updated.namespace().unwrap_or_default();
        let key = format!("{namespace}/{name}");
        let api: Api<K> = Api::namespaced(self.client.clone(), &namespace);
        let params = PatchParams::default();
        let after = serde_json::to_value(updated)?;
        let mut latest = updated.clone();

        if changes.spec_or_metadata {
            let patch = json!({
                "metadata": {
                    "resourceVersion": original.resource_version(),
                    "finalizers": updated.finalizers(),
                },
                "spec": after["spec"],
            });
            debug!("Patching spec/finalizers of {}", key);
            latest = api
                .patch(&name, &params, &Patch::Merge(&patch))
                .await
                .map_err(|e| map_write_error(&key, e))?;

            // Removing the last finalizer of a deleting object deletes it
            if latest.meta().deletion_timestamp.is_some() && latest.finalizers().is_empty() {
                return Ok(latest);
            }
        }

        if changes.status {
            let patch = json!({ "status": after["status"] });
            debug!("Patching status of {}", key);
            latest = api
                .patch_status(&name, &params, &Patch::Merge(&patch))
                .await
                .map_err(|e| map_write_error(&key, e))?;
        }

        Ok(latest)
    }
}
