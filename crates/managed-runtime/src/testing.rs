//! In-memory collaborators for exercising the loop without an API server
//!
//! Enabled with the `test-util` feature.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use crds::{AttributeReference, Managed, ProviderReference};
use kube::{Resource, ResourceExt};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::Span;

use crate::context::{Clock, ObjectKey, PassContext};
use crate::credentials::{CredentialsReader, ProviderCredentials};
use crate::error::{CredentialsError, ExternalError, PublishError, ResolveError, StoreError};
use crate::external::{
    ConnectionDetails, ExternalClient, ExternalConnecter, ExternalCreation, ExternalObservation, ExternalUpdate,
};
use crate::publisher::{ConnectionPublisher, PublishTarget};
use crate::resolver::ReferenceReader;
use crate::store::{Changes, ManagedStore};

/// Clock frozen at a settable instant
#[derive(Debug)]
pub struct FixedClock(Mutex<DateTime<Utc>>);

impl FixedClock {
    /// Clock stopped at `now`
    pub fn at(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    /// Move the clock forward
    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.0.lock().unwrap();
        *now += by;
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::at(fixed_time())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// 2024-01-01T00:00:00Z
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Pass context with a fixed clock, a fresh cancellation token and a generous deadline
pub fn test_context() -> (PassContext, CancellationToken) {
    test_context_with_clock(Arc::new(FixedClock::default()))
}

/// Pass context driven by `clock`
pub fn test_context_with_clock(clock: Arc<dyn Clock>) -> (PassContext, CancellationToken) {
    let token = CancellationToken::new();
    let ctx = PassContext::new(clock, token.clone(), Duration::from_secs(30), Span::none());
    (ctx, token)
}

/// Key of a resource
pub fn key_of<K: Managed>(resource: &K) -> ObjectKey {
    ObjectKey::new(&resource.namespace().unwrap_or_default(), &resource.name_any())
}

/// Managed resource store backed by a map
///
/// Spec and finalizer writes are checked against the stored resourceVersion like the
/// API server does; status writes are not.
pub struct InMemoryStore<K> {
    objects: Mutex<HashMap<ObjectKey, K>>,
    writes: Mutex<Vec<K>>,
    fail_updates: Mutex<Option<String>>,
    // Real writes still allowed before `fail_updates` applies; None means none
    writes_before_failure: Mutex<Option<usize>>,
    version: Mutex<u64>,
}

impl<K> Default for InMemoryStore<K> {
    fn default() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            fail_updates: Mutex::new(None),
            writes_before_failure: Mutex::new(None),
            version: Mutex::new(1),
        }
    }
}

impl<K: Managed> InMemoryStore<K> {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self, resource: &mut K) {
        let mut version = self.version.lock().unwrap();
        *version += 1;
        resource.meta_mut().resource_version = Some(version.to_string());
    }

    /// Store a resource as if a client had applied it
    pub fn insert(&self, mut resource: K) {
        self.bump(&mut resource);
        self.objects.lock().unwrap().insert(key_of(&resource), resource);
    }

    /// Stored copy of a resource
    pub fn object(&self, key: &ObjectKey) -> Option<K> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Every successful write, oldest first
    pub fn writes(&self) -> Vec<K> {
        self.writes.lock().unwrap().clone()
    }

    /// Make every following update fail with a conflict
    pub fn fail_updates(&self, message: &str) {
        *self.writes_before_failure.lock().unwrap() = None;
        *self.fail_updates.lock().unwrap() = Some(message.to_string());
    }

    /// Let `writes` more updates through, then fail every following one with a conflict
    pub fn fail_updates_after(&self, writes: usize, message: &str) {
        *self.writes_before_failure.lock().unwrap() = Some(writes);
        *self.fail_updates.lock().unwrap() = Some(message.to_string());
    }

    /// Stop failing updates
    pub fn clear_update_failures(&self) {
        *self.writes_before_failure.lock().unwrap() = None;
        *self.fail_updates.lock().unwrap() = None;
    }

    /// Mark the stored resource as deleted by a client
    pub fn request_deletion(&self, key: &ObjectKey) {
        if let Some(resource) = self.objects.lock().unwrap().get_mut(key) {
            resource.meta_mut().deletion_timestamp =
                Some(serde_json::from_value(Value::String(fixed_time().to_rfc3339())).unwrap());
        }
    }
}

#[async_trait]
impl<K: Managed> ManagedStore<K> for InMemoryStore<K> {
    async fn get(&self, key: &ObjectKey) -> Result<Option<K>, StoreError> {
        Ok(self.object(key))
    }

    async fn update(&self, original: &K, updated: &K) -> Result<K, StoreError> {
        let changes = Changes::between(original, updated)?;
        if let Some(message) = self.fail_updates.lock().unwrap().clone() {
            let mut remaining = self.writes_before_failure.lock().unwrap();
            match remaining.as_mut() {
                Some(n) if *n > 0 => {
                    if changes.any() {
                        *n -= 1;
                    }
                }
                _ => return Err(StoreError::Conflict(message)),
            }
        }
        if !changes.any() {
            return Ok(updated.clone());
        }

        let key = key_of(updated);
        let stored = self
            .object(&key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        if changes.spec_or_metadata && stored.resource_version() != original.resource_version() {
            return Err(StoreError::Conflict(key.to_string()));
        }

        let mut written = updated.clone();
        self.bump(&mut written);
        self.writes.lock().unwrap().push(written.clone());
        if written.meta().deletion_timestamp.is_some() && written.finalizers().is_empty() {
            self.objects.lock().unwrap().remove(&key);
        } else {
            self.objects.lock().unwrap().insert(key, written.clone());
        }
        Ok(written)
    }
}

/// Reference targets served from a map keyed by kind, namespace and name
#[derive(Default)]
pub struct StaticReferenceReader {
    objects: Mutex<HashMap<(String, String, String), Value>>,
    reads: Mutex<Vec<String>>,
}

impl StaticReferenceReader {
    /// Reader that serves nothing until targets are inserted
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a typed resource
    pub fn insert<T>(&self, resource: &T)
    where
        T: Resource<DynamicType = ()> + Serialize,
    {
        let value = serde_json::to_value(resource).unwrap();
        self.insert_value(
            &T::kind(&()),
            &resource.namespace().unwrap_or_default(),
            &resource.name_any(),
            value,
        );
    }

    /// Serve a raw object under `kind/namespace/name`
    pub fn insert_value(&self, kind: &str, namespace: &str, name: &str, value: Value) {
        self.objects
            .lock()
            .unwrap()
            .insert((kind.to_string(), namespace.to_string(), name.to_string()), value);
    }

    /// Every read, formatted as `Kind/namespace/name`
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReferenceReader for StaticReferenceReader {
    async fn get(&self, reference: &AttributeReference, namespace: &str) -> Result<Option<Value>, ResolveError> {
        let ns = reference.target_namespace(namespace).to_string();
        self.reads.lock().unwrap().push(reference.describe(namespace));
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&(reference.kind.clone(), ns, reference.name.clone()))
            .cloned())
    }
}

/// Publisher that keeps secrets in memory and counts real writes
#[derive(Default)]
pub struct RecordingPublisher {
    secrets: Mutex<HashMap<(String, String), ConnectionDetails>>,
    writes: Mutex<usize>,
    unpublished: Mutex<Vec<String>>,
    fail_publish: Mutex<Option<String>>,
    fail_unpublish: Mutex<Option<String>>,
}

impl RecordingPublisher {
    /// Publisher with no secrets
    pub fn new() -> Self {
        Self::default()
    }

    /// Published details of a secret, if present
    pub fn secret(&self, namespace: &str, name: &str) -> Option<ConnectionDetails> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Number of publishes that changed a secret
    pub fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    /// Every unpublish attempt, formatted as `namespace/name`
    pub fn unpublished(&self) -> Vec<String> {
        self.unpublished.lock().unwrap().clone()
    }

    /// Make every following publish fail
    pub fn fail_publish(&self, message: &str) {
        *self.fail_publish.lock().unwrap() = Some(message.to_string());
    }

    /// Make every following unpublish fail
    pub fn fail_unpublish(&self, message: &str) {
        *self.fail_unpublish.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl ConnectionPublisher for RecordingPublisher {
    async fn publish(&self, target: &PublishTarget, details: &ConnectionDetails) -> Result<(), PublishError> {
        if let Some(message) = self.fail_publish.lock().unwrap().clone() {
            return Err(PublishError::Sink(message));
        }
        let key = (target.namespace.clone(), target.secret_name.clone());
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.get(&key) != Some(details) {
            secrets.insert(key, details.clone());
            *self.writes.lock().unwrap() += 1;
        }
        Ok(())
    }

    async fn unpublish(&self, target: &PublishTarget) -> Result<(), PublishError> {
        self.unpublished
            .lock()
            .unwrap()
            .push(format!("{}/{}", target.namespace, target.secret_name));
        if let Some(message) = self.fail_unpublish.lock().unwrap().clone() {
            return Err(PublishError::Sink(message));
        }
        self.secrets
            .lock()
            .unwrap()
            .remove(&(target.namespace.clone(), target.secret_name.clone()));
        Ok(())
    }
}

/// Credentials keyed by ProviderConfig name
#[derive(Default)]
pub struct StaticCredentialsReader {
    providers: Mutex<HashMap<String, ProviderCredentials>>,
}

impl StaticCredentialsReader {
    /// Reader with no providers
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider serving `blob` for `region`
    pub fn with_provider(self, name: &str, region: &str, blob: &[u8]) -> Self {
        self.providers.lock().unwrap().insert(
            name.to_string(),
            ProviderCredentials {
                region: region.to_string(),
                blob: blob.to_vec(),
            },
        );
        self
    }
}

#[async_trait]
impl CredentialsReader for StaticCredentialsReader {
    async fn read(&self, provider_ref: &ProviderReference, namespace: &str) -> Result<ProviderCredentials, CredentialsError> {
        self.providers
            .lock()
            .unwrap()
            .get(&provider_ref.name)
            .cloned()
            .ok_or_else(|| CredentialsError::ProviderNotFound(format!("{namespace}/{}", provider_ref.name)))
    }
}

#[derive(Debug, Default)]
struct Script {
    observation: ExternalObservation,
    creation: ExternalCreation,
    connect_error: Option<ExternalError>,
    observe_error: Option<ExternalError>,
    create_error: Option<ExternalError>,
    update_error: Option<ExternalError>,
    delete_error: Option<ExternalError>,
    calls: Vec<&'static str>,
}

/// External adapter whose answers are set by the test
///
/// Injected errors persist until replaced or cleared.
#[derive(Debug, Clone, Default)]
pub struct ScriptedExternal {
    script: Arc<Mutex<Script>>,
}

impl ScriptedExternal {
    /// Adapter reporting an absent resource and succeeding at everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Observation returned by every following observe
    pub fn observe_returns(&self, observation: ExternalObservation) {
        self.script.lock().unwrap().observation = observation;
    }

    /// Connection details returned by every following create
    pub fn create_returns(&self, details: ConnectionDetails) {
        self.script.lock().unwrap().creation = ExternalCreation {
            connection_details: details,
        };
    }

    /// Error for connect, or `None` to succeed again
    pub fn fail_connect(&self, err: Option<ExternalError>) {
        self.script.lock().unwrap().connect_error = err;
    }

    /// Error for observe, or `None` to succeed again
    pub fn fail_observe(&self, err: Option<ExternalError>) {
        self.script.lock().unwrap().observe_error = err;
    }

    /// Error for create, or `None` to succeed again
    pub fn fail_create(&self, err: Option<ExternalError>) {
        self.script.lock().unwrap().create_error = err;
    }

    /// Error for update, or `None` to succeed again
    pub fn fail_update(&self, err: Option<ExternalError>) {
        self.script.lock().unwrap().update_error = err;
    }

    /// Error for delete, or `None` to succeed again
    pub fn fail_delete(&self, err: Option<ExternalError>) {
        self.script.lock().unwrap().delete_error = err;
    }

    /// Operations invoked so far ("connect", "observe", "create", "update", "delete")
    pub fn calls(&self) -> Vec<&'static str> {
        self.script.lock().unwrap().calls.clone()
    }

    fn call(&self, name: &'static str) -> Option<ExternalError> {
        let mut script = self.script.lock().unwrap();
        script.calls.push(name);
        match name {
            "connect" => script.connect_error.clone(),
            "observe" => script.observe_error.clone(),
            "create" => script.create_error.clone(),
            "update" => script.update_error.clone(),
            _ => script.delete_error.clone(),
        }
    }
}

#[async_trait]
impl<K: Managed> ExternalConnecter<K> for ScriptedExternal {
    async fn connect(&self, _ctx: &PassContext, _resource: &K) -> Result<Box<dyn ExternalClient<K>>, ExternalError> {
        match self.call("connect") {
            Some(err) => Err(err),
            None => Ok(Box::new(self.clone())),
        }
    }
}

#[async_trait]
impl<K: Managed> ExternalClient<K> for ScriptedExternal {
    async fn observe(&self, _ctx: &PassContext, _resource: &mut K) -> Result<ExternalObservation, ExternalError> {
        match self.call("observe") {
            Some(err) => Err(err),
            None => Ok(self.script.lock().unwrap().observation.clone()),
        }
    }

    async fn create(&self, ctx: &PassContext, resource: &mut K) -> Result<ExternalCreation, ExternalError> {
        if let Some(err) = self.call("create") {
            return Err(err);
        }
        resource.conditions_mut().set(crds::Condition::creating(ctx.now()));
        Ok(self.script.lock().unwrap().creation.clone())
    }

    async fn update(&self, ctx: &PassContext, resource: &mut K) -> Result<ExternalUpdate, ExternalError> {
        if let Some(err) = self.call("update") {
            return Err(err);
        }
        resource.conditions_mut().set(crds::Condition::creating(ctx.now()));
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, _ctx: &PassContext, _resource: &mut K) -> Result<(), ExternalError> {
        match self.call("delete") {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
