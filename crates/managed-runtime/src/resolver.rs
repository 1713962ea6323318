//! Attribute reference resolution
//!
//! For every [`AttributeReference`] whose source field is still empty, the resolver
//! reads the target resource and classifies it as NotFound, NotReady or Ready. Only
//! when every pending reference is Ready are the values copied into the spec, so a
//! blocked pass never leaves a half-resolved spec behind. Once a field holds a value
//! its references are skipped (resolve once, then the literal governs).

use std::sync::Arc;

use async_trait::async_trait;
use crds::{API_VERSION, AttributeReference, Managed};
use kube::api::{Api, ApiResource, DynamicObject};
use kube::core::GroupVersionKind;
use kube::{Client, ResourceExt};
use serde_json::Value;
use tracing::debug;

use crate::context::PassContext;
use crate::error::ResolveError;

/// Readiness of one reference target, only meaningful within a single pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceStatus {
    NotFound,
    NotReady,
    Ready,
}

impl std::fmt::Display for ReferenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceStatus::NotFound => write!(f, "NotFound"),
            ReferenceStatus::NotReady => write!(f, "NotReady"),
            ReferenceStatus::Ready => write!(f, "Ready"),
        }
    }
}

/// Status of one pending reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceOutcome {
    pub reference: AttributeReference,
    pub status: ReferenceStatus,
}

/// Aggregate result of a resolution pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// No reference had an empty source field; nothing was read
    AlreadyResolved,
    /// This many references were resolved and assigned into the spec
    Resolved(usize),
    /// At least one target is missing or not ready; the spec is untouched
    Blocked(Vec<ReferenceOutcome>),
}

impl Resolution {
    /// Message listing the references that block resolution
    pub fn blocked_message(outcomes: &[ReferenceOutcome], namespace: &str) -> String {
        outcomes
            .iter()
            .filter(|o| o.status != ReferenceStatus::Ready)
            .map(|o| format!("{} is {}", o.reference.describe(namespace), o.status))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Reads reference targets as untyped JSON
#[async_trait]
pub trait ReferenceReader: Send + Sync {
    /// The target object, or `None` if it does not exist
    async fn get(&self, reference: &AttributeReference, namespace: &str) -> Result<Option<Value>, ResolveError>;
}

/// Reads reference targets from the Kubernetes API using dynamic objects
#[derive(Clone)]
pub struct KubeReferenceReader {
    client: Client,
}

impl KubeReferenceReader {
    /// Reader fetching targets through the dynamic API
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReferenceReader for KubeReferenceReader {
    async fn get(&self, reference: &AttributeReference, namespace: &str) -> Result<Option<Value>, ResolveError> {
        let gvk = GroupVersionKind::gvk(&reference.api_group, API_VERSION, &reference.kind);
        let ar = ApiResource::from_gvk(&gvk);
        let ns = reference.target_namespace(namespace);
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), ns, &ar);
        let obj = api.get_opt(&reference.name).await.map_err(|e| ResolveError::Read {
            target: reference.describe(namespace),
            message: e.to_string(),
        })?;
        obj.map(serde_json::to_value).transpose().map_err(ResolveError::from)
    }
}

/// Resolves the attribute references of managed resources
#[derive(Clone)]
pub struct ReferenceResolver {
    reader: Arc<dyn ReferenceReader>,
}

impl ReferenceResolver {
    /// Resolver reading targets through `reader`
    pub fn new(reader: Arc<dyn ReferenceReader>) -> Self {
        Self { reader }
    }

    /// Resolve every pending reference of `resource`, assigning values into its spec
    /// only if all of them are Ready.
    pub async fn resolve<K: Managed>(&self, ctx: &PassContext, resource: &mut K) -> Result<Resolution, ResolveError> {
        let namespace = resource.namespace().unwrap_or_default();
        let mut doc = serde_json::to_value(&*resource)?;

        let pending: Vec<&AttributeReference> = resource
            .resource_spec()
            .references
            .iter()
            .filter(|r| is_empty(lookup(&doc["spec"], &r.source_field)))
            .collect();

        if pending.is_empty() {
            return Ok(Resolution::AlreadyResolved);
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        let mut values = Vec::with_capacity(pending.len());
        for reference in &pending {
            let target = ctx.guard(self.reader.get(reference, &namespace)).await??;
            let (status, value) = classify(target.as_ref(), &reference.attribute_path);
            debug!("Reference {} -> {}", reference.describe(&namespace), status);
            outcomes.push(ReferenceOutcome {
                reference: (*reference).clone(),
                status,
            });
            values.push(value);
        }

        if outcomes.iter().any(|o| o.status != ReferenceStatus::Ready) {
            return Ok(Resolution::Blocked(outcomes));
        }

        let spec = doc
            .get_mut("spec")
            .ok_or_else(|| ResolveError::Assign {
                field: "spec".to_string(),
                message: "resource has no spec".to_string(),
            })?;
        for (reference, value) in pending.iter().zip(values) {
            if let Some(value) = value {
                assign(spec, &reference.source_field, value)?;
            }
        }

        let resolved = pending.len();
        *resource = serde_json::from_value(doc)?;
        Ok(Resolution::Resolved(resolved))
    }
}

/// Classify a target and extract the referenced attribute when Ready
fn classify(target: Option<&Value>, attribute_path: &str) -> (ReferenceStatus, Option<Value>) {
    let Some(target) = target else {
        return (ReferenceStatus::NotFound, None);
    };
    if !target_is_ready(target) {
        return (ReferenceStatus::NotReady, None);
    }
    let value = lookup(target, attribute_path);
    if is_empty(value) {
        // Ready but the attribute is not published yet
        return (ReferenceStatus::NotReady, None);
    }
    (ReferenceStatus::Ready, value.cloned())
}

fn target_is_ready(target: &Value) -> bool {
    target["status"]["conditions"]
        .as_array()
        .map(|conds| {
            conds
                .iter()
                .any(|c| c["type"] == "Ready" && c["status"] == "True")
        })
        .unwrap_or(false)
}

/// Follow a dotted path; numeric segments index into arrays
pub(crate) fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .try_fold(root, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

pub(crate) fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Set a scalar field, or append to an array field if the value is not already present
fn assign(spec: &mut Value, field: &str, value: Value) -> Result<(), ResolveError> {
    let assign_err = |message: &str| ResolveError::Assign {
        field: field.to_string(),
        message: message.to_string(),
    };

    let segments: Vec<&str> = field.split('.').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        return Err(assign_err("empty field path"));
    };

    let mut current = spec;
    for segment in parents {
        let map = current.as_object_mut().ok_or_else(|| assign_err("parent is not an object"))?;
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }

    let map = current.as_object_mut().ok_or_else(|| assign_err("parent is not an object"))?;
    match map.get_mut(*last) {
        Some(Value::Array(items)) => {
            if !items.contains(&value) {
                items.push(value);
            }
        }
        _ => {
            map.insert(last.to_string(), value);
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "resolver_test.rs"]
mod resolver_test;
