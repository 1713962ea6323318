//! Connection secret publishing
//!
//! Connection details are written wholesale into the Secret named by
//! `spec.writeConnectionSecretToRef`, owned by the managed resource so that
//! Kubernetes garbage-collects it with its owner.

use std::collections::BTreeMap;

use async_trait::async_trait;
use crds::Managed;
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, info};

use crate::error::PublishError;
use crate::external::ConnectionDetails;

const FIELD_MANAGER: &str = "cloudops-controller";

/// Where and on whose behalf to publish
#[derive(Debug, Clone, PartialEq)]
pub struct PublishTarget {
    pub secret_name: String,
    pub namespace: String,
    pub owner: OwnerReference,
}

impl PublishTarget {
    /// Target for a managed resource, `None` if it does not ask for a connection secret
    pub fn for_resource<K: Managed>(resource: &K) -> Option<Self> {
        let secret_ref = resource.resource_spec().write_connection_secret_to_ref.as_ref()?;
        let own_ns = resource.namespace().unwrap_or_default();
        let owner = resource.controller_owner_ref(&())?;
        Some(Self {
            secret_name: secret_ref.name.clone(),
            namespace: secret_ref.namespace.clone().unwrap_or(own_ns),
            owner,
        })
    }
}

/// Externalizes connection details
#[async_trait]
pub trait ConnectionPublisher: Send + Sync {
    /// Overwrite the target secret with exactly `details`; identical content is not rewritten
    async fn publish(&self, target: &PublishTarget, details: &ConnectionDetails) -> Result<(), PublishError>;

    /// Remove the target secret if this owner created it
    async fn unpublish(&self, target: &PublishTarget) -> Result<(), PublishError>;
}

/// Publishes into Kubernetes Secrets
#[derive(Clone)]
pub struct SecretPublisher {
    client: Client,
}

impl SecretPublisher {
    /// Publisher writing Secrets through the API server
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn to_secret_data(details: &ConnectionDetails) -> BTreeMap<String, ByteString> {
    details
        .iter()
        .map(|(k, v)| (k.clone(), ByteString(v.clone())))
        .collect()
}

fn owned_by(secret: &Secret, owner: &OwnerReference) -> bool {
    secret.owner_references().iter().any(|r| r.uid == owner.uid)
}

#[async_trait]
impl ConnectionPublisher for SecretPublisher {
    async fn publish(&self, target: &PublishTarget, details: &ConnectionDetails) -> Result<(), PublishError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &target.namespace);
        let data = to_secret_data(details);

        if let Some(existing) = api.get_opt(&target.secret_name).await? {
            if !owned_by(&existing, &target.owner) {
                return Err(PublishError::Sink(format!(
                    "secret {}/{} exists and is not owned by {}",
                    target.namespace, target.secret_name, target.owner.name
                )));
            }
            if existing.data.as_ref() == Some(&data) {
                debug!("Connection secret {}/{} unchanged", target.namespace, target.secret_name);
                return Ok(());
            }
        }

        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(target.secret_name.clone()),
                namespace: Some(target.namespace.clone()),
                owner_references: Some(vec![target.owner.clone()]),
                ..Default::default()
            },
            data: Some(data),
            type_: Some("connection.cloudops.microscaler.io/v1alpha1".to_string()),
            ..Default::default()
        };
        let params = PatchParams::apply(FIELD_MANAGER).force();
        api.patch(&target.secret_name, &params, &Patch::Apply(&secret)).await?;
        info!("Published connection secret {}/{}", target.namespace, target.secret_name);
        Ok(())
    }

    async fn unpublish(&self, target: &PublishTarget) -> Result<(), PublishError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &target.namespace);
        let Some(existing) = api.get_opt(&target.secret_name).await? else {
            return Ok(());
        };
        if !owned_by(&existing, &target.owner) {
            debug!("Leaving {}/{} in place, not owned by {}", target.namespace, target.secret_name, target.owner.name);
            return Ok(());
        }
        match api.delete(&target.secret_name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
