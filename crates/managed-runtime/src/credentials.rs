//! Provider reference to credentials

use async_trait::async_trait;
use crds::{ProviderConfig, ProviderReference};
use k8s_openapi::api::core::v1::Secret;
use kube::Client;
use kube::api::Api;

use crate::error::CredentialsError;

/// Region and opaque credentials blob of a ProviderConfig
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub region: String,
    pub blob: Vec<u8>,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("region", &self.region)
            .field("blob", &format_args!("<{} bytes>", self.blob.len()))
            .finish()
    }
}

/// Resolves a provider reference to credentials
#[async_trait]
pub trait CredentialsReader: Send + Sync {
    /// `namespace` is the managed resource's namespace, used when the reference has none
    async fn read(&self, provider_ref: &ProviderReference, namespace: &str) -> Result<ProviderCredentials, CredentialsError>;
}

/// Reads the ProviderConfig and then its credentials Secret
#[derive(Clone)]
pub struct KubeCredentialsReader {
    client: Client,
}

impl KubeCredentialsReader {
    /// Reader over the cluster's ProviderConfigs and Secrets
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialsReader for KubeCredentialsReader {
    async fn read(&self, provider_ref: &ProviderReference, namespace: &str) -> Result<ProviderCredentials, CredentialsError> {
        let provider_ns = provider_ref.namespace.as_deref().unwrap_or(namespace);
        let providers: Api<ProviderConfig> = Api::namespaced(self.client.clone(), provider_ns);
        let provider = providers
            .get_opt(&provider_ref.name)
            .await?
            .ok_or_else(|| CredentialsError::ProviderNotFound(format!("{provider_ns}/{}", provider_ref.name)))?;

        let selector = &provider.spec.credentials_secret_ref;
        let secret_ns = selector.namespace.as_deref().unwrap_or(provider_ns);
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), secret_ns);
        let secret_name = format!("{secret_ns}/{}", selector.name);
        let secret = secrets
            .get_opt(&selector.name)
            .await?
            .ok_or_else(|| CredentialsError::SecretNotFound(secret_name.clone()))?;

        let blob = secret
            .data
            .as_ref()
            .and_then(|data| data.get(&selector.key))
            .map(|bytes| bytes.0.clone())
            .ok_or_else(|| CredentialsError::MissingKey {
                secret: secret_name,
                key: selector.key.clone(),
            })?;

        Ok(ProviderCredentials {
            region: provider.spec.region.clone(),
            blob,
        })
    }
}
