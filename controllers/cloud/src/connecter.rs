//! Provider sessions
//!
//! [`CloudConnecter`] turns a managed resource's provider reference into an
//! authenticated gateway client and hands it to the kind's adapter.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use cloud_client::{CloudClient, CloudClientTrait, CloudCredentials, CloudError};
use kube::ResourceExt;
use managed_runtime::{CredentialsReader, ExternalClient, ExternalConnecter, ExternalError, PassContext};
use tracing::debug;

use crate::adapters::{CloudKind, classify};

/// Builds gateway clients
pub trait ClientFactory: Send + Sync {
    fn build(
        &self,
        endpoint: &str,
        region: &str,
        credentials: &CloudCredentials,
    ) -> Result<Arc<dyn CloudClientTrait>, CloudError>;
}

/// HTTP gateway clients
#[derive(Debug, Clone, Copy, Default)]
pub struct GatewayClientFactory;

impl ClientFactory for GatewayClientFactory {
    fn build(
        &self,
        endpoint: &str,
        region: &str,
        credentials: &CloudCredentials,
    ) -> Result<Arc<dyn CloudClientTrait>, CloudError> {
        Ok(Arc::new(CloudClient::new(endpoint, region, credentials)?))
    }
}

/// Connects resources of kind `K` to the gateway
pub struct CloudConnecter<K> {
    credentials: Arc<dyn CredentialsReader>,
    factory: Arc<dyn ClientFactory>,
    endpoint_override: Option<String>,
    kind: PhantomData<fn() -> K>,
}

impl<K> CloudConnecter<K> {
    /// Connecter building clients with `factory`; `endpoint_override` wins over the credentials' endpoint
    pub fn new(
        credentials: Arc<dyn CredentialsReader>,
        factory: Arc<dyn ClientFactory>,
        endpoint_override: Option<String>,
    ) -> Self {
        Self {
            credentials,
            factory,
            endpoint_override,
            kind: PhantomData,
        }
    }
}

#[async_trait]
impl<K: CloudKind> ExternalConnecter<K> for CloudConnecter<K> {
    async fn connect(&self, _ctx: &PassContext, resource: &K) -> Result<Box<dyn ExternalClient<K>>, ExternalError> {
        let namespace = resource.namespace().unwrap_or_default();
        let provider_ref = &resource.resource_spec().provider_ref;
        let provider = self
            .credentials
            .read(provider_ref, &namespace)
            .await
            .map_err(|e| ExternalError::Transient(format!("cannot read provider credentials: {e}")))?;
        let credentials = CloudCredentials::parse(&provider.blob)
            .map_err(|e| ExternalError::Transient(format!("invalid provider credentials: {e}")))?;

        let endpoint = self
            .endpoint_override
            .clone()
            .or_else(|| credentials.endpoint.clone())
            .ok_or_else(|| {
                ExternalError::Terminal(format!(
                    "no gateway endpoint configured for ProviderConfig {}",
                    provider_ref.name
                ))
            })?;
        let region = resource.region().unwrap_or(provider.region.as_str()).to_string();

        debug!("Connecting {} {}/{} to {} in {}", K::kind(&()), namespace, resource.name_any(), endpoint, region);
        let client = self.factory.build(&endpoint, &region, &credentials).map_err(classify)?;
        Ok(K::external(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use cloud_client::MockCloudClient;
    use crds::{KubernetesCluster, Vpc};
    use managed_runtime::testing::{StaticCredentialsReader, test_context};

    const BLOB: &[u8] = br#"{"accessKeyId":"AKID","secretAccessKey":"secret"}"#;
    const BLOB_WITH_ENDPOINT: &[u8] = br#"{"accessKeyId":"AKID","secretAccessKey":"secret","endpoint":"https://gw.example.com"}"#;

    fn connecter<K>(blob: &[u8], endpoint_override: Option<&str>) -> (CloudConnecter<K>, Arc<RecordingFactory>) {
        let factory = Arc::new(RecordingFactory::new(Arc::new(MockCloudClient::new())));
        let credentials = Arc::new(StaticCredentialsReader::new().with_provider("default", "us-east-1", blob));
        (
            CloudConnecter::new(credentials, factory.clone(), endpoint_override.map(str::to_string)),
            factory,
        )
    }

    #[tokio::test]
    async fn test_override_takes_precedence() {
        let (connecter, factory) = connecter::<Vpc>(BLOB_WITH_ENDPOINT, Some("http://localhost:4566"));
        let (ctx, _) = test_context();

        assert!(connecter.connect(&ctx, &test_vpc("main")).await.is_ok());
        assert_eq!(factory.builds(), vec![("http://localhost:4566".to_string(), "us-east-1".to_string())]);
    }

    #[tokio::test]
    async fn test_endpoint_from_credentials() {
        let (connecter, factory) = connecter::<Vpc>(BLOB_WITH_ENDPOINT, None);
        let (ctx, _) = test_context();

        assert!(connecter.connect(&ctx, &test_vpc("main")).await.is_ok());
        assert_eq!(factory.builds()[0].0, "https://gw.example.com");
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_terminal() {
        let (connecter, factory) = connecter::<Vpc>(BLOB, None);
        let (ctx, _) = test_context();

        let err = connecter.connect(&ctx, &test_vpc("main")).await.err().unwrap();
        assert!(err.is_terminal());
        assert!(factory.builds().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_provider_fails() {
        let (connecter, _) = connecter::<Vpc>(BLOB, Some("http://localhost:4566"));
        let (ctx, _) = test_context();
        let mut vpc = test_vpc("main");
        vpc.spec.resource.provider_ref.name = "missing".to_string();

        let err = connecter.connect(&ctx, &vpc).await.err().unwrap();
        assert!(matches!(err, ExternalError::Transient(ref m) if m.contains("missing")));
    }

    #[tokio::test]
    async fn test_cluster_uses_its_own_region() {
        let (connecter, factory) = connecter::<KubernetesCluster>(BLOB, Some("http://localhost:4566"));
        let (ctx, _) = test_context();

        assert!(connecter.connect(&ctx, &test_cluster("prod")).await.is_ok());
        assert_eq!(factory.builds()[0].1, "us-west-2");
    }
}
