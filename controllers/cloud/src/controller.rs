//! Main controller implementation.
//!
//! Builds the shared collaborators (reference reader, connection publisher,
//! credentials reader and gateway client factory) once, then starts one watcher
//! per managed kind, each with its own store and reconciler.

use std::sync::Arc;

use crds::{IamRole, InternetGateway, KubernetesCluster, RolePolicyAttachment, SecurityGroup, Subnet, Vpc};
use kube::{Api, Client};
use managed_runtime::{
    ConnectionPublisher, CredentialsReader, KubeCredentialsReader, KubeReferenceReader, KubeStore, ManagedReconciler,
    ReferenceReader, ReferenceResolver, SecretPublisher,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::adapters::CloudKind;
use crate::config::ControllerConfig;
use crate::connecter::{ClientFactory, CloudConnecter, GatewayClientFactory};
use crate::error::ControllerError;
use crate::watcher::watch_resource;

/// Collaborators shared by every managed kind
struct Shared {
    client: Client,
    references: Arc<dyn ReferenceReader>,
    publisher: Arc<dyn ConnectionPublisher>,
    credentials: Arc<dyn CredentialsReader>,
    factory: Arc<dyn ClientFactory>,
}

/// Main controller for CloudOps managed resources.
pub struct Controller {
    watchers: Vec<(String, JoinHandle<Result<(), ControllerError>>)>,
    shutdown: CancellationToken,
}

impl Controller {
    /// Connect to the cluster and start a watcher for every managed kind.
    pub async fn new(config: ControllerConfig, shutdown: CancellationToken) -> Result<Self, ControllerError> {
        info!("Initializing CloudOps controller");

        let client = Client::try_default().await?;
        let shared = Shared {
            references: Arc::new(KubeReferenceReader::new(client.clone())),
            publisher: Arc::new(SecretPublisher::new(client.clone())),
            credentials: Arc::new(KubeCredentialsReader::new(client.clone())),
            factory: Arc::new(GatewayClientFactory),
            client,
        };

        let watchers = vec![
            spawn_watcher::<Vpc>(&shared, &config, &shutdown),
            spawn_watcher::<Subnet>(&shared, &config, &shutdown),
            spawn_watcher::<SecurityGroup>(&shared, &config, &shutdown),
            spawn_watcher::<InternetGateway>(&shared, &config, &shutdown),
            spawn_watcher::<IamRole>(&shared, &config, &shutdown),
            spawn_watcher::<RolePolicyAttachment>(&shared, &config, &shutdown),
            spawn_watcher::<KubernetesCluster>(&shared, &config, &shutdown),
        ];
        info!("Started {} watchers in namespace {}", watchers.len(), config.namespace);

        Ok(Self { watchers, shutdown })
    }

    /// Run until shutdown or until any watcher stops.
    ///
    /// The first watcher to stop cancels the rest, so the process exits and is restarted
    /// rather than running with a kind silently unwatched.
    pub async fn run(self) -> Result<(), ControllerError> {
        let (kinds, handles): (Vec<String>, Vec<_>) = self.watchers.into_iter().unzip();
        let (result, index, remaining) = futures::future::select_all(handles).await;
        self.shutdown.cancel();
        futures::future::join_all(remaining).await;

        match result {
            Ok(Ok(())) => {
                info!("{} watcher stopped", kinds[index]);
                Ok(())
            }
            Ok(Err(e)) => {
                error!("{} watcher failed: {}", kinds[index], e);
                Err(e)
            }
            Err(e) => {
                error!("{} watcher task panicked: {}", kinds[index], e);
                Err(ControllerError::Watch(format!("{} watcher task failed: {e}", kinds[index])))
            }
        }
    }
}

fn spawn_watcher<K: CloudKind>(
    shared: &Shared,
    config: &ControllerConfig,
    shutdown: &CancellationToken,
) -> (String, JoinHandle<Result<(), ControllerError>>) {
    let kind = K::kind(&()).to_string();
    let api: Api<K> = Api::namespaced(shared.client.clone(), &config.namespace);
    let connecter = CloudConnecter::<K>::new(
        shared.credentials.clone(),
        shared.factory.clone(),
        config.endpoint_override.clone(),
    );
    let reconciler = Arc::new(ManagedReconciler::new(
        Arc::new(KubeStore::<K>::new(shared.client.clone())),
        Arc::new(connecter),
        ReferenceResolver::new(shared.references.clone()),
        shared.publisher.clone(),
        config.requeue,
    ));

    let config = config.clone();
    let shutdown = shutdown.clone();
    let handle = tokio::spawn(async move { watch_resource(api, reconciler, &config, shutdown).await });
    (kind, handle)
}
