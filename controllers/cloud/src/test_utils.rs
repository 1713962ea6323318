//! Test utilities for the cloud adapters
//!
//! Fixture builders for every managed kind, plus a reconciler harness that drives
//! an adapter through the real reconcile loop against the in-memory gateway.

use std::sync::{Arc, Mutex};

use cloud_client::{CloudClientTrait, CloudCredentials, CloudError, MockCloudClient, RoleInfo, VpcInfo};
use crds::*;
use managed_runtime::testing::{InMemoryStore, RecordingPublisher, StaticCredentialsReader, StaticReferenceReader, key_of};
use managed_runtime::{ManagedReconciler, ObjectKey, ReferenceResolver, RequeuePolicy};

use crate::adapters::CloudKind;
use crate::connecter::{ClientFactory, CloudConnecter};

/// Namespace every fixture lives in
pub const NAMESPACE: &str = "default";

/// Trust policy letting the managed Kubernetes service assume a role
pub const TRUST_POLICY: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":{"Service":"eks.amazonaws.com"},"Action":"sts:AssumeRole"}]}"#;

/// Credentials blob naming a gateway endpoint
pub const CREDENTIALS: &[u8] =
    br#"{"accessKeyId":"AKID","secretAccessKey":"secret","endpoint":"http://gateway.test"}"#;

fn place<K: Managed>(mut resource: K, name: &str) -> K {
    let meta = resource.meta_mut();
    meta.namespace = Some(NAMESPACE.to_string());
    meta.uid = Some(format!("uid-{name}"));
    meta.generation = Some(1);
    resource
}

/// Vpc with a /16 CIDR and default DNS support
pub fn test_vpc(name: &str) -> Vpc {
    place(
        Vpc::new(
            name,
            VpcSpec {
                resource: ResourceSpec::with_provider("default"),
                cidr_block: "10.0.0.0/16".to_string(),
                enable_dns_support: None,
            },
        ),
        name,
    )
}

/// Provider view of an available VPC
pub fn test_vpc_info(vpc_id: &str) -> VpcInfo {
    VpcInfo {
        vpc_id: vpc_id.to_string(),
        cidr_block: "10.0.0.0/16".to_string(),
        state: "available".to_string(),
        enable_dns_support: true,
        client_token: None,
    }
}

/// Subnet in us-west-2a, optionally pinned to a VPC
pub fn test_subnet(name: &str, vpc_id: Option<&str>) -> Subnet {
    place(
        Subnet::new(
            name,
            SubnetSpec {
                resource: ResourceSpec::with_provider("default"),
                cidr_block: "10.0.1.0/24".to_string(),
                availability_zone: "us-west-2a".to_string(),
                vpc_id: vpc_id.map(str::to_string),
            },
        ),
        name,
    )
}

/// Security group named after the resource
pub fn test_security_group(name: &str, vpc_id: Option<&str>) -> SecurityGroup {
    place(
        SecurityGroup::new(
            name,
            SecurityGroupSpec {
                resource: ResourceSpec::with_provider("default"),
                group_name: name.to_string(),
                description: "web tier".to_string(),
                vpc_id: vpc_id.map(str::to_string),
            },
        ),
        name,
    )
}

/// Internet gateway, optionally pinned to a VPC
pub fn test_internet_gateway(name: &str, vpc_id: Option<&str>) -> InternetGateway {
    place(
        InternetGateway::new(
            name,
            InternetGatewaySpec {
                resource: ResourceSpec::with_provider("default"),
                vpc_id: vpc_id.map(str::to_string),
            },
        ),
        name,
    )
}

/// Role named after the resource, trusting the managed Kubernetes service
pub fn test_iam_role(name: &str) -> IamRole {
    place(
        IamRole::new(
            name,
            IamRoleSpec {
                resource: ResourceSpec::with_provider("default"),
                role_name: name.to_string(),
                assume_role_policy_document: TRUST_POLICY.to_string(),
                description: None,
            },
        ),
        name,
    )
}

/// Provider view of a role created from [`test_iam_role`]
pub fn test_role_info(name: &str) -> RoleInfo {
    RoleInfo {
        role_name: name.to_string(),
        role_id: format!("AROA{}", name.to_uppercase()),
        arn: format!("arn:aws:iam::000000000000:role/{name}"),
        assume_role_policy_document: TRUST_POLICY.to_string(),
        description: None,
    }
}

/// Attachment of `policy_arns` to a role
pub fn test_role_policy_attachment(name: &str, role_name: Option<&str>, policy_arns: &[&str]) -> RolePolicyAttachment {
    place(
        RolePolicyAttachment::new(
            name,
            RolePolicyAttachmentSpec {
                resource: ResourceSpec::with_provider("default"),
                role_name: role_name.map(str::to_string),
                policy_arn: None,
                policy_arns: policy_arns.iter().map(|s| s.to_string()).collect(),
            },
        ),
        name,
    )
}

/// Cluster in us-west-2 whose connection secret is `<name>-conn`
pub fn test_cluster(name: &str) -> KubernetesCluster {
    let mut resource = ResourceSpec::with_provider("default");
    resource.write_connection_secret_to_ref = Some(SecretReference {
        name: format!("{name}-conn"),
        namespace: None,
    });
    place(
        KubernetesCluster::new(
            name,
            KubernetesClusterSpec {
                resource,
                region: "us-west-2".to_string(),
                role_arn: Some("arn:aws:iam::000000000000:role/eks-master".to_string()),
                vpc_id: Some("vpc-1".to_string()),
                subnet_ids: vec!["subnet-1".to_string(), "subnet-2".to_string()],
                security_group_ids: vec!["sg-1".to_string()],
                cluster_version: None,
                worker_nodes: WorkerNodesSpec {
                    instance_type: "m5.large".to_string(),
                    min_size: Some(1),
                    max_size: Some(3),
                    volume_size: None,
                    node_image_id: None,
                    key_name: None,
                    bootstrap_arguments: None,
                    cluster_control_plane_security_group: Some("sg-1".to_string()),
                },
                map_roles: Vec::new(),
                map_users: Vec::new(),
            },
        ),
        name,
    )
}

/// Hands out one shared mock and records every (endpoint, region) it was asked for
pub struct RecordingFactory {
    client: Arc<MockCloudClient>,
    builds: Mutex<Vec<(String, String)>>,
}

impl RecordingFactory {
    /// Factory handing out `client` for every build
    pub fn new(client: Arc<MockCloudClient>) -> Self {
        Self {
            client,
            builds: Mutex::new(Vec::new()),
        }
    }

    /// Every (endpoint, region) asked for, oldest first
    pub fn builds(&self) -> Vec<(String, String)> {
        self.builds.lock().unwrap().clone()
    }
}

impl ClientFactory for RecordingFactory {
    fn build(
        &self,
        endpoint: &str,
        region: &str,
        _credentials: &CloudCredentials,
    ) -> Result<Arc<dyn CloudClientTrait>, CloudError> {
        self.builds
            .lock()
            .unwrap()
            .push((endpoint.to_string(), region.to_string()));
        Ok(self.client.clone())
    }
}

/// The reconcile loop wired to a kind's adapter over the mock gateway
pub struct Harness<K: CloudKind> {
    pub mock: Arc<MockCloudClient>,
    pub store: Arc<InMemoryStore<K>>,
    pub reader: Arc<StaticReferenceReader>,
    pub publisher: Arc<RecordingPublisher>,
    pub reconciler: ManagedReconciler<K>,
}

impl<K: CloudKind> Harness<K> {
    /// Harness over an empty store and gateway, with a "default" provider
    pub fn new() -> Self {
        let mock = Arc::new(MockCloudClient::new());
        let store = Arc::new(InMemoryStore::new());
        let reader = Arc::new(StaticReferenceReader::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let credentials = Arc::new(StaticCredentialsReader::new().with_provider("default", "us-east-1", CREDENTIALS));
        let connecter = CloudConnecter::<K>::new(credentials, Arc::new(RecordingFactory::new(mock.clone())), None);
        let reconciler = ManagedReconciler::new(
            store.clone(),
            Arc::new(connecter),
            ReferenceResolver::new(reader.clone()),
            publisher.clone(),
            RequeuePolicy::default(),
        );
        Self {
            mock,
            store,
            reader,
            publisher,
            reconciler,
        }
    }

    /// Store the resource and return its key
    pub fn apply(&self, resource: K) -> ObjectKey {
        let key = key_of(&resource);
        self.store.insert(resource);
        key
    }

    /// Stored copy of the resource; panics if it is gone
    pub fn stored(&self, key: &ObjectKey) -> K {
        self.store.object(key).unwrap()
    }
}

/// Ready condition of a resource
pub fn ready<K: Managed>(resource: &K) -> Option<Condition> {
    resource.conditions().and_then(|c| c.get(ConditionType::Ready)).cloned()
}
