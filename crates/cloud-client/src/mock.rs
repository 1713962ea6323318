//! Mock CloudClient for unit testing
//!
//! Stores provider objects in memory, records every call and lets tests inject
//! an error for the next invocation of any operation.

use crate::cloud_trait::{ComputeClientTrait, IdentityClientTrait, NetworkClientTrait};
use crate::error::CloudError;
use crate::models::*;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Mock CloudClient for testing
#[derive(Clone, Default)]
pub struct MockCloudClient {
    vpcs: Arc<Mutex<HashMap<String, VpcInfo>>>,
    subnets: Arc<Mutex<HashMap<String, SubnetInfo>>>,
    internet_gateways: Arc<Mutex<HashMap<String, InternetGatewayInfo>>>,
    security_groups: Arc<Mutex<HashMap<String, SecurityGroupInfo>>>,
    roles: Arc<Mutex<HashMap<String, RoleInfo>>>,
    attachments: Arc<Mutex<HashMap<String, BTreeSet<String>>>>,
    clusters: Arc<Mutex<HashMap<String, ClusterInfo>>>,
    worker_pools: Arc<Mutex<HashMap<String, WorkerPoolInfo>>>,
    auth_configs: Arc<Mutex<HashMap<String, AuthConfig>>>,
    // Errors returned by the next call of an operation, keyed by operation name
    failures: Arc<Mutex<HashMap<String, VecDeque<CloudError>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl std::fmt::Debug for MockCloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockCloudClient").finish_non_exhaustive()
    }
}

impl MockCloudClient {
    /// Create a new, empty mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `operation` (e.g. "delete_cluster") fail with `error`
    pub fn fail_next(&self, operation: &str, error: CloudError) {
        self.failures
            .lock()
            .unwrap()
            .entry(operation.to_string())
            .or_default()
            .push_back(error);
    }

    /// Every call made so far, formatted as `operation:arg[:arg]`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls of a single operation
    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{operation}:");
        self.calls()
            .into_iter()
            .filter(|c| c == operation || c.starts_with(&prefix))
            .collect()
    }

    /// Forget recorded calls, keeping provider state
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, operation: &str, args: &[&str]) -> Result<(), CloudError> {
        let mut entry = operation.to_string();
        for arg in args {
            entry.push(':');
            entry.push_str(arg);
        }
        self.calls.lock().unwrap().push(entry);
        match self.failures.lock().unwrap().get_mut(operation).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn new_id(prefix: &str) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("{prefix}-{}", &id[..17])
    }

    // Test setup helpers

    /// Seed a VPC (bypasses call recording)
    pub fn add_vpc(&self, vpc: VpcInfo) {
        self.vpcs.lock().unwrap().insert(vpc.vpc_id.clone(), vpc);
    }

    /// Seed a role (bypasses call recording)
    pub fn add_role(&self, role: RoleInfo) {
        self.roles.lock().unwrap().insert(role.role_name.clone(), role);
    }

    /// Seed a role with attached policies (bypasses call recording)
    pub fn seed_attachments(&self, role_name: &str, policy_arns: &[&str]) {
        self.attachments
            .lock()
            .unwrap()
            .insert(role_name.to_string(), policy_arns.iter().map(|s| s.to_string()).collect());
    }

    /// Policies currently attached to a role
    pub fn attached(&self, role_name: &str) -> BTreeSet<String> {
        self.attachments.lock().unwrap().get(role_name).cloned().unwrap_or_default()
    }

    /// Seed a cluster (bypasses call recording)
    pub fn add_cluster(&self, cluster: ClusterInfo) {
        self.clusters.lock().unwrap().insert(cluster.name.clone(), cluster);
    }

    /// Current provider view of a cluster
    pub fn cluster(&self, name: &str) -> Option<ClusterInfo> {
        self.clusters.lock().unwrap().get(name).cloned()
    }

    /// Move a cluster to a new state; becoming active assigns an endpoint and CA
    pub fn set_cluster_state(&self, name: &str, state: ClusterState) {
        if let Some(cluster) = self.clusters.lock().unwrap().get_mut(name) {
            cluster.state = state;
            if state == ClusterState::Active {
                cluster.endpoint.get_or_insert_with(|| format!("https://{name}.k8s.example.com"));
                // base64("test-ca-data")
                cluster.certificate_authority.get_or_insert_with(|| "dGVzdC1jYS1kYXRh".to_string());
            }
        }
    }

    /// Current provider view of a worker pool
    pub fn worker_pool(&self, name: &str) -> Option<WorkerPoolInfo> {
        self.worker_pools.lock().unwrap().get(name).cloned()
    }

    /// Move a worker pool to a new state; completion assigns the node role
    pub fn set_worker_pool_state(&self, name: &str, state: WorkerPoolState) {
        if let Some(pool) = self.worker_pools.lock().unwrap().get_mut(name) {
            pool.state = state;
            if state.is_complete() {
                pool.node_instance_role_arn
                    .get_or_insert_with(|| format!("arn:aws:iam::000000000000:role/{name}-node"));
            }
        }
    }

    /// Auth mapping last written for a cluster
    pub fn auth_config(&self, cluster_name: &str) -> Option<AuthConfig> {
        self.auth_configs.lock().unwrap().get(cluster_name).cloned()
    }

    /// Number of VPCs the provider holds
    pub fn vpc_count(&self) -> usize {
        self.vpcs.lock().unwrap().len()
    }

    /// Number of subnets the provider holds
    pub fn subnet_count(&self) -> usize {
        self.subnets.lock().unwrap().len()
    }

    /// Current provider view of an internet gateway
    pub fn internet_gateway(&self, gateway_id: &str) -> Option<InternetGatewayInfo> {
        self.internet_gateways.lock().unwrap().get(gateway_id).cloned()
    }

    /// Number of internet gateways the provider holds
    pub fn internet_gateway_count(&self) -> usize {
        self.internet_gateways.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl NetworkClientTrait for MockCloudClient {
    async fn get_vpc(&self, vpc_id: &str) -> Result<VpcInfo, CloudError> {
        self.record("get_vpc", &[vpc_id])?;
        self.vpcs
            .lock()
            .unwrap()
            .get(vpc_id)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("vpc {vpc_id}")))
    }

    async fn find_vpc(&self, client_token: &str) -> Result<Option<VpcInfo>, CloudError> {
        self.record("find_vpc", &[client_token])?;
        Ok(self
            .vpcs
            .lock()
            .unwrap()
            .values()
            .find(|v| v.client_token.as_deref() == Some(client_token))
            .cloned())
    }

    async fn create_vpc(&self, request: &CreateVpcRequest) -> Result<VpcInfo, CloudError> {
        self.record("create_vpc", &[&request.cidr_block])?;
        let mut vpcs = self.vpcs.lock().unwrap();
        if vpcs.values().any(|v| v.client_token.as_ref() == Some(&request.client_token)) {
            return Err(CloudError::AlreadyExists(format!("vpc with token {}", request.client_token)));
        }
        let vpc = VpcInfo {
            vpc_id: Self::new_id("vpc"),
            cidr_block: request.cidr_block.clone(),
            state: "available".to_string(),
            enable_dns_support: request.enable_dns_support,
            client_token: Some(request.client_token.clone()),
        };
        vpcs.insert(vpc.vpc_id.clone(), vpc.clone());
        Ok(vpc)
    }

    async fn set_vpc_dns_support(&self, vpc_id: &str, enabled: bool) -> Result<(), CloudError> {
        self.record("set_vpc_dns_support", &[vpc_id, &enabled.to_string()])?;
        match self.vpcs.lock().unwrap().get_mut(vpc_id) {
            Some(vpc) => {
                vpc.enable_dns_support = enabled;
                Ok(())
            }
            None => Err(CloudError::NotFound(format!("vpc {vpc_id}"))),
        }
    }

    async fn delete_vpc(&self, vpc_id: &str) -> Result<(), CloudError> {
        self.record("delete_vpc", &[vpc_id])?;
        self.vpcs
            .lock()
            .unwrap()
            .remove(vpc_id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("vpc {vpc_id}")))
    }

    async fn get_subnet(&self, subnet_id: &str) -> Result<SubnetInfo, CloudError> {
        self.record("get_subnet", &[subnet_id])?;
        self.subnets
            .lock()
            .unwrap()
            .get(subnet_id)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("subnet {subnet_id}")))
    }

    async fn find_subnet(&self, client_token: &str) -> Result<Option<SubnetInfo>, CloudError> {
        self.record("find_subnet", &[client_token])?;
        Ok(self
            .subnets
            .lock()
            .unwrap()
            .values()
            .find(|s| s.client_token.as_deref() == Some(client_token))
            .cloned())
    }

    async fn create_subnet(&self, request: &CreateSubnetRequest) -> Result<SubnetInfo, CloudError> {
        self.record("create_subnet", &[&request.vpc_id, &request.cidr_block])?;
        if !self.vpcs.lock().unwrap().contains_key(&request.vpc_id) {
            return Err(CloudError::InvalidRequest(format!("vpc {} does not exist", request.vpc_id)));
        }
        let mut subnets = self.subnets.lock().unwrap();
        if subnets.values().any(|s| s.client_token.as_ref() == Some(&request.client_token)) {
            return Err(CloudError::AlreadyExists(format!("subnet with token {}", request.client_token)));
        }
        let subnet = SubnetInfo {
            subnet_id: Self::new_id("subnet"),
            vpc_id: request.vpc_id.clone(),
            cidr_block: request.cidr_block.clone(),
            availability_zone: request.availability_zone.clone(),
            state: "available".to_string(),
            client_token: Some(request.client_token.clone()),
        };
        subnets.insert(subnet.subnet_id.clone(), subnet.clone());
        Ok(subnet)
    }

    async fn delete_subnet(&self, subnet_id: &str) -> Result<(), CloudError> {
        self.record("delete_subnet", &[subnet_id])?;
        self.subnets
            .lock()
            .unwrap()
            .remove(subnet_id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("subnet {subnet_id}")))
    }

    async fn get_security_group(&self, group_id: &str) -> Result<SecurityGroupInfo, CloudError> {
        self.record("get_security_group", &[group_id])?;
        self.security_groups
            .lock()
            .unwrap()
            .get(group_id)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("security group {group_id}")))
    }

    async fn find_security_group(&self, vpc_id: Option<&str>, group_name: &str) -> Result<Option<SecurityGroupInfo>, CloudError> {
        self.record("find_security_group", &[vpc_id.unwrap_or(""), group_name])?;
        Ok(self
            .security_groups
            .lock()
            .unwrap()
            .values()
            .find(|g| g.group_name == group_name && g.vpc_id.as_deref() == vpc_id)
            .cloned())
    }

    async fn create_security_group(&self, request: &CreateSecurityGroupRequest) -> Result<SecurityGroupInfo, CloudError> {
        self.record("create_security_group", &[&request.group_name])?;
        let mut groups = self.security_groups.lock().unwrap();
        if groups
            .values()
            .any(|g| g.group_name == request.group_name && g.vpc_id == request.vpc_id)
        {
            return Err(CloudError::AlreadyExists(format!("security group {}", request.group_name)));
        }
        let group = SecurityGroupInfo {
            group_id: Self::new_id("sg"),
            group_name: request.group_name.clone(),
            description: request.description.clone(),
            vpc_id: request.vpc_id.clone(),
        };
        groups.insert(group.group_id.clone(), group.clone());
        Ok(group)
    }

    async fn delete_security_group(&self, group_id: &str) -> Result<(), CloudError> {
        self.record("delete_security_group", &[group_id])?;
        self.security_groups
            .lock()
            .unwrap()
            .remove(group_id)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("security group {group_id}")))
    }

    async fn get_internet_gateway(&self, gateway_id: &str) -> Result<InternetGatewayInfo, CloudError> {
        self.record("get_internet_gateway", &[gateway_id])?;
        self.internet_gateway(gateway_id)
            .ok_or_else(|| CloudError::NotFound(format!("internet gateway {gateway_id}")))
    }

    async fn find_internet_gateway(&self, client_token: &str) -> Result<Option<InternetGatewayInfo>, CloudError> {
        self.record("find_internet_gateway", &[client_token])?;
        Ok(self
            .internet_gateways
            .lock()
            .unwrap()
            .values()
            .find(|g| g.client_token.as_deref() == Some(client_token))
            .cloned())
    }

    async fn create_internet_gateway(&self, request: &CreateInternetGatewayRequest) -> Result<InternetGatewayInfo, CloudError> {
        self.record("create_internet_gateway", &[&request.client_token])?;
        let mut gateways = self.internet_gateways.lock().unwrap();
        if gateways.values().any(|g| g.client_token.as_ref() == Some(&request.client_token)) {
            return Err(CloudError::AlreadyExists(format!("internet gateway with token {}", request.client_token)));
        }
        let gateway = InternetGatewayInfo {
            internet_gateway_id: Self::new_id("igw"),
            attached_vpc_id: None,
            client_token: Some(request.client_token.clone()),
        };
        gateways.insert(gateway.internet_gateway_id.clone(), gateway.clone());
        Ok(gateway)
    }

    async fn attach_internet_gateway(&self, gateway_id: &str, vpc_id: &str) -> Result<(), CloudError> {
        self.record("attach_internet_gateway", &[gateway_id, vpc_id])?;
        if !self.vpcs.lock().unwrap().contains_key(vpc_id) {
            return Err(CloudError::InvalidRequest(format!("vpc {vpc_id} does not exist")));
        }
        let mut gateways = self.internet_gateways.lock().unwrap();
        let gateway = gateways
            .get_mut(gateway_id)
            .ok_or_else(|| CloudError::NotFound(format!("internet gateway {gateway_id}")))?;
        match gateway.attached_vpc_id.as_deref() {
            Some(attached) if attached != vpc_id => Err(CloudError::InvalidRequest(format!(
                "internet gateway {gateway_id} is attached to {attached}"
            ))),
            _ => {
                gateway.attached_vpc_id = Some(vpc_id.to_string());
                Ok(())
            }
        }
    }

    async fn detach_internet_gateway(&self, gateway_id: &str, vpc_id: &str) -> Result<(), CloudError> {
        self.record("detach_internet_gateway", &[gateway_id, vpc_id])?;
        let mut gateways = self.internet_gateways.lock().unwrap();
        match gateways.get_mut(gateway_id) {
            Some(gateway) if gateway.attached_vpc_id.as_deref() == Some(vpc_id) => {
                gateway.attached_vpc_id = None;
                Ok(())
            }
            _ => Err(CloudError::NotFound(format!("attachment {gateway_id}/{vpc_id}"))),
        }
    }

    async fn delete_internet_gateway(&self, gateway_id: &str) -> Result<(), CloudError> {
        self.record("delete_internet_gateway", &[gateway_id])?;
        let mut gateways = self.internet_gateways.lock().unwrap();
        match gateways.get(gateway_id) {
            None => Err(CloudError::NotFound(format!("internet gateway {gateway_id}"))),
            Some(gateway) if gateway.attached_vpc_id.is_some() => Err(CloudError::InvalidRequest(format!(
                "internet gateway {gateway_id} is still attached"
            ))),
            Some(_) => {
                gateways.remove(gateway_id);
                Ok(())
            }
        }
    }
}

#[async_trait::async_trait]
impl IdentityClientTrait for MockCloudClient {
    async fn get_role(&self, role_name: &str) -> Result<RoleInfo, CloudError> {
        self.record("get_role", &[role_name])?;
        self.roles
            .lock()
            .unwrap()
            .get(role_name)
            .cloned()
            .ok_or_else(|| CloudError::NotFound(format!("role {role_name}")))
    }

    async fn create_role(&self, request: &CreateRoleRequest) -> Result<RoleInfo, CloudError> {
        self.record("create_role", &[&request.role_name])?;
        let mut roles = self.roles.lock().unwrap();
        if roles.contains_key(&request.role_name) {
            return Err(CloudError::AlreadyExists(format!("role {}", request.role_name)));
        }
        let role = RoleInfo {
            role_name: request.role_name.clone(),
            role_id: Self::new_id("AROA"),
            arn: format!("arn:aws:iam::000000000000:role/{}", request.role_name),
            assume_role_policy_document: request.assume_role_policy_document.clone(),
            description: request.description.clone(),
        };
        roles.insert(role.role_name.clone(), role.clone());
        Ok(role)
    }

    async fn update_role(&self, role_name: &str, request: &UpdateRoleRequest) -> Result<RoleInfo, CloudError> {
        self.record("update_role", &[role_name])?;
        match self.roles.lock().unwrap().get_mut(role_name) {
            Some(role) => {
                role.assume_role_policy_document = request.assume_role_policy_document.clone();
                role.description = request.description.clone();
                Ok(role.clone())
            }
            None => Err(CloudError::NotFound(format!("role {role_name}"))),
        }
    }

    async fn delete_role(&self, role_name: &str) -> Result<(), CloudError> {
        self.record("delete_role", &[role_name])?;
        self.attachments.lock().unwrap().remove(role_name);
        self.roles
            .lock()
            .unwrap()
            .remove(role_name)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("role {role_name}")))
    }

    async fn list_attached_role_policies(&self, role_name: &str) -> Result<Vec<AttachedPolicy>, CloudError> {
        self.record("list_attached_role_policies", &[role_name])?;
        Ok(self
            .attached(role_name)
            .into_iter()
            .map(|policy_arn| AttachedPolicy {
                policy_arn,
                policy_name: None,
            })
            .collect())
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), CloudError> {
        self.record("attach_role_policy", &[role_name, policy_arn])?;
        self.attachments
            .lock()
            .unwrap()
            .entry(role_name.to_string())
            .or_default()
            .insert(policy_arn.to_string());
        Ok(())
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), CloudError> {
        self.record("detach_role_policy", &[role_name, policy_arn])?;
        let removed = self
            .attachments
            .lock()
            .unwrap()
            .get_mut(role_name)
            .map(|set| set.remove(policy_arn))
            .unwrap_or(false);
        if removed {
            Ok(())
        } else {
            Err(CloudError::NotFound(format!("policy {policy_arn} is not attached to {role_name}")))
        }
    }
}

#[async_trait::async_trait]
impl ComputeClientTrait for MockCloudClient {
    async fn get_cluster(&self, name: &str) -> Result<ClusterInfo, CloudError> {
        self.record("get_cluster", &[name])?;
        self.cluster(name).ok_or_else(|| CloudError::NotFound(format!("cluster {name}")))
    }

    async fn create_cluster(&self, request: &CreateClusterRequest) -> Result<ClusterInfo, CloudError> {
        self.record("create_cluster", &[&request.name])?;
        let mut clusters = self.clusters.lock().unwrap();
        if clusters.contains_key(&request.name) {
            return Err(CloudError::AlreadyExists(format!("cluster {}", request.name)));
        }
        let cluster = ClusterInfo {
            name: request.name.clone(),
            state: ClusterState::Creating,
            version: request.version.clone().or_else(|| Some("1.30".to_string())),
            endpoint: None,
            certificate_authority: None,
        };
        clusters.insert(cluster.name.clone(), cluster.clone());
        Ok(cluster)
    }

    async fn delete_cluster(&self, name: &str) -> Result<(), CloudError> {
        self.record("delete_cluster", &[name])?;
        self.clusters
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("cluster {name}")))
    }

    async fn get_worker_pool(&self, name: &str) -> Result<WorkerPoolInfo, CloudError> {
        self.record("get_worker_pool", &[name])?;
        self.worker_pool(name).ok_or_else(|| CloudError::NotFound(format!("worker pool {name}")))
    }

    async fn create_worker_pool(&self, request: &CreateWorkerPoolRequest) -> Result<WorkerPoolInfo, CloudError> {
        self.record("create_worker_pool", &[&request.name])?;
        let mut pools = self.worker_pools.lock().unwrap();
        if pools.contains_key(&request.name) {
            return Err(CloudError::AlreadyExists(format!("worker pool {}", request.name)));
        }
        let pool = WorkerPoolInfo {
            id: Self::new_id("pool"),
            name: request.name.clone(),
            state: WorkerPoolState::CreateInProgress,
            status_reason: None,
            node_instance_role_arn: None,
        };
        pools.insert(pool.name.clone(), pool.clone());
        Ok(pool)
    }

    async fn delete_worker_pool(&self, name: &str) -> Result<(), CloudError> {
        self.record("delete_worker_pool", &[name])?;
        self.worker_pools
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CloudError::NotFound(format!("worker pool {name}")))
    }

    async fn put_auth_config(&self, cluster_name: &str, config: &AuthConfig) -> Result<(), CloudError> {
        self.record("put_auth_config", &[cluster_name])?;
        self.auth_configs
            .lock()
            .unwrap()
            .insert(cluster_name.to_string(), config.clone());
        Ok(())
    }

    async fn connection_token(&self, cluster_name: &str) -> Result<ClusterToken, CloudError> {
        self.record("connection_token", &[cluster_name])?;
        if self.cluster(cluster_name).is_none() {
            return Err(CloudError::NotFound(format!("cluster {cluster_name}")));
        }
        Ok(ClusterToken {
            token: format!("token-{cluster_name}"),
            expiration: None,
        })
    }
}
