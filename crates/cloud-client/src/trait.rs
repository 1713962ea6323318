//! Cloud client traits for mocking
//!
//! The concrete [`CloudClient`](crate::CloudClient) implements every trait here; tests use
//! [`MockCloudClient`](crate::MockCloudClient) behind the `test-util` feature.

use crate::error::CloudError;
use crate::models::*;

/// VPC, subnet, security group and internet gateway operations
#[async_trait::async_trait]
pub trait NetworkClientTrait: Send + Sync {
    async fn get_vpc(&self, vpc_id: &str) -> Result<VpcInfo, CloudError>;
    /// Look up the VPC created with `client_token`
    async fn find_vpc(&self, client_token: &str) -> Result<Option<VpcInfo>, CloudError>;
    async fn create_vpc(&self, request: &CreateVpcRequest) -> Result<VpcInfo, CloudError>;
    async fn set_vpc_dns_support(&self, vpc_id: &str, enabled: bool) -> Result<(), CloudError>;
    async fn delete_vpc(&self, vpc_id: &str) -> Result<(), CloudError>;

    async fn get_subnet(&self, subnet_id: &str) -> Result<SubnetInfo, CloudError>;
    async fn find_subnet(&self, client_token: &str) -> Result<Option<SubnetInfo>, CloudError>;
    async fn create_subnet(&self, request: &CreateSubnetRequest) -> Result<SubnetInfo, CloudError>;
    async fn delete_subnet(&self, subnet_id: &str) -> Result<(), CloudError>;

    async fn get_security_group(&self, group_id: &str) -> Result<SecurityGroupInfo, CloudError>;
    /// Look up a group by name within a VPC (or the default VPC)
    async fn find_security_group(&self, vpc_id: Option<&str>, group_name: &str) -> Result<Option<SecurityGroupInfo>, CloudError>;
    async fn create_security_group(&self, request: &CreateSecurityGroupRequest) -> Result<SecurityGroupInfo, CloudError>;
    async fn delete_security_group(&self, group_id: &str) -> Result<(), CloudError>;

    async fn get_internet_gateway(&self, gateway_id: &str) -> Result<InternetGatewayInfo, CloudError>;
    async fn find_internet_gateway(&self, client_token: &str) -> Result<Option<InternetGatewayInfo>, CloudError>;
    async fn create_internet_gateway(&self, request: &CreateInternetGatewayRequest) -> Result<InternetGatewayInfo, CloudError>;
    async fn attach_internet_gateway(&self, gateway_id: &str, vpc_id: &str) -> Result<(), CloudError>;
    /// Fails with NotFound when the gateway is not attached to `vpc_id`
    async fn detach_internet_gateway(&self, gateway_id: &str, vpc_id: &str) -> Result<(), CloudError>;
    async fn delete_internet_gateway(&self, gateway_id: &str) -> Result<(), CloudError>;
}

/// Role and policy attachment operations
#[async_trait::async_trait]
pub trait IdentityClientTrait: Send + Sync {
    async fn get_role(&self, role_name: &str) -> Result<RoleInfo, CloudError>;
    async fn create_role(&self, request: &CreateRoleRequest) -> Result<RoleInfo, CloudError>;
    async fn update_role(&self, role_name: &str, request: &UpdateRoleRequest) -> Result<RoleInfo, CloudError>;
    async fn delete_role(&self, role_name: &str) -> Result<(), CloudError>;

    async fn list_attached_role_policies(&self, role_name: &str) -> Result<Vec<AttachedPolicy>, CloudError>;
    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), CloudError>;
    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), CloudError>;
}

/// Managed Kubernetes operations
#[async_trait::async_trait]
pub trait ComputeClientTrait: Send + Sync {
    async fn get_cluster(&self, name: &str) -> Result<ClusterInfo, CloudError>;
    async fn create_cluster(&self, request: &CreateClusterRequest) -> Result<ClusterInfo, CloudError>;
    async fn delete_cluster(&self, name: &str) -> Result<(), CloudError>;

    async fn get_worker_pool(&self, name: &str) -> Result<WorkerPoolInfo, CloudError>;
    async fn create_worker_pool(&self, request: &CreateWorkerPoolRequest) -> Result<WorkerPoolInfo, CloudError>;
    async fn delete_worker_pool(&self, name: &str) -> Result<(), CloudError>;

    /// Replace the cluster's auth mapping
    async fn put_auth_config(&self, cluster_name: &str, config: &AuthConfig) -> Result<(), CloudError>;
    /// Short-lived bearer token for the cluster's API server
    async fn connection_token(&self, cluster_name: &str) -> Result<ClusterToken, CloudError>;
}

/// Everything a controller needs from the provider
pub trait CloudClientTrait: NetworkClientTrait + IdentityClientTrait + ComputeClientTrait {}

impl<T> CloudClientTrait for T where T: NetworkClientTrait + IdentityClientTrait + ComputeClientTrait {}
