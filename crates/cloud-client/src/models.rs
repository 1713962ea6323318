//! Cloud gateway models
//!
//! Request and response bodies of the provider REST gateway. Field names are
//! camelCase on the wire.

use serde::{Deserialize, Serialize};

// Network

/// VPC as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VpcInfo {
    pub vpc_id: String,
    pub cidr_block: String,
    pub state: String, // "pending" | "available"
    #[serde(default)]
    pub enable_dns_support: bool,
    /// Idempotency token the VPC was created with
    #[serde(default)]
    pub client_token: Option<String>,
}

/// VPC create parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateVpcRequest {
    pub cidr_block: String,
    pub enable_dns_support: bool,
    /// Repeating a create with the same token never yields a second VPC
    pub client_token: String,
}

/// Subnet as reported by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetInfo {
    pub subnet_id: String,
    pub vpc_id: String,
    pub cidr_block: String,
    pub availability_zone: String,
    pub state: String,
    #[serde(default)]
    pub client_token: Option<String>,
}

/// Subnet create parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubnetRequest {
    pub vpc_id: String,
    pub cidr_block: String,
    pub availability_zone: String,
    pub client_token: String,
}

/// Internet gateway and the VPC it is attached to, if any
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InternetGatewayInfo {
    pub internet_gateway_id: String,
    #[serde(default)]
    pub attached_vpc_id: Option<String>,
    #[serde(default)]
    pub client_token: Option<String>,
}

/// Internet gateway create parameters; gateways are created detached
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateInternetGatewayRequest {
    pub client_token: String,
}

/// Security group as reported by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupInfo {
    pub group_id: String,
    pub group_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
}

/// Security group create parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateSecurityGroupRequest {
    pub group_name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
}

// Identity

/// IAM role as reported by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoleInfo {
    pub role_name: String,
    pub role_id: String,
    pub arn: String,
    pub assume_role_policy_document: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// IAM role create parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub role_name: String,
    pub assume_role_policy_document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Replacement trust policy and description for an existing role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
    pub assume_role_policy_document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Managed policy attached to a role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachedPolicy {
    pub policy_arn: String,
    #[serde(default)]
    pub policy_name: Option<String>,
}

// Compute

/// Control plane lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterState {
    Creating,
    Active,
    Updating,
    Deleting,
    Failed,
}

/// Kubernetes control plane as reported by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterInfo {
    pub name: String,
    pub state: ClusterState,
    #[serde(default)]
    pub version: Option<String>,
    /// API server URL, empty until the cluster is active
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Base64 encoded certificate authority data
    #[serde(default)]
    pub certificate_authority: Option<String>,
}

/// Control plane create parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterRequest {
    pub name: String,
    pub role_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    pub subnet_ids: Vec<String>,
    pub security_group_ids: Vec<String>,
}

/// Worker pool lifecycle state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerPoolState {
    CreateInProgress,
    CreateComplete,
    CreateFailed,
    RollbackInProgress,
    RollbackComplete,
    DeleteInProgress,
}

impl WorkerPoolState {
    /// Pool finished creating
    pub fn is_complete(&self) -> bool {
        matches!(self, WorkerPoolState::CreateComplete)
    }

    /// Pool can no longer reach CreateComplete on its own
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            WorkerPoolState::CreateFailed
                | WorkerPoolState::RollbackInProgress
                | WorkerPoolState::RollbackComplete
                | WorkerPoolState::DeleteInProgress
        )
    }
}

/// Worker node pool as reported by the gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPoolInfo {
    pub id: String,
    pub name: String,
    pub state: WorkerPoolState,
    #[serde(default)]
    pub status_reason: Option<String>,
    /// Role assumed by the worker instances, known once creation completes
    #[serde(default)]
    pub node_instance_role_arn: Option<String>,
}

/// Worker pool create parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkerPoolRequest {
    pub name: String,
    pub cluster_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_control_plane_security_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    pub subnet_ids: Vec<String>,
    pub instance_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_arguments: Option<String>,
}

/// Auth mapping pushed to a cluster (YAML documents keyed like the aws-auth ConfigMap)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    pub map_roles: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_users: Option<String>,
}

/// Short-lived bearer token for a cluster API server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterToken {
    pub token: String,
    #[serde(default)]
    pub expiration: Option<chrono::DateTime<chrono::Utc>>,
}
