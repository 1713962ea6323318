//! KubernetesCluster CRD
//!
//! A managed Kubernetes control plane plus one worker pool. Provisioning is a
//! sequence of stages persisted in `status.stage`, so a restarted controller
//! resumes from the last recorded stage instead of re-issuing earlier steps.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::ResourceSpec;
use crate::conditions::Conditions;

/// Worker pool settings
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerNodesSpec {
    /// Instance type for worker nodes (e.g., "m5.large")
    pub instance_type: String,
    
    /// Minimum pool size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<i32>,
    
    /// Maximum pool size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<i32>,
    
    /// Root volume size in GiB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<i32>,
    
    /// Node image override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_image_id: Option<String>,
    
    /// SSH key pair name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    
    /// Extra arguments passed to the node bootstrap script
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_arguments: Option<String>,
    
    /// Security group of the control plane that workers must be able to reach
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_control_plane_security_group: Option<String>,
}

/// Role mapped into the cluster's auth configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MapRole {
    pub role_arn: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

/// User mapped into the cluster's auth configuration
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MapUser {
    pub user_arn: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

/// KubernetesCluster CRD
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cloudops.microscaler.io",
    version = "v1alpha1",
    kind = "KubernetesCluster",
    namespaced,
    status = "KubernetesClusterStatus",
    shortname = "kc",
    printcolumn = r#"{"name":"Stage","type":"string","jsonPath":".status.stage"}"#,
    printcolumn = r#"{"name":"Cluster","type":"string","jsonPath":".status.clusterName"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.endpoint"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesClusterSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    
    /// Region the cluster is created in
    pub region: String,
    
    /// Role the control plane assumes (usually resolved from an IamRole reference)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    
    /// VPC the cluster is placed in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    
    /// Subnets for control plane and workers
    #[serde(default)]
    pub subnet_ids: Vec<String>,
    
    /// Security groups attached to the control plane
    #[serde(default)]
    pub security_group_ids: Vec<String>,
    
    /// Kubernetes version (provider default when empty)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_version: Option<String>,
    
    /// Worker pool settings
    pub worker_nodes: WorkerNodesSpec,
    
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub map_roles: Vec<MapRole>,
    
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub map_users: Vec<MapUser>,
}

/// Provisioning stage of a KubernetesCluster
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ClusterStage {
    /// Nothing requested yet
    #[default]
    Pending,
    /// Control plane requested, waiting for it to become active
    ClusterCreating,
    /// Worker pool requested, waiting for it to complete
    WorkerPoolCreating,
    /// Registering workers with the control plane
    Configuring,
    /// Fully provisioned
    Available,
    /// Provider reported an unrecoverable failure
    Failed,
}

impl std::fmt::Display for ClusterStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ClusterStage::Pending => "Pending",
            ClusterStage::ClusterCreating => "ClusterCreating",
            ClusterStage::WorkerPoolCreating => "WorkerPoolCreating",
            ClusterStage::Configuring => "Configuring",
            ClusterStage::Available => "Available",
            ClusterStage::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

/// Status of KubernetesCluster
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesClusterStatus {
    #[serde(default)]
    pub stage: ClusterStage,
    
    /// Provider-side cluster name, set once creation has been requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_version: Option<String>,
    
    /// API server endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    
    /// Worker pool identifier, set once pool creation has been requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_pool_id: Option<String>,
    
    /// Role ARN assumed by worker nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_role_arn: Option<String>,

    /// `metadata.generation` at the time the cluster entered `Failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_generation: Option<i64>,
    
    #[serde(default)]
    pub conditions: Conditions,
}

impl KubernetesCluster {
    /// Deterministic provider-side cluster name
    pub fn cluster_name_for_uid(uid: &str) -> String {
        format!("cluster-{uid}")
    }

    /// Deterministic worker pool name for a cluster
    pub fn worker_pool_name(cluster_name: &str) -> String {
        format!("{cluster_name}-workers")
    }

    /// Current stage, `Pending` before any status has been written
    pub fn stage(&self) -> ClusterStage {
        self.status.as_ref().map(|s| s.stage).unwrap_or_default()
    }

    /// Failed, and the spec has been edited since the failure was recorded
    pub fn retry_after_failure(&self) -> bool {
        let Some(status) = self.status.as_ref() else {
            return false;
        };
        status.stage == ClusterStage::Failed && self.metadata.generation > status.failed_generation
    }

    /// Recorded cluster name, if creation was requested
    pub fn recorded_cluster_name(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|s| s.cluster_name.as_deref())
            .filter(|n| !n.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_deterministic() {
        let name = KubernetesCluster::cluster_name_for_uid("1234-abcd");
        assert_eq!(name, "cluster-1234-abcd");
        assert_eq!(KubernetesCluster::worker_pool_name(&name), "cluster-1234-abcd-workers");
    }

    #[test]
    fn test_failure_is_retried_only_after_spec_edit() {
        let spec: KubernetesClusterSpec = serde_json::from_value(serde_json::json!({
            "providerRef": {"name": "default"},
            "region": "us-west-2",
            "workerNodes": {"instanceType": "m5.large"}
        }))
        .unwrap();
        let mut cluster = KubernetesCluster::new("prod", spec);
        cluster.metadata.generation = Some(3);
        cluster.status = Some(KubernetesClusterStatus {
            stage: ClusterStage::Failed,
            failed_generation: Some(3),
            ..Default::default()
        });
        assert!(!cluster.retry_after_failure());

        cluster.metadata.generation = Some(4);
        assert!(cluster.retry_after_failure());

        cluster.status.as_mut().unwrap().stage = ClusterStage::WorkerPoolCreating;
        assert!(!cluster.retry_after_failure());
    }

    #[test]
    fn test_stage_serializes_pascal_case() {
        let v = serde_json::to_value(ClusterStage::WorkerPoolCreating).unwrap();
        assert_eq!(v, "WorkerPoolCreating");
        let s: KubernetesClusterStatus = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(s.stage, ClusterStage::Pending);
    }
}
