//! KubernetesCluster adapter
//!
//! Provisioning runs through the stages recorded in `status.stage`:
//!
//! ```text
//! Pending -> ClusterCreating -> WorkerPoolCreating -> Configuring -> Available
//!                  \                   \
//!                   +-------------------+--> Failed
//! ```
//!
//! `create` requests the control plane. Every later step happens in `update`, which
//! runs the handler of the recorded stage and keeps going while a handler completes
//! its stage within the pass. Cluster and pool names are derived from the resource
//! uid, so a repeated request for either reports "already exists" and is adopted.
//!
//! `Failed` is terminal until the spec is edited: the failure records the object's
//! generation, and a later generation sends the cluster back to `ClusterCreating`
//! to be re-derived from what the provider reports.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cloud_client::{
    AuthConfig, CloudClientTrait, ClusterInfo, ClusterState, CreateClusterRequest, CreateWorkerPoolRequest,
};
use crds::{ClusterStage, Condition, KubernetesCluster, KubernetesClusterStatus, Managed};
use kube::ResourceExt;
use managed_runtime::{
    ConnectionDetails, ExternalClient, ExternalCreation, ExternalError, ExternalObservation, ExternalUpdate,
    PassContext,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{CloudKind, classify, found, required};

/// Connection secret key holding the API server URL
pub const ENDPOINT_KEY: &str = "endpoint";
/// Connection secret key holding the decoded certificate authority
pub const CLUSTER_CA_KEY: &str = "clusterCA";
/// Connection secret key holding the bearer token
pub const TOKEN_KEY: &str = "token";

const NODE_USERNAME: &str = "system:node:{{EC2PrivateDNSName}}";
const NODE_GROUPS: [&str; 2] = ["system:bootstrappers", "system:nodes"];

/// Provisions a control plane and its worker pool through the compute gateway
pub struct KubernetesClusterExternal {
    client: Arc<dyn CloudClientTrait>,
}

impl CloudKind for KubernetesCluster {
    fn external(client: Arc<dyn CloudClientTrait>) -> Box<dyn ExternalClient<Self>> {
        Box::new(KubernetesClusterExternal { client })
    }

    fn region(&self) -> Option<&str> {
        Some(self.spec.region.as_str()).filter(|r| !r.is_empty())
    }
}

/// Recorded cluster name, or the deterministic one for this resource
fn cluster_name(cluster: &KubernetesCluster) -> Result<String, ExternalError> {
    if let Some(name) = cluster.recorded_cluster_name() {
        return Ok(name.to_string());
    }
    cluster
        .uid()
        .map(|uid| KubernetesCluster::cluster_name_for_uid(&uid))
        .ok_or_else(|| ExternalError::Terminal("resource has no uid yet".to_string()))
}

fn status_mut(cluster: &mut KubernetesCluster) -> &mut KubernetesClusterStatus {
    cluster.status.get_or_insert_with(KubernetesClusterStatus::default)
}

#[derive(Serialize)]
struct RoleMapping<'a> {
    rolearn: &'a str,
    username: &'a str,
    groups: Vec<&'a str>,
}

#[derive(Serialize)]
struct UserMapping<'a> {
    userarn: &'a str,
    username: &'a str,
    groups: Vec<&'a str>,
}

/// Auth mapping: the spec's roles followed by the worker node role, then the spec's users
pub fn auth_config(cluster: &KubernetesCluster, worker_role_arn: &str) -> Result<AuthConfig, serde_yaml::Error> {
    let mut roles: Vec<RoleMapping<'_>> = cluster
        .spec
        .map_roles
        .iter()
        .map(|r| RoleMapping {
            rolearn: &r.role_arn,
            username: &r.username,
            groups: r.groups.iter().map(String::as_str).collect(),
        })
        .collect();
    roles.push(RoleMapping {
        rolearn: worker_role_arn,
        username: NODE_USERNAME,
        groups: NODE_GROUPS.to_vec(),
    });

    let map_users = if cluster.spec.map_users.is_empty() {
        None
    } else {
        let users: Vec<UserMapping<'_>> = cluster
            .spec
            .map_users
            .iter()
            .map(|u| UserMapping {
                userarn: &u.user_arn,
                username: &u.username,
                groups: u.groups.iter().map(String::as_str).collect(),
            })
            .collect();
        Some(serde_yaml::to_string(&users)?)
    };

    Ok(AuthConfig {
        map_roles: serde_yaml::to_string(&roles)?,
        map_users,
    })
}

impl KubernetesClusterExternal {
    fn fail(cluster: &mut KubernetesCluster, message: String) -> ExternalError {
        warn!("KubernetesCluster {} failed: {}", cluster.name_any(), message);
        let generation = cluster.metadata.generation;
        let status = status_mut(cluster);
        status.stage = ClusterStage::Failed;
        status.failed_generation = generation;
        ExternalError::Terminal(message)
    }

    /// Endpoint, decoded CA and a fresh token of an active cluster
    async fn connection_details(&self, info: &ClusterInfo) -> Result<ConnectionDetails, ExternalError> {
        let token = self.client.connection_token(&info.name).await.map_err(classify)?;
        let ca = STANDARD
            .decode(info.certificate_authority.as_deref().unwrap_or_default())
            .map_err(|e| ExternalError::Transient(format!("cluster {} has invalid CA data: {e}", info.name)))?;

        let mut details = ConnectionDetails::new();
        details.insert(ENDPOINT_KEY.to_string(), info.endpoint.clone().unwrap_or_default().into_bytes());
        details.insert(CLUSTER_CA_KEY.to_string(), ca);
        details.insert(TOKEN_KEY.to_string(), token.token.into_bytes());
        Ok(details)
    }

    /// Wait for the control plane, then request the worker pool
    async fn await_cluster(&self, cluster: &mut KubernetesCluster, name: &str) -> Result<ClusterStage, ExternalError> {
        let info = self.client.get_cluster(name).await.map_err(classify)?;
        match info.state {
            ClusterState::Active => {}
            ClusterState::Creating | ClusterState::Updating => {
                debug!("Cluster {} is {:?}", name, info.state);
                return Ok(ClusterStage::ClusterCreating);
            }
            ClusterState::Failed | ClusterState::Deleting => {
                return Err(Self::fail(cluster, format!("cluster {name} is in state {:?}", info.state)));
            }
        }

        let status = status_mut(cluster);
        status.endpoint = info.endpoint.clone();
        if info.version.is_some() {
            status.cluster_version = info.version.clone();
        }

        let pool_name = KubernetesCluster::worker_pool_name(name);
        let workers = &cluster.spec.worker_nodes;
        let request = CreateWorkerPoolRequest {
            name: pool_name.clone(),
            cluster_name: name.to_string(),
            cluster_control_plane_security_group: workers.cluster_control_plane_security_group.clone(),
            vpc_id: cluster.spec.vpc_id.clone(),
            subnet_ids: cluster.spec.subnet_ids.clone(),
            instance_type: workers.instance_type.clone(),
            min_size: workers.min_size,
            max_size: workers.max_size,
            volume_size: workers.volume_size,
            node_image_id: workers.node_image_id.clone(),
            key_name: workers.key_name.clone(),
            bootstrap_arguments: workers.bootstrap_arguments.clone(),
        };
        let pool = match self.client.create_worker_pool(&request).await {
            Ok(pool) => {
                info!("Requested worker pool {} for cluster {}", pool_name, name);
                pool
            }
            Err(err) if err.is_already_exists() => self.client.get_worker_pool(&pool_name).await.map_err(classify)?,
            Err(err) => return Err(classify(err)),
        };
        status_mut(cluster).worker_pool_id = Some(pool.id);
        Ok(ClusterStage::WorkerPoolCreating)
    }

    /// Wait for the worker pool to complete and learn its node role
    async fn await_worker_pool(&self, cluster: &mut KubernetesCluster, name: &str) -> Result<ClusterStage, ExternalError> {
        let pool_name = KubernetesCluster::worker_pool_name(name);
        let pool = self.client.get_worker_pool(&pool_name).await.map_err(classify)?;
        if pool.state.is_failed() {
            return Err(Self::fail(
                cluster,
                format!(
                    "worker pool {} failed with state {:?} and reason {}",
                    pool_name,
                    pool.state,
                    pool.status_reason.unwrap_or_default()
                ),
            ));
        }
        if !pool.state.is_complete() {
            debug!("Worker pool {} is {:?}", pool_name, pool.state);
            return Ok(ClusterStage::WorkerPoolCreating);
        }
        let Some(role_arn) = pool.node_instance_role_arn.filter(|arn| !arn.is_empty()) else {
            debug!("Worker pool {} has not reported its node role yet", pool_name);
            return Ok(ClusterStage::WorkerPoolCreating);
        };
        status_mut(cluster).worker_role_arn = Some(role_arn);
        Ok(ClusterStage::Configuring)
    }

    /// Register the worker node role with the control plane
    async fn configure(&self, cluster: &mut KubernetesCluster, name: &str) -> Result<ClusterStage, ExternalError> {
        let role_arn = cluster
            .status
            .as_ref()
            .and_then(|s| s.worker_role_arn.clone())
            .ok_or_else(|| ExternalError::Transient("worker role ARN is not recorded".to_string()))?;
        let config = auth_config(cluster, &role_arn)
            .map_err(|e| ExternalError::Terminal(format!("cannot render auth mapping: {e}")))?;
        self.client
            .put_auth_config(name, &config)
            .await
            .map_err(|e| ExternalError::Transient(format!("failed to set auth map on cluster {name}: {e}")))?;
        info!("Registered worker role {} with cluster {}", role_arn, name);
        Ok(ClusterStage::Available)
    }
}

#[async_trait]
impl ExternalClient<KubernetesCluster> for KubernetesClusterExternal {
    async fn observe(
        &self,
        _ctx: &PassContext,
        cluster: &mut KubernetesCluster,
    ) -> Result<ExternalObservation, ExternalError> {
        let Some(name) = cluster.recorded_cluster_name().map(str::to_string) else {
            return Ok(ExternalObservation::absent());
        };
        if cluster.retry_after_failure() {
            info!("Cluster {} was edited after it failed, resuming provisioning", name);
            let status = status_mut(cluster);
            status.stage = ClusterStage::ClusterCreating;
            status.failed_generation = None;
        }
        let stage = cluster.stage();
        if stage == ClusterStage::Failed {
            return Err(ExternalError::Terminal(format!("cluster {name} failed to provision")));
        }
        let Some(info) = found(self.client.get_cluster(&name).await)? else {
            info!("Cluster {} no longer exists", name);
            return Ok(ExternalObservation::absent());
        };
        if info.state == ClusterState::Failed {
            return Err(Self::fail(cluster, format!("cluster {name} is in state {:?}", info.state)));
        }
        if stage != ClusterStage::Available {
            return Ok(ExternalObservation::present(false));
        }

        status_mut(cluster).endpoint = info.endpoint.clone();
        let details = self.connection_details(&info).await?;
        Ok(ExternalObservation::present(true).with_details(details))
    }

    async fn create(&self, ctx: &PassContext, cluster: &mut KubernetesCluster) -> Result<ExternalCreation, ExternalError> {
        let name = cluster_name(cluster)?;
        let request = CreateClusterRequest {
            name: name.clone(),
            role_arn: required(cluster.spec.role_arn.as_deref(), "roleArn")?.to_string(),
            version: cluster.spec.cluster_version.clone(),
            vpc_id: cluster.spec.vpc_id.clone(),
            subnet_ids: cluster.spec.subnet_ids.clone(),
            security_group_ids: cluster.spec.security_group_ids.clone(),
        };
        let info = match self.client.create_cluster(&request).await {
            Ok(info) => {
                info!("Requested cluster {}", name);
                info
            }
            Err(err) if err.is_already_exists() => self.client.get_cluster(&name).await.map_err(classify)?,
            Err(err) => return Err(classify(err)),
        };

        let conditions = std::mem::take(&mut status_mut(cluster).conditions);
        cluster.status = Some(KubernetesClusterStatus {
            stage: ClusterStage::ClusterCreating,
            cluster_name: Some(name),
            cluster_version: info.version,
            conditions,
            ..Default::default()
        });
        cluster.conditions_mut().set(Condition::creating(ctx.now()));
        Ok(ExternalCreation::default())
    }

    /// Advance provisioning from the recorded stage
    async fn update(&self, ctx: &PassContext, cluster: &mut KubernetesCluster) -> Result<ExternalUpdate, ExternalError> {
        let name = cluster_name(cluster)?;
        let mut stage = cluster.stage();
        loop {
            let next = match stage {
                ClusterStage::ClusterCreating => self.await_cluster(cluster, &name).await?,
                ClusterStage::WorkerPoolCreating => self.await_worker_pool(cluster, &name).await?,
                ClusterStage::Configuring => self.configure(cluster, &name).await?,
                ClusterStage::Pending | ClusterStage::Available | ClusterStage::Failed => break,
            };
            if next == stage {
                break;
            }
            info!("Cluster {} moved from {} to {}", name, stage, next);
            status_mut(cluster).stage = next;
            stage = next;
        }

        cluster.conditions_mut().set(Condition::creating(ctx.now()));
        if stage != ClusterStage::Available {
            return Ok(ExternalUpdate::default());
        }
        let info = self.client.get_cluster(&name).await.map_err(classify)?;
        Ok(ExternalUpdate {
            connection_details: self.connection_details(&info).await?,
        })
    }

    /// Delete the worker pool, then the control plane, reporting every failure
    async fn delete(&self, ctx: &PassContext, cluster: &mut KubernetesCluster) -> Result<(), ExternalError> {
        let name = cluster_name(cluster)?;
        cluster.conditions_mut().set(Condition::deleting(ctx.now()));

        let mut errors = Vec::new();
        let pool_name = KubernetesCluster::worker_pool_name(&name);
        if let Err(err) = found(self.client.delete_worker_pool(&pool_name).await) {
            errors.push(format!("Worker Delete Error: {err}"));
        }
        if let Err(err) = found(self.client.delete_cluster(&name).await) {
            errors.push(format!("Master Delete Error: {err}"));
        }

        if errors.is_empty() {
            info!("Deleted cluster {} and worker pool {}", name, pool_name);
            Ok(())
        } else {
            Err(ExternalError::Transient(errors.join(", ")))
        }
    }
}

#[cfg(test)]
#[path = "kubernetes_cluster_test.rs"]
mod kubernetes_cluster_test;
