//! Cloud gateway client
//!
//! Implements the client traits over the provider REST gateway:
//! `/v1/network/...`, `/v1/iam/...` and `/v1/compute/...`.

use crate::cloud_trait::{ComputeClientTrait, IdentityClientTrait, NetworkClientTrait};
use crate::common::HttpClient;
use crate::credentials::CloudCredentials;
use crate::error::CloudError;
use crate::models::*;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Cloud gateway client
#[derive(Debug, Clone)]
pub struct CloudClient {
    http: HttpClient,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse<T> {
    items: Vec<T>,
}

fn seg(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

impl CloudClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - Gateway base URL (e.g., "https://cloud-gateway:443")
    /// * `region` - Region every request is scoped to
    /// * `credentials` - Parsed credentials blob
    pub fn new(base_url: &str, region: &str, credentials: &CloudCredentials) -> Result<Self, CloudError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(CloudError::Http)?;

        Ok(Self {
            http: HttpClient::new(
                client,
                base_url,
                region,
                &credentials.aws_access_key_id,
                &credentials.aws_secret_access_key,
                credentials.aws_session_token.as_deref(),
            ),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Region every request is scoped to
    pub fn region(&self) -> &str {
        self.http.region()
    }
}

#[async_trait::async_trait]
impl NetworkClientTrait for CloudClient {
    async fn get_vpc(&self, vpc_id: &str) -> Result<VpcInfo, CloudError> {
        self.http.get(&format!("/v1/network/vpcs/{}", seg(vpc_id))).await
    }

    async fn find_vpc(&self, client_token: &str) -> Result<Option<VpcInfo>, CloudError> {
        let list: ListResponse<VpcInfo> = self
            .http
            .get(&format!("/v1/network/vpcs?clientToken={}", seg(client_token)))
            .await?;
        Ok(list.items.into_iter().next())
    }

    async fn create_vpc(&self, request: &CreateVpcRequest) -> Result<VpcInfo, CloudError> {
        debug!("Creating VPC {}", request.cidr_block);
        self.http.post("/v1/network/vpcs", request).await
    }

    async fn set_vpc_dns_support(&self, vpc_id: &str, enabled: bool) -> Result<(), CloudError> {
        let body = serde_json::json!({ "enableDnsSupport": enabled });
        let _: VpcInfo = self.http.patch(&format!("/v1/network/vpcs/{}", seg(vpc_id)), &body).await?;
        Ok(())
    }

    async fn delete_vpc(&self, vpc_id: &str) -> Result<(), CloudError> {
        self.http.delete(&format!("/v1/network/vpcs/{}", seg(vpc_id))).await
    }

    async fn get_subnet(&self, subnet_id: &str) -> Result<SubnetInfo, CloudError> {
        self.http.get(&format!("/v1/network/subnets/{}", seg(subnet_id))).await
    }

    async fn find_subnet(&self, client_token: &str) -> Result<Option<SubnetInfo>, CloudError> {
        let list: ListResponse<SubnetInfo> = self
            .http
            .get(&format!("/v1/network/subnets?clientToken={}", seg(client_token)))
            .await?;
        Ok(list.items.into_iter().next())
    }

    async fn create_subnet(&self, request: &CreateSubnetRequest) -> Result<SubnetInfo, CloudError> {
        debug!("Creating subnet {} in {}", request.cidr_block, request.vpc_id);
        self.http.post("/v1/network/subnets", request).await
    }

    async fn delete_subnet(&self, subnet_id: &str) -> Result<(), CloudError> {
        self.http.delete(&format!("/v1/network/subnets/{}", seg(subnet_id))).await
    }

    async fn get_security_group(&self, group_id: &str) -> Result<SecurityGroupInfo, CloudError> {
        self.http.get(&format!("/v1/network/security-groups/{}", seg(group_id))).await
    }

    async fn find_security_group(&self, vpc_id: Option<&str>, group_name: &str) -> Result<Option<SecurityGroupInfo>, CloudError> {
        let mut path = format!("/v1/network/security-groups?groupName={}", seg(group_name));
        if let Some(vpc_id) = vpc_id {
            path.push_str(&format!("&vpcId={}", seg(vpc_id)));
        }
        let list: ListResponse<SecurityGroupInfo> = self.http.get(&path).await?;
        Ok(list.items.into_iter().next())
    }

    async fn create_security_group(&self, request: &CreateSecurityGroupRequest) -> Result<SecurityGroupInfo, CloudError> {
        debug!("Creating security group {}", request.group_name);
        self.http.post("/v1/network/security-groups", request).await
    }

    async fn delete_security_group(&self, group_id: &str) -> Result<(), CloudError> {
        self.http.delete(&format!("/v1/network/security-groups/{}", seg(group_id))).await
    }

    async fn get_internet_gateway(&self, gateway_id: &str) -> Result<InternetGatewayInfo, CloudError> {
        self.http
            .get(&format!("/v1/network/internet-gateways/{}", seg(gateway_id)))
            .await
    }

    async fn find_internet_gateway(&self, client_token: &str) -> Result<Option<InternetGatewayInfo>, CloudError> {
        let list: ListResponse<InternetGatewayInfo> = self
            .http
            .get(&format!("/v1/network/internet-gateways?clientToken={}", seg(client_token)))
            .await?;
        Ok(list.items.into_iter().next())
    }

    async fn create_internet_gateway(&self, request: &CreateInternetGatewayRequest) -> Result<InternetGatewayInfo, CloudError> {
        debug!("Creating internet gateway {}", request.client_token);
        self.http.post("/v1/network/internet-gateways", request).await
    }

    async fn attach_internet_gateway(&self, gateway_id: &str, vpc_id: &str) -> Result<(), CloudError> {
        debug!("Attaching internet gateway {} to {}", gateway_id, vpc_id);
        self.http
            .put(
                &format!("/v1/network/internet-gateways/{}/attachments/{}", seg(gateway_id), seg(vpc_id)),
                &serde_json::json!({}),
            )
            .await
    }

    async fn detach_internet_gateway(&self, gateway_id: &str, vpc_id: &str) -> Result<(), CloudError> {
        debug!("Detaching internet gateway {} from {}", gateway_id, vpc_id);
        self.http
            .delete(&format!("/v1/network/internet-gateways/{}/attachments/{}", seg(gateway_id), seg(vpc_id)))
            .await
    }

    async fn delete_internet_gateway(&self, gateway_id: &str) -> Result<(), CloudError> {
        self.http
            .delete(&format!("/v1/network/internet-gateways/{}", seg(gateway_id)))
            .await
    }
}

#[async_trait::async_trait]
impl IdentityClientTrait for CloudClient {
    async fn get_role(&self, role_name: &str) -> Result<RoleInfo, CloudError> {
        self.http.get(&format!("/v1/iam/roles/{}", seg(role_name))).await
    }

    async fn create_role(&self, request: &CreateRoleRequest) -> Result<RoleInfo, CloudError> {
        debug!("Creating role {}", request.role_name);
        self.http.post("/v1/iam/roles", request).await
    }

    async fn update_role(&self, role_name: &str, request: &UpdateRoleRequest) -> Result<RoleInfo, CloudError> {
        self.http.patch(&format!("/v1/iam/roles/{}", seg(role_name)), request).await
    }

    async fn delete_role(&self, role_name: &str) -> Result<(), CloudError> {
        self.http.delete(&format!("/v1/iam/roles/{}", seg(role_name))).await
    }

    async fn list_attached_role_policies(&self, role_name: &str) -> Result<Vec<AttachedPolicy>, CloudError> {
        let list: ListResponse<AttachedPolicy> = self
            .http
            .get(&format!("/v1/iam/roles/{}/attached-policies", seg(role_name)))
            .await?;
        Ok(list.items)
    }

    async fn attach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), CloudError> {
        debug!("Attaching {} to role {}", policy_arn, role_name);
        self.http
            .put(
                &format!("/v1/iam/roles/{}/attached-policies/{}", seg(role_name), seg(policy_arn)),
                &serde_json::json!({}),
            )
            .await
    }

    async fn detach_role_policy(&self, role_name: &str, policy_arn: &str) -> Result<(), CloudError> {
        debug!("Detaching {} from role {}", policy_arn, role_name);
        self.http
            .delete(&format!("/v1/iam/roles/{}/attached-policies/{}", seg(role_name), seg(policy_arn)))
            .await
    }
}

#[async_trait::async_trait]
impl ComputeClientTrait for CloudClient {
    async fn get_cluster(&self, name: &str) -> Result<ClusterInfo, CloudError> {
        self.http.get(&format!("/v1/compute/clusters/{}", seg(name))).await
    }

    async fn create_cluster(&self, request: &CreateClusterRequest) -> Result<ClusterInfo, CloudError> {
        debug!("Creating cluster {}", request.name);
        self.http.post("/v1/compute/clusters", request).await
    }

    async fn delete_cluster(&self, name: &str) -> Result<(), CloudError> {
        self.http.delete(&format!("/v1/compute/clusters/{}", seg(name))).await
    }

    async fn get_worker_pool(&self, name: &str) -> Result<WorkerPoolInfo, CloudError> {
        self.http.get(&format!("/v1/compute/worker-pools/{}", seg(name))).await
    }

    async fn create_worker_pool(&self, request: &CreateWorkerPoolRequest) -> Result<WorkerPoolInfo, CloudError> {
        debug!("Creating worker pool {} for {}", request.name, request.cluster_name);
        self.http.post("/v1/compute/worker-pools", request).await
    }

    async fn delete_worker_pool(&self, name: &str) -> Result<(), CloudError> {
        self.http.delete(&format!("/v1/compute/worker-pools/{}", seg(name))).await
    }

    async fn put_auth_config(&self, cluster_name: &str, config: &AuthConfig) -> Result<(), CloudError> {
        self.http
            .put(&format!("/v1/compute/clusters/{}/auth-config", seg(cluster_name)), config)
            .await
    }

    async fn connection_token(&self, cluster_name: &str) -> Result<ClusterToken, CloudError> {
        self.http
            .post(&format!("/v1/compute/clusters/{}/token", seg(cluster_name)), &serde_json::json!({}))
            .await
    }
}
