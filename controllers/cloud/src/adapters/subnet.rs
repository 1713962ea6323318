//! Subnet adapter
//!
//! `spec.vpcId` is usually filled in from a Vpc reference before this adapter runs.
//! Creates carry a client token derived from the resource uid and are looked up by
//! it until the subnet id is recorded.

use std::sync::Arc;

use async_trait::async_trait;
use cloud_client::{CloudClientTrait, CreateSubnetRequest, SubnetInfo};
use crds::{Condition, Managed, Subnet, SubnetStatus};
use managed_runtime::{
    ExternalClient, ExternalCreation, ExternalError, ExternalObservation, ExternalUpdate, PassContext,
};
use tracing::{debug, info};

use super::{CloudKind, classify, client_token, found, ignore_not_found, recorded, required};

/// Provisions subnets through the network gateway
pub struct SubnetExternal {
    client: Arc<dyn CloudClientTrait>,
}

impl CloudKind for Subnet {
    fn external(client: Arc<dyn CloudClientTrait>) -> Box<dyn ExternalClient<Self>> {
        Box::new(SubnetExternal { client })
    }
}

fn subnet_id(subnet: &Subnet) -> Option<String> {
    recorded(subnet.status.as_ref().and_then(|s| s.subnet_id.as_ref())).map(str::to_string)
}

fn record(subnet: &mut Subnet, info: &SubnetInfo) {
    let status = subnet.status.get_or_insert_with(SubnetStatus::default);
    status.subnet_id = Some(info.subnet_id.clone());
    status.state = Some(info.state.clone());
}

impl SubnetExternal {
    async fn find_by_token(&self, token: &str) -> Result<Option<SubnetInfo>, ExternalError> {
        self.client.find_subnet(token).await.map_err(classify)
    }
}

#[async_trait]
impl ExternalClient<Subnet> for SubnetExternal {
    async fn observe(&self, _ctx: &PassContext, subnet: &mut Subnet) -> Result<ExternalObservation, ExternalError> {
        let info = match subnet_id(subnet) {
            Some(subnet_id) => {
                let info = found(self.client.get_subnet(&subnet_id).await)?;
                if info.is_none() {
                    debug!("Subnet {} no longer exists", subnet_id);
                }
                info
            }
            None => self.find_by_token(&client_token(subnet)?).await?,
        };
        let Some(info) = info else {
            return Ok(ExternalObservation::absent());
        };
        record(subnet, &info);
        // CIDR and zone are immutable; only a pending subnet is out of date
        Ok(ExternalObservation::present(info.state == "available"))
    }

    async fn create(&self, ctx: &PassContext, subnet: &mut Subnet) -> Result<ExternalCreation, ExternalError> {
        let vpc_id = required(subnet.spec.vpc_id.as_deref(), "vpcId")?.to_string();
        let token = client_token(subnet)?;
        let info = match self.find_by_token(&token).await? {
            Some(existing) => {
                info!("Adopting subnet {} created with token {}", existing.subnet_id, token);
                existing
            }
            None => {
                let request = CreateSubnetRequest {
                    vpc_id,
                    cidr_block: subnet.spec.cidr_block.clone(),
                    availability_zone: subnet.spec.availability_zone.clone(),
                    client_token: token.clone(),
                };
                match self.client.create_subnet(&request).await {
                    Ok(info) => {
                        info!("Created subnet {} in {}", info.subnet_id, info.vpc_id);
                        info
                    }
                    Err(err) if err.is_already_exists() => self
                        .find_by_token(&token)
                        .await?
                        .ok_or_else(|| ExternalError::Transient(format!("{err}, but it cannot be found by token")))?,
                    Err(err) => return Err(classify(err)),
                }
            }
        };
        record(subnet, &info);
        subnet.conditions_mut().set(Condition::creating(ctx.now()));
        Ok(ExternalCreation::default())
    }

    async fn update(&self, ctx: &PassContext, subnet: &mut Subnet) -> Result<ExternalUpdate, ExternalError> {
        subnet.conditions_mut().set(Condition::creating(ctx.now()));
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, _ctx: &PassContext, subnet: &mut Subnet) -> Result<(), ExternalError> {
        match subnet_id(subnet) {
            Some(subnet_id) => ignore_not_found(self.client.delete_subnet(&subnet_id).await),
            None => Ok(()),
        }
    }
}
