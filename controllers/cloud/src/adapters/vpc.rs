//! Vpc adapter
//!
//! The VPC id is only known after creation, so it is recorded in `status.vpcId` and
//! every later pass observes by that id. Creates carry a client token derived from
//! the resource uid; until an id is recorded the VPC is looked up by that token, so a
//! create whose status write was lost is adopted rather than repeated.

use std::sync::Arc;

use async_trait::async_trait;
use cloud_client::{CloudClientTrait, CreateVpcRequest, VpcInfo};
use crds::{Condition, Managed, Vpc, VpcStatus};
use managed_runtime::{
    ExternalClient, ExternalCreation, ExternalError, ExternalObservation, ExternalUpdate, PassContext,
};
use tracing::{debug, info};

use super::{CloudKind, classify, client_token, found, ignore_not_found, recorded};

const AVAILABLE: &str = "available";

/// Provisions VPCs through the network gateway
pub struct VpcExternal {
    client: Arc<dyn CloudClientTrait>,
}

impl CloudKind for Vpc {
    fn external(client: Arc<dyn CloudClientTrait>) -> Box<dyn ExternalClient<Self>> {
        Box::new(VpcExternal { client })
    }
}

fn desired_dns_support(vpc: &Vpc) -> bool {
    vpc.spec.enable_dns_support.unwrap_or(true)
}

fn vpc_id(vpc: &Vpc) -> Option<String> {
    recorded(vpc.status.as_ref().and_then(|s| s.vpc_id.as_ref())).map(str::to_string)
}

fn record(vpc: &mut Vpc, info: &VpcInfo) {
    let status = vpc.status.get_or_insert_with(VpcStatus::default);
    status.vpc_id = Some(info.vpc_id.clone());
    status.state = Some(info.state.clone());
}

impl VpcExternal {
    async fn find_by_token(&self, token: &str) -> Result<Option<VpcInfo>, ExternalError> {
        self.client.find_vpc(token).await.map_err(classify)
    }
}

#[async_trait]
impl ExternalClient<Vpc> for VpcExternal {
    async fn observe(&self, _ctx: &PassContext, vpc: &mut Vpc) -> Result<ExternalObservation, ExternalError> {
        let info = match vpc_id(vpc) {
            Some(vpc_id) => {
                let info = found(self.client.get_vpc(&vpc_id).await)?;
                if info.is_none() {
                    debug!("VPC {} no longer exists", vpc_id);
                }
                info
            }
            None => self.find_by_token(&client_token(vpc)?).await?,
        };
        let Some(info) = info else {
            return Ok(ExternalObservation::absent());
        };
        record(vpc, &info);

        let up_to_date = info.state == AVAILABLE && info.enable_dns_support == desired_dns_support(vpc);
        Ok(ExternalObservation::present(up_to_date))
    }

    async fn create(&self, ctx: &PassContext, vpc: &mut Vpc) -> Result<ExternalCreation, ExternalError> {
        let token = client_token(vpc)?;
        let info = match self.find_by_token(&token).await? {
            Some(existing) => {
                info!("Adopting VPC {} created with token {}", existing.vpc_id, token);
                existing
            }
            None => {
                let request = CreateVpcRequest {
                    cidr_block: vpc.spec.cidr_block.clone(),
                    enable_dns_support: desired_dns_support(vpc),
                    client_token: token.clone(),
                };
                match self.client.create_vpc(&request).await {
                    Ok(info) => {
                        info!("Created VPC {} ({})", info.vpc_id, info.cidr_block);
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
        record(vpc, &info);
        vpc.conditions_mut().set(Condition::creating(ctx.now()));
        Ok(ExternalCreation::default())
    }

    /// Re-applies DNS support; a VPC still pending needs nothing but waiting
    async fn update(&self, ctx: &PassContext, vpc: &mut Vpc) -> Result<ExternalUpdate, ExternalError> {
        let vpc_id = vpc_id(vpc).ok_or_else(|| ExternalError::NotFound("VPC id is not recorded".to_string()))?;
        let info = self.client.get_vpc(&vpc_id).await.map_err(classify)?;
        let desired = desired_dns_support(vpc);
        if info.enable_dns_support != desired {
            self.client.set_vpc_dns_support(&vpc_id, desired).await.map_err(classify)?;
            info!("Set DNS support of VPC {} to {}", vpc_id, desired);
        }
        vpc.conditions_mut().set(Condition::creating(ctx.now()));
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, _ctx: &PassContext, vpc: &mut Vpc) -> Result<(), ExternalError> {
        match vpc_id(vpc) {
            Some(vpc_id) => ignore_not_found(self.client.delete_vpc(&vpc_id).await),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use cloud_client::{CloudError, MockCloudClient};
    use crds::{ConditionReason, ConditionType};
    use managed_runtime::testing::test_context;

    fn adapter(mock: &Arc<MockCloudClient>) -> Box<dyn ExternalClient<Vpc>> {
        Vpc::external(mock.clone())
    }

    #[tokio::test]
    async fn test_observe_without_recorded_id_is_absent() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        let mut vpc = test_vpc("main");

        let observation = adapter(&mock).observe(&ctx, &mut vpc).await.unwrap();
        assert_eq!(observation, ExternalObservation::absent());
        assert_eq!(mock.calls(), vec!["find_vpc:cloudops-uid-main".to_string()]);
    }

    #[tokio::test]
    async fn test_create_twice_from_one_snapshot_makes_one_vpc() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        let snapshot = test_vpc("main");

        let mut first = snapshot.clone();
        adapter(&mock).create(&ctx, &mut first).await.unwrap();
        // Status of the first attempt was never written
        let mut second = snapshot.clone();
        adapter(&mock).create(&ctx, &mut second).await.unwrap();

        assert_eq!(mock.vpc_count(), 1);
        assert_eq!(mock.calls_to("create_vpc").len(), 1);
        assert_eq!(first.status.unwrap().vpc_id, second.status.unwrap().vpc_id);
    }

    #[tokio::test]
    async fn test_observe_finds_unrecorded_vpc_by_token() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        let snapshot = test_vpc("main");
        let mut created = snapshot.clone();
        adapter(&mock).create(&ctx, &mut created).await.unwrap();

        let mut vpc = snapshot.clone();
        let observation = adapter(&mock).observe(&ctx, &mut vpc).await.unwrap();

        assert_eq!(observation, ExternalObservation::present(true));
        assert_eq!(vpc.status.unwrap().vpc_id, created.status.unwrap().vpc_id);
    }

    #[tokio::test]
    async fn test_token_collision_without_match_is_retried() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        mock.fail_next("create_vpc", CloudError::AlreadyExists("token in use".to_string()));
        let mut vpc = test_vpc("main");

        let err = adapter(&mock).create(&ctx, &mut vpc).await.unwrap_err();
        assert!(matches!(err, ExternalError::Transient(_)));
        assert_eq!(mock.calls_to("find_vpc").len(), 2);
    }

    #[tokio::test]
    async fn test_lost_status_write_does_not_create_second_vpc() {
        let harness = Harness::<Vpc>::new();
        let key = harness.apply(test_vpc("main"));
        let (ctx, _) = test_context();
        // Finalizer is written, the status after create is not
        harness.store.fail_updates_after(1, "apiserver unavailable");

        assert!(harness.reconciler.reconcile(&ctx, &key).await.is_err());
        assert!(harness.stored(&key).status.is_none());

        harness.store.clear_update_failures();
        harness.reconciler.reconcile(&ctx, &key).await.unwrap();

        assert_eq!(harness.mock.calls_to("create_vpc").len(), 1);
        assert_eq!(harness.mock.vpc_count(), 1);
        let stored = harness.stored(&key);
        assert!(stored.status.and_then(|s| s.vpc_id).is_some());
    }

    #[tokio::test]
    async fn test_create_records_id_and_marks_creating() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        let mut vpc = test_vpc("main");

        adapter(&mock).create(&ctx, &mut vpc).await.unwrap();

        let status = vpc.status.as_ref().unwrap();
        let vpc_id = status.vpc_id.clone().unwrap();
        assert!(vpc_id.starts_with("vpc-"));
        let ready = status.conditions.get(ConditionType::Ready).unwrap();
        assert_eq!(ready.reason, ConditionReason::Creating);

        let observation = adapter(&mock).observe(&ctx, &mut vpc).await.unwrap();
        assert_eq!(observation, ExternalObservation::present(true));
    }

    #[tokio::test]
    async fn test_dns_drift_is_updated() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        mock.add_vpc(VpcInfo {
            enable_dns_support: false,
            ..test_vpc_info("vpc-1")
        });
        let mut vpc = test_vpc("main");
        vpc.status = Some(VpcStatus {
            vpc_id: Some("vpc-1".to_string()),
            ..Default::default()
        });

        let observation = adapter(&mock).observe(&ctx, &mut vpc).await.unwrap();
        assert_eq!(observation, ExternalObservation::present(false));

        adapter(&mock).update(&ctx, &mut vpc).await.unwrap();
        assert_eq!(mock.calls_to("set_vpc_dns_support"), vec!["set_vpc_dns_support:vpc-1:true".to_string()]);
        let observation = adapter(&mock).observe(&ctx, &mut vpc).await.unwrap();
        assert!(observation.resource_up_to_date);
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_vpc() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        let mut vpc = test_vpc("main");
        vpc.status = Some(VpcStatus {
            vpc_id: Some("vpc-gone".to_string()),
            ..Default::default()
        });

        adapter(&mock).delete(&ctx, &mut vpc).await.unwrap();
        assert_eq!(mock.calls_to("delete_vpc").len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_create_is_terminal() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        mock.fail_next("create_vpc", CloudError::InvalidRequest("bad CIDR".to_string()));
        let mut vpc = test_vpc("main");

        let err = adapter(&mock).create(&ctx, &mut vpc).await.unwrap_err();
        assert!(err.is_terminal());
        assert!(vpc.status.is_none());
    }
}
