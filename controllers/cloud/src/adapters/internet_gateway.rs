//! InternetGateway adapter
//!
//! A gateway is created detached and then attached to `spec.vpcId`, which usually
//! comes from a Vpc reference. Moving it to another VPC detaches it from the old one
//! first; deletion detaches before deleting. Creates carry a client token derived
//! from the resource uid, like VPCs and subnets.

use std::sync::Arc;

use async_trait::async_trait;
use cloud_client::{CloudClientTrait, CreateInternetGatewayRequest, InternetGatewayInfo};
use crds::{Condition, InternetGateway, InternetGatewayStatus, Managed};
use managed_runtime::{
    ExternalClient, ExternalCreation, ExternalError, ExternalObservation, ExternalUpdate, PassContext,
};
use tracing::{debug, info};

use super::{CloudKind, classify, client_token, found, ignore_not_found, recorded, required};

/// Provisions internet gateways and their VPC attachment
pub struct InternetGatewayExternal {
    client: Arc<dyn CloudClientTrait>,
}

impl CloudKind for InternetGateway {
    fn external(client: Arc<dyn CloudClientTrait>) -> Box<dyn ExternalClient<Self>> {
        Box::new(InternetGatewayExternal { client })
    }
}

fn gateway_id(gateway: &InternetGateway) -> Option<String> {
    recorded(gateway.status.as_ref().and_then(|s| s.internet_gateway_id.as_ref())).map(str::to_string)
}

fn record(gateway: &mut InternetGateway, info: &InternetGatewayInfo) {
    let status = gateway.status.get_or_insert_with(InternetGatewayStatus::default);
    status.internet_gateway_id = Some(info.internet_gateway_id.clone());
    status.attached_vpc_id = info.attached_vpc_id.clone();
}

impl InternetGatewayExternal {
    async fn find_by_token(&self, token: &str) -> Result<Option<InternetGatewayInfo>, ExternalError> {
        self.client.find_internet_gateway(token).await.map_err(classify)
    }

    /// Current gateway, by recorded id or else by client token
    async fn current(&self, gateway: &InternetGateway) -> Result<Option<InternetGatewayInfo>, ExternalError> {
        match gateway_id(gateway) {
            Some(id) => {
                let info = found(self.client.get_internet_gateway(&id).await)?;
                if info.is_none() {
                    debug!("Internet gateway {} no longer exists", id);
                }
                Ok(info)
            }
            None => self.find_by_token(&client_token(gateway)?).await,
        }
    }

    /// Attach `info` to `vpc_id`, detaching it from any other VPC first
    async fn attach(&self, info: &mut InternetGatewayInfo, vpc_id: &str) -> Result<(), ExternalError> {
        let id = info.internet_gateway_id.clone();
        match info.attached_vpc_id.as_deref() {
            Some(attached) if attached == vpc_id => return Ok(()),
            Some(attached) => {
                ignore_not_found(self.client.detach_internet_gateway(&id, attached).await)?;
                info!("Detached internet gateway {} from {}", id, attached);
                info.attached_vpc_id = None;
            }
            None => {}
        }
        self.client.attach_internet_gateway(&id, vpc_id).await.map_err(classify)?;
        info!("Attached internet gateway {} to {}", id, vpc_id);
        info.attached_vpc_id = Some(vpc_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl ExternalClient<InternetGateway> for InternetGatewayExternal {
    async fn observe(
        &self,
        _ctx: &PassContext,
        gateway: &mut InternetGateway,
    ) -> Result<ExternalObservation, ExternalError> {
        let Some(info) = self.current(gateway).await? else {
            return Ok(ExternalObservation::absent());
        };
        record(gateway, &info);

        let desired = gateway.spec.vpc_id.as_deref().filter(|v| !v.is_empty());
        Ok(ExternalObservation::present(
            desired.is_some() && info.attached_vpc_id.as_deref() == desired,
        ))
    }

    async fn create(&self, ctx: &PassContext, gateway: &mut InternetGateway) -> Result<ExternalCreation, ExternalError> {
        let vpc_id = required(gateway.spec.vpc_id.as_deref(), "vpcId")?.to_string();
        let token = client_token(gateway)?;
        let mut info = match self.find_by_token(&token).await? {
            Some(existing) => {
                info!("Adopting internet gateway {} created with token {}", existing.internet_gateway_id, token);
                existing
            }
            None => match self
                .client
                .create_internet_gateway(&CreateInternetGatewayRequest { client_token: token.clone() })
                .await
            {
                Ok(info) => {
                    info!("Created internet gateway {}", info.internet_gateway_id);
                    info
                }
                Err(err) if err.is_already_exists() => self
                    .find_by_token(&token)
                    .await?
                    .ok_or_else(|| ExternalError::Transient(format!("{err}, but it cannot be found by token")))?,
                Err(err) => return Err(classify(err)),
            },
        };
        // Record the id before attaching so a failed attach is retried on this gateway
        record(gateway, &info);
        self.attach(&mut info, &vpc_id).await?;
        record(gateway, &info);
        gateway.conditions_mut().set(Condition::creating(ctx.now()));
        Ok(ExternalCreation::default())
    }

    /// Moves the gateway to the VPC named by the spec
    async fn update(&self, ctx: &PassContext, gateway: &mut InternetGateway) -> Result<ExternalUpdate, ExternalError> {
        let vpc_id = required(gateway.spec.vpc_id.as_deref(), "vpcId")?.to_string();
        let mut info = self
            .current(gateway)
            .await?
            .ok_or_else(|| ExternalError::NotFound("internet gateway is not recorded".to_string()))?;
        let result = self.attach(&mut info, &vpc_id).await;
        record(gateway, &info);
        result?;
        gateway.conditions_mut().set(Condition::creating(ctx.now()));
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, _ctx: &PassContext, gateway: &mut InternetGateway) -> Result<(), ExternalError> {
        let Some(info) = self.current(gateway).await? else {
            return Ok(());
        };
        let id = &info.internet_gateway_id;
        if let Some(vpc_id) = info.attached_vpc_id.as_deref() {
            ignore_not_found(self.client.detach_internet_gateway(id, vpc_id).await)?;
            info!("Detached internet gateway {} from {}", id, vpc_id);
        }
        ignore_not_found(self.client.delete_internet_gateway(id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use cloud_client::{CloudError, MockCloudClient};
    use crds::{AttributeReference, ConditionStatus, ConditionType, Vpc, VpcStatus};
    use managed_runtime::testing::{fixed_time, test_context};

    fn adapter(mock: &Arc<MockCloudClient>) -> Box<dyn ExternalClient<InternetGateway>> {
        InternetGateway::external(mock.clone())
    }

    fn attached(gateway: &InternetGateway) -> Option<String> {
        gateway.status.as_ref().and_then(|s| s.attached_vpc_id.clone())
    }

    #[tokio::test]
    async fn test_observe_before_create_is_absent() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        let mut gateway = test_internet_gateway("igw", Some("vpc-1"));

        let observation = adapter(&mock).observe(&ctx, &mut gateway).await.unwrap();
        assert_eq!(observation, ExternalObservation::absent());
        assert_eq!(mock.calls(), vec!["find_internet_gateway:cloudops-uid-igw".to_string()]);
    }

    #[tokio::test]
    async fn test_create_requires_vpc_id() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        let mut gateway = test_internet_gateway("igw", None);

        let err = adapter(&mock).create(&ctx, &mut gateway).await.unwrap_err();
        assert_eq!(err, ExternalError::Terminal("spec.vpcId is not set".to_string()));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_attaches_to_vpc() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        mock.add_vpc(test_vpc_info("vpc-1"));
        let mut gateway = test_internet_gateway("igw", Some("vpc-1"));

        adapter(&mock).create(&ctx, &mut gateway).await.unwrap();

        let id = gateway.status.as_ref().and_then(|s| s.internet_gateway_id.clone()).unwrap();
        assert!(id.starts_with("igw-"));
        assert_eq!(attached(&gateway).as_deref(), Some("vpc-1"));
        assert_eq!(mock.internet_gateway(&id).unwrap().attached_vpc_id.as_deref(), Some("vpc-1"));

        let observation = adapter(&mock).observe(&ctx, &mut gateway).await.unwrap();
        assert_eq!(observation, ExternalObservation::present(true));
    }

    #[tokio::test]
    async fn test_failed_attach_keeps_gateway_id() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        mock.add_vpc(test_vpc_info("vpc-1"));
        mock.fail_next("attach_internet_gateway", CloudError::Throttled("slow down".to_string()));
        let mut gateway = test_internet_gateway("igw", Some("vpc-1"));

        let err = adapter(&mock).create(&ctx, &mut gateway).await.unwrap_err();
        assert!(matches!(err, ExternalError::Transient(_)));
        assert!(gateway.status.as_ref().and_then(|s| s.internet_gateway_id.clone()).is_some());
        assert_eq!(attached(&gateway), None);

        // Next pass finds the detached gateway and attaches it
        let observation = adapter(&mock).observe(&ctx, &mut gateway).await.unwrap();
        assert_eq!(observation, ExternalObservation::present(false));
        adapter(&mock).update(&ctx, &mut gateway).await.unwrap();
        assert_eq!(attached(&gateway).as_deref(), Some("vpc-1"));
        assert_eq!(mock.internet_gateway_count(), 1);
    }

    #[tokio::test]
    async fn test_create_twice_from_one_snapshot_makes_one_gateway() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        mock.add_vpc(test_vpc_info("vpc-1"));
        let snapshot = test_internet_gateway("igw", Some("vpc-1"));

        let mut first = snapshot.clone();
        adapter(&mock).create(&ctx, &mut first).await.unwrap();
        let mut second = snapshot.clone();
        adapter(&mock).create(&ctx, &mut second).await.unwrap();

        assert_eq!(mock.internet_gateway_count(), 1);
        assert_eq!(mock.calls_to("create_internet_gateway").len(), 1);
        assert_eq!(mock.calls_to("attach_internet_gateway").len(), 1);
        assert_eq!(first.status, second.status);
    }

    #[tokio::test]
    async fn test_update_moves_gateway_to_new_vpc() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        mock.add_vpc(test_vpc_info("vpc-1"));
        mock.add_vpc(test_vpc_info("vpc-2"));
        let mut gateway = test_internet_gateway("igw", Some("vpc-1"));
        adapter(&mock).create(&ctx, &mut gateway).await.unwrap();
        let id = gateway.status.as_ref().and_then(|s| s.internet_gateway_id.clone()).unwrap();

        gateway.spec.vpc_id = Some("vpc-2".to_string());
        let observation = adapter(&mock).observe(&ctx, &mut gateway).await.unwrap();
        assert_eq!(observation, ExternalObservation::present(false));
        adapter(&mock).update(&ctx, &mut gateway).await.unwrap();

        assert_eq!(mock.calls_to("detach_internet_gateway"), vec![format!("detach_internet_gateway:{id}:vpc-1")]);
        assert_eq!(attached(&gateway).as_deref(), Some("vpc-2"));
        let observation = adapter(&mock).observe(&ctx, &mut gateway).await.unwrap();
        assert!(observation.resource_up_to_date);
    }

    #[tokio::test]
    async fn test_delete_detaches_then_deletes() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        mock.add_vpc(test_vpc_info("vpc-1"));
        let mut gateway = test_internet_gateway("igw", Some("vpc-1"));
        adapter(&mock).create(&ctx, &mut gateway).await.unwrap();
        let id = gateway.status.as_ref().and_then(|s| s.internet_gateway_id.clone()).unwrap();
        mock.clear_calls();

        adapter(&mock).delete(&ctx, &mut gateway).await.unwrap();

        assert_eq!(
            mock.calls(),
            vec![
                format!("get_internet_gateway:{id}"),
                format!("detach_internet_gateway:{id}:vpc-1"),
                format!("delete_internet_gateway:{id}"),
            ]
        );
        assert_eq!(mock.internet_gateway_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_gateway() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        let mut gateway = test_internet_gateway("igw", Some("vpc-1"));
        gateway.status = Some(InternetGatewayStatus {
            internet_gateway_id: Some("igw-gone".to_string()),
            ..Default::default()
        });

        adapter(&mock).delete(&ctx, &mut gateway).await.unwrap();
        assert!(mock.calls_to("delete_internet_gateway").is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_attaches_to_referenced_vpc() {
        let harness = Harness::<InternetGateway>::new();
        harness.mock.add_vpc(test_vpc_info("vpc-main"));
        let mut gateway = test_internet_gateway("igw", None);
        gateway.spec.resource.references = vec![AttributeReference::new("vpcId", "Vpc", "main", "status.vpcId")];
        let key = harness.apply(gateway);
        let (ctx, _) = test_context();

        harness.reconciler.reconcile(&ctx, &key).await.unwrap();
        assert!(harness.mock.calls().is_empty());

        let mut vpc = test_vpc("main");
        vpc.status = Some(VpcStatus {
            vpc_id: Some("vpc-main".to_string()),
            ..Default::default()
        });
        vpc.conditions_mut().set(Condition::available(fixed_time()));
        harness.reader.insert::<Vpc>(&vpc);

        harness.reconciler.reconcile(&ctx, &key).await.unwrap();
        let stored = harness.stored(&key);
        assert_eq!(stored.spec.vpc_id.as_deref(), Some("vpc-main"));
        assert_eq!(attached(&stored).as_deref(), Some("vpc-main"));

        harness.reconciler.reconcile(&ctx, &key).await.unwrap();
        let ready = ready(&harness.stored(&key)).unwrap();
        assert_eq!(ready.status, ConditionStatus::True);
        assert!(harness.stored(&key).condition_is_true(ConditionType::ReferencesResolved));
    }
}
