//! SecurityGroup adapter
//!
//! Groups are unique by name within a VPC, which makes creation safe to repeat: a
//! create that reports the name as taken adopts the existing group.

use std::sync::Arc;

use async_trait::async_trait;
use cloud_client::{CloudClientTrait, CreateSecurityGroupRequest, SecurityGroupInfo};
use crds::{Condition, Managed, SecurityGroup, SecurityGroupStatus};
use managed_runtime::{
    ExternalClient, ExternalCreation, ExternalError, ExternalObservation, ExternalUpdate, PassContext,
};
use tracing::info;

use super::{CloudKind, classify, found, ignore_not_found, recorded};

/// Provisions security groups through the network gateway
pub struct SecurityGroupExternal {
    client: Arc<dyn CloudClientTrait>,
}

impl CloudKind for SecurityGroup {
    fn external(client: Arc<dyn CloudClientTrait>) -> Box<dyn ExternalClient<Self>> {
        Box::new(SecurityGroupExternal { client })
    }
}

fn group_id(group: &SecurityGroup) -> Option<String> {
    recorded(group.status.as_ref().and_then(|s| s.security_group_id.as_ref())).map(str::to_string)
}

fn record(group: &mut SecurityGroup, info: &SecurityGroupInfo) {
    group
        .status
        .get_or_insert_with(SecurityGroupStatus::default)
        .security_group_id = Some(info.group_id.clone());
}

impl SecurityGroupExternal {
    async fn find_by_name(&self, group: &SecurityGroup) -> Result<Option<SecurityGroupInfo>, ExternalError> {
        self.client
            .find_security_group(group.spec.vpc_id.as_deref(), &group.spec.group_name)
            .await
            .map_err(classify)
    }
}

#[async_trait]
impl ExternalClient<SecurityGroup> for SecurityGroupExternal {
    async fn observe(&self, _ctx: &PassContext, group: &mut SecurityGroup) -> Result<ExternalObservation, ExternalError> {
        let info = match group_id(group) {
            Some(id) => found(self.client.get_security_group(&id).await)?,
            None => self.find_by_name(group).await?,
        };
        match info {
            Some(info) => {
                record(group, &info);
                // Name and description cannot change after creation
                Ok(ExternalObservation::present(true))
            }
            None => Ok(ExternalObservation::absent()),
        }
    }

    async fn create(&self, ctx: &PassContext, group: &mut SecurityGroup) -> Result<ExternalCreation, ExternalError> {
        let request = CreateSecurityGroupRequest {
            group_name: group.spec.group_name.clone(),
            description: group.spec.description.clone(),
            vpc_id: group.spec.vpc_id.clone(),
        };
        let info = match self.client.create_security_group(&request).await {
            Ok(info) => {
                info!("Created security group {} ({})", info.group_name, info.group_id);
                info
            }
            Err(err) if err.is_already_exists() => self
                .find_by_name(group)
                .await?
                .ok_or_else(|| ExternalError::Transient(format!("{err}, but it cannot be found by name")))?,
            Err(err) => return Err(classify(err)),
        };
        record(group, &info);
        group.conditions_mut().set(Condition::creating(ctx.now()));
        Ok(ExternalCreation::default())
    }

    async fn update(&self, ctx: &PassContext, group: &mut SecurityGroup) -> Result<ExternalUpdate, ExternalError> {
        group.conditions_mut().set(Condition::creating(ctx.now()));
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, _ctx: &PassContext, group: &mut SecurityGroup) -> Result<(), ExternalError> {
        match group_id(group) {
            Some(id) => ignore_not_found(self.client.delete_security_group(&id).await),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use cloud_client::{MockCloudClient, NetworkClientTrait};
    use managed_runtime::testing::test_context;

    #[tokio::test]
    async fn test_create_adopts_existing_group() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        let existing = mock
            .create_security_group(&CreateSecurityGroupRequest {
                group_name: "web".to_string(),
                description: "web tier".to_string(),
                vpc_id: Some("vpc-1".to_string()),
            })
            .await
            .unwrap();
        let mut group = test_security_group("web", Some("vpc-1"));

        SecurityGroup::external(mock.clone()).create(&ctx, &mut group).await.unwrap();

        assert_eq!(group.status.unwrap().security_group_id, Some(existing.group_id));
        assert_eq!(mock.calls_to("create_security_group").len(), 2);
    }

    #[tokio::test]
    async fn test_observe_finds_group_by_name_before_id_is_recorded() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        let existing = mock
            .create_security_group(&CreateSecurityGroupRequest {
                group_name: "web".to_string(),
                description: "web tier".to_string(),
                vpc_id: None,
            })
            .await
            .unwrap();
        let mut group = test_security_group("web", None);

        let observation = SecurityGroup::external(mock).observe(&ctx, &mut group).await.unwrap();
        assert_eq!(observation, ExternalObservation::present(true));
        assert_eq!(group.status.unwrap().security_group_id, Some(existing.group_id));
    }

    #[tokio::test]
    async fn test_delete_by_recorded_id() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        let mut group = test_security_group("web", Some("vpc-1"));
        let external = SecurityGroup::external(mock.clone());
        external.create(&ctx, &mut group).await.unwrap();

        external.delete(&ctx, &mut group).await.unwrap();
        // Already gone
        external.delete(&ctx, &mut group).await.unwrap();
        assert_eq!(mock.calls_to("delete_security_group").len(), 2);
        assert!(mock.find_security_group(Some("vpc-1"), "web").await.unwrap().is_none());
    }
}
