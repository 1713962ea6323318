//! IamRole adapter
//!
//! Roles are keyed by name, so creation is safe to repeat. The trust policy is
//! compared as JSON so formatting differences do not count as drift.

use std::sync::Arc;

use async_trait::async_trait;
use cloud_client::{CloudClientTrait, CreateRoleRequest, RoleInfo, UpdateRoleRequest};
use crds::{Condition, IamRole, IamRoleStatus, Managed};
use managed_runtime::{
    ExternalClient, ExternalCreation, ExternalError, ExternalObservation, ExternalUpdate, PassContext,
};
use tracing::info;

use super::{CloudKind, classify, found, ignore_not_found};

/// Provisions roles through the identity gateway
pub struct IamRoleExternal {
    client: Arc<dyn CloudClientTrait>,
}

impl CloudKind for IamRole {
    fn external(client: Arc<dyn CloudClientTrait>) -> Box<dyn ExternalClient<Self>> {
        Box::new(IamRoleExternal { client })
    }
}

fn record(role: &mut IamRole, info: &RoleInfo) {
    let status = role.status.get_or_insert_with(IamRoleStatus::default);
    status.role_arn = Some(info.arn.clone());
    status.role_id = Some(info.role_id.clone());
}

fn same_policy(desired: &str, observed: &str) -> bool {
    match (
        serde_json::from_str::<serde_json::Value>(desired),
        serde_json::from_str::<serde_json::Value>(observed),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => desired.trim() == observed.trim(),
    }
}

fn up_to_date(role: &IamRole, info: &RoleInfo) -> bool {
    same_policy(&role.spec.assume_role_policy_document, &info.assume_role_policy_document)
        && role.spec.description.as_deref().unwrap_or_default() == info.description.as_deref().unwrap_or_default()
}

#[async_trait]
impl ExternalClient<IamRole> for IamRoleExternal {
    async fn observe(&self, _ctx: &PassContext, role: &mut IamRole) -> Result<ExternalObservation, ExternalError> {
        let Some(info) = found(self.client.get_role(&role.spec.role_name).await)? else {
            return Ok(ExternalObservation::absent());
        };
        record(role, &info);
        Ok(ExternalObservation::present(up_to_date(role, &info)))
    }

    async fn create(&self, ctx: &PassContext, role: &mut IamRole) -> Result<ExternalCreation, ExternalError> {
        let request = CreateRoleRequest {
            role_name: role.spec.role_name.clone(),
            assume_role_policy_document: role.spec.assume_role_policy_document.clone(),
            description: role.spec.description.clone(),
        };
        let info = match self.client.create_role(&request).await {
            Ok(info) => {
                info!("Created role {} ({})", info.role_name, info.arn);
                info
            }
            Err(err) if err.is_already_exists() => {
                self.client.get_role(&role.spec.role_name).await.map_err(classify)?
            }
            Err(err) => return Err(classify(err)),
        };
        record(role, &info);
        role.conditions_mut().set(Condition::creating(ctx.now()));
        Ok(ExternalCreation::default())
    }

    async fn update(&self, ctx: &PassContext, role: &mut IamRole) -> Result<ExternalUpdate, ExternalError> {
        let request = UpdateRoleRequest {
            assume_role_policy_document: role.spec.assume_role_policy_document.clone(),
            description: role.spec.description.clone(),
        };
        let info = self
            .client
            .update_role(&role.spec.role_name, &request)
            .await
            .map_err(classify)?;
        info!("Updated role {}", info.role_name);
        record(role, &info);
        role.conditions_mut().set(Condition::creating(ctx.now()));
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, _ctx: &PassContext, role: &mut IamRole) -> Result<(), ExternalError> {
        ignore_not_found(self.client.delete_role(&role.spec.role_name).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use cloud_client::MockCloudClient;
    use managed_runtime::testing::test_context;

    #[test]
    fn test_policy_comparison_ignores_formatting() {
        assert!(same_policy(r#"{"Version":"2012-10-17"}"#, "{ \"Version\": \"2012-10-17\" }\n"));
        assert!(!same_policy(r#"{"Version":"2012-10-17"}"#, r#"{"Version":"2008-10-17"}"#));
        assert!(same_policy("not json", " not json "));
    }

    #[tokio::test]
    async fn test_create_tolerates_existing_role() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        mock.add_role(test_role_info("eks-master"));
        let mut role = test_iam_role("eks-master");

        IamRole::external(mock.clone()).create(&ctx, &mut role).await.unwrap();

        let status = role.status.unwrap();
        assert_eq!(status.role_arn.as_deref(), Some("arn:aws:iam::000000000000:role/eks-master"));
        assert_eq!(mock.calls_to("get_role").len(), 1);
    }

    #[tokio::test]
    async fn test_changed_trust_policy_is_updated() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        let mut existing = test_role_info("eks-master");
        existing.assume_role_policy_document = r#"{"Statement":[]}"#.to_string();
        mock.add_role(existing);
        let mut role = test_iam_role("eks-master");
        let external = IamRole::external(mock.clone());

        let observation = external.observe(&ctx, &mut role).await.unwrap();
        assert_eq!(observation, ExternalObservation::present(false));

        external.update(&ctx, &mut role).await.unwrap();
        let observation = external.observe(&ctx, &mut role).await.unwrap();
        assert_eq!(observation, ExternalObservation::present(true));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let mock = Arc::new(MockCloudClient::new());
        let (ctx, _) = test_context();
        mock.add_role(test_role_info("eks-master"));
        let mut role = test_iam_role("eks-master");
        let external = IamRole::external(mock.clone());

        external.delete(&ctx, &mut role).await.unwrap();
        external.delete(&ctx, &mut role).await.unwrap();
        assert_eq!(external.observe(&ctx, &mut role).await.unwrap(), ExternalObservation::absent());
    }
}
