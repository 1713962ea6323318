//! RolePolicyAttachment adapter
//!
//! The attached set is reconciled by diff: missing policies are attached and policies
//! this resource attached earlier but no longer wants are detached. Policies attached
//! to the role by anyone else are never touched, so the observed set is the provider's
//! list intersected with what this resource desires or has recorded.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use cloud_client::CloudClientTrait;
use crds::{Condition, Managed, RolePolicyAttachment, RolePolicyAttachmentStatus};
use managed_runtime::{
    ExternalClient, ExternalCreation, ExternalError, ExternalObservation, ExternalUpdate, PassContext,
};
use tracing::info;

use super::{CloudKind, classify, found, required};

/// Attaches and detaches managed policies on a role
pub struct RolePolicyAttachmentExternal {
    client: Arc<dyn CloudClientTrait>,
}

impl CloudKind for RolePolicyAttachment {
    fn external(client: Arc<dyn CloudClientTrait>) -> Box<dyn ExternalClient<Self>> {
        Box::new(RolePolicyAttachmentExternal { client })
    }
}

fn recorded_policies(attachment: &RolePolicyAttachment) -> BTreeSet<String> {
    attachment
        .status
        .as_ref()
        .map(|s| s.attached_policy_arns.iter().cloned().collect())
        .unwrap_or_default()
}

fn record(attachment: &mut RolePolicyAttachment, attached: &BTreeSet<String>) {
    attachment
        .status
        .get_or_insert_with(RolePolicyAttachmentStatus::default)
        .attached_policy_arns = attached.iter().cloned().collect();
}

fn role_name(attachment: &RolePolicyAttachment) -> Result<String, ExternalError> {
    required(attachment.spec.role_name.as_deref(), "roleName").map(str::to_string)
}

impl RolePolicyAttachmentExternal {
    async fn attach(&self, role: &str, policies: impl IntoIterator<Item = &String>) -> Result<(), ExternalError> {
        for arn in policies {
            self.client.attach_role_policy(role, arn).await.map_err(classify)?;
            info!("Attached {} to role {}", arn, role);
        }
        Ok(())
    }

    /// Detach each policy; an already detached policy counts as success
    async fn detach(&self, role: &str, policies: impl IntoIterator<Item = &String>) -> Result<(), ExternalError> {
        let mut errors = Vec::new();
        for arn in policies {
            match found(self.client.detach_role_policy(role, arn).await) {
                Ok(_) => info!("Detached {} from role {}", arn, role),
                Err(err) => errors.push(format!("{arn}: {err}")),
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ExternalError::Transient(format!("failed to detach {}", errors.join(", "))))
        }
    }
}

#[async_trait]
impl ExternalClient<RolePolicyAttachment> for RolePolicyAttachmentExternal {
    async fn observe(
        &self,
        _ctx: &PassContext,
        attachment: &mut RolePolicyAttachment,
    ) -> Result<ExternalObservation, ExternalError> {
        let role = role_name(attachment)?;
        let Some(attached) = found(self.client.list_attached_role_policies(&role).await)? else {
            return Ok(ExternalObservation::absent());
        };

        let desired = attachment.spec.desired_policy_arns();
        let relevant: BTreeSet<String> = desired.union(&recorded_policies(attachment)).cloned().collect();
        let managed: BTreeSet<String> = attached
            .into_iter()
            .map(|p| p.policy_arn)
            .filter(|arn| relevant.contains(arn))
            .collect();
        record(attachment, &managed);

        if managed.is_empty() {
            return Ok(ExternalObservation::absent());
        }
        Ok(ExternalObservation::present(managed == desired))
    }

    async fn create(
        &self,
        ctx: &PassContext,
        attachment: &mut RolePolicyAttachment,
    ) -> Result<ExternalCreation, ExternalError> {
        let role = role_name(attachment)?;
        let desired = attachment.spec.desired_policy_arns();
        if desired.is_empty() {
            return Err(ExternalError::Terminal("no policy ARNs specified".to_string()));
        }
        // Attaching an attached policy is a no-op on the provider side
        self.attach(&role, &desired).await?;
        record(attachment, &desired);
        attachment.conditions_mut().set(Condition::creating(ctx.now()));
        Ok(ExternalCreation::default())
    }

    async fn update(
        &self,
        ctx: &PassContext,
        attachment: &mut RolePolicyAttachment,
    ) -> Result<ExternalUpdate, ExternalError> {
        let role = role_name(attachment)?;
        let desired = attachment.spec.desired_policy_arns();
        let current = recorded_policies(attachment);

        self.attach(&role, desired.difference(&current)).await?;
        self.detach(&role, current.difference(&desired)).await?;

        record(attachment, &desired);
        attachment.conditions_mut().set(Condition::creating(ctx.now()));
        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, ctx: &PassContext, attachment: &mut RolePolicyAttachment) -> Result<(), ExternalError> {
        let Some(role) = attachment.spec.role_name.clone().filter(|r| !r.is_empty()) else {
            // Never resolved, so nothing was attached
            return Ok(());
        };
        let managed: BTreeSet<String> = attachment
            .spec
            .desired_policy_arns()
            .union(&recorded_policies(attachment))
            .cloned()
            .collect();
        attachment.conditions_mut().set(Condition::deleting(ctx.now()));
        self.detach(&role, &managed).await?;
        record(attachment, &BTreeSet::new());
        Ok(())
    }
}

#[cfg(test)]
#[path = "role_policy_attachment_test.rs"]
mod role_policy_attachment_test;
