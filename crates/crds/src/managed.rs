//! Generic access to the managed resource envelope
//!
//! The reconcile loop and reference resolver work on any kind implementing
//! [`Managed`]: they read the shared [`ResourceSpec`] and mutate conditions without
//! knowing the kind's own fields. Kind-specific spec fields are reached through
//! serde (`serde_json::to_value` of the whole object) when a reference needs them.

use std::fmt::Debug;

use kube::Resource;
use kube::core::NamespaceResourceScope;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::common::ResourceSpec;
use crate::conditions::{ConditionType, Conditions};
use crate::compute::{KubernetesCluster, KubernetesClusterStatus};
use crate::identity::{IamRole, IamRoleStatus, RolePolicyAttachment, RolePolicyAttachmentStatus};
use crate::network::{
    InternetGateway, InternetGatewayStatus, SecurityGroup, SecurityGroupStatus, Subnet, SubnetStatus, Vpc, VpcStatus,
};

/// A namespaced CloudOps managed resource
pub trait Managed:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Shared envelope of the spec
    fn resource_spec(&self) -> &ResourceSpec;

    /// Current conditions, if the status has been written at least once
    fn conditions(&self) -> Option<&Conditions>;

    /// Conditions, creating an empty status first if needed
    fn conditions_mut(&mut self) -> &mut Conditions;

    /// Whether the condition of this type is currently True
    fn condition_is_true(&self, type_: ConditionType) -> bool {
        self.conditions().map(|c| c.is_true(type_)).unwrap_or(false)
    }
}

macro_rules! impl_managed {
    ($kind:ty, $status:ty) => {
        impl Managed for $kind {
            fn resource_spec(&self) -> &ResourceSpec {
                &self.spec.resource
            }

            fn conditions(&self) -> Option<&Conditions> {
                self.status.as_ref().map(|s| &s.conditions)
            }

            fn conditions_mut(&mut self) -> &mut Conditions {
                &mut self.status.get_or_insert_with(<$status>::default).conditions
            }
        }
    };
}

impl_managed!(Vpc, VpcStatus);
impl_managed!(Subnet, SubnetStatus);
impl_managed!(SecurityGroup, SecurityGroupStatus);
impl_managed!(InternetGateway, InternetGatewayStatus);
impl_managed!(IamRole, IamRoleStatus);
impl_managed!(RolePolicyAttachment, RolePolicyAttachmentStatus);
impl_managed!(KubernetesCluster, KubernetesClusterStatus);
