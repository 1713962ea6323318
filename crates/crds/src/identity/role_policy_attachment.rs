//! RolePolicyAttachment CRD
//!
//! Attaches a set of managed policies to a role. Only policies listed in the spec,
//! or previously recorded in `status.attachedPolicyArns`, are ever touched; other
//! policies attached to the same role are left alone.

use std::collections::BTreeSet;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::ResourceSpec;
use crate::conditions::Conditions;

/// RolePolicyAttachment CRD
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cloudops.microscaler.io",
    version = "v1alpha1",
    kind = "RolePolicyAttachment",
    namespaced,
    status = "RolePolicyAttachmentStatus",
    printcolumn = r#"{"name":"Role","type":"string","jsonPath":".spec.roleName"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct RolePolicyAttachmentSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    
    /// Role to attach to (usually resolved from an IamRole reference)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_name: Option<String>,
    
    /// Single policy ARN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_arn: Option<String>,
    
    /// Additional policy ARNs
    #[serde(default)]
    pub policy_arns: Vec<String>,
}

impl RolePolicyAttachmentSpec {
    /// Union of `policyArn` and `policyArns`, blanks dropped
    pub fn desired_policy_arns(&self) -> BTreeSet<String> {
        self.policy_arn
            .iter()
            .chain(self.policy_arns.iter())
            .filter(|arn| !arn.is_empty())
            .cloned()
            .collect()
    }
}

/// Status of RolePolicyAttachment
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RolePolicyAttachmentStatus {
    /// Policies this resource has observed attached to the role
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attached_policy_arns: Vec<String>,
    
    #[serde(default)]
    pub conditions: Conditions,
}
