//! SecurityGroup CRD

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::ResourceSpec;
use crate::conditions::Conditions;

/// SecurityGroup CRD
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cloudops.microscaler.io",
    version = "v1alpha1",
    kind = "SecurityGroup",
    namespaced,
    status = "SecurityGroupStatus",
    shortname = "sg",
    printcolumn = r#"{"name":"Group","type":"string","jsonPath":".spec.groupName"}"#,
    printcolumn = r#"{"name":"ID","type":"string","jsonPath":".status.securityGroupId"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    
    /// Group name, unique within the VPC
    pub group_name: String,
    
    /// Free-form description
    pub description: String,
    
    /// Owning VPC identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
}

/// Status of SecurityGroup
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
    
    #[serde(default)]
    pub conditions: Conditions,
}
