//! IamRole CRD

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::ResourceSpec;
use crate::conditions::Conditions;

/// IamRole CRD
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cloudops.microscaler.io",
    version = "v1alpha1",
    kind = "IamRole",
    namespaced,
    status = "IamRoleStatus",
    printcolumn = r#"{"name":"Role","type":"string","jsonPath":".spec.roleName"}"#,
    printcolumn = r#"{"name":"ARN","type":"string","jsonPath":".status.roleArn"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct IamRoleSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    
    /// Role name
    pub role_name: String,
    
    /// JSON trust policy document
    pub assume_role_policy_document: String,
    
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Status of IamRole
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IamRoleStatus {
    /// Role ARN, the attribute other resources reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,
    
    /// Provider-assigned stable role identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<String>,
    
    #[serde(default)]
    pub conditions: Conditions,
}
