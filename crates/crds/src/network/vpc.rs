//! Vpc CRD
//!
//! Custom Resource Definition for a virtual private network.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::ResourceSpec;
use crate::conditions::Conditions;

/// Vpc CRD
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cloudops.microscaler.io",
    version = "v1alpha1",
    kind = "Vpc",
    namespaced,
    status = "VpcStatus",
    printcolumn = r#"{"name":"CIDR","type":"string","jsonPath":".spec.cidrBlock"}"#,
    printcolumn = r#"{"name":"VPC ID","type":"string","jsonPath":".status.vpcId"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct VpcSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    
    /// IPv4 CIDR block (e.g., "10.0.0.0/16")
    pub cidr_block: String,
    
    /// Whether provider DNS resolution is enabled inside the VPC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_dns_support: Option<bool>,
}

/// Status of Vpc
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VpcStatus {
    /// Provider-assigned VPC identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
    
    /// Provider-reported state (e.g., "available", "pending")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    
    #[serde(default)]
    pub conditions: Conditions,
}
