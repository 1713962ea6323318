//! Subnet CRD

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::ResourceSpec;
use crate::conditions::Conditions;

/// Subnet CRD
///
/// `vpcId` is usually left empty and filled through a reference to a Vpc's `status.vpcId`.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cloudops.microscaler.io",
    version = "v1alpha1",
    kind = "Subnet",
    namespaced,
    status = "SubnetStatus",
    printcolumn = r#"{"name":"CIDR","type":"string","jsonPath":".spec.cidrBlock"}"#,
    printcolumn = r#"{"name":"Zone","type":"string","jsonPath":".spec.availabilityZone"}"#,
    printcolumn = r#"{"name":"Subnet ID","type":"string","jsonPath":".status.subnetId"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    
    /// IPv4 CIDR block inside the VPC range
    pub cidr_block: String,
    
    /// Availability zone (e.g., "us-west-2a")
    pub availability_zone: String,
    
    /// Owning VPC identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
}

/// Status of Subnet
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubnetStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    
    #[serde(default)]
    pub conditions: Conditions,
}
