//! InternetGateway CRD
//!
//! Custom Resource Definition for an internet gateway attached to one VPC.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::ResourceSpec;
use crate::conditions::Conditions;

/// InternetGateway CRD
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cloudops.microscaler.io",
    version = "v1alpha1",
    kind = "InternetGateway",
    namespaced,
    status = "InternetGatewayStatus",
    printcolumn = r#"{"name":"VPC","type":"string","jsonPath":".status.attachedVpcId"}"#,
    printcolumn = r#"{"name":"Gateway ID","type":"string","jsonPath":".status.internetGatewayId"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InternetGatewaySpec {
    #[serde(flatten)]
    pub resource: ResourceSpec,
    
    /// VPC the gateway is attached to; usually resolved from a Vpc reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,
}

/// Status of InternetGateway
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InternetGatewayStatus {
    /// Provider-assigned gateway identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internet_gateway_id: Option<String>,
    
    /// VPC the gateway is currently attached to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_vpc_id: Option<String>,
    
    #[serde(default)]
    pub conditions: Conditions,
}
