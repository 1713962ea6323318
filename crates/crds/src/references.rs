//! Cross-resource attribute references for CloudOps CRDs
//!
//! A managed resource may leave some of its spec fields empty and instead name another
//! managed resource whose published attribute should fill them in (for example a
//! Subnet taking its `vpcId` from the `status.vpcId` of a Vpc).
//! Follows the Kubernetes TypedLocalObjectReference pattern with apiGroup, kind, name,
//! and optional namespace, extended with the two attribute paths that drive resolution.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::API_GROUP;

fn default_api_group() -> String {
    API_GROUP.to_string()
}

/// Reference from one spec field of a managed resource to an attribute of another
///
/// - `sourceField`: dotted camelCase path inside the referencing resource's spec that
///   receives the value (e.g. "vpcId", "subnetIds", "workerNodes.clusterControlPlaneSecurityGroup")
/// - `apiGroup`: API group of the target (defaults to "cloudops.microscaler.io")
/// - `kind`: kind of the target (e.g. "Vpc", "SecurityGroup")
/// - `name`: name of the target (required)
/// - `namespace`: namespace of the target (defaults to the referencing resource's namespace)
/// - `attributePath`: dotted path inside the target object that holds the value
///   (e.g. "status.vpcId")
///
/// When `sourceField` is an array the resolved value is appended, otherwise it is assigned.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeReference {
    /// Spec field that receives the resolved value
    pub source_field: String,
    
    /// API group of the referenced resource
    #[serde(default = "default_api_group")]
    pub api_group: String,
    
    /// Kind of the referenced resource (e.g., "Vpc", "IamRole")
    pub kind: String,
    
    /// Name of the referenced resource
    pub name: String,
    
    /// Namespace of the referenced resource (defaults to same namespace as the referencing resource)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    
    /// Path of the attribute to read from the referenced resource (e.g., "status.vpcId")
    pub attribute_path: String,
}

impl AttributeReference {
    /// Create a reference to a CloudOps resource in the same namespace
    pub fn new(source_field: &str, kind: &str, name: &str, attribute_path: &str) -> Self {
        Self {
            source_field: source_field.to_string(),
            api_group: default_api_group(),
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: None,
            attribute_path: attribute_path.to_string(),
        }
    }
    
    /// Set the namespace of the referenced resource
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }
    
    /// Set the API group of the referenced resource
    pub fn with_api_group(mut self, api_group: &str) -> Self {
        self.api_group = api_group.to_string();
        self
    }
    
    /// Namespace the referenced resource lives in, given the referencing resource's namespace
    pub fn target_namespace<'a>(&'a self, default: &'a str) -> &'a str {
        self.namespace.as_deref().unwrap_or(default)
    }
    
    /// Human readable `kind/namespace/name` used in condition messages and logs
    pub fn describe(&self, default_namespace: &str) -> String {
        format!("{}/{}/{}", self.kind, self.target_namespace(default_namespace), self.name)
    }
}
