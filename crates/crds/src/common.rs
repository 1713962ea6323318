//! Types shared by every managed resource spec

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::references::AttributeReference;

/// Reference to the ProviderConfig holding region and credentials
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReference {
    /// Name of the ProviderConfig
    pub name: String,
    
    /// Namespace of the ProviderConfig (defaults to the managed resource's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ProviderReference {
    /// Reference to a ProviderConfig in the resource's own namespace
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: None,
        }
    }
}

/// Target Secret for published connection details
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Secret name
    pub name: String,
    
    /// Secret namespace (defaults to the managed resource's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Key within a Secret
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// Secret name
    pub name: String,
    
    /// Secret namespace (defaults to the ProviderConfig's namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    
    /// Key holding the credentials blob
    pub key: String,
}

/// What happens to the external resource when the managed resource is deleted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
pub enum ReclaimPolicy {
    /// Delete the external resource
    #[default]
    #[serde(alias = "delete")]
    Delete,
    /// Leave the external resource in place
    #[serde(alias = "retain")]
    Retain,
}

/// Envelope fields every managed resource spec carries (flattened into the kind's spec)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSpec {
    /// ProviderConfig used to talk to the cloud provider
    pub provider_ref: ProviderReference,
    
    /// Secret that receives connection details once the resource is available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_ref: Option<SecretReference>,
    
    /// Reclaim policy (Delete or Retain)
    #[serde(default)]
    pub reclaim_policy: ReclaimPolicy,
    
    /// Spec fields filled from attributes of other managed resources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<AttributeReference>,
}

impl ResourceSpec {
    /// Envelope pointing at the given ProviderConfig with default policy and no references
    pub fn with_provider(name: &str) -> Self {
        Self {
            provider_ref: ProviderReference::new(name),
            write_connection_secret_to_ref: None,
            reclaim_policy: ReclaimPolicy::Delete,
            references: Vec::new(),
        }
    }
}
