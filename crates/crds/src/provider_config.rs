//! ProviderConfig CRD
//!
//! Names the region and the Secret key holding provider credentials. Managed
//! resources point at a ProviderConfig through `spec.providerRef`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::common::SecretKeySelector;

/// ProviderConfig CRD
///
/// Credentials are read from `credentialsSecretRef` every time a managed resource
/// connects, so rotating the Secret takes effect on the next reconcile pass.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "cloudops.microscaler.io",
    version = "v1alpha1",
    kind = "ProviderConfig",
    namespaced,
    status = "ProviderConfigStatus",
    shortname = "pc",
    printcolumn = r#"{"name":"Region","type":"string","jsonPath":".spec.region"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigSpec {
    /// Cloud region (e.g., "us-west-2")
    pub region: String,
    
    /// Secret key holding the credentials blob
    pub credentials_secret_ref: SecretKeySelector,
}

/// Status of ProviderConfig
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigStatus {
    /// Number of managed resources last seen using this config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<i64>,
}
