//! # ProductApiVersion
//!
//! The version set behind a versioned `ProductApi`.

use super::{ProvisioningState, VersioningScheme};
use serde::{Deserialize, Serialize};

/// ProductApiVersion Custom Resource Definition
#[derive(
    kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "ProductApiVersion",
    group = "apim.azure.stilas.418.cloud",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::ProductApiVersionStatus",
    shortname = "apimpav",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.provisioningState"}, {"name":"VersionSet", "type":"string", "jsonPath":".status.apiVersionSetID"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProductApiVersionSpec {
    /// Display name of the version set
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub versioning_scheme: VersioningScheme,
}

/// Status of the ProductApiVersion resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductApiVersionStatus {
    #[serde(
        default,
        rename = "apiVersionSetID",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_version_set_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
}
