//! # Backend
//!
//! An APIM backend: a named upstream URL with TLS validation settings.

use super::ProvisioningState;
use serde::{Deserialize, Serialize};

/// Backend Custom Resource Definition
#[derive(
    kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "Backend",
    group = "apim.azure.stilas.418.cloud",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::BackendStatus",
    shortname = "apimbe",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.provisioningState"}, {"name":"URL", "type":"string", "jsonPath":".spec.url"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct BackendSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Runtime URL of the backend
    pub url: String,
    /// Validate the server certificate chain (Azure default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_certificate_chain: Option<bool>,
    /// Validate the server certificate name (Azure default: true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_certificate_name: Option<bool>,
}

/// Status of the Backend resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatus {
    #[serde(default, rename = "backendID", skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
}
