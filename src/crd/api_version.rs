//! # ApiVersion
//!
//! One version of an API inside a version set. Usually created and kept in
//! sync by the owning `Api`; its own status tracks the long-running apply.

use super::{ApiType, ContentFormat, Contact, OperationState, PolicyFormat, Protocol, VersioningScheme};
use serde::{Deserialize, Serialize};

/// ApiVersion Custom Resource Definition
#[derive(
    kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "ApiVersion",
    group = "apim.azure.stilas.418.cloud",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::ApiVersionStatus",
    shortname = "apimver",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.provisioningState"}, {"name":"Version", "type":"string", "jsonPath":".spec.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersionSpec {
    /// Remote ID of the version set this version belongs to
    #[serde(default)]
    pub api_version_set_id: String,
    #[serde(default)]
    pub api_version_scheme: VersioningScheme,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_type: Option<ApiType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(flatten)]
    pub version: ApiVersionSubSpec,
}

/// Per-version settings, declared inline on an `Api` or flattened into an `ApiVersion`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersionSubSpec {
    /// Version specifier; absent or empty means `default`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Backend URL requests are forwarded to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    /// Product IDs the version is published in
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<String>,
    /// Defaults to `openapi+json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_format: Option<ContentFormat>,
    /// Inline definition, or its URL for `*-link` formats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_required: Option<bool>,
    /// Defaults to `[https]`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<Protocol>,
    /// Defaults to `true`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_current: Option<bool>,
    #[serde(default, rename = "policies", skip_serializing_if = "Option::is_none")]
    pub policy: Option<ApiPolicySpec>,
}

/// Policy document attached to an API version
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiPolicySpec {
    /// Policy XML, or its URL for `*-link` formats
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_content: Option<String>,
    /// Defaults to `xml`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_format: Option<PolicyFormat>,
}

/// Status of the ApiVersion resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiVersionStatus {
    #[serde(flatten)]
    pub operation: OperationState,
    /// Digest of the policy last applied successfully
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_applied_policy_sha: Option<String>,
}
