//! # ProductApi
//!
//! A product-scoped API. When `apiVersion` is set, a `ProductApiVersion`
//! with the same name is created to own the version set, and its remote ID is
//! propagated back through an annotation.

use super::{ApiType, ContentFormat, Contact, OperationState, VersioningScheme};
use serde::{Deserialize, Serialize};

/// ProductApi Custom Resource Definition
#[derive(
    kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "ProductApi",
    group = "apim.azure.stilas.418.cloud",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::ProductApiStatus",
    shortname = "apimpa",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.provisioningState"}, {"name":"Version", "type":"string", "jsonPath":".spec.apiVersion"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProductApiSpec {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, rename = "serviceURL", skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    pub path: String,
    /// Product IDs the API is published in
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<String>,
    /// Version specifier; empty means the API is not versioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Versioning scheme of the product version set
    #[serde(default)]
    pub versioning_scheme: VersioningScheme,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_type: Option<ApiType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_format: Option<ContentFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_required: Option<bool>,
}

/// Status of the ProductApi resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductApiStatus {
    #[serde(flatten)]
    pub operation: OperationState,
}
