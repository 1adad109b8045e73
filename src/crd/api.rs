//! # Api
//!
//! An API version set and the versions it owns. Each entry of `versions`
//! becomes an owned `ApiVersion` record.

use super::{ApiType, ApiVersionSubSpec, Contact, ProvisioningState, VersioningScheme};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Api Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: apim.azure.stilas.418.cloud/v1alpha1
/// kind: Api
/// metadata:
///   name: orders
///   namespace: team
/// spec:
///   displayName: Orders API
///   versioningScheme: Segment
///   path: orders
///   versions:
///     - displayName: Orders v1
///       name: v1
///       contentFormat: openapi+json-link
///       content: https://example.com/orders/v1/openapi.json
/// ```
#[derive(
    kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema,
)]
#[kube(
    kind = "Api",
    group = "apim.azure.stilas.418.cloud",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::ApiStatus",
    shortname = "apimapi",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.provisioningState"}, {"name":"VersionSet", "type":"string", "jsonPath":".status.apiVersionSetID"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ApiSpec {
    /// Display name of the version set
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// How clients select a version
    #[serde(default)]
    pub versioning_scheme: VersioningScheme,
    /// Path segment under the APIM gateway URL, shared by every version
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_type: Option<ApiType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    /// Versions published through this version set
    #[serde(default)]
    pub versions: Vec<ApiVersionSubSpec>,
}

/// Status of the Api resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    /// Remote ID of the version set
    #[serde(
        default,
        rename = "apiVersionSetID",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_version_set_id: Option<String>,
    /// Provisioning state of each owned ApiVersion, keyed by record name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub version_states: BTreeMap<String, ProvisioningState>,
}
