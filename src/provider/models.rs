//! # APIM Resource Contracts
//!
//! Typed request/response bodies for the API Management resources managed by
//! the controller. Field names follow the Azure Resource Manager JSON shape
//! (`{ "id", "name", "properties": { .. } }`).

use serde::{Deserialize, Serialize};

/// API version set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSetContract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub properties: VersionSetProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSetProperties {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub versioning_scheme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_header_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_query_name: Option<String>,
}

impl VersionSetProperties {
    /// Whether the remote version set needs an update to match `self`
    #[must_use]
    pub fn differs_from(&self, remote: &VersionSetProperties) -> bool {
        self.display_name != remote.display_name
            || non_empty(&self.description) != non_empty(&remote.description)
            || !self.versioning_scheme.eq_ignore_ascii_case(&remote.versioning_scheme)
    }
}

/// API (a single version when part of a version set)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiContract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub properties: ApiProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub api_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version_set_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_current: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactContract>,
    /// Content format; only sent on create/update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Content or content URL; only sent on create/update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

impl ApiProperties {
    /// Whether the remote API's descriptive fields drift from `self`
    ///
    /// Content is tracked by digest, not here. Descriptive fields left unset
    /// on the desired side are not compared; version-set membership always is.
    #[must_use]
    pub fn differs_from(&self, remote: &ApiProperties) -> bool {
        fn drifted<T: PartialEq + ?Sized>(desired: Option<&T>, remote: Option<&T>) -> bool {
            desired.is_some_and(|d| Some(d) != remote)
        }

        self.path.trim_matches('/') != remote.path.trim_matches('/')
            || drifted(non_empty(&self.display_name), non_empty(&remote.display_name))
            || drifted(non_empty(&self.description), non_empty(&remote.description))
            || drifted(non_empty(&self.service_url), non_empty(&remote.service_url))
            || drifted(self.subscription_required.as_ref(), remote.subscription_required.as_ref())
            || drifted(self.is_current.as_ref(), remote.is_current.as_ref())
            || !same_id(non_empty(&self.api_version_set_id), non_empty(&remote.api_version_set_id))
            || non_empty(&self.api_version) != non_empty(&remote.api_version)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactContract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// API policy document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyContract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub properties: PolicyProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyProperties {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Backend upstream
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendContract {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub properties: BackendProperties,
    /// Entity tag from the `ETag` response header
    #[serde(skip)]
    pub etag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub url: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<BackendTls>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendTls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_certificate_chain: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_certificate_name: Option<bool>,
}

impl BackendProperties {
    /// Whether the remote backend needs an update to match `self`
    ///
    /// Unset TLS flags compare equal to `true`, the Azure default.
    #[must_use]
    pub fn differs_from(&self, remote: &BackendProperties) -> bool {
        self.url != remote.url
            || non_empty(&self.title) != non_empty(&remote.title)
            || non_empty(&self.description) != non_empty(&remote.description)
            || self.tls_flags() != remote.tls_flags()
    }

    fn tls_flags(&self) -> (bool, bool) {
        let tls = self.tls.clone().unwrap_or_default();
        (
            tls.validate_certificate_chain.unwrap_or(true),
            tls.validate_certificate_name.unwrap_or(true),
        )
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// ARM resource IDs compare case-insensitively
fn same_id(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_set_comparison_ignores_empty_description_and_scheme_case() {
        let desired = VersionSetProperties {
            display_name: "Orders API".to_string(),
            description: Some(String::new()),
            versioning_scheme: "Segment".to_string(),
            ..Default::default()
        };
        let remote = VersionSetProperties {
            display_name: "Orders API".to_string(),
            description: None,
            versioning_scheme: "segment".to_string(),
            ..Default::default()
        };
        assert!(!desired.differs_from(&remote));

        let renamed = VersionSetProperties {
            display_name: "Orders".to_string(),
            ..remote
        };
        assert!(desired.differs_from(&renamed));
    }

    #[test]
    fn test_backend_comparison_treats_unset_tls_flags_as_enabled() {
        let desired = BackendProperties {
            url: "https://orders.internal".to_string(),
            protocol: "http".to_string(),
            ..Default::default()
        };
        let remote = BackendProperties {
            url: "https://orders.internal".to_string(),
            protocol: "http".to_string(),
            tls: Some(BackendTls {
                validate_certificate_chain: Some(true),
                validate_certificate_name: Some(true),
            }),
            ..Default::default()
        };
        assert!(!desired.differs_from(&remote));

        let moved = BackendProperties {
            url: "https://orders-v2.internal".to_string(),
            ..remote
        };
        assert!(desired.differs_from(&moved));
    }

    #[test]
    fn test_api_drift_ignores_unset_desired_fields() {
        let desired = ApiProperties {
            display_name: Some("Orders v2".to_string()),
            path: "orders".to_string(),
            ..Default::default()
        };
        let remote = ApiProperties {
            display_name: Some("Orders v2".to_string()),
            description: Some("set out of band".to_string()),
            path: "/orders".to_string(),
            ..Default::default()
        };
        assert!(!desired.differs_from(&remote));

        let renamed = ApiProperties {
            display_name: Some("Orders".to_string()),
            ..remote
        };
        assert!(desired.differs_from(&renamed));
    }

    #[test]
    fn test_api_drift_tracks_version_set_membership() {
        let desired = ApiProperties {
            path: "payments".to_string(),
            ..Default::default()
        };
        let versioned = ApiProperties {
            path: "payments".to_string(),
            api_version_set_id: Some("/apiVersionSets/Team-Payments".to_string()),
            api_version: Some("v1".to_string()),
            ..Default::default()
        };
        assert!(desired.differs_from(&versioned));

        let same_set = ApiProperties {
            api_version_set_id: Some("/apiversionsets/team-payments".to_string()),
            api_version: Some("v1".to_string()),
            ..desired.clone()
        };
        assert!(!same_set.differs_from(&versioned));
    }

    #[test]
    fn test_api_contract_serializes_arm_field_names() {
        let contract = ApiContract {
            properties: ApiProperties {
                path: "orders".to_string(),
                api_type: Some("http".to_string()),
                api_version_set_id: Some("/vs/orders".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let json = serde_json::to_value(&contract).unwrap();
        assert_eq!(json["properties"]["type"], "http");
        assert_eq!(json["properties"]["apiVersionSetId"], "/vs/orders");
        assert!(json.get("id").is_none());
    }
}
