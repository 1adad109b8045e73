//! # Payloads
//!
//! Builds gateway contracts from desired records. Defaults for optional
//! fields are applied here and nowhere else.

use super::naming::remote_version_label;
use crate::constants::{DEFAULT_VERSION_HEADER_NAME, DEFAULT_VERSION_QUERY_NAME};
use crate::crd::{
    ApiPolicySpec, ApiSpec, ApiType, ApiVersionSpec, BackendSpec, Contact, ContentFormat,
    PolicyFormat, ProductApiSpec, ProductApiVersionSpec, Protocol, VersioningScheme,
};
use crate::provider::{
    ApiContract, ApiProperties, BackendContract, BackendProperties, BackendTls, ContactContract,
    PolicyContract, PolicyProperties, VersionSetContract, VersionSetProperties,
};

#[must_use]
pub fn effective_content_format(format: Option<ContentFormat>) -> ContentFormat {
    format.unwrap_or_default()
}

#[must_use]
pub fn effective_policy_format(format: Option<PolicyFormat>) -> PolicyFormat {
    format.unwrap_or_default()
}

#[must_use]
pub fn effective_protocols(protocols: &[Protocol]) -> Vec<String> {
    if protocols.is_empty() {
        vec![Protocol::Https.as_str().to_string()]
    } else {
        protocols.iter().map(|p| p.as_str().to_string()).collect()
    }
}

#[must_use]
pub fn effective_is_current(is_current: Option<bool>) -> bool {
    is_current.unwrap_or(true)
}

fn contact_contract(contact: Option<&Contact>) -> Option<ContactContract> {
    contact.map(|c| ContactContract {
        name: c.name.clone(),
        email: c.email.clone(),
        url: c.url.clone(),
    })
}

fn version_set_properties(
    display_name: &str,
    description: Option<&str>,
    scheme: VersioningScheme,
) -> VersionSetProperties {
    VersionSetProperties {
        display_name: display_name.to_string(),
        description: description.map(str::to_string),
        versioning_scheme: scheme.as_str().to_string(),
        version_header_name: (scheme == VersioningScheme::Header)
            .then(|| DEFAULT_VERSION_HEADER_NAME.to_string()),
        version_query_name: (scheme == VersioningScheme::Query)
            .then(|| DEFAULT_VERSION_QUERY_NAME.to_string()),
    }
}

/// Version set behind an `Api`
#[must_use]
pub fn api_version_set(spec: &ApiSpec) -> VersionSetContract {
    VersionSetContract {
        properties: version_set_properties(
            &spec.display_name,
            spec.description.as_deref(),
            spec.versioning_scheme,
        ),
        ..Default::default()
    }
}

/// Version set behind a `ProductApiVersion`
#[must_use]
pub fn product_version_set(spec: &ProductApiVersionSpec) -> VersionSetContract {
    VersionSetContract {
        properties: version_set_properties(
            &spec.name,
            spec.description.as_deref(),
            spec.versioning_scheme,
        ),
        ..Default::default()
    }
}

/// Desired `ApiVersion` record the parent `Api` derives for one version
#[must_use]
pub fn derived_api_version(
    parent: &ApiSpec,
    version_set_id: &str,
    version: &crate::crd::ApiVersionSubSpec,
) -> ApiVersionSpec {
    ApiVersionSpec {
        api_version_set_id: version_set_id.to_string(),
        api_version_scheme: parent.versioning_scheme,
        path: parent.path.clone(),
        api_type: parent.api_type,
        contact: parent.contact.clone(),
        version: version.clone(),
    }
}

/// API create-or-update payload for an `ApiVersion`
#[must_use]
pub fn api_version_contract(spec: &ApiVersionSpec) -> ApiContract {
    let version = &spec.version;
    let version_set_id = Some(spec.api_version_set_id.clone()).filter(|id| !id.is_empty());
    ApiContract {
        properties: ApiProperties {
            display_name: Some(version.display_name.clone()),
            description: version.description.clone(),
            path: spec.path.clone(),
            service_url: version.service_url.clone(),
            protocols: effective_protocols(&version.protocols),
            api_type: spec.api_type.map(|t| ApiType::as_str(&t).to_string()),
            api_version: remote_version_label(version.name.as_deref()),
            api_version_set_id: version_set_id,
            is_current: Some(effective_is_current(version.is_current)),
            subscription_required: version.subscription_required,
            contact: contact_contract(spec.contact.as_ref()),
            format: Some(
                effective_content_format(version.content_format)
                    .as_str()
                    .to_string(),
            ),
            value: version.content.clone(),
            provisioning_state: None,
        },
        ..Default::default()
    }
}

/// API create-or-update payload for a `ProductApi`
///
/// `version_set_id` is the version set propagated by the product version, if any.
#[must_use]
pub fn product_api_contract(spec: &ProductApiSpec, version_set_id: Option<&str>) -> ApiContract {
    ApiContract {
        properties: ApiProperties {
            display_name: Some(spec.display_name.clone()),
            description: spec.description.clone(),
            path: spec.path.clone(),
            service_url: spec.service_url.clone(),
            protocols: effective_protocols(&[]),
            api_type: spec.api_type.map(|t| ApiType::as_str(&t).to_string()),
            api_version: version_set_id
                .and_then(|_| remote_version_label(spec.api_version.as_deref())),
            api_version_set_id: version_set_id.map(str::to_string),
            is_current: None,
            subscription_required: spec.subscription_required,
            contact: contact_contract(spec.contact.as_ref()),
            format: Some(
                effective_content_format(spec.content_format)
                    .as_str()
                    .to_string(),
            ),
            value: spec.content.clone(),
            provisioning_state: None,
        },
        ..Default::default()
    }
}

/// Policy payload; `None` when no policy content is declared
#[must_use]
pub fn policy_contract(policy: Option<&ApiPolicySpec>) -> Option<PolicyContract> {
    let policy = policy?;
    let content = policy.policy_content.as_ref().filter(|c| !c.is_empty())?;
    Some(PolicyContract {
        id: None,
        properties: PolicyProperties {
            value: content.clone(),
            format: Some(
                effective_policy_format(policy.policy_format)
                    .as_str()
                    .to_string(),
            ),
        },
    })
}

/// Backend create-or-update payload
#[must_use]
pub fn backend_contract(spec: &BackendSpec) -> BackendContract {
    let tls = (spec.validate_certificate_chain.is_some()
        || spec.validate_certificate_name.is_some())
    .then(|| BackendTls {
        validate_certificate_chain: spec.validate_certificate_chain,
        validate_certificate_name: spec.validate_certificate_name,
    });
    BackendContract {
        properties: BackendProperties {
            title: spec.title.clone(),
            description: spec.description.clone(),
            url: spec.url.clone(),
            protocol: "http".to_string(),
            tls,
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::ApiVersionSubSpec;

    fn version_spec(name: Option<&str>) -> ApiVersionSpec {
        ApiVersionSpec {
            api_version_set_id: "/apiVersionSets/team-orders".to_string(),
            path: "orders".to_string(),
            version: ApiVersionSubSpec {
                name: name.map(str::to_string),
                display_name: "Orders".to_string(),
                content: Some("{}".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_api_payload_applies_defaults() {
        let contract = api_version_contract(&version_spec(None));
        let props = &contract.properties;
        assert_eq!(props.protocols, vec!["https".to_string()]);
        assert_eq!(props.format.as_deref(), Some("openapi+json"));
        assert_eq!(props.is_current, Some(true));
        assert_eq!(props.api_version, None);
        assert_eq!(
            props.api_version_set_id.as_deref(),
            Some("/apiVersionSets/team-orders")
        );
    }

    #[test]
    fn test_named_version_is_labelled() {
        let contract = api_version_contract(&version_spec(Some("v2")));
        assert_eq!(contract.properties.api_version.as_deref(), Some("v2"));
    }

    #[test]
    fn test_explicit_default_name_is_labelled() {
        let contract = api_version_contract(&version_spec(Some("default")));
        assert_eq!(contract.properties.api_version.as_deref(), Some("default"));
    }

    #[test]
    fn test_header_scheme_sets_header_name() {
        let spec = ApiSpec {
            display_name: "Orders API".to_string(),
            versioning_scheme: VersioningScheme::Header,
            path: "orders".to_string(),
            ..Default::default()
        };
        let set = api_version_set(&spec);
        assert_eq!(set.properties.versioning_scheme, "Header");
        assert_eq!(set.properties.version_header_name.as_deref(), Some("Api-Version"));
        assert_eq!(set.properties.version_query_name, None);
    }

    #[test]
    fn test_policy_requires_content() {
        assert!(policy_contract(None).is_none());
        assert!(policy_contract(Some(&ApiPolicySpec::default())).is_none());

        let policy = policy_contract(Some(&ApiPolicySpec {
            policy_content: Some("<policies/>".to_string()),
            policy_format: None,
        }))
        .expect("policy");
        assert_eq!(policy.properties.format.as_deref(), Some("xml"));
    }

    #[test]
    fn test_unversioned_product_api_has_no_label() {
        let spec = ProductApiSpec {
            display_name: "Catalog".to_string(),
            path: "catalog".to_string(),
            api_version: Some("v1".to_string()),
            ..Default::default()
        };
        assert_eq!(product_api_contract(&spec, None).properties.api_version, None);
        assert_eq!(
            product_api_contract(&spec, Some("/vs/1"))
                .properties
                .api_version
                .as_deref(),
            Some("v1")
        );
    }
}
