//! # Shared CRD Types
//!
//! Enumerations and nested structures shared by several kinds, plus the
//! operation-tracking status block used by every kind that drives a
//! long-running Azure operation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How clients select an API version within a version set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum VersioningScheme {
    /// Version carried in a request header
    Header,
    /// Version carried in a query parameter
    Query,
    /// Version carried as a path segment
    #[default]
    Segment,
}

impl VersioningScheme {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            VersioningScheme::Header => "Header",
            VersioningScheme::Query => "Query",
            VersioningScheme::Segment => "Segment",
        }
    }
}

/// Protocol family of an API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    Graphql,
    Http,
    Websocket,
}

impl ApiType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiType::Graphql => "graphql",
            ApiType::Http => "http",
            ApiType::Websocket => "websocket",
        }
    }
}

/// Format of an API definition
///
/// `*-link` formats carry a URL that Azure downloads; the remaining formats
/// carry the definition inline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ContentFormat {
    #[serde(rename = "graphql-link")]
    GraphqlLink,
    #[serde(rename = "openapi")]
    Openapi,
    #[default]
    #[serde(rename = "openapi+json")]
    OpenapiJson,
    #[serde(rename = "openapi+json-link")]
    OpenapiJsonLink,
    #[serde(rename = "openapi-link")]
    OpenapiLink,
    #[serde(rename = "swagger-json")]
    SwaggerJson,
    #[serde(rename = "swagger-link-json")]
    SwaggerLinkJson,
    #[serde(rename = "wadl-link-json")]
    WadlLinkJson,
    #[serde(rename = "wadl-xml")]
    WadlXml,
}

impl ContentFormat {
    /// Wire value understood by Azure API Management
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFormat::GraphqlLink => "graphql-link",
            ContentFormat::Openapi => "openapi",
            ContentFormat::OpenapiJson => "openapi+json",
            ContentFormat::OpenapiJsonLink => "openapi+json-link",
            ContentFormat::OpenapiLink => "openapi-link",
            ContentFormat::SwaggerJson => "swagger-json",
            ContentFormat::SwaggerLinkJson => "swagger-link-json",
            ContentFormat::WadlLinkJson => "wadl-link-json",
            ContentFormat::WadlXml => "wadl-xml",
        }
    }

    /// Whether the content is a URL to remotely hosted bytes
    #[must_use]
    pub fn is_link(&self) -> bool {
        matches!(
            self,
            ContentFormat::GraphqlLink
                | ContentFormat::OpenapiJsonLink
                | ContentFormat::OpenapiLink
                | ContentFormat::SwaggerLinkJson
                | ContentFormat::WadlLinkJson
        )
    }
}

/// Transport protocol accepted by an API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
    Ws,
    Wss,
}

impl Protocol {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
            Protocol::Ws => "ws",
            Protocol::Wss => "wss",
        }
    }
}

/// Format of an API policy document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum PolicyFormat {
    #[default]
    #[serde(rename = "xml")]
    Xml,
    #[serde(rename = "xml-link")]
    XmlLink,
    #[serde(rename = "rawxml")]
    RawXml,
    #[serde(rename = "rawxml-link")]
    RawXmlLink,
}

impl PolicyFormat {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyFormat::Xml => "xml",
            PolicyFormat::XmlLink => "xml-link",
            PolicyFormat::RawXml => "rawxml",
            PolicyFormat::RawXmlLink => "rawxml-link",
        }
    }

    #[must_use]
    pub fn is_link(&self) -> bool {
        matches!(self, PolicyFormat::XmlLink | PolicyFormat::RawXmlLink)
    }
}

/// Contact information published with an API
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// User-visible provisioning state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ProvisioningState {
    Provisioning,
    Succeeded,
    Failed,
}

impl ProvisioningState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisioningState::Provisioning => "Provisioning",
            ProvisioningState::Succeeded => "Succeeded",
            ProvisioningState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracking block for kinds whose remote apply is a long-running operation
///
/// `poller_token` is present exactly when `provisioning_state` is
/// `Provisioning`; the transition methods below are the only writers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,
    /// Resume token of the in-flight operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poller_token: Option<String>,
    /// Digest of the content submitted by the in-flight operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_spec_sha: Option<String>,
    /// Digest of the content last applied successfully
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_applied_spec_sha: Option<String>,
}

impl OperationState {
    /// Resume token of an in-flight operation, ignoring empty strings
    #[must_use]
    pub fn resume_token(&self) -> Option<&str> {
        self.poller_token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn mark_in_progress(&mut self, token: String, pending_spec_sha: String) {
        self.provisioning_state = Some(ProvisioningState::Provisioning);
        self.poller_token = Some(token);
        self.pending_spec_sha = Some(pending_spec_sha);
    }

    pub fn mark_succeeded(&mut self, applied_spec_sha: String) {
        self.provisioning_state = Some(ProvisioningState::Succeeded);
        self.poller_token = None;
        self.pending_spec_sha = None;
        self.last_applied_spec_sha = Some(applied_spec_sha);
    }

    pub fn mark_failed(&mut self) {
        self.provisioning_state = Some(ProvisioningState::Failed);
        self.poller_token = None;
        self.pending_spec_sha = None;
    }
}
