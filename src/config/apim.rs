//! # APIM Target Configuration
//!
//! Identifies the API Management service instance all reconcilers write to.
//! Read once at startup; a missing value disables remote calls without
//! stopping the controller.

use super::{env_var_non_empty, env_var_or_default_bool};
use thiserror::Error;

/// Raw APIM settings as found in the environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApimConfig {
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub service_name: Option<String>,
    /// Overrides the Resource Manager endpoint (Pact mock servers, sovereign clouds)
    pub endpoint: Option<String>,
    /// Client ID for Workload Identity; Managed Identity is used when unset
    pub client_id: Option<String>,
    /// Route calls to a Pact mock server with a mock credential
    pub pact_mode: bool,
}

/// A fully specified APIM service instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApimTarget {
    pub subscription_id: String,
    pub resource_group: String,
    pub service_name: String,
}

/// One or more required APIM settings are absent
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("missing APIM configuration: {}", missing.join(", "))]
pub struct MissingConfiguration {
    pub missing: Vec<&'static str>,
}

impl ApimConfig {
    /// Load APIM settings from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            subscription_id: env_var_non_empty("STILAS_AZ_SUBSCRIPTION_ID"),
            resource_group: env_var_non_empty("STILAS_AZ_RESOURCE_GROUP"),
            service_name: env_var_non_empty("STILAS_AZ_APIM_NAME"),
            endpoint: env_var_non_empty("APIM_ENDPOINT"),
            client_id: env_var_non_empty("AZURE_CLIENT_ID"),
            pact_mode: env_var_or_default_bool("PACT_MODE", false),
        }
    }

    /// Resolve the target service instance
    ///
    /// # Errors
    /// Returns every missing variable name when the configuration is incomplete.
    pub fn target(&self) -> Result<ApimTarget, MissingConfiguration> {
        let mut missing = Vec::new();
        if self.subscription_id.is_none() {
            missing.push("STILAS_AZ_SUBSCRIPTION_ID");
        }
        if self.resource_group.is_none() {
            missing.push("STILAS_AZ_RESOURCE_GROUP");
        }
        if self.service_name.is_none() {
            missing.push("STILAS_AZ_APIM_NAME");
        }

        match (&self.subscription_id, &self.resource_group, &self.service_name) {
            (Some(subscription_id), Some(resource_group), Some(service_name)) => Ok(ApimTarget {
                subscription_id: subscription_id.clone(),
                resource_group: resource_group.clone(),
                service_name: service_name.clone(),
            }),
            _ => Err(MissingConfiguration { missing }),
        }
    }
}
