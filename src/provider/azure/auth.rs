//! # Azure Credentials
//!
//! Builds the `TokenCredential` used to authorize Resource Manager calls.
//!
//! - Workload Identity when `AZURE_CLIENT_ID` is configured
//! - Managed Identity otherwise (AKS, App Service, VMs)
//! - A static mock token in Pact mode

use crate::config::ApimConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use azure_core::credentials::{AccessToken, Secret, TokenCredential, TokenRequestOptions};
use azure_identity::{ManagedIdentityCredential, WorkloadIdentityCredential};
use std::sync::Arc;
use tracing::{debug, info};

/// Mock TokenCredential for Pact testing
/// Returns a dummy token without attempting real Azure authentication
#[derive(Debug, Default)]
pub struct MockTokenCredential;

#[async_trait]
impl TokenCredential for MockTokenCredential {
    async fn get_token(
        &self,
        _scopes: &[&str],
        _options: Option<TokenRequestOptions<'_>>,
    ) -> azure_core::Result<AccessToken> {
        use typespec_client_core::time::{Duration, OffsetDateTime};

        Ok(AccessToken::new(
            Secret::new("test-token".to_string()),
            OffsetDateTime::now_utc() + Duration::seconds(3600),
        ))
    }
}

/// Select and construct the credential for this process
///
/// # Errors
/// Returns an error if the identity credential cannot be constructed
pub fn build_credential(config: &ApimConfig) -> Result<Arc<dyn TokenCredential>> {
    if config.pact_mode {
        debug!("Pact mode: using mock Azure credential");
        return Ok(Arc::new(MockTokenCredential));
    }

    match &config.client_id {
        Some(client_id) => {
            info!(
                "Using Azure Workload Identity authentication with client ID: {}",
                client_id
            );
            let options = azure_identity::WorkloadIdentityCredentialOptions {
                client_id: Some(client_id.clone()),
                ..Default::default()
            };
            let credential = WorkloadIdentityCredential::new(Some(options))
                .context("Failed to create WorkloadIdentityCredential")?;
            Ok(credential)
        }
        None => {
            info!("AZURE_CLIENT_ID not set, using Managed Identity");
            let credential = ManagedIdentityCredential::new(None)
                .context("Failed to create ManagedIdentityCredential")?;
            Ok(credential)
        }
    }
}
