//! # Resource Manager Client
//!
//! Thin authenticated HTTP layer over the API Management REST surface.
//! Every request carries a fresh bearer token and the pinned `api-version`;
//! non-success responses are classified into [`GatewayError`].

use crate::config::ApimTarget;
use crate::constants::{APIM_API_VERSION, ARM_TOKEN_SCOPE};
use crate::provider::{GatewayError, GatewayResult};
use azure_core::credentials::{TokenCredential, TokenRequestOptions};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Error envelope returned by Resource Manager
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Authenticated client bound to one APIM service instance
pub struct ArmClient {
    http: reqwest::Client,
    base_url: String,
    credential: Arc<dyn TokenCredential>,
    api_version: String,
}

impl std::fmt::Debug for ArmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmClient")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl ArmClient {
    /// Create a client for `target` rooted at `endpoint`
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(
        endpoint: &str,
        target: &ApimTarget,
        credential: Arc<dyn TokenCredential>,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transient(format!("failed to build HTTP client: {e}")))?;

        let base_url = format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ApiManagement/service/{}",
            endpoint.trim_end_matches('/'),
            target.subscription_id,
            target.resource_group,
            target.service_name
        );

        Ok(Self {
            http,
            base_url,
            credential,
            api_version: APIM_API_VERSION.to_string(),
        })
    }

    /// Absolute URL of a service-relative path, with the pinned `api-version`
    #[must_use]
    pub fn resource_url(&self, path: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.base_url,
            path.trim_start_matches('/'),
            self.api_version
        )
    }

    async fn bearer_token(&self) -> GatewayResult<String> {
        let token_response = self
            .credential
            .get_token(&[ARM_TOKEN_SCOPE], Some(TokenRequestOptions::default()))
            .await
            .map_err(|e| GatewayError::Credential(e.to_string()))?;
        Ok(token_response.token.secret().to_string())
    }

    /// Issue a request and return the raw response, whatever its status
    ///
    /// Connection failures and timeouts are transient.
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        if_match: Option<&str>,
    ) -> GatewayResult<Response> {
        let token = self.bearer_token().await?;

        debug!(method = %method, url = %url, "APIM request");
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(etag) = if_match {
            request = request.header("If-Match", etag);
        }

        request
            .send()
            .await
            .map_err(|e| GatewayError::Transient(format!("request to {url} failed: {e}")))
    }

    /// Issue a request and fail on any non-success status
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&serde_json::Value>,
        if_match: Option<&str>,
    ) -> GatewayResult<Response> {
        let response = self.execute(method, url, body, if_match).await?;
        check_status(response).await
    }
}

/// Pass success responses through; convert everything else to a [`GatewayError`]
pub async fn check_status(response: Response) -> GatewayResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    Err(error_from_response(response).await)
}

/// Classify a failed response, using the error envelope when present
pub async fn error_from_response(response: Response) -> GatewayError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return GatewayError::NotFound;
    }

    let text = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&text) {
        Ok(ErrorEnvelope {
            error: Some(ErrorBody { code, message }),
        }) => (code, message),
        _ if text.is_empty() => (None, None),
        _ => (None, Some(text)),
    };
    GatewayError::from_status(status.as_u16(), code, message)
}

/// Decode a JSON body
pub async fn decode<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| GatewayError::Transient(format!("failed to read response body: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
}

/// Read the `ETag` response header, if any
#[must_use]
pub fn etag_of(response: &Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::ETAG)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::azure::MockTokenCredential;

    #[test]
    fn test_resource_url_is_service_scoped() {
        let target = ApimTarget {
            subscription_id: "sub-1".to_string(),
            resource_group: "rg-apis".to_string(),
            service_name: "apim-prod".to_string(),
        };
        let client = ArmClient::new(
            "https://management.azure.com/",
            &target,
            Arc::new(MockTokenCredential),
            Duration::from_secs(5),
        )
        .expect("client");

        assert_eq!(
            client.resource_url("/apis/team-orders"),
            "https://management.azure.com/subscriptions/sub-1/resourceGroups/rg-apis/providers/Microsoft.ApiManagement/service/apim-prod/apis/team-orders?api-version=2022-08-01"
        );
    }
}
