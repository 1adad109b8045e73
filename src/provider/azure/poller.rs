//! # Long-Running Operation Poller
//!
//! Resource Manager reports asynchronous work in one of three ways:
//!
//! - `Azure-AsyncOperation` header: poll a status monitor until `Succeeded`
//! - `Location` header: poll until the monitor stops answering `202`
//! - neither: poll the resource itself until `provisioningState` settles
//!
//! The poller keeps only the URLs needed to continue, and serializes them as
//! an opaque resume token (base64 of a JSON [`ContinuationToken`]).

use super::client::{check_status, decode, ArmClient};
use crate::provider::{GatewayError, GatewayResult, OperationPoller, PollState};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// How an operation reports progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PollingKind {
    AsyncOperation,
    Location,
    Body,
}

/// Everything needed to continue polling from another process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuationToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_url: Option<String>,
    pub resource_url: String,
    pub kind: PollingKind,
}

impl ContinuationToken {
    /// Serialize to the opaque token persisted in status
    pub fn encode(&self) -> GatewayResult<String> {
        let json = serde_json::to_vec(self).map_err(|e| GatewayError::Decode(e.to_string()))?;
        Ok(general_purpose::STANDARD.encode(json))
    }

    /// Parse a token produced by [`ContinuationToken::encode`]
    pub fn decode(token: &str) -> GatewayResult<Self> {
        let bytes = general_purpose::STANDARD
            .decode(token.trim())
            .map_err(|e| GatewayError::InvalidResumeToken(e.to_string()))?;
        let parsed: Self = serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::InvalidResumeToken(e.to_string()))?;
        if parsed.kind != PollingKind::Body && parsed.operation_url.is_none() {
            return Err(GatewayError::InvalidResumeToken(
                "operation URL missing for header-based polling".to_string(),
            ));
        }
        Ok(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<OperationErrorBody>,
}

#[derive(Debug, Deserialize)]
struct OperationErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Map a terminal or intermediate status string
fn classify(status: &str, detail: Option<String>) -> PollState {
    match status {
        "Succeeded" => PollState::Succeeded,
        "Failed" | "Canceled" | "Cancelled" => {
            PollState::Failed(detail.unwrap_or_else(|| format!("operation {status}")))
        }
        _ => PollState::InProgress,
    }
}

/// Poller for a single APIM long-running create-or-update
pub struct ArmPoller<T> {
    client: Arc<ArmClient>,
    token: ContinuationToken,
    state: Option<PollState>,
    body: Option<T>,
}

impl<T> std::fmt::Debug for ArmPoller<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArmPoller")
            .field("token", &self.token)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<T> ArmPoller<T> {
    /// Continue an operation identified by `token`
    #[must_use]
    pub fn resume(client: Arc<ArmClient>, token: ContinuationToken) -> Self {
        Self {
            client,
            token,
            state: None,
            body: None,
        }
    }

    /// An operation that finished within the initial request
    #[must_use]
    pub fn completed(client: Arc<ArmClient>, resource_url: String, body: Option<T>) -> Self {
        Self {
            client,
            token: ContinuationToken {
                operation_url: None,
                resource_url,
                kind: PollingKind::Body,
            },
            state: Some(PollState::Succeeded),
            body,
        }
    }
}

impl<T> ArmPoller<T>
where
    T: DeserializeOwned + Send,
{
    async fn poll_async_operation(&mut self, url: &str) -> GatewayResult<PollState> {
        let response = self.client.send(Method::GET, url, None, None).await?;
        let status: OperationStatus = decode(response).await?;
        let detail = status.error.map(|e| {
            format!(
                "{}: {}",
                e.code.unwrap_or_else(|| "Unknown".to_string()),
                e.message.unwrap_or_default()
            )
        });
        Ok(classify(&status.status, detail))
    }

    async fn poll_location(&mut self, url: &str) -> GatewayResult<PollState> {
        let response = self.client.execute(Method::GET, url, None, None).await?;
        if response.status() == StatusCode::ACCEPTED {
            return Ok(PollState::InProgress);
        }
        let response = check_status(response).await?;
        if response.status() != StatusCode::NO_CONTENT {
            // The monitor may answer with the final resource; otherwise
            // `result()` reads it from the resource URL.
            if let Ok(body) = decode::<T>(response).await {
                self.body = Some(body);
            }
        }
        Ok(PollState::Succeeded)
    }

    async fn poll_resource(&mut self) -> GatewayResult<PollState> {
        let response = self
            .client
            .send(Method::GET, &self.token.resource_url, None, None)
            .await?;
        let raw: serde_json::Value = decode(response).await?;
        let provisioning_state = raw
            .pointer("/properties/provisioningState")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("Succeeded")
            .to_string();
        let state = classify(&provisioning_state, None);
        if state == PollState::Succeeded {
            self.body =
                Some(serde_json::from_value(raw).map_err(|e| GatewayError::Decode(e.to_string()))?);
        }
        Ok(state)
    }
}

#[async_trait]
impl<T> OperationPoller<T> for ArmPoller<T>
where
    T: DeserializeOwned + Send + Sync,
{
    async fn poll(&mut self) -> GatewayResult<PollState> {
        if let Some(state) = self.state.clone().filter(|s| *s != PollState::InProgress) {
            return Ok(state);
        }

        let state = match (self.token.kind, self.token.operation_url.clone()) {
            (PollingKind::AsyncOperation, Some(url)) => self.poll_async_operation(&url).await?,
            (PollingKind::Location, Some(url)) => self.poll_location(&url).await?,
            _ => self.poll_resource().await?,
        };
        debug!(kind = ?self.token.kind, state = ?state, "Polled APIM operation");
        self.state = Some(state.clone());
        Ok(state)
    }

    fn is_done(&self) -> bool {
        matches!(
            self.state,
            Some(PollState::Succeeded | PollState::Failed(_))
        )
    }

    async fn result(&mut self) -> GatewayResult<T> {
        match &self.state {
            Some(PollState::Failed(reason)) => {
                return Err(GatewayError::OperationFailed(reason.clone()));
            }
            Some(PollState::Succeeded) => {}
            _ => {
                return Err(GatewayError::OperationFailed(
                    "operation has not completed".to_string(),
                ));
            }
        }

        if let Some(body) = self.body.take() {
            return Ok(body);
        }
        let response = self
            .client
            .send(Method::GET, &self.token.resource_url, None, None)
            .await?;
        decode(response).await
    }

    fn resume_token(&self) -> GatewayResult<String> {
        self.token.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_survives_encoding() {
        let token = ContinuationToken {
            operation_url: Some(
                "https://management.azure.com/operations/op-1?api-version=2022-08-01".to_string(),
            ),
            resource_url: "https://management.azure.com/apis/a?api-version=2022-08-01".to_string(),
            kind: PollingKind::AsyncOperation,
        };
        let encoded = token.encode().expect("encode");
        assert!(!encoded.contains("https"));
        assert_eq!(ContinuationToken::decode(&encoded).expect("decode"), token);
    }

    #[test]
    fn test_garbage_token_is_rejected() {
        let err = ContinuationToken::decode("not base64 at all!").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResumeToken(_)));

        let missing_url = general_purpose::STANDARD
            .encode(br#"{"resourceUrl":"https://x/apis/a","kind":"location"}"#);
        assert!(matches!(
            ContinuationToken::decode(&missing_url),
            Err(GatewayError::InvalidResumeToken(_))
        ));
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(classify("Succeeded", None), PollState::Succeeded);
        assert_eq!(classify("InProgress", None), PollState::InProgress);
        assert_eq!(classify("Updating", None), PollState::InProgress);
        assert_eq!(
            classify("Failed", Some("ValidationError: bad spec".to_string())),
            PollState::Failed("ValidationError: bad spec".to_string())
        );
        assert!(matches!(classify("Canceled", None), PollState::Failed(_)));
    }
}
