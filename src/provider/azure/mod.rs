//! # Azure API Management Gateway
//!
//! [`ApimGateway`] over the Azure Resource Manager REST API.
//!
//! - `auth`: credential selection (Workload Identity, Managed Identity, Pact mock)
//! - `client`: authenticated HTTP layer and error classification
//! - `poller`: long-running operation polling and resume tokens

mod auth;
mod client;
mod poller;

pub use auth::{build_credential, MockTokenCredential};
pub use client::ArmClient;
pub use poller::{ArmPoller, ContinuationToken, PollingKind};

use crate::config::{ApimConfig, ApimTarget, ControllerConfig};
use crate::constants::DEFAULT_ARM_ENDPOINT;
use crate::observability::metrics;
use crate::provider::{
    ApiContract, ApimGateway, BackendContract, DeleteOutcome, GatewayError, GatewayResult,
    OperationPoller, PolicyContract, VersionSetContract,
};
use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use client::{check_status, decode, error_from_response, etag_of};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, Instrument, Span};

/// Span for one gateway call, with the fields [`tracked`] fills in
macro_rules! apim_span {
    ($name:literal, $id:expr) => {
        info_span!(
            $name,
            apim.resource_id = %$id,
            operation.success = tracing::field::Empty,
            operation.duration_ms = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    };
}

/// Run `fut` inside `span`, recording outcome, duration and metrics
async fn tracked<T, F>(span: Span, operation: &'static str, fut: F) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    let recorder = span.clone();
    let start = Instant::now();
    let result = fut.instrument(span).await;
    let elapsed = start.elapsed();

    #[allow(
        clippy::cast_possible_truncation,
        reason = "Gateway calls never run for u64::MAX milliseconds"
    )]
    recorder.record("operation.duration_ms", elapsed.as_millis() as u64);
    match &result {
        Ok(_) => {
            recorder.record("operation.success", true);
            metrics::record_gateway_operation(operation, elapsed.as_secs_f64());
        }
        Err(e) => {
            recorder.record("operation.success", false);
            recorder.record("error.message", e.to_string().as_str());
            metrics::increment_gateway_operation_errors(operation);
        }
    }
    result
}

fn to_body<T: Serialize>(payload: &T) -> GatewayResult<serde_json::Value> {
    serde_json::to_value(payload).map_err(|e| GatewayError::Decode(e.to_string()))
}

fn header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Resource Manager backed [`ApimGateway`]
#[derive(Debug, Clone)]
pub struct ArmApimGateway {
    client: Arc<ArmClient>,
}

impl ArmApimGateway {
    /// Build a gateway for `target`, honouring the endpoint override
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(
        target: &ApimTarget,
        apim: &ApimConfig,
        controller: &ControllerConfig,
        credential: Arc<dyn TokenCredential>,
    ) -> GatewayResult<Self> {
        let endpoint = apim.endpoint.as_deref().unwrap_or(DEFAULT_ARM_ENDPOINT);
        if apim.pact_mode {
            info!(
                "Pact mode enabled: routing APIM requests to {}",
                endpoint
            );
        }
        Self::with_endpoint(endpoint, target, credential, controller.http_timeout())
    }

    /// Build a gateway against an explicit endpoint
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn with_endpoint(
        endpoint: &str,
        target: &ApimTarget,
        credential: Arc<dyn TokenCredential>,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let client = ArmClient::new(endpoint, target, credential, timeout)?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    async fn get_optional<T>(&self, path: &str) -> GatewayResult<Option<(T, Option<String>)>>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.client.resource_url(path);
        let response = self.client.execute(Method::GET, &url, None, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        let etag = etag_of(&response);
        Ok(Some((decode(response).await?, etag)))
    }

    async fn put<T, P>(&self, path: &str, payload: &P) -> GatewayResult<T>
    where
        T: serde::de::DeserializeOwned,
        P: Serialize,
    {
        let url = self.client.resource_url(path);
        let body = to_body(payload)?;
        let response = self
            .client
            .send(Method::PUT, &url, Some(&body), None)
            .await?;
        decode(response).await
    }

    async fn delete(&self, path: &str, match_token: &str) -> GatewayResult<DeleteOutcome> {
        let url = self.client.resource_url(path);
        let response = self
            .client
            .execute(Method::DELETE, &url, None, Some(match_token))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(DeleteOutcome::NotFound),
            status if status.is_success() => Ok(DeleteOutcome::Deleted),
            _ => Err(error_from_response(response).await),
        }
    }
}

#[async_trait]
impl ApimGateway for ArmApimGateway {
    async fn get_version_set(&self, id: &str) -> GatewayResult<Option<VersionSetContract>> {
        let span = apim_span!("azure.apim.version_set.get", id);
        tracked(span, "version_set.get", async {
            let found = self
                .get_optional::<VersionSetContract>(&format!("apiVersionSets/{id}"))
                .await?;
            Ok(found.map(|(contract, _)| contract))
        })
        .await
    }

    async fn create_or_update_version_set(
        &self,
        id: &str,
        payload: &VersionSetContract,
    ) -> GatewayResult<VersionSetContract> {
        let span = apim_span!("azure.apim.version_set.create_or_update", id);
        tracked(
            span,
            "version_set.create_or_update",
            self.put(&format!("apiVersionSets/{id}"), payload),
        )
        .await
    }

    async fn delete_version_set(&self, id: &str, match_token: &str) -> GatewayResult<DeleteOutcome> {
        let span = apim_span!("azure.apim.version_set.delete", id);
        tracked(
            span,
            "version_set.delete",
            self.delete(&format!("apiVersionSets/{id}"), match_token),
        )
        .await
    }

    async fn get_api(&self, id: &str) -> GatewayResult<Option<ApiContract>> {
        let span = apim_span!("azure.apim.api.get", id);
        tracked(span, "api.get", async {
            let found = self.get_optional::<ApiContract>(&format!("apis/{id}")).await?;
            Ok(found.map(|(contract, _)| contract))
        })
        .await
    }

    async fn begin_create_or_update_api(
        &self,
        id: &str,
        payload: &ApiContract,
        resume_token: Option<&str>,
    ) -> GatewayResult<Box<dyn OperationPoller<ApiContract>>> {
        let span = apim_span!("azure.apim.api.begin_create_or_update", id);
        tracked(span, "api.begin_create_or_update", async {
            if let Some(token) = resume_token {
                debug!("Resuming APIM operation from token");
                let token = ContinuationToken::decode(token)?;
                let poller: Box<dyn OperationPoller<ApiContract>> =
                    Box::new(ArmPoller::<ApiContract>::resume(Arc::clone(&self.client), token));
                return Ok(poller);
            }

            let resource_url = self.client.resource_url(&format!("apis/{id}"));
            let body = to_body(payload)?;
            let response = self
                .client
                .send(Method::PUT, &resource_url, Some(&body), None)
                .await?;

            let poller: Box<dyn OperationPoller<ApiContract>> =
                if let Some(operation_url) = header(&response, "Azure-AsyncOperation") {
                    Box::new(ArmPoller::<ApiContract>::resume(
                        Arc::clone(&self.client),
                        ContinuationToken {
                            operation_url: Some(operation_url),
                            resource_url,
                            kind: PollingKind::AsyncOperation,
                        },
                    ))
                } else if let Some(operation_url) = header(&response, "Location") {
                    Box::new(ArmPoller::<ApiContract>::resume(
                        Arc::clone(&self.client),
                        ContinuationToken {
                            operation_url: Some(operation_url),
                            resource_url,
                            kind: PollingKind::Location,
                        },
                    ))
                } else if response.status() == StatusCode::ACCEPTED {
                    Box::new(ArmPoller::<ApiContract>::resume(
                        Arc::clone(&self.client),
                        ContinuationToken {
                            operation_url: None,
                            resource_url,
                            kind: PollingKind::Body,
                        },
                    ))
                } else {
                    let contract = decode::<ApiContract>(response).await.ok();
                    let settled = contract.as_ref().is_none_or(|c| {
                        c.properties
                            .provisioning_state
                            .as_deref()
                            .is_none_or(|state| state == "Succeeded")
                    });
                    if settled {
                        Box::new(ArmPoller::completed(
                            Arc::clone(&self.client),
                            resource_url,
                            contract,
                        ))
                    } else {
                        Box::new(ArmPoller::<ApiContract>::resume(
                            Arc::clone(&self.client),
                            ContinuationToken {
                                operation_url: None,
                                resource_url,
                                kind: PollingKind::Body,
                            },
                        ))
                    }
                };
            Ok(poller)
        })
        .await
    }

    async fn delete_api(&self, id: &str, match_token: &str) -> GatewayResult<DeleteOutcome> {
        let span = apim_span!("azure.apim.api.delete", id);
        tracked(
            span,
            "api.delete",
            self.delete(&format!("apis/{id}"), match_token),
        )
        .await
    }

    async fn get_api_policy(&self, api_id: &str) -> GatewayResult<Option<PolicyContract>> {
        let span = apim_span!("azure.apim.policy.get", api_id);
        tracked(span, "policy.get", async {
            let found = self
                .get_optional::<PolicyContract>(&format!("apis/{api_id}/policies/policy"))
                .await?;
            Ok(found.map(|(contract, _)| contract))
        })
        .await
    }

    async fn create_or_update_api_policy(
        &self,
        api_id: &str,
        payload: &PolicyContract,
    ) -> GatewayResult<PolicyContract> {
        let span = apim_span!("azure.apim.policy.create_or_update", api_id);
        tracked(
            span,
            "policy.create_or_update",
            self.put(&format!("apis/{api_id}/policies/policy"), payload),
        )
        .await
    }

    async fn delete_api_policy(&self, api_id: &str, match_token: &str) -> GatewayResult<DeleteOutcome> {
        let span = apim_span!("azure.apim.policy.delete", api_id);
        tracked(
            span,
            "policy.delete",
            self.delete(&format!("apis/{api_id}/policies/policy"), match_token),
        )
        .await
    }

    async fn link_product_api(&self, product_id: &str, api_id: &str) -> GatewayResult<()> {
        let span = apim_span!("azure.apim.product_api.link", api_id);
        tracked(span, "product_api.link", async {
            let url = self
                .client
                .resource_url(&format!("products/{product_id}/apis/{api_id}"));
            self.client.send(Method::PUT, &url, None, None).await?;
            Ok(())
        })
        .await
    }

    async fn get_backend(&self, id: &str) -> GatewayResult<Option<BackendContract>> {
        let span = apim_span!("azure.apim.backend.get", id);
        tracked(span, "backend.get", async {
            let found = self
                .get_optional::<BackendContract>(&format!("backends/{id}"))
                .await?;
            Ok(found.map(|(mut contract, etag)| {
                contract.etag = etag;
                contract
            }))
        })
        .await
    }

    async fn create_or_update_backend(
        &self,
        id: &str,
        payload: &BackendContract,
    ) -> GatewayResult<BackendContract> {
        let span = apim_span!("azure.apim.backend.create_or_update", id);
        tracked(
            span,
            "backend.create_or_update",
            self.put(&format!("backends/{id}"), payload),
        )
        .await
    }

    async fn delete_backend(&self, id: &str, match_token: &str) -> GatewayResult<DeleteOutcome> {
        let span = apim_span!("azure.apim.backend.delete", id);
        tracked(
            span,
            "backend.delete",
            self.delete(&format!("backends/{id}"), match_token),
        )
        .await
    }
}
