//! HTTP provider implementation.
//!
//! Talks to the provisioning REST API. Transient failures (rate limits and
//! network errors) are retried here so the executor never has to.

use async_trait::async_trait;
use reqwest::{header, Client, Response};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::error::{ProviderError, Result, StratoformError};
use crate::module::AttrMap;

use super::types::{
    ApiErrorBody, AppliedResource, CreateResourceRequest, ResourceResponse,
    UpdateResourceRequest,
};
use super::Provider;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// HTTP-backed resource provider.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    /// HTTP client.
    client: Client,
    /// API base URL, without trailing slash.
    base_url: String,
    /// Bearer token.
    token: String,
}

impl HttpProvider {
    /// Creates a new HTTP provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a provider with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(base_url: &str, token: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                StratoformError::Provider(ProviderError::network(format!(
                    "Failed to create HTTP client: {e}"
                )))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// Builds the URL for a resource instance.
    fn resource_url(&self, kind: &str, id: &str) -> String {
        format!("{}/v1/resources/{kind}/{id}", self.base_url)
    }

    /// Runs an operation with retries for transient failures.
    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES}");
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)))
                    .await;
            }

            match op().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if e.is_retryable() {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            StratoformError::Provider(ProviderError::NetworkError {
                message: String::from("Max retries exceeded"),
            })
        }))
    }

    /// Sends one request and maps the HTTP status to the error hierarchy.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        let response = request
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| {
                StratoformError::Provider(ProviderError::network(format!(
                    "Request failed: {e}"
                )))
            })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 { 60 } else { retry_after };

            return Err(StratoformError::Provider(ProviderError::RateLimited {
                retry_after_secs: retry_after,
            }));
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(StratoformError::Provider(
                ProviderError::AuthenticationFailed {
                    message: String::from("Invalid API token"),
                },
            ));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map_or(body, |e| e.message);
            return Err(StratoformError::Provider(ProviderError::api_error(
                status.as_u16(),
                message,
            )));
        }

        Ok(response)
    }

    /// Parses a create/update response body.
    async fn parse_resource(response: Response) -> Result<AppliedResource> {
        let parsed: ResourceResponse = response.json().await.map_err(|e| {
            StratoformError::Provider(ProviderError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            })
        })?;
        Ok(parsed.into_applied())
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn create(
        &self,
        kind: &str,
        name: &str,
        attributes: &AttrMap,
    ) -> Result<AppliedResource> {
        let url = format!("{}/v1/resources", self.base_url);
        trace!("POST {url} ({kind}.{name})");

        self.with_retry(|| async {
            let body = CreateResourceRequest {
                kind,
                name,
                attributes,
            };
            let response = self.send(self.client.post(&url).json(&body)).await?;
            Self::parse_resource(response).await
        })
        .await
    }

    async fn update(
        &self,
        kind: &str,
        id: &str,
        attributes: &AttrMap,
    ) -> Result<AppliedResource> {
        let url = self.resource_url(kind, id);
        trace!("PATCH {url}");

        self.with_retry(|| async {
            let body = UpdateResourceRequest { attributes };
            let response = self.send(self.client.patch(&url).json(&body)).await?;
            Self::parse_resource(response).await
        })
        .await
    }

    async fn delete(&self, kind: &str, id: &str) -> Result<()> {
        let url = self.resource_url(kind, id);
        trace!("DELETE {url}");

        let result = self
            .with_retry(|| async {
                let response = self.client.delete(&url);
                self.send(response).await?;
                Ok(())
            })
            .await;

        // A resource already gone is the outcome we wanted.
        match result {
            Err(StratoformError::Provider(ProviderError::ApiRequestFailed {
                status: 404,
                ..
            })) => {
                warn!("Resource {kind}/{id} already absent, treating delete as success");
                Ok(())
            }
            other => other,
        }
    }

    fn provider_type(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::AttrValue;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn attrs() -> AttrMap {
        let mut map = AttrMap::new();
        map.insert(
            String::from("cidr_block"),
            AttrValue::String(String::from("10.0.0.0/16")),
        );
        map
    }

    #[tokio::test]
    async fn test_create_resource() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/resources"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(serde_json::json!({
                "type": "vpc",
                "name": "main",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "vpc-123",
                "outputs": { "arn": "arn:vpc-123" },
            })))
            .mount(&server)
            .await;

        let provider = HttpProvider::new(&server.uri(), "test-token").expect("client");
        let applied = provider
            .create("vpc", "main", &attrs())
            .await
            .expect("create succeeds");

        assert_eq!(applied.id, "vpc-123");
        assert_eq!(
            applied.outputs.get("arn"),
            Some(&AttrValue::String(String::from("arn:vpc-123")))
        );
    }

    #[tokio::test]
    async fn test_update_resource() {
        let server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/v1/resources/vpc/vpc-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "vpc-123",
            })))
            .mount(&server)
            .await;

        let provider = HttpProvider::new(&server.uri(), "test-token").expect("client");
        let applied = provider
            .update("vpc", "vpc-123", &attrs())
            .await
            .expect("update succeeds");

        assert_eq!(applied.id, "vpc-123");
        assert!(applied.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/resources"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/resources"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "vpc-123",
            })))
            .mount(&server)
            .await;

        let provider = HttpProvider::new(&server.uri(), "test-token").expect("client");
        let applied = provider
            .create("vpc", "main", &attrs())
            .await
            .expect("retry succeeds");

        assert_eq!(applied.id, "vpc-123");
    }

    #[tokio::test]
    async fn test_auth_failure_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/resources"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let provider = HttpProvider::new(&server.uri(), "bad-token").expect("client");
        let err = provider.create("vpc", "main", &attrs()).await.unwrap_err();

        assert!(matches!(
            err,
            StratoformError::Provider(ProviderError::AuthenticationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_resource_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/v1/resources/vpc/vpc-gone"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "message": "no such resource",
            })))
            .mount(&server)
            .await;

        let provider = HttpProvider::new(&server.uri(), "test-token").expect("client");
        provider
            .delete("vpc", "vpc-gone")
            .await
            .expect("missing resource is not an error");
    }

    #[tokio::test]
    async fn test_api_error_carries_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/resources"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "message": "cidr_block overlaps existing network",
            })))
            .mount(&server)
            .await;

        let provider = HttpProvider::new(&server.uri(), "test-token").expect("client");
        let err = provider.create("vpc", "main", &attrs()).await.unwrap_err();

        let StratoformError::Provider(ProviderError::ApiRequestFailed { status, message }) = err
        else {
            panic!("expected ApiRequestFailed");
        };
        assert_eq!(status, 422);
        assert!(message.contains("overlaps"));
    }
}
