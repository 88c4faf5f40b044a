use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use super::AdapterError;

/// Delay before the attempt following `attempt` (1-based):
/// `2^attempt × 1000ms`, so attempt 1 → 2s, attempt 2 → 4s.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(1000 * 2u64.saturating_pow(attempt))
}

/// Shared resilient HTTP wrapper all adapters issue requests through.
///
/// Client-class responses (4xx) propagate immediately without retry;
/// server-class responses (5xx) and network failures are retried with
/// exponential backoff up to the attempt budget, after which the last error
/// propagates.
pub struct ResilientClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    max_attempts: u32,
}

impl ResilientClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        timeout: Duration,
        max_attempts: u32,
    ) -> Result<Self, AdapterError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| AdapterError::Validation(format!("invalid base URL: {}", e)))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AdapterError::Network)?;
        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
            max_attempts: max_attempts.max(1),
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AdapterError> {
        let body = self.execute(Method::GET, path, None).await?;
        decode(&body)
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: Value,
    ) -> Result<T, AdapterError> {
        let body = self.execute(Method::POST, path, Some(payload)).await?;
        decode(&body)
    }

    pub async fn delete(&self, path: &str) -> Result<(), AdapterError> {
        self.execute(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// Issues one logical request, retrying server-class and network
    /// failures within the attempt budget. Returns the raw response body.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        payload: Option<Value>,
    ) -> Result<String, AdapterError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| AdapterError::Validation(format!("invalid request path: {}", e)))?;

        let mut attempt = 1u32;
        loop {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .bearer_auth(&self.api_key);
            if let Some(ref payload) = payload {
                request = request.json(payload);
            }

            let error = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if status.is_success() {
                        return Ok(body);
                    }
                    classify_status(status, body)
                }
                Err(e) => AdapterError::Network(e),
            };

            if !error.is_retryable() || attempt >= self.max_attempts {
                warn!(
                    %url,
                    attempt,
                    error = %error,
                    "Partner request failed, not retrying"
                );
                return Err(error);
            }

            let delay = backoff_delay(attempt);
            debug!(
                %url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Partner request failed, backing off before retry"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}

fn classify_status(status: StatusCode, body: String) -> AdapterError {
    let message = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        body
    };
    if status.is_client_error() {
        AdapterError::Client {
            status: status.as_u16(),
            message,
        }
    } else {
        AdapterError::Server {
            status: status.as_u16(),
            message,
        }
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, AdapterError> {
    serde_json::from_str(body).map_err(|e| AdapterError::Decode(e.to_string()))
}
