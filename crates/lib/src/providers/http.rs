//! # HTTP Transport
//!
//! Shared request plumbing for every upstream client: a per-attempt timeout and
//! bounded exponential backoff for transient failures.
//!
//! - HTTP 429 and 5xx: retried
//! - other 4xx: returned immediately
//! - network errors (including per-attempt timeouts): retried

use crate::errors::PromptError;
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// How many times a transient failure is retried, and how long to wait first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    250
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff_base_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based): base, 2x base, 4x base, ...
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(5);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Transport settings shared by the HTTP provider clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    /// Timeout for a single request attempt.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

pub(crate) fn build_client(settings: &HttpSettings) -> Result<ReqwestClient, PromptError> {
    ReqwestClient::builder()
        .timeout(settings.timeout)
        .build()
        .map_err(PromptError::ReqwestClientBuild)
}

/// Sends the request produced by `make_request`, retrying transient failures.
///
/// Returns the first successful response, or the last error once retries run out.
pub(crate) async fn send_with_retry<F>(
    service: &'static str,
    retry: &RetryPolicy,
    make_request: F,
) -> Result<Response, PromptError>
where
    F: Fn() -> RequestBuilder,
{
    let mut attempt = 0;
    loop {
        if attempt > 0 {
            tokio::time::sleep(retry.delay(attempt)).await;
        }

        let error = match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                let body = response.text().await.unwrap_or_default();
                let error = PromptError::Api {
                    service,
                    status: status.as_u16(),
                    body,
                };
                if !is_transient(status) {
                    return Err(error);
                }
                error
            }
            Err(source) => PromptError::Request { service, source },
        };

        if attempt >= retry.max_retries {
            return Err(error);
        }
        attempt += 1;
        warn!(
            "{service} request failed ({error}); retrying ({attempt}/{})",
            retry.max_retries
        );
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
