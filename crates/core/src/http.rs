//! HTTP client with a bounded, fixed-delay retry loop.

use std::time::Duration;

use reqwest::{header::HeaderMap, Client, Method, Response, StatusCode, Url};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::HttpError;

const MAX_ERROR_BODY_CHARS: usize = 200;

/// How many times a request is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: usize,
    /// Fixed pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            delay: Duration::from_secs(2),
        }
    }
}

/// Thin wrapper around `reqwest::Client` that retries transport failures and
/// non-2xx responses.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingClient {
    /// Start building a client.
    pub fn builder() -> RetryingClientBuilder {
        RetryingClientBuilder::default()
    }

    /// Send `method url` with an optional JSON body.
    ///
    /// Returns the first 2xx response. After `max_attempts` failures the last
    /// failure is reported as [`HttpError::RetriesExhausted`].
    pub async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<Response, HttpError> {
        self.send_accepting(method, url, body, |status| status.is_success())
            .await
    }

    /// Like [`send`](Self::send), but any status for which `accept` returns
    /// `true` ends the loop and is handed back to the caller.
    ///
    /// Transport errors and rejected statuses are retried as usual.
    pub async fn send_accepting<F>(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        accept: F,
    ) -> Result<Response, HttpError>
    where
        F: Fn(StatusCode) -> bool,
    {
        let attempts = self.policy.max_attempts.max(1);
        let target = display_url(&url);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let mut request = self.client.request(method.clone(), url.clone());
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(attempt, %method, url = %target, "sending request");
            match request.send().await {
                Ok(response) if accept(response.status()) => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    last_error = format!("status {status}: {}", truncate(&text));
                }
                Err(err) => {
                    last_error = err.without_url().to_string();
                }
            }

            warn!(
                attempt,
                max_attempts = attempts,
                %method,
                url = %target,
                error = %last_error,
                "request failed"
            );
            if attempt < attempts && !self.policy.delay.is_zero() {
                tokio::time::sleep(self.policy.delay).await;
            }
        }

        error!(%method, url = %target, attempts, "max retries exceeded, giving up");
        Err(HttpError::RetriesExhausted {
            method,
            url: target,
            attempts,
            last_error,
        })
    }
}

/// Builder for [`RetryingClient`].
#[derive(Debug)]
pub struct RetryingClientBuilder {
    policy: RetryPolicy,
    timeout: Duration,
    default_headers: Option<HeaderMap>,
}

impl Default for RetryingClientBuilder {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
            default_headers: None,
        }
    }
}

impl RetryingClientBuilder {
    /// Attempts and delay.
    pub fn policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Headers sent with every request.
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<RetryingClient, HttpError> {
        let mut builder = Client::builder().timeout(self.timeout);
        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }
        let client = builder
            .build()
            .map_err(|err| HttpError::InvalidRequest(err.to_string()))?;

        Ok(RetryingClient {
            client,
            policy: RetryPolicy {
                max_attempts: self.policy.max_attempts.max(1),
                delay: self.policy.delay,
            },
        })
    }
}

/// URL without its query string, safe to log when the query carries an API key.
pub(crate) fn display_url(url: &Url) -> String {
    let mut url = url.clone();
    url.set_query(None);
    url.to_string()
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
