//! Generic retrying JSON fetch over reqwest.

use std::time::Duration;

use anyhow::Context;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Retry disposition for a failed request, decided at the fetch boundary.
///
/// Only `Transient` failures are worth another attempt; `Permanent` and
/// `NotFound` fail fast so a malformed request or a missing resource does not
/// burn the whole backoff budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Transient,
    Permanent,
    NotFound,
}

pub fn classify_status(status: StatusCode) -> RetryClass {
    if status == StatusCode::NOT_FOUND {
        RetryClass::NotFound
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryClass::Transient
    } else {
        RetryClass::Permanent
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryClass {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        RetryClass::Transient
    } else {
        RetryClass::Permanent
    }
}

/// Exponential backoff: the sleep before re-attempting attempt `i + 1` is
/// `base_secs^i` seconds, capped at `max_delay`. No jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_secs: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_secs: 2.0,
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Cap in float space: the uncapped power can exceed what Duration
        // can represent long before the cap would apply.
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let secs = self
            .base_secs
            .powi(exponent)
            .min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request error for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("http status {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },
}

impl FetchError {
    pub fn class(&self) -> RetryClass {
        match self {
            FetchError::Request { source, .. } => classify_reqwest_error(source),
            FetchError::HttpStatus { status, .. } => classify_status(*status),
        }
    }
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        let mut retry = config.retry;
        retry.max_retries = retry.max_retries.max(1);

        Ok(Self { client, retry })
    }

    /// GET `url` and parse the body as JSON. Transient failures are retried
    /// up to `max_retries` total attempts; permanent and not-found responses
    /// return immediately on the first attempt.
    pub async fn fetch_json(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<Value, FetchError> {
        let mut last_error: Option<FetchError> = None;

        for attempt in 0..self.retry.max_retries {
            debug!(url, attempt, max_attempts = self.retry.max_retries, "requesting");

            let result = self.client.get(url).query(params).send().await;
            let error = match result {
                Ok(resp) => {
                    let status = resp.status();
                    let final_url = resp.url().to_string();

                    if status.is_success() {
                        return resp.json::<Value>().await.map_err(|source| {
                            FetchError::Request {
                                url: final_url,
                                source,
                            }
                        });
                    }

                    FetchError::HttpStatus {
                        status,
                        url: final_url,
                    }
                }
                Err(source) => FetchError::Request {
                    url: url.to_string(),
                    source,
                },
            };

            if error.class() != RetryClass::Transient {
                return Err(error);
            }

            if attempt + 1 < self.retry.max_retries {
                let delay = self.retry.delay_for_attempt(attempt);
                warn!(
                    url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
            }
            last_error = Some(error);
        }

        Err(last_error.expect("retry loop captures an error before exhausting attempts"))
    }
}
