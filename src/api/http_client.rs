use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::FetchMode;
use crate::utils::Timer;
use anyhow::{Context, Result};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, warn};
use url::Url;

const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Bounded exponential backoff with jitter. Applies to initial loads only,
/// and only transient errors are retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: usize,
    base_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_ms: u64) -> Self {
        Self {
            max_retries,
            base_ms: base_ms.max(1),
        }
    }

    pub fn applies_to(&self, mode: FetchMode) -> bool {
        mode == FetchMode::Initial && self.max_retries > 0
    }

    pub async fn run<T, F, Fut>(&self, mode: FetchMode, label: &str, mut op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        if !self.applies_to(mode) {
            return op().await;
        }

        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.base_ms)
            .max_delay(MAX_BACKOFF)
            .map(jitter)
            .take(self.max_retries);

        let mut attempt = 0u32;
        RetryIf::start(
            strategy,
            move || {
                attempt += 1;
                if attempt > 1 {
                    debug!("{} (attempt {})", label, attempt);
                }
                op()
            },
            move |e: &ApiError| {
                let retry = e.is_transient();
                if retry {
                    warn!("Transient failure on {}: {}", label, e);
                }
                retry
            },
        )
        .await
    }
}

pub struct HttpClient {
    inner: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            // Session cookies from the auth layer ride along
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            inner,
            retry: RetryPolicy::new(config.max_retries, config.retry_base_ms),
        })
    }

    /// GET a JSON document, retrying per the client's `RetryPolicy`.
    pub async fn get_json(&self, url: &Url, mode: FetchMode) -> ApiResult<Value> {
        let label = format!("GET {}", url);
        self.retry
            .run(mode, &label, move || self.send(Method::GET, url, None))
            .await
    }

    pub async fn post_json(&self, url: &Url, body: &Value) -> ApiResult<Value> {
        self.send(Method::POST, url, Some(body)).await
    }

    pub async fn delete(&self, url: &Url) -> ApiResult<Value> {
        self.send(Method::DELETE, url, None).await
    }

    async fn send(&self, method: Method, url: &Url, body: Option<&Value>) -> ApiResult<Value> {
        let _t = Timer::start(format!("{} {}", method, url.path()));

        let mut req = self.inner.request(method, url.clone());
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}
