// src/transport.rs
//! HTTP transport collaborator. The dispatcher talks to the [`Transport`]
//! trait so tests can substitute canned responses; [`HttpTransport`] is the
//! production implementation with its own retry/backoff policy (opaque to
//! the core).

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::catalog::RequestDescriptor;
use crate::catalog::template::stringify;
use crate::config::AppConfig;
use crate::error::{FetchError, Result};

/// Statuses worth another attempt before giving up.
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one expanded request. Implementations raise only after their
    /// own retries are exhausted; the caller adds no retry of its own.
    async fn request(&self, request: &RequestDescriptor) -> Result<TransportResponse>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    max_retries: u32,
    backoff_base: f64,
    default_timeout: f64,
}

impl HttpTransport {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        for (key, value) in config.headers() {
            let name = HeaderName::from_bytes(key.as_bytes())
                .with_context(|| format!("invalid default header name '{key}'"))?;
            let value = HeaderValue::from_str(&value)
                .with_context(|| format!("invalid default header value for '{key}'"))?;
            default_headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs_f64(config.http_timeout));
        if let Some(proxy_url) = &config.proxy_url {
            builder = builder.proxy(
                reqwest::Proxy::all(proxy_url)
                    .with_context(|| format!("invalid proxy url '{proxy_url}'"))?,
            );
        }

        Ok(Self {
            client: builder.build().context("building reqwest client")?,
            max_retries: config.http_max_retries,
            backoff_base: config.http_backoff_base,
            default_timeout: config.http_timeout,
        })
    }

    fn build_request(&self, request: &RequestDescriptor) -> reqwest::RequestBuilder {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .unwrap_or(reqwest::Method::GET);
        let mut builder = self.client.request(method, &request.url);

        // Only the parts that are present go out; no empty query strings or
        // zero-length form bodies.
        if let Some(query) = &request.query {
            let pairs: Vec<(String, String)> = query
                .iter()
                .map(|(k, v)| (k.clone(), stringify(v)))
                .collect();
            builder = builder.query(&pairs);
        }
        if let Some(payload) = &request.payload {
            let pairs: Vec<(String, String)> = payload
                .iter()
                .map(|(k, v)| (k.clone(), stringify(v)))
                .collect();
            builder = builder.form(&pairs);
        }
        if !request.headers.is_empty() {
            let mut headers = HeaderMap::new();
            for (key, value) in &request.headers {
                match (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(&stringify(value)),
                ) {
                    (Ok(name), Ok(value)) => {
                        headers.insert(name, value);
                    }
                    _ => tracing::warn!(header = %key, "skipping malformed catalog header"),
                }
            }
            builder = builder.headers(headers);
        }
        let timeout = request.timeout_seconds.unwrap_or(self.default_timeout);
        builder.timeout(Duration::from_secs_f64(timeout))
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.backoff_base * f64::from(2u32.saturating_pow(attempt)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: &RequestDescriptor) -> Result<TransportResponse> {
        let mut last_err: Option<FetchError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.backoff(attempt - 1)).await;
            }
            match self.build_request(request).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.bytes().await?.to_vec();
                        return Ok(TransportResponse {
                            status: status.as_u16(),
                            body,
                        });
                    }
                    let err = FetchError::HttpStatus {
                        status: status.as_u16(),
                        url: request.url.clone(),
                    };
                    if !RETRY_STATUSES.contains(&status.as_u16()) {
                        return Err(err);
                    }
                    tracing::warn!(
                        category = %request.id,
                        status = status.as_u16(),
                        attempt,
                        "retryable status from upstream"
                    );
                    last_err = Some(err);
                }
                Err(e) => {
                    tracing::warn!(
                        category = %request.id,
                        error = %e,
                        attempt,
                        "transport error"
                    );
                    last_err = Some(FetchError::Transport(e));
                }
            }
        }

        Err(last_err.unwrap_or(FetchError::HttpStatus {
            status: 0,
            url: request.url.clone(),
        }))
    }
}
