//! Rate-limited JSON over HTTP, shared by the Dexscreener and Jupiter clients.

use crate::errors::{AggregatorError, QueryError};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Bodies are truncated to this many characters in errors and logs.
const BODY_PREVIEW_CHARS: usize = 180;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<HttpError> for QueryError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Transport(msg) => QueryError::Transport(msg),
            HttpError::Timeout => QueryError::Transport("request timed out".into()),
            HttpError::RateLimited => QueryError::RateLimited,
            HttpError::Status { status, body } => QueryError::Upstream { status, body },
            HttpError::Decode(msg) => QueryError::Malformed(msg),
        }
    }
}

impl From<HttpError> for AggregatorError {
    fn from(e: HttpError) -> Self {
        AggregatorError::unavailable(e.to_string())
    }
}

/// HTTP client with a shared outbound request budget.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl HttpGateway {
    pub fn new(requests_per_second: u32, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("keepalive-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));

        Ok(Self {
            client,
            limiter: Arc::new(RateLimiter::direct(quota)),
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, HttpError> {
        self.send(self.client.get(url).query(query)).await
    }

    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.client.post(url).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, HttpError> {
        self.limiter.until_ready().await;

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout
            } else {
                HttpError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let url = response.url().clone();
        let body = response.text().await.map_err(|e| HttpError::Transport(e.to_string()))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limited by {}", url.host_str().unwrap_or("upstream"));
            return Err(HttpError::RateLimited);
        }
        if !status.is_success() {
            warn!("Non-200 {} url={} body={}", status.as_u16(), url, preview(&body));
            return Err(HttpError::Status {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        debug!("HTTP {} from {}", status.as_u16(), url);
        serde_json::from_str(&body).map_err(|e| HttpError::Decode(format!("{} (body: {})", e, preview(&body))))
    }
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}
