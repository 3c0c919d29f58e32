use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::{ApiError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.paradisestation.org/stats";

/// Header carrying the requests left in the current rate-limit window.
pub const RATE_LIMIT_HEADER: &str = "X-Rate-Limit-Remaining";

/// Outcome of a GET that did not fail outright.
///
/// A 404 is ordinary data here: rounds that are still running, or never
/// existed, answer 404 and bulk callers keep going.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Data(T),
    NotFound,
    /// 2xx response whose body did not decode into the expected shape.
    Undecodable,
}

impl<T> Fetched<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Fetched::Data(data) => Some(data),
            Fetched::NotFound | Fetched::Undecodable => None,
        }
    }

    /// Demands data, turning the soft outcomes into errors.
    pub fn require(self, endpoint: &str) -> Result<T> {
        match self {
            Fetched::Data(data) => Ok(data),
            Fetched::NotFound => Err(ApiError::RoundNotFound(endpoint.to_string())),
            Fetched::Undecodable => Err(ApiError::UndecodableBody(endpoint.to_string())),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Data(data) => Fetched::Data(f(data)),
            Fetched::NotFound => Fetched::NotFound,
            Fetched::Undecodable => Fetched::Undecodable,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    /// Fixed pause after every request, successful or not.
    pub throttle: Option<Duration>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            throttle: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Pooled HTTP client for the stats API. Safe to share between tasks.
pub struct StatsClient {
    client: reqwest::Client,
    base_url: String,
    throttle: Option<Duration>,
    rate_limit_remaining: Mutex<Option<i64>>,
}

impl StatsClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("para-stats-ingest/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            throttle: config.throttle,
            rate_limit_remaining: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Last `X-Rate-Limit-Remaining` value seen, if any response carried one.
    pub fn rate_limit_remaining(&self) -> Option<i64> {
        *self
            .rate_limit_remaining
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_remaining(&self, remaining: i64) {
        *self
            .rate_limit_remaining
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(remaining);
    }

    /// GETs `endpoint` (relative to the base URL) and decodes the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Fetched<T>> {
        let result = self.fetch(endpoint).await;

        if let Some(delay) = self.throttle {
            tokio::time::sleep(delay).await;
        }

        result
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Fetched<T>> {
        let url = format!("{}{}", self.base_url, endpoint);
        let started = Instant::now();

        let response = self.client.get(&url).send().await?;

        let remaining = parse_remaining(response.headers());
        if let Some(remaining) = remaining {
            self.record_remaining(remaining);
        }

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(endpoint, "Round not found or still ongoing");
            return Ok(Fetched::NotFound);
        }
        check_status(status, endpoint, remaining)?;

        let body = response.bytes().await?;
        tracing::info!(
            endpoint,
            elapsed_ms = started.elapsed().as_millis() as u64,
            rate_limit_remaining = remaining,
            "Successful GET"
        );

        match serde_json::from_slice(&body) {
            Ok(data) => Ok(Fetched::Data(data)),
            Err(e) => {
                tracing::warn!(endpoint, error = %e, "Could not decode response body");
                Ok(Fetched::Undecodable)
            }
        }
    }
}

/// Maps a non-404 status onto the error taxonomy; success passes.
pub fn check_status(status: StatusCode, endpoint: &str, remaining: Option<i64>) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::error!(endpoint, ?remaining, "Rate limit exceeded");
        return Err(ApiError::RateLimitExceeded {
            endpoint: endpoint.to_string(),
            remaining,
        });
    }

    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::RoundNotFound(endpoint.to_string()));
    }

    tracing::error!(endpoint, status = status.as_u16(), "Unexpected upstream status");
    Err(ApiError::UpstreamHttp {
        status: status.as_u16(),
        endpoint: endpoint.to_string(),
    })
}

fn parse_remaining(headers: &HeaderMap) -> Option<i64> {
    headers
        .get(RATE_LIMIT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}
