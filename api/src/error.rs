use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Exceeded API rate limit on {endpoint} (remaining: {remaining:?})")]
    RateLimitExceeded {
        endpoint: String,
        remaining: Option<i64>,
    },

    #[error("HTTP response status 404 for {0}: round not found or is still ongoing")]
    RoundNotFound(String),

    #[error("Upstream HTTP error (status {status}) on {endpoint}")]
    UpstreamHttp { status: u16, endpoint: String },

    #[error("Could not decode response body of {0}")]
    UndecodableBody(String),

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

impl ApiError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ApiError::RateLimitExceeded { .. })
    }
}
