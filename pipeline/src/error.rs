use std::fmt::Display;

use api::ApiError;
use database::DatabaseError;
use thiserror::Error;
use transform::NormalizeError;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Store(#[from] DatabaseError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure classes reported to the operator when a run stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RateLimitExceeded,
    RoundNotFound,
    UpstreamHttpError,
    MalformedMetricPayload,
    StoreError,
    TransportError,
    ConfigError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::RateLimitExceeded => "RateLimitExceeded",
            ErrorKind::RoundNotFound => "RoundNotFound",
            ErrorKind::UpstreamHttpError => "UpstreamHTTPError",
            ErrorKind::MalformedMetricPayload => "MalformedMetricPayload",
            ErrorKind::StoreError => "StoreError",
            ErrorKind::TransportError => "TransportError",
            ErrorKind::ConfigError => "ConfigError",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Api(e) => match e {
                ApiError::RateLimitExceeded { .. } => ErrorKind::RateLimitExceeded,
                ApiError::RoundNotFound(_) => ErrorKind::RoundNotFound,
                ApiError::UpstreamHttp { .. } | ApiError::UndecodableBody(_) => {
                    ErrorKind::UpstreamHttpError
                }
                ApiError::Transport(_) => ErrorKind::TransportError,
                ApiError::InvalidBaseUrl(_) => ErrorKind::ConfigError,
            },
            PipelineError::Normalize(_) => ErrorKind::MalformedMetricPayload,
            PipelineError::Store(e) => match e {
                DatabaseError::Config(_) | DatabaseError::InvalidIdentifier(_) => {
                    ErrorKind::ConfigError
                }
                _ => ErrorKind::StoreError,
            },
            PipelineError::Config(_) => ErrorKind::ConfigError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_follow_failure_taxonomy() {
        let rate_limited = PipelineError::from(ApiError::RateLimitExceeded {
            endpoint: "/blackbox/5".to_string(),
            remaining: Some(0),
        });
        let upstream = PipelineError::from(ApiError::UpstreamHttp {
            status: 502,
            endpoint: "/roundlist?offset=0".to_string(),
        });
        let store = PipelineError::from(DatabaseError::ChunkFailed {
            table: "main.rounds".to_string(),
            chunk_index: 2,
            rows_committed: 2000,
            message: "disk I/O error".to_string(),
        });

        assert_eq!(rate_limited.kind().to_string(), "RateLimitExceeded");
        assert_eq!(upstream.kind().to_string(), "UpstreamHTTPError");
        assert_eq!(store.kind(), ErrorKind::StoreError);
    }

    #[test]
    fn test_store_misconfiguration_is_config_error() {
        let err = PipelineError::from(DatabaseError::InvalidIdentifier("rounds-v2".to_string()));

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }
}
