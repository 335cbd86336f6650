//! Error types for the signal pipeline

use thiserror::Error;

/// Failures raised while talking to a market data provider.
///
/// Every variant is recoverable: the source retries with backoff and
/// eventually reports itself unavailable instead of propagating.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed payload: {0}")]
    Parse(String),
    #[error("no data received for {0:?}")]
    Timeout(std::time::Duration),
    #[error("a connect or refresh is already in flight for {0}")]
    Busy(String),
    #[error("stream closed by provider")]
    Closed,
    #[error("operation not supported by feed: {0}")]
    Unsupported(&'static str),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IndicatorError {
    #[error("invalid period {0} for {1}")]
    InvalidPeriod(usize, &'static str),
}
