//! Error types for instrument analysis operations

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Instrument analysis specific errors
#[derive(Debug, Error)]
pub enum ScopeError {
    /// Provider returned nothing for the request
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable {
        symbol: String,
        reason: String,
    },

    /// Not enough points to fit a line
    #[error("Insufficient data: need at least {required} points, got {actual}")]
    InsufficientData {
        required: usize,
        actual: usize,
    },

    /// Yield is undefined without prices
    #[error("Price series is empty, yield is undefined")]
    EmptyPriceSeries,

    /// Yield is undefined for a zero average price
    #[error("Average price is zero, yield is undefined")]
    ZeroAveragePrice,

    /// Input contained values the estimators cannot use
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Identifier is not an ISIN, WKN or ticker
    #[error("Malformed identifier: {0:?}")]
    MalformedIdentifier(String),

    /// A required input resource does not exist
    #[error("Resource not found: {}", path.display())]
    ResourceNotFound {
        path: PathBuf,
    },

    /// Filesystem error other than a missing resource
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transient upstream failure (5xx, broken connection)
    #[error("API error: {0}")]
    ApiError(String),

    /// Provider refused the request; repeating it gives the same answer
    #[error("{provider} rejected the request: {reason}")]
    RequestRejected {
        provider: String,
        reason: String,
    },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded {
        provider: String,
    },

    /// Provider call did not answer in time
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: String,
        after: Duration,
    },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Sentiment lexicon could not be parsed
    #[error("Lexicon error at line {line}: {reason}")]
    LexiconError {
        line: usize,
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Chart rendering error
    #[error("Chart error: {0}")]
    ChartError(String),
}

/// Coarse, serialisable classification of a [`ScopeError`]
///
/// Reports and failure records carry the kind rather than the error itself so
/// they stay `Clone` and can be dumped as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    DataUnavailable,
    InsufficientData,
    EmptyPriceSeries,
    ZeroAveragePrice,
    InvalidData,
    MalformedIdentifier,
    ResourceNotFound,
    Io,
    Provider,
    RateLimited,
    Timeout,
    Lexicon,
    Config,
    Presentation,
}

impl ErrorKind {
    /// Short human readable label
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::DataUnavailable => "data unavailable",
            ErrorKind::InsufficientData => "insufficient data",
            ErrorKind::EmptyPriceSeries => "empty price series",
            ErrorKind::ZeroAveragePrice => "zero average price",
            ErrorKind::InvalidData => "invalid data",
            ErrorKind::MalformedIdentifier => "malformed identifier",
            ErrorKind::ResourceNotFound => "resource not found",
            ErrorKind::Io => "i/o error",
            ErrorKind::Provider => "provider error",
            ErrorKind::RateLimited => "rate limited",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Lexicon => "lexicon error",
            ErrorKind::Config => "configuration error",
            ErrorKind::Presentation => "presentation error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl ScopeError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScopeError::DataUnavailable { .. } => ErrorKind::DataUnavailable,
            ScopeError::InsufficientData { .. } => ErrorKind::InsufficientData,
            ScopeError::EmptyPriceSeries => ErrorKind::EmptyPriceSeries,
            ScopeError::ZeroAveragePrice => ErrorKind::ZeroAveragePrice,
            ScopeError::InvalidData(_) => ErrorKind::InvalidData,
            ScopeError::MalformedIdentifier(_) => ErrorKind::MalformedIdentifier,
            ScopeError::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            ScopeError::Io(_) => ErrorKind::Io,
            ScopeError::ApiError(_)
            | ScopeError::RequestRejected { .. }
            | ScopeError::NetworkError(_)
            | ScopeError::JsonError(_)
            | ScopeError::YahooFinanceError(_) => ErrorKind::Provider,
            ScopeError::RateLimitExceeded { .. } => ErrorKind::RateLimited,
            ScopeError::Timeout { .. } => ErrorKind::Timeout,
            ScopeError::LexiconError { .. } => ErrorKind::Lexicon,
            ScopeError::ConfigError(_) => ErrorKind::Config,
            ScopeError::ChartError(_) => ErrorKind::Presentation,
        }
    }

    /// Whether retrying the same provider request may succeed
    ///
    /// Rejected requests, unknown symbols and malformed responses fail the
    /// same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScopeError::ApiError(_)
                | ScopeError::NetworkError(_)
                | ScopeError::RateLimitExceeded { .. }
                | ScopeError::Timeout { .. }
        )
    }

    /// Shorthand for [`ScopeError::DataUnavailable`]
    pub fn unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        ScopeError::DataUnavailable {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for analysis operations
pub type Result<T> = std::result::Result<T, ScopeError>;
