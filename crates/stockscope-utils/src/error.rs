//! Error types for shared utilities

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UtilsError {
    #[error("Unknown log format: {0:?} (expected \"pretty\" or \"json\")")]
    InvalidLogFormat(String),

    #[error("Failed to install tracing subscriber: {0}")]
    TracingInit(String),
}

pub type Result<T> = std::result::Result<T, UtilsError>;
