//! Shared utilities for stockscope
//!
//! Logging setup and application level settings used by the binaries.

pub mod config;
pub mod error;
pub mod logging;

pub use config::AppSettings;
pub use error::{Result, UtilsError};
pub use logging::{LogFormat, init_tracing};
