//! Application level settings

use crate::error::Result;
use crate::logging::{DEFAULT_FILTER, LogFormat, init_tracing};
use serde::{Deserialize, Serialize};

/// Settings shared by every stockscope binary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Application name
    pub app_name: String,
    pub log_format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            app_name: "stockscope".to_string(),
            log_format: LogFormat::default(),
            log_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl AppSettings {
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Install the tracing subscriber described by these settings
    pub fn init_logging(&self) -> Result<()> {
        init_tracing(self.log_format, &self.log_filter)?;
        tracing::info!(app = %self.app_name, format = %self.log_format, "Logging initialised");
        Ok(())
    }
}
