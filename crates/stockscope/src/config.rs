//! Configuration for instrument analysis runs

use crate::analysis::sentiment::DEFAULT_NEWS_WINDOW;
use crate::error::{Result, ScopeError};
use crate::identifiers::Identifier;
use crate::models::HistoryPeriod;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable holding the Finnhub API key
pub const ENV_FINNHUB_API_KEY: &str = "FINNHUB_API_KEY";
pub const ENV_NEWS_WINDOW: &str = "STOCKSCOPE_NEWS_WINDOW";
pub const ENV_CONCURRENCY: &str = "STOCKSCOPE_CONCURRENCY";
pub const ENV_TIMEOUT_SECS: &str = "STOCKSCOPE_TIMEOUT_SECS";
pub const ENV_LEXICON: &str = "STOCKSCOPE_LEXICON";

/// Upper bound for `max_retries`
pub const MAX_RETRIES: u32 = 10;

/// Configuration for instrument analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Number of most recent news items scored per instrument
    pub news_window: usize,

    /// Lookback for the trend and yield calculations
    pub history_period: HistoryPeriod,

    /// Lookback for the short-term price view
    pub recent_period: HistoryPeriod,

    /// Instruments analysed at the same time
    pub concurrency: usize,

    /// Cache TTL for price and dividend history
    pub cache_ttl_prices: Duration,

    /// Cache TTL for company metadata and financial statements
    pub cache_ttl_fundamental: Duration,

    /// Cache TTL for news data
    pub cache_ttl_news: Duration,

    /// Maximum number of attempts for provider calls
    pub max_retries: u32,

    /// Initial backoff duration for retries
    pub retry_backoff_base: Duration,

    /// Timeout for a single provider call
    pub request_timeout: Duration,

    /// Finnhub API key (optional, enables news summaries, sectors and financials)
    pub finnhub_api_key: Option<String>,

    /// Finnhub requests per minute
    pub finnhub_rate_limit: u32,

    /// VADER-format lexicon replacing the built-in one
    pub lexicon_path: Option<PathBuf>,

    /// Identifiers compared against each instrument's sector
    pub peer_universe: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            news_window: DEFAULT_NEWS_WINDOW,
            history_period: HistoryPeriod::Years(5),
            recent_period: HistoryPeriod::Days(3),
            concurrency: 1,
            cache_ttl_prices: Duration::from_secs(300),        // 5 minutes
            cache_ttl_fundamental: Duration::from_secs(3600),  // 1 hour
            cache_ttl_news: Duration::from_secs(300),          // 5 minutes
            max_retries: 3,
            retry_backoff_base: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
            finnhub_api_key: None,
            finnhub_rate_limit: 60,
            lexicon_path: None,
            peer_universe: Vec::new(),
        }
    }
}

impl ScopeConfig {
    /// Create a new configuration builder
    pub fn builder() -> ScopeConfigBuilder {
        ScopeConfigBuilder::default()
    }

    /// Overlay values from the environment
    pub fn from_env(mut self) -> Result<Self> {
        if let Ok(key) = std::env::var(ENV_FINNHUB_API_KEY) {
            if !key.trim().is_empty() {
                self.finnhub_api_key = Some(key);
            }
        }
        if let Ok(window) = std::env::var(ENV_NEWS_WINDOW) {
            self.news_window = parse_env(ENV_NEWS_WINDOW, &window)?;
        }
        if let Ok(concurrency) = std::env::var(ENV_CONCURRENCY) {
            self.concurrency = parse_env(ENV_CONCURRENCY, &concurrency)?;
        }
        if let Ok(secs) = std::env::var(ENV_TIMEOUT_SECS) {
            self.request_timeout = Duration::from_secs(parse_env(ENV_TIMEOUT_SECS, &secs)?);
        }
        if let Ok(path) = std::env::var(ENV_LEXICON) {
            self.lexicon_path = Some(PathBuf::from(path));
        }
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(ScopeError::ConfigError(
                "max_retries must be greater than 0".to_string()
            ));
        }

        if self.max_retries > MAX_RETRIES {
            return Err(ScopeError::ConfigError(format!(
                "max_retries must be at most {MAX_RETRIES}"
            )));
        }

        if self.concurrency == 0 {
            return Err(ScopeError::ConfigError(
                "concurrency must be greater than 0".to_string()
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ScopeError::ConfigError(
                "request_timeout must be greater than 0".to_string()
            ));
        }

        if self.finnhub_rate_limit == 0 {
            return Err(ScopeError::ConfigError(
                "finnhub_rate_limit must be greater than 0".to_string()
            ));
        }

        self.history_period.validate()?;
        self.recent_period.validate()?;
        self.peer_identifiers()?;
        Ok(())
    }

    /// Get retry backoff duration for attempt number
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        self.retry_backoff_base
            .saturating_mul(2_u32.saturating_pow(attempt))
    }

    /// Retry policy for provider calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            self.retry_backoff_base,
            self.retry_backoff(self.max_retries),
            2.0,
        )
    }

    /// Parsed peer universe
    pub fn peer_identifiers(&self) -> Result<Vec<Identifier>> {
        self.peer_universe
            .iter()
            .map(|raw| {
                Identifier::parse(raw).map_err(|_| {
                    ScopeError::ConfigError(format!("invalid peer identifier: {raw:?}"))
                })
            })
            .collect()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ScopeError::ConfigError(format!("{name} has an invalid value: {value:?}")))
}

/// Builder for ScopeConfig
#[derive(Debug, Default)]
pub struct ScopeConfigBuilder {
    news_window: Option<usize>,
    history_period: Option<HistoryPeriod>,
    recent_period: Option<HistoryPeriod>,
    concurrency: Option<usize>,
    cache_ttl_prices: Option<Duration>,
    cache_ttl_fundamental: Option<Duration>,
    cache_ttl_news: Option<Duration>,
    max_retries: Option<u32>,
    retry_backoff_base: Option<Duration>,
    request_timeout: Option<Duration>,
    finnhub_api_key: Option<String>,
    finnhub_rate_limit: Option<u32>,
    lexicon_path: Option<PathBuf>,
    peer_universe: Option<Vec<String>>,
}

impl ScopeConfigBuilder {
    /// Set the news window
    pub fn news_window(mut self, window: usize) -> Self {
        self.news_window = Some(window);
        self
    }

    /// Set the long history period
    pub fn history_period(mut self, period: HistoryPeriod) -> Self {
        self.history_period = Some(period);
        self
    }

    /// Set the recent history period
    pub fn recent_period(mut self, period: HistoryPeriod) -> Self {
        self.recent_period = Some(period);
        self
    }

    /// Set the number of concurrent instrument analyses
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    /// Set cache TTL for price data
    pub fn cache_ttl_prices(mut self, duration: Duration) -> Self {
        self.cache_ttl_prices = Some(duration);
        self
    }

    /// Set cache TTL for fundamental data
    pub fn cache_ttl_fundamental(mut self, duration: Duration) -> Self {
        self.cache_ttl_fundamental = Some(duration);
        self
    }

    /// Set cache TTL for news data
    pub fn cache_ttl_news(mut self, duration: Duration) -> Self {
        self.cache_ttl_news = Some(duration);
        self
    }

    /// Set maximum retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set retry backoff base duration
    pub fn retry_backoff_base(mut self, duration: Duration) -> Self {
        self.retry_backoff_base = Some(duration);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set Finnhub API key
    pub fn finnhub_api_key(mut self, key: impl Into<String>) -> Self {
        self.finnhub_api_key = Some(key.into());
        self
    }

    /// Set Finnhub requests per minute
    pub fn finnhub_rate_limit(mut self, per_minute: u32) -> Self {
        self.finnhub_rate_limit = Some(per_minute);
        self
    }

    /// Set a lexicon file
    pub fn lexicon_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lexicon_path = Some(path.into());
        self
    }

    /// Set the peer universe
    pub fn peer_universe<I, S>(mut self, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.peer_universe = Some(peers.into_iter().map(Into::into).collect());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ScopeConfig> {
        let defaults = ScopeConfig::default();

        let config = ScopeConfig {
            news_window: self.news_window.unwrap_or(defaults.news_window),
            history_period: self.history_period.unwrap_or(defaults.history_period),
            recent_period: self.recent_period.unwrap_or(defaults.recent_period),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            cache_ttl_prices: self.cache_ttl_prices.unwrap_or(defaults.cache_ttl_prices),
            cache_ttl_fundamental: self
                .cache_ttl_fundamental
                .unwrap_or(defaults.cache_ttl_fundamental),
            cache_ttl_news: self.cache_ttl_news.unwrap_or(defaults.cache_ttl_news),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_backoff_base: self.retry_backoff_base.unwrap_or(defaults.retry_backoff_base),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            finnhub_api_key: self.finnhub_api_key.or(defaults.finnhub_api_key),
            finnhub_rate_limit: self.finnhub_rate_limit.unwrap_or(defaults.finnhub_rate_limit),
            lexicon_path: self.lexicon_path.or(defaults.lexicon_path),
            peer_universe: self.peer_universe.unwrap_or(defaults.peer_universe),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ScopeConfig::default();
        assert_eq!(config.news_window, 10);
        assert_eq!(config.history_period, HistoryPeriod::Years(5));
        assert_eq!(config.recent_period, HistoryPeriod::Days(3));
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ScopeConfig::builder()
            .news_window(5)
            .concurrency(4)
            .max_retries(5)
            .request_timeout(Duration::from_secs(60))
            .peer_universe(["MSFT", "GOOGL"])
            .build()
            .unwrap();

        assert_eq!(config.news_window, 5);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.peer_identifiers().unwrap().len(), 2);
    }

    #[test]
    fn test_validation_zero_concurrency() {
        let config = ScopeConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bad_peer() {
        let result = ScopeConfig::builder().peer_universe(["AAPL", "not a ticker"]).build();
        assert!(matches!(result, Err(ScopeError::ConfigError(_))));
    }

    #[test]
    fn test_retry_backoff() {
        let config = ScopeConfig::default();
        assert_eq!(config.retry_backoff(0), Duration::from_secs(1));
        assert_eq!(config.retry_backoff(1), Duration::from_secs(2));
        assert_eq!(config.retry_backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn test_retry_backoff_saturates() {
        let config = ScopeConfig::default();
        assert_eq!(config.retry_backoff(40), Duration::from_secs(u64::from(u32::MAX)));

        let slow = ScopeConfig {
            retry_backoff_base: Duration::MAX,
            ..Default::default()
        };
        assert_eq!(slow.retry_backoff(3), Duration::MAX);
    }

    #[test]
    fn test_validation_too_many_retries() {
        let result = ScopeConfig::builder().max_retries(32).build();
        assert!(matches!(result, Err(ScopeError::ConfigError(_))));
        assert!(ScopeConfig::builder().max_retries(MAX_RETRIES).build().is_ok());
    }

    #[test]
    fn test_validation_history_period_out_of_range() {
        let result = ScopeConfig::builder()
            .history_period(HistoryPeriod::Years(300_000))
            .build();
        assert!(matches!(result, Err(ScopeError::ConfigError(_))));

        let config = ScopeConfig {
            recent_period: HistoryPeriod::Days(u32::MAX),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = ScopeConfig::default();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_secs(1));
    }
}
