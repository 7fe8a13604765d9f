//! Market data access behind a mockable trait
//!
//! [`MarketDataService`] is the production implementation: prices and
//! dividends from Yahoo, company news, profile and financials from Finnhub
//! when an API key is configured, with Yahoo fallbacks otherwise. Every call
//! is bounded by the configured timeout, retried on transient failures and
//! cached per tier.

use crate::api::{FinnhubClient, YahooFinanceClient};
use crate::cache::{CacheKey, CacheManager, MarketCache};
use crate::config::ScopeConfig;
use crate::error::{Result, ScopeError};
use crate::identifiers::Identifier;
use crate::models::{
    DividendEvent, FinancialStatements, HistoryPeriod, InstrumentMetadata, NewsItem, PriceSeries,
};
use crate::retry::{RetryPolicy, with_timeout};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

/// Source of everything the analyzer needs about one instrument
///
/// Empty results are returned as empty values, not errors.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// News items, oldest first
    async fn get_news(&self, id: &Identifier) -> Result<Vec<NewsItem>>;

    /// Daily closes over `period`
    async fn get_price_history(
        &self,
        id: &Identifier,
        period: HistoryPeriod,
    ) -> Result<PriceSeries>;

    /// Dividends paid over `period`
    async fn get_dividends(
        &self,
        id: &Identifier,
        period: HistoryPeriod,
    ) -> Result<Vec<DividendEvent>>;

    async fn get_metadata(&self, id: &Identifier) -> Result<InstrumentMetadata>;

    async fn get_financial_statements(&self, id: &Identifier) -> Result<FinancialStatements>;
}

/// Yahoo plus optional Finnhub, with timeouts, retries and caching
pub struct MarketDataService {
    yahoo: YahooFinanceClient,
    finnhub: Option<FinnhubClient>,
    cache: CacheManager,
    retry: RetryPolicy,
    timeout: Duration,
}

impl MarketDataService {
    pub fn new(config: &ScopeConfig) -> Self {
        let finnhub = config
            .finnhub_api_key
            .as_ref()
            .filter(|key| !key.trim().is_empty())
            .map(|key| FinnhubClient::new(key.clone(), config.finnhub_rate_limit));

        if finnhub.is_none() {
            tracing::info!(
                "No Finnhub API key configured; \
                 news summaries and financial statements are unavailable"
            );
        }

        Self {
            yahoo: YahooFinanceClient::new(),
            finnhub,
            cache: CacheManager::from_config(config),
            retry: config.retry_policy(),
            timeout: config.request_timeout,
        }
    }

    pub fn has_finnhub(&self) -> bool {
        self.finnhub.is_some()
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Listing symbol for `id`, resolved once and cached
    pub async fn resolve_symbol(&self, id: &Identifier) -> Result<String> {
        let key = CacheKey::new(id.as_str(), "resolve", ());
        self.cached_call(&self.cache.fundamental, key, "resolve symbol", move || {
            self.yahoo.resolve_symbol(id)
        })
        .await
    }

    async fn cached_call<T, F, Fut>(
        &self,
        tier: &MarketCache,
        key: CacheKey,
        operation: &str,
        fetch: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let timeout = self.timeout;
        let fetch = &fetch;
        tier.get_or_fetch(key, move || {
            self.retry
                .execute(operation, move || with_timeout(operation, timeout, fetch()))
        })
        .await
    }

    async fn news_for(&self, symbol: &str) -> Result<Vec<NewsItem>> {
        match &self.finnhub {
            Some(finnhub) => finnhub.get_company_news(symbol).await,
            None => self.yahoo.get_news(symbol).await,
        }
    }

    async fn metadata_for(&self, symbol: &str) -> Result<InstrumentMetadata> {
        let Some(finnhub) = &self.finnhub else {
            return self.yahoo.get_metadata(symbol).await;
        };

        match finnhub.get_company_profile(symbol).await {
            Ok(metadata) => Ok(metadata),
            // non-US listings are often missing from the profile endpoint
            Err(ScopeError::DataUnavailable { .. }) => self.yahoo.get_metadata(symbol).await,
            Err(e) => Err(e),
        }
    }

    async fn financials_for(&self, symbol: &str) -> Result<FinancialStatements> {
        match &self.finnhub {
            Some(finnhub) => finnhub.get_financials_reported(symbol).await,
            None => Err(ScopeError::unavailable(
                symbol,
                "financial statements require a Finnhub API key",
            )),
        }
    }
}

#[async_trait]
impl MarketDataProvider for MarketDataService {
    async fn get_news(&self, id: &Identifier) -> Result<Vec<NewsItem>> {
        let symbol = self.resolve_symbol(id).await?;
        let symbol = symbol.as_str();
        let key = CacheKey::new(symbol, "news", self.has_finnhub());
        self.cached_call(&self.cache.news, key, "news", move || self.news_for(symbol))
            .await
    }

    async fn get_price_history(
        &self,
        id: &Identifier,
        period: HistoryPeriod,
    ) -> Result<PriceSeries> {
        let symbol = self.resolve_symbol(id).await?;
        let symbol = symbol.as_str();
        let key = CacheKey::new(symbol, "history", period.to_string());
        self.cached_call(&self.cache.prices, key, "price history", move || {
            self.yahoo.get_price_history(symbol, period)
        })
        .await
    }

    async fn get_dividends(
        &self,
        id: &Identifier,
        period: HistoryPeriod,
    ) -> Result<Vec<DividendEvent>> {
        let symbol = self.resolve_symbol(id).await?;
        let symbol = symbol.as_str();
        let key = CacheKey::new(symbol, "dividends", period.to_string());
        self.cached_call(&self.cache.prices, key, "dividends", move || {
            self.yahoo.get_dividends(symbol, period)
        })
        .await
    }

    async fn get_metadata(&self, id: &Identifier) -> Result<InstrumentMetadata> {
        let symbol = self.resolve_symbol(id).await?;
        let symbol = symbol.as_str();
        let key = CacheKey::new(symbol, "metadata", ());
        self.cached_call(&self.cache.fundamental, key, "metadata", move || {
            self.metadata_for(symbol)
        })
        .await
    }

    async fn get_financial_statements(&self, id: &Identifier) -> Result<FinancialStatements> {
        let symbol = self.resolve_symbol(id).await?;
        let symbol = symbol.as_str();
        let key = CacheKey::new(symbol, "financials", ());
        self.cached_call(&self.cache.fundamental, key, "financial statements", move || {
            self.financials_for(symbol)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> MarketDataService {
        let config = ScopeConfig {
            finnhub_api_key: None,
            ..Default::default()
        };
        MarketDataService::new(&config)
    }

    #[test]
    fn test_service_without_key() {
        assert!(!service().has_finnhub());

        let config = ScopeConfig {
            finnhub_api_key: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(!MarketDataService::new(&config).has_finnhub());
    }

    #[tokio::test]
    async fn test_financials_unavailable_without_key() {
        let service = service();
        let id = Identifier::parse("AAPL").unwrap();

        let result = service.get_financial_statements(&id).await;
        assert!(matches!(result, Err(ScopeError::DataUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_ticker_resolution_is_cached() {
        let service = service();
        let id = Identifier::parse("MSFT").unwrap();

        assert_eq!(service.resolve_symbol(&id).await.unwrap(), "MSFT");
        assert_eq!(service.cache().fundamental.len().await, 1);
        assert_eq!(service.resolve_symbol(&id).await.unwrap(), "MSFT");
        assert_eq!(service.cache().fundamental.len().await, 1);
    }

    #[tokio::test]
    async fn test_mock_provider() {
        let mut mock = MockMarketDataProvider::new();
        mock.expect_get_news()
            .returning(|_| Ok(vec![NewsItem::new("Headline", "Great results")]));

        let id = Identifier::parse("AAPL").unwrap();
        let news = mock.get_news(&id).await.unwrap();
        assert_eq!(news.len(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_history() {
        let service = service();
        let id = Identifier::parse("AAPL").unwrap();
        let history = service.get_price_history(&id, HistoryPeriod::Months(1)).await.unwrap();
        assert!(!history.is_empty());
    }
}
