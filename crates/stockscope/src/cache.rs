//! Caching layer for provider responses
//!
//! Values are stored as `serde_json::Value` so one cache type serves every
//! response shape; typed access goes through [`MarketCache::get_or_fetch`].

use crate::config::ScopeConfig;
use crate::error::Result;
use cached::{Cached, TimedCache};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key for provider requests
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Resolved symbol
    pub symbol: String,
    /// Provider operation
    pub endpoint: String,
    /// Additional parameters as JSON string
    pub params: String,
}

impl CacheKey {
    pub fn new(
        symbol: impl Into<String>,
        endpoint: impl Into<String>,
        params: impl Serialize,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            endpoint: endpoint.into(),
            params: serde_json::to_string(&params).unwrap_or_default(),
        }
    }
}

/// Thread-safe TTL cache
pub struct MarketCache {
    cache: Arc<RwLock<TimedCache<CacheKey, serde_json::Value>>>,
}

impl MarketCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, value: serde_json::Value) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Get or fetch a value using the provided fetcher function
    ///
    /// Failed fetches are not cached. A cached entry that no longer
    /// deserializes as `T` is treated as a miss.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: CacheKey, fetcher: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        if let Some(value) = self.get(&key).await {
            match serde_json::from_value(value) {
                Ok(hit) => {
                    tracing::debug!("Cache hit for key: {:?}", key);
                    return Ok(hit);
                }
                Err(e) => tracing::debug!("Discarding stale cache entry {:?}: {}", key, e),
            }
        } else {
            tracing::debug!("Cache miss for key: {:?}", key);
        }

        let fetched = fetcher().await?;
        self.insert(key, serde_json::to_value(&fetched)?).await;
        Ok(fetched)
    }

    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Clone for MarketCache {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
        }
    }
}

/// Cache tiers by data volatility
#[derive(Clone)]
pub struct CacheManager {
    /// Price and dividend history
    pub prices: MarketCache,
    /// Metadata and financial statements
    pub fundamental: MarketCache,
    /// News
    pub news: MarketCache,
}

impl CacheManager {
    pub fn new(prices_ttl: Duration, fundamental_ttl: Duration, news_ttl: Duration) -> Self {
        Self {
            prices: MarketCache::new(prices_ttl),
            fundamental: MarketCache::new(fundamental_ttl),
            news: MarketCache::new(news_ttl),
        }
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        Self::new(
            config.cache_ttl_prices,
            config.cache_ttl_fundamental,
            config.cache_ttl_news,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScopeError;
    use crate::models::NewsItem;

    #[test]
    fn test_cache_key_creation() {
        let key = CacheKey::new("AAPL", "history", "5y");
        assert_eq!(key.symbol, "AAPL");
        assert_eq!(key.endpoint, "history");
        assert!(key.params.contains("5y"));
    }

    #[test]
    fn test_stale_entry_is_refetched() {
        let cache = MarketCache::new(Duration::from_secs(60));
        let key = CacheKey::new("SAP.DE", "metadata", ());

        let fetched: Vec<String> = tokio_test::block_on(async {
            cache.insert(key.clone(), serde_json::json!({"not": "a list"})).await;
            cache
                .get_or_fetch(key.clone(), || async { Ok(vec!["fresh".to_string()]) })
                .await
                .unwrap()
        });

        assert_eq!(fetched, vec!["fresh"]);
        let cached = tokio_test::block_on(cache.get(&key));
        assert_eq!(cached, Some(serde_json::json!(["fresh"])));
    }

    #[tokio::test]
    async fn test_cache_insert_and_get() {
        let cache = MarketCache::new(Duration::from_secs(60));
        let key = CacheKey::new("AAPL", "metadata", ());
        let value = serde_json::json!({"sector": "Technology"});

        cache.insert(key.clone(), value.clone()).await;
        assert_eq!(cache.get(&key).await, Some(value));
    }

    #[tokio::test]
    async fn test_get_or_fetch_typed() {
        let cache = MarketCache::new(Duration::from_secs(60));
        let key = CacheKey::new("AAPL", "news", ());
        let items = vec![NewsItem::new("Apple beats", "Strong quarter")];

        let mut call_count = 0;
        let first: Vec<NewsItem> = cache
            .get_or_fetch(key.clone(), || {
                call_count += 1;
                let items = items.clone();
                async move { Ok(items) }
            })
            .await
            .unwrap();
        assert_eq!(first, items);

        let second: Vec<NewsItem> = cache
            .get_or_fetch(key, || {
                call_count += 1;
                async { Ok(Vec::new()) }
            })
            .await
            .unwrap();
        assert_eq!(second, items);
        assert_eq!(call_count, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_not_cached() {
        let cache = MarketCache::new(Duration::from_secs(60));
        let key = CacheKey::new("XYZ", "metadata", ());

        let result: Result<String> = cache
            .get_or_fetch(key.clone(), || async {
                Err(ScopeError::ApiError("boom".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_cache_manager_tiers() {
        let manager = CacheManager::from_config(&ScopeConfig::default());
        let key = CacheKey::new("AAPL", "x", ());

        manager.prices.insert(key.clone(), serde_json::json!(1)).await;
        manager.fundamental.insert(key.clone(), serde_json::json!(2)).await;
        manager.news.insert(key, serde_json::json!(3)).await;
        assert_eq!(
            manager.prices.get(&CacheKey::new("AAPL", "x", ())).await,
            Some(serde_json::json!(1))
        );
        assert_eq!(manager.fundamental.len().await, 1);
        assert_eq!(manager.news.len().await, 1);

        // clones share storage, tiers do not
        let clone = manager.clone();
        clone.news.insert(CacheKey::new("MSFT", "x", ()), serde_json::json!(4)).await;
        assert_eq!(manager.news.len().await, 2);
        assert_eq!(manager.prices.len().await, 1);
    }
}
