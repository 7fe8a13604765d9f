//! Yahoo Finance API client
//!
//! Price history and dividends come from the chart endpoint through
//! `yahoo_finance_api`. Symbol lookup, headlines and basic company data come
//! from the public search endpoint, which also resolves ISINs and WKNs to a
//! listing symbol.

use crate::error::{Result, ScopeError};
use crate::identifiers::Identifier;
use crate::models::{
    DividendEvent, HistoryPeriod, InstrumentMetadata, NewsItem, PricePoint, PriceSeries,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use yahoo_finance_api as yahoo;

const SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";
const PROVIDER: &str = "Yahoo Finance";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; stockscope/0.1)";

/// Number of headlines requested from the search endpoint
pub const SEARCH_NEWS_COUNT: usize = 20;

/// Yahoo Finance API client
#[derive(Clone)]
pub struct YahooFinanceClient {
    http: reqwest::Client,
}

/// Listing returned by the search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuote {
    pub symbol: String,
    #[serde(default, rename = "shortname")]
    pub short_name: Option<String>,
    #[serde(default, rename = "longname")]
    pub long_name: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub exch_disp: Option<String>,
    #[serde(default)]
    pub quote_type: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
}

/// Headline returned by the search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchNews {
    pub title: String,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub provider_publish_time: Option<i64>,
}

/// Search endpoint response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub quotes: Vec<SearchQuote>,
    #[serde(default)]
    pub news: Vec<SearchNews>,
}

impl YahooFinanceClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    /// Map an identifier to a symbol the chart endpoint understands
    ///
    /// Tickers are used as given. ISINs and WKNs go through search and take
    /// the first listing.
    pub async fn resolve_symbol(&self, identifier: &Identifier) -> Result<String> {
        if identifier.is_symbol() {
            return Ok(identifier.as_str().to_string());
        }

        let response = self.search(identifier.as_str(), 1, 0).await?;
        let symbol = response
            .quotes
            .into_iter()
            .next()
            .map(|q| q.symbol)
            .ok_or_else(|| ScopeError::unavailable(identifier.as_str(), "no listing found"))?;

        tracing::debug!("Resolved {} to {}", identifier, symbol);
        Ok(symbol)
    }

    /// Query the search endpoint
    pub async fn search(&self, query: &str, quotes: usize, news: usize) -> Result<SearchResponse> {
        let response = self
            .http
            .get(SEARCH_URL)
            .query(&[
                ("q", query.to_string()),
                ("quotesCount", quotes.to_string()),
                ("newsCount", news.to_string()),
            ])
            .send()
            .await
            .map_err(|e| ScopeError::ApiError(format!("Yahoo search request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ScopeError::RateLimitExceeded {
                provider: PROVIDER.to_string(),
            });
        }
        if status.is_client_error() {
            return Err(ScopeError::RequestRejected {
                provider: PROVIDER.to_string(),
                reason: format!("search returned {status}"),
            });
        }
        if !status.is_success() {
            return Err(ScopeError::ApiError(format!("Yahoo search error {status}")));
        }

        let body = response.text().await?;
        parse_search_response(&body)
    }

    /// Daily closes over `period`
    pub async fn get_price_history(
        &self,
        symbol: &str,
        period: HistoryPeriod,
    ) -> Result<PriceSeries> {
        let response = self.quote_history(symbol, period).await?;
        let quotes = response.quotes().map_err(|e| classify_error(symbol, e))?;

        Ok(PriceSeries::new(
            quotes
                .iter()
                .filter_map(|q| {
                    from_unix(q.timestamp as i64).map(|ts| PricePoint::new(ts, q.close))
                })
                .collect(),
        ))
    }

    /// Dividends paid over `period`, oldest first
    pub async fn get_dividends(
        &self,
        symbol: &str,
        period: HistoryPeriod,
    ) -> Result<Vec<DividendEvent>> {
        let response = self.quote_history(symbol, period).await?;
        let dividends = response.dividends().map_err(|e| classify_error(symbol, e))?;

        let mut events: Vec<DividendEvent> = dividends
            .iter()
            .filter_map(|d| from_unix(d.date as i64).map(|ts| DividendEvent::new(ts, d.amount)))
            .collect();
        events.sort_by_key(|d| d.timestamp);
        Ok(events)
    }

    /// Headlines from search; Yahoo provides no summary text
    pub async fn get_news(&self, symbol: &str) -> Result<Vec<NewsItem>> {
        let response = self.search(symbol, 0, SEARCH_NEWS_COUNT).await?;
        Ok(news_from_search(response.news))
    }

    /// Name, exchange and, when listed, sector of `symbol`
    pub async fn get_metadata(&self, symbol: &str) -> Result<InstrumentMetadata> {
        let response = self.search(symbol, 5, 0).await?;
        metadata_from_search(symbol, response.quotes)
    }

    async fn quote_history(&self, symbol: &str, period: HistoryPeriod) -> Result<yahoo::YResponse> {
        let provider = yahoo::YahooConnector::new().map_err(|e| classify_error(symbol, e))?;

        let end = Utc::now();
        let start = period.start_from(end)?;
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| ScopeError::YahooFinanceError(format!("Invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| ScopeError::YahooFinanceError(format!("Invalid end timestamp: {e}")))?;

        provider
            .get_quote_history(symbol, start_odt, end_odt)
            .await
            .map_err(|e| classify_error(symbol, e))
    }
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Split connector errors into transient and permanent failures
pub(crate) fn classify_error(symbol: &str, error: yahoo::YahooError) -> ScopeError {
    match error {
        yahoo::YahooError::ConnectionFailed(e) => {
            ScopeError::ApiError(format!("Yahoo connection failed: {e}"))
        }
        yahoo::YahooError::TooManyRequests(_) => ScopeError::RateLimitExceeded {
            provider: PROVIDER.to_string(),
        },
        yahoo::YahooError::NoResult | yahoo::YahooError::NoQuotes => {
            ScopeError::unavailable(symbol, "Yahoo returned no data")
        }
        yahoo::YahooError::ApiError(message) => ScopeError::RequestRejected {
            provider: PROVIDER.to_string(),
            reason: message
                .description
                .or(message.code)
                .unwrap_or_else(|| "unknown error".to_string()),
        },
        other => ScopeError::YahooFinanceError(other.to_string()),
    }
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

pub(crate) fn parse_search_response(body: &str) -> Result<SearchResponse> {
    Ok(serde_json::from_str(body)?)
}

pub(crate) fn news_from_search(news: Vec<SearchNews>) -> Vec<NewsItem> {
    let mut items: Vec<NewsItem> = news
        .into_iter()
        .map(|n| NewsItem {
            title: n.title,
            summary: String::new(),
            publisher: n.publisher,
            link: n.link,
            published_at: n.provider_publish_time.and_then(from_unix),
        })
        .collect();
    // oldest first, so the news window takes the most recent items
    items.sort_by_key(|n| n.published_at);
    items
}

pub(crate) fn metadata_from_search(
    symbol: &str,
    quotes: Vec<SearchQuote>,
) -> Result<InstrumentMetadata> {
    let quote = quotes
        .into_iter()
        .find(|q| q.symbol.eq_ignore_ascii_case(symbol))
        .ok_or_else(|| ScopeError::unavailable(symbol, "symbol not listed in search results"))?;

    let mut metadata = InstrumentMetadata::for_symbol(quote.symbol);
    metadata.name = quote.long_name.or(quote.short_name);
    metadata.exchange = quote.exch_disp.or(quote.exchange);
    metadata.sector = quote.sector;
    metadata.industry = quote.industry;
    if let Some(quote_type) = quote.quote_type {
        metadata.extra.insert("quoteType".to_string(), serde_json::Value::String(quote_type));
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_FIXTURE: &str = r#"{
        "count": 2,
        "quotes": [
            {"exchange": "NMS", "shortname": "Apple Inc.", "quoteType": "EQUITY",
             "symbol": "AAPL", "longname": "Apple Inc.", "exchDisp": "NASDAQ",
             "sector": "Technology", "industry": "Consumer Electronics"},
            {"exchange": "GER", "shortname": "APPLE INC", "quoteType": "EQUITY",
             "symbol": "APC.DE"}
        ],
        "news": [
            {"uuid": "b", "title": "Later story", "publisher": "Reuters",
             "link": "https://example.com/b", "providerPublishTime": 1700003600, "type": "STORY"},
            {"uuid": "a", "title": "Earlier story", "publisher": "Bloomberg",
             "link": "https://example.com/a", "providerPublishTime": 1700000000, "type": "STORY"}
        ]
    }"#;

    #[test]
    fn test_parse_search_response() {
        let response = parse_search_response(SEARCH_FIXTURE).unwrap();
        assert_eq!(response.quotes.len(), 2);
        assert_eq!(response.quotes[0].exch_disp.as_deref(), Some("NASDAQ"));
        assert_eq!(response.news.len(), 2);
    }

    #[test]
    fn test_parse_search_response_without_sections() {
        let response = parse_search_response(r#"{"count": 0}"#).unwrap();
        assert!(response.quotes.is_empty());
        assert!(response.news.is_empty());
    }

    #[test]
    fn test_news_from_search_sorted_without_summary() {
        let response = parse_search_response(SEARCH_FIXTURE).unwrap();
        let items = news_from_search(response.news);

        assert_eq!(items[0].title, "Earlier story");
        assert_eq!(items[1].title, "Later story");
        assert!(items.iter().all(|n| n.summary.is_empty()));
        assert_eq!(items[1].publisher.as_deref(), Some("Reuters"));
    }

    #[test]
    fn test_metadata_from_search() {
        let response = parse_search_response(SEARCH_FIXTURE).unwrap();

        let meta = metadata_from_search("AAPL", response.quotes.clone()).unwrap();
        assert_eq!(meta.name.as_deref(), Some("Apple Inc."));
        assert_eq!(meta.exchange.as_deref(), Some("NASDAQ"));
        assert_eq!(meta.sector_or_unknown(), "Technology");
        assert_eq!(meta.extra["quoteType"], "EQUITY");

        let listing = metadata_from_search("APC.DE", response.quotes.clone()).unwrap();
        assert_eq!(listing.sector, None);

        assert!(matches!(
            metadata_from_search("MSFT", response.quotes),
            Err(ScopeError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn test_classify_error() {
        let not_found = yahoo::YahooError::ApiError(
            serde_json::from_value(serde_json::json!({
                "code": "Not Found",
                "description": "No data found, symbol may be delisted"
            }))
            .unwrap(),
        );
        let err = classify_error("NOPE", not_found);
        assert!(matches!(err, ScopeError::RequestRejected { .. }));
        assert!(!err.is_retryable());

        let empty = classify_error("NOPE", yahoo::YahooError::NoResult);
        assert!(matches!(empty, ScopeError::DataUnavailable { .. }));
        assert!(!empty.is_retryable());

        let limited =
            classify_error("AAPL", yahoo::YahooError::TooManyRequests("chart".to_string()));
        assert!(limited.is_retryable());

        assert!(!classify_error("AAPL", yahoo::YahooError::DataInconsistency).is_retryable());
    }

    #[tokio::test]
    async fn test_ticker_resolves_without_network() {
        let client = YahooFinanceClient::new();
        let id = Identifier::parse("BRK.B").unwrap();
        assert_eq!(client.resolve_symbol(&id).await.unwrap(), "BRK.B");
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_resolve_isin() {
        let client = YahooFinanceClient::new();
        let id = Identifier::parse("US0378331005").unwrap();
        assert_eq!(client.resolve_symbol(&id).await.unwrap(), "AAPL");
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_get_price_history() {
        let client = YahooFinanceClient::new();
        let history = client.get_price_history("AAPL", HistoryPeriod::Months(1)).await.unwrap();
        assert!(!history.is_empty());
        assert!(history.closes().iter().all(|c| *c > 0.0));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_get_dividends() {
        let client = YahooFinanceClient::new();
        let dividends = client.get_dividends("AAPL", HistoryPeriod::Years(2)).await.unwrap();
        assert!(!dividends.is_empty());
    }
}
