//! Finnhub client for company news, profiles and reported financials

use crate::error::{Result, ScopeError};
use crate::models::{FinancialStatements, InstrumentMetadata, LineItem, NewsItem};
use chrono::{DateTime, Duration, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::Arc;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const BASE_URL: &str = "https://finnhub.io/api/v1";

/// Days of company news requested per symbol
pub const NEWS_LOOKBACK_DAYS: i64 = 14;

/// Finnhub news article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinnhubNewsArticle {
    #[serde(default)]
    pub category: String,
    /// Publish time (UNIX timestamp)
    #[serde(default)]
    pub datetime: i64,
    pub headline: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub related: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub url: String,
}

/// One reported filing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportedFiling {
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub quarter: i32,
    #[serde(default)]
    pub form: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub report: ReportSections,
}

/// Statement sections of a filing, keyed the way Finnhub keys them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSections {
    #[serde(default)]
    pub ic: Vec<ReportedLine>,
    #[serde(default)]
    pub bs: Vec<ReportedLine>,
    #[serde(default)]
    pub cf: Vec<ReportedLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportedLine {
    #[serde(default)]
    pub concept: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub unit: Option<String>,
    /// Usually a number; Finnhub sends strings such as `"N/A"` for some lines
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FinancialsReportedResponse {
    #[serde(default)]
    data: Vec<ReportedFiling>,
}

/// Finnhub client for company data
pub struct FinnhubClient {
    client: Client,
    api_key: String,
    rate_limiter: SharedRateLimiter,
}

impl FinnhubClient {
    /// Create a new Finnhub client with rate limiting
    ///
    /// # Arguments
    /// * `api_key` - Finnhub API key
    /// * `rate_limit` - Requests per minute (free tier: 60, premium: 300+)
    pub fn new(api_key: impl Into<String>, rate_limit: u32) -> Self {
        let quota = Quota::per_minute(NonZeroU32::new(rate_limit).unwrap_or(NonZeroU32::MIN));
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        Self {
            client: Client::new(),
            api_key: api_key.into(),
            rate_limiter,
        }
    }

    /// Company news of the last [`NEWS_LOOKBACK_DAYS`], oldest first
    pub async fn get_company_news(&self, symbol: &str) -> Result<Vec<NewsItem>> {
        let to = Utc::now();
        let from = to - Duration::days(NEWS_LOOKBACK_DAYS);
        let articles: Vec<FinnhubNewsArticle> = self
            .get_json(
                "company-news",
                &[
                    ("symbol", symbol.to_string()),
                    ("from", from.format("%Y-%m-%d").to_string()),
                    ("to", to.format("%Y-%m-%d").to_string()),
                ],
            )
            .await?;

        Ok(news_from_articles(articles))
    }

    /// Company profile; `finnhubIndustry` is used as the sector
    pub async fn get_company_profile(&self, symbol: &str) -> Result<InstrumentMetadata> {
        let profile: BTreeMap<String, serde_json::Value> = self
            .get_json("stock/profile2", &[("symbol", symbol.to_string())])
            .await?;

        metadata_from_profile(symbol, profile)
    }

    /// Most recent annual reported statements
    pub async fn get_financials_reported(&self, symbol: &str) -> Result<FinancialStatements> {
        let response: FinancialsReportedResponse = self
            .get_json(
                "stock/financials-reported",
                &[("symbol", symbol.to_string()), ("freq", "annual".to_string())],
            )
            .await?;

        latest_statements(symbol, response.data)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(format!("{BASE_URL}/{path}"))
            .query(params)
            .query(&[("token", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ScopeError::ApiError(format!("Finnhub request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Error for a non-success Finnhub response
pub(crate) fn status_error(status: StatusCode, body: &str) -> ScopeError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        ScopeError::RateLimitExceeded {
            provider: "Finnhub".to_string(),
        }
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ScopeError::ConfigError(format!("Finnhub rejected the API key ({status}): {body}"))
    } else if status.is_client_error() {
        ScopeError::RequestRejected {
            provider: "Finnhub".to_string(),
            reason: format!("{status}: {body}"),
        }
    } else {
        ScopeError::ApiError(format!("Finnhub API error {status}: {body}"))
    }
}

pub(crate) fn news_from_articles(mut articles: Vec<FinnhubNewsArticle>) -> Vec<NewsItem> {
    articles.sort_by_key(|a| a.datetime);
    articles
        .into_iter()
        .map(|a| NewsItem {
            title: a.headline,
            summary: a.summary,
            publisher: Some(a.source).filter(|s| !s.is_empty()),
            link: Some(a.url).filter(|u| !u.is_empty()),
            published_at: DateTime::from_timestamp(a.datetime, 0),
        })
        .collect()
}

pub(crate) fn metadata_from_profile(
    symbol: &str,
    mut profile: BTreeMap<String, serde_json::Value>,
) -> Result<InstrumentMetadata> {
    // unknown symbols come back as an empty object
    if profile.is_empty() {
        return Err(ScopeError::unavailable(symbol, "no company profile"));
    }

    let mut take_string = |key: &str| match profile.remove(key) {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    };

    let mut metadata = InstrumentMetadata::for_symbol(symbol);
    metadata.name = take_string("name");
    metadata.exchange = take_string("exchange");
    metadata.sector = take_string("finnhubIndustry");
    metadata.currency = take_string("currency");
    metadata.country = take_string("country");
    // reported in millions
    metadata.market_cap = profile
        .remove("marketCapitalization")
        .and_then(|v| v.as_f64())
        .map(|m| m * 1_000_000.0);
    profile.remove("ticker");
    metadata.extra = profile;
    Ok(metadata)
}

pub(crate) fn latest_statements(
    symbol: &str,
    filings: Vec<ReportedFiling>,
) -> Result<FinancialStatements> {
    let filing = filings
        .into_iter()
        .max_by_key(|f| (f.year, f.quarter))
        .ok_or_else(|| ScopeError::unavailable(symbol, "no reported financials"))?;

    let convert = |lines: Vec<ReportedLine>| -> Vec<LineItem> {
        lines
            .into_iter()
            .filter_map(|line| {
                line.value.as_f64().map(|value| LineItem {
                    concept: line.concept,
                    label: line.label,
                    value,
                    unit: line.unit,
                })
            })
            .collect()
    };

    let statements = FinancialStatements {
        period_label: if filing.quarter == 0 {
            format!("FY{}", filing.year)
        } else {
            format!("Q{} {}", filing.quarter, filing.year)
        },
        income: convert(filing.report.ic),
        balance_sheet: convert(filing.report.bs),
        cash_flow: convert(filing.report.cf),
    };

    if statements.is_empty() {
        return Err(ScopeError::unavailable(symbol, "reported financials contain no values"));
    }
    Ok(statements)
}
