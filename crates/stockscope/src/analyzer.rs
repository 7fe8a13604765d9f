//! Per-instrument analysis
//!
//! One call to [`InstrumentAnalyzer::analyze`] fetches everything for an
//! identifier concurrently and runs the analysis leaves over it. Each report
//! field degrades on its own: a failed news fetch leaves the trend intact and
//! vice versa. Only an unparseable identifier or a total fetch failure turns
//! into an error for the whole instrument.

use crate::analysis::{
    HeadlineSentiment, SentimentClassifier, SentimentLabel, TrendResult, YieldResult,
    align_dividends_to_prices, candidate_universe, compute_yield, find_peers, fit_prices,
};
use crate::analysis::sentiment::DEFAULT_NEWS_WINDOW;
use crate::config::ScopeConfig;
use crate::error::{ErrorKind, Result, ScopeError};
use crate::identifiers::Identifier;
use crate::models::{
    Availability, DividendEvent, FinancialStatements, HistoryPeriod, InstrumentMetadata,
    NewsItem, PriceSeries, UNKNOWN_SECTOR,
};
use crate::provider::MarketDataProvider;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

/// What to fetch and how much of it to score
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub news_window: usize,
    pub history_period: HistoryPeriod,
    pub recent_period: HistoryPeriod,
    /// Peer candidates; empty means only the instrument itself
    pub peer_universe: Vec<Identifier>,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            news_window: DEFAULT_NEWS_WINDOW,
            history_period: HistoryPeriod::Years(5),
            recent_period: HistoryPeriod::Days(3),
            peer_universe: Vec::new(),
        }
    }
}

impl AnalyzerSettings {
    pub fn from_config(config: &ScopeConfig) -> Result<Self> {
        Ok(Self {
            news_window: config.news_window,
            history_period: config.history_period,
            recent_period: config.recent_period,
            peer_universe: config.peer_identifiers()?,
        })
    }
}

/// Everything known about one instrument after a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentReport {
    pub identifier: Identifier,
    /// Listing symbol the provider used, when metadata was available
    pub resolved_symbol: Option<String>,
    pub metadata: Availability<InstrumentMetadata>,
    pub headlines: Availability<Vec<HeadlineSentiment>>,
    pub trend: Availability<TrendResult>,
    pub yield_result: Availability<YieldResult>,
    /// Dividend timestamps paired with the close on that day
    pub dividend_markers: Availability<Vec<(DateTime<Utc>, f64)>>,
    pub history: Availability<PriceSeries>,
    pub recent_history: Availability<PriceSeries>,
    pub peers: Availability<Vec<Identifier>>,
    pub financials: Availability<FinancialStatements>,
    pub generated_at: DateTime<Utc>,
}

/// Label counts over the scored headlines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentTally {
    pub good: usize,
    pub bad: usize,
    pub neutral: usize,
}

impl InstrumentReport {
    /// Display name: company name when known, else the identifier
    pub fn display_name(&self) -> String {
        self.metadata
            .value()
            .and_then(|m| m.name.clone())
            .unwrap_or_else(|| self.identifier.to_string())
    }

    pub fn sector(&self) -> &str {
        self.metadata
            .value()
            .map_or(UNKNOWN_SECTOR, InstrumentMetadata::sector_or_unknown)
    }

    pub fn sentiment_tally(&self) -> Option<SentimentTally> {
        self.headlines.value().map(|headlines| {
            headlines
                .iter()
                .fold(SentimentTally::default(), |mut tally, h| {
                    match h.label {
                        SentimentLabel::Good => tally.good += 1,
                        SentimentLabel::Bad => tally.bad += 1,
                        SentimentLabel::Neutral => tally.neutral += 1,
                    }
                    tally
                })
        })
    }

    /// Names of the fields that could not be produced
    pub fn unavailable_fields(&self) -> Vec<&'static str> {
        [
            ("metadata", self.metadata.is_available()),
            ("headlines", self.headlines.is_available()),
            ("trend", self.trend.is_available()),
            ("yield", self.yield_result.is_available()),
            ("dividend_markers", self.dividend_markers.is_available()),
            ("history", self.history.is_available()),
            ("recent_history", self.recent_history.is_available()),
            ("peers", self.peers.is_available()),
            ("financials", self.financials.is_available()),
        ]
        .into_iter()
        .filter(|(_, available)| !available)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Runs the full analysis for one identifier at a time
pub struct InstrumentAnalyzer {
    provider: Arc<dyn MarketDataProvider>,
    classifier: SentimentClassifier,
    settings: AnalyzerSettings,
}

impl InstrumentAnalyzer {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        classifier: SentimentClassifier,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            provider,
            classifier,
            settings,
        }
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Analyse one raw identifier
    pub async fn analyze(&self, raw: &str) -> Result<InstrumentReport> {
        let span = info_span!("instrument", id = %raw.trim());
        self.analyze_inner(raw).instrument(span).await
    }

    async fn analyze_inner(&self, raw: &str) -> Result<InstrumentReport> {
        let identifier = Identifier::parse(raw)?;
        info!("Analyzing {} ({:?})", identifier, identifier.kind());

        let provider = self.provider.as_ref();
        let settings = &self.settings;
        let (news, history, recent, dividends, metadata, financials) = tokio::join!(
            provider.get_news(&identifier),
            provider.get_price_history(&identifier, settings.history_period),
            provider.get_price_history(&identifier, settings.recent_period),
            provider.get_dividends(&identifier, settings.history_period),
            provider.get_metadata(&identifier),
            provider.get_financial_statements(&identifier),
        );

        let symbol = identifier.as_str();
        let news = non_empty(news, Vec::is_empty, symbol, "no news");
        let history = non_empty(history, PriceSeries::is_empty, symbol, "no price history");
        let recent = non_empty(recent, PriceSeries::is_empty, symbol, "no recent prices");
        let financials = non_empty(
            financials,
            FinancialStatements::is_empty,
            symbol,
            "no financial statements",
        );

        // an empty dividend list is a 0% yield, but on its own it is no data
        let all_failed = news.is_err()
            && history.is_err()
            && recent.is_err()
            && !dividends.as_ref().is_ok_and(|d| !d.is_empty())
            && metadata.is_err()
            && financials.is_err();
        if all_failed {
            warn!("Every data request failed for {}", identifier);
            return Err(news
                .err()
                .unwrap_or_else(|| ScopeError::unavailable(symbol, "no data")));
        }

        let news: Availability<Vec<NewsItem>> = news.into();
        let history: Availability<PriceSeries> = history.into();
        let dividends: Availability<Vec<DividendEvent>> = dividends.into();
        let metadata: Availability<InstrumentMetadata> = metadata.into();

        let headlines = derive(&news, |items| {
            Ok(self.classifier.score_news_stream(items, settings.news_window))
        });
        let trend = derive(&history, fit_prices);
        let yield_result = derive_both(&history, &dividends, |prices, divs| {
            compute_yield(prices, divs)
        });
        let dividend_markers = derive_both(&history, &dividends, |prices, divs| {
            Ok(align_dividends_to_prices(prices, divs))
        });
        let peers = self.peers(&identifier, &metadata).await;

        let report = InstrumentReport {
            resolved_symbol: metadata.value().map(|m| m.symbol.clone()).filter(|s| !s.is_empty()),
            identifier,
            metadata,
            headlines,
            trend,
            yield_result,
            dividend_markers,
            history,
            recent_history: recent.into(),
            peers,
            financials: financials.into(),
            generated_at: Utc::now(),
        };

        let missing = report.unavailable_fields();
        if missing.is_empty() {
            info!("Analysis of {} complete", report.identifier);
        } else {
            warn!(
                "Analysis of {} degraded, unavailable: {}",
                report.identifier,
                missing.join(", ")
            );
        }
        Ok(report)
    }

    async fn peers(
        &self,
        target: &Identifier,
        metadata: &Availability<InstrumentMetadata>,
    ) -> Availability<Vec<Identifier>> {
        let Some(own) = metadata.value() else {
            return derive(metadata, |_| Ok(Vec::new()));
        };
        let sector = own.sector_or_unknown();
        let universe = candidate_universe(target, &self.settings.peer_universe);

        let lookups = universe
            .iter()
            .filter(|candidate| *candidate != target)
            .map(|candidate| async move {
                let sector = match self.provider.get_metadata(candidate).await {
                    Ok(meta) => Some(meta.sector_or_unknown().to_string()),
                    Err(e) => {
                        debug!("Sector lookup for {} failed: {}", candidate, e);
                        None
                    }
                };
                (candidate.clone(), sector)
            });
        let mut sectors: HashMap<Identifier, Option<String>> =
            join_all(lookups).await.into_iter().collect();
        sectors.insert(target.clone(), Some(sector.to_string()));

        Availability::Available {
            value: find_peers(target, sector, &universe, |candidate| {
                sectors.get(candidate).cloned().flatten()
            }),
        }
    }
}

fn non_empty<T>(
    result: Result<T>,
    is_empty: impl Fn(&T) -> bool,
    symbol: &str,
    reason: &str,
) -> Result<T> {
    match result {
        Ok(value) if is_empty(&value) => Err(ScopeError::unavailable(symbol, reason)),
        other => other,
    }
}

fn carry<U>(kind: ErrorKind, reason: &str) -> Availability<U> {
    Availability::Unavailable {
        kind,
        reason: reason.to_string(),
    }
}

/// Compute a field from another one, inheriting its unavailability
fn derive<T, U>(source: &Availability<T>, f: impl FnOnce(&T) -> Result<U>) -> Availability<U> {
    match source {
        Availability::Available { value } => f(value).into(),
        Availability::Unavailable { kind, reason } => carry(*kind, reason),
    }
}

fn derive_both<A, B, U>(
    a: &Availability<A>,
    b: &Availability<B>,
    f: impl FnOnce(&A, &B) -> Result<U>,
) -> Availability<U> {
    match (a, b) {
        (Availability::Available { value: a }, Availability::Available { value: b }) => {
            f(a, b).into()
        }
        (Availability::Unavailable { kind, reason }, _) => carry(*kind, reason),
        (_, Availability::Unavailable { kind, reason }) => carry(*kind, reason),
    }
}
