//! Multi-signal instrument analysis
//!
//! For every identifier in a batch (ISIN, WKN or ticker) this crate combines
//! three independent signals:
//!
//! - news sentiment, scored with a VADER-style lexicon classifier
//! - price trend, from an ordinary least squares fit over daily closes
//! - dividend yield over the observation period
//!
//! plus a naive sector-peer match and the latest reported financial
//! statements.
//!
//! # Architecture
//!
//! The pure building blocks live in [`analysis`]. [`InstrumentAnalyzer`]
//! fetches data through a [`MarketDataProvider`] and assembles an
//! [`InstrumentReport`] in which every field is independently
//! [`Availability::Available`] or [`Availability::Unavailable`].
//! [`BatchOrchestrator`] runs the analyzer over a list of identifiers with
//! bounded concurrency and per-instrument failure isolation. Finished
//! batches are rendered through [`PresentationSink`]s.
//!
//! # Example
//!
//! ```rust,ignore
//! use stockscope::{
//!     AnalyzerSettings, BatchOrchestrator, ConsoleSink, InstrumentAnalyzer, MarketDataService,
//!     ScopeConfig, SentimentClassifier, present,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ScopeConfig::default().from_env()?;
//!     let provider = Arc::new(MarketDataService::new(&config));
//!     let analyzer = InstrumentAnalyzer::new(
//!         provider,
//!         SentimentClassifier::default(),
//!         AnalyzerSettings::from_config(&config)?,
//!     );
//!
//!     let batch = BatchOrchestrator::new(analyzer, config.concurrency);
//!     let summary = batch.run(&["US0378331005", "SAP.DE"]).await;
//!     present(&[Box::new(ConsoleSink)], &summary);
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod analyzer;
pub mod api;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod identifiers;
pub mod models;
pub mod presentation;
pub mod provider;
pub mod retry;

pub use analysis::{
    HeadlineSentiment, Lexicon, SentimentClassifier, SentimentLabel, TrendDirection, TrendResult,
    YieldResult,
};
pub use analyzer::{AnalyzerSettings, InstrumentAnalyzer, InstrumentReport, SentimentTally};
pub use batch::{BatchOrchestrator, BatchState, BatchSummary, FailureRecord};
pub use config::ScopeConfig;
pub use error::{ErrorKind, Result, ScopeError};
pub use identifiers::{DEFAULT_IDENTIFIER_FILE, Identifier, IdentifierKind, read_identifier_list};
pub use models::{
    Availability, DividendEvent, FinancialStatements, HistoryPeriod, InstrumentMetadata, NewsItem,
    PricePoint, PriceSeries,
};
pub use presentation::{ConsoleSink, JsonSink, PresentationSink, SvgChartSink, present};
pub use provider::{MarketDataProvider, MarketDataService};
