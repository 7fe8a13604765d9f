//! Pure analysis building blocks
//!
//! Each module is a leaf: no I/O, no shared mutable state, typed errors.

pub mod dividend;
pub mod lexicon;
pub mod peers;
pub mod sentiment;
pub mod trend;

pub use dividend::{YieldResult, align_dividends_to_prices, compute_yield};
pub use lexicon::Lexicon;
pub use peers::{candidate_universe, find_peers};
pub use sentiment::{
    DEFAULT_NEWS_WINDOW, HeadlineSentiment, SentimentClassifier, SentimentLabel, label_for,
};
pub use trend::{TrendDirection, TrendResult, fit, fit_prices};
