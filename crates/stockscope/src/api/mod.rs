//! API clients for market data providers

pub mod finnhub;
pub mod yahoo;

pub use finnhub::FinnhubClient;
pub use yahoo::YahooFinanceClient;
