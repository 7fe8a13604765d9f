//! Dividend yield over an observation period
//!
//! The yield is a deliberately simple approximation: the sum of all dividends
//! paid in the period over the average closing price of the whole period,
//! not the price on each payment date.

use crate::error::{Result, ScopeError};
use crate::models::{DividendEvent, PriceSeries};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate dividend yield
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldResult {
    pub total_dividends: f64,
    pub average_price: f64,
    /// `total_dividends / average_price * 100`
    pub yield_percent: f64,
    pub dividend_count: usize,
}

/// Compute the dividend yield of `dividends` against the mean close of `prices`
pub fn compute_yield(prices: &PriceSeries, dividends: &[DividendEvent]) -> Result<YieldResult> {
    if prices.is_empty() {
        return Err(ScopeError::EmptyPriceSeries);
    }

    let average_price = prices.points().iter().map(|p| p.close).sum::<f64>() / prices.len() as f64;
    if average_price == 0.0 {
        return Err(ScopeError::ZeroAveragePrice);
    }
    if !average_price.is_finite() {
        return Err(ScopeError::InvalidData(format!(
            "average price is {average_price}"
        )));
    }

    let total_dividends: f64 = dividends.iter().map(|d| d.amount).sum();

    Ok(YieldResult {
        total_dividends,
        average_price,
        yield_percent: total_dividends / average_price * 100.0,
        dividend_count: dividends.len(),
    })
}

/// Pair each dividend with the close on the same timestamp, for plotting
///
/// Dividends without an exact price match are left out of the markers only;
/// they still count toward [`compute_yield`].
pub fn align_dividends_to_prices(
    prices: &PriceSeries,
    dividends: &[DividendEvent],
) -> Vec<(DateTime<Utc>, f64)> {
    dividends
        .iter()
        .filter_map(|d| prices.close_at(d.timestamp).map(|close| (d.timestamp, close)))
        .collect()
}
