//! Market data and report building blocks shared by providers and analyzers

use crate::error::{ErrorKind, Result, ScopeError};
use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Sector string used when the provider has none
pub const UNKNOWN_SECTOR: &str = "N/A";

/// Longest lookback in days, also the span of `max`
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// A news article as delivered by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Headline, display only
    pub title: String,
    /// Summary text, the part that gets scored. May be empty.
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            publisher: None,
            link: None,
            published_at: None,
        }
    }
}

/// Closing price at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, close: f64) -> Self {
        Self { timestamp, close }
    }
}

/// Closing prices in ascending timestamp order without duplicate timestamps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PricePoint>", into = "Vec<PricePoint>")]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, sorting by timestamp; for duplicate timestamps the
    /// point that came later in the input wins
    pub fn new(mut points: Vec<PricePoint>) -> Self {
        points.reverse();
        points.sort_by_key(|p| p.timestamp);
        points.dedup_by_key(|p| p.timestamp);
        Self { points }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    /// Closing price at exactly `timestamp`
    pub fn close_at(&self, timestamp: DateTime<Utc>) -> Option<f64> {
        self.points
            .binary_search_by_key(&timestamp, |p| p.timestamp)
            .ok()
            .map(|i| self.points[i].close)
    }
}

impl From<Vec<PricePoint>> for PriceSeries {
    fn from(points: Vec<PricePoint>) -> Self {
        Self::new(points)
    }
}

impl From<PriceSeries> for Vec<PricePoint> {
    fn from(series: PriceSeries) -> Self {
        series.points
    }
}

/// Dividend payment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DividendEvent {
    pub timestamp: DateTime<Utc>,
    pub amount: f64,
}

impl DividendEvent {
    pub fn new(timestamp: DateTime<Utc>, amount: f64) -> Self {
        Self { timestamp, amount }
    }
}

/// Lookback window for a price history request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryPeriod {
    Days(u32),
    Months(u32),
    Years(u32),
    YearToDate,
    Max,
}

impl HistoryPeriod {
    /// Parse Yahoo style range strings (`3d`, `1mo`, `5y`, `ytd`, `max`)
    pub fn parse(range: &str) -> Result<Self> {
        let range = range.trim().to_lowercase();
        let invalid = || ScopeError::ConfigError(format!("Invalid history period: {range}"));

        match range.as_str() {
            "ytd" => return Ok(Self::YearToDate),
            "max" => return Ok(Self::Max),
            _ => {}
        }

        let (count, unit) = if let Some(n) = range.strip_suffix("mo") {
            (n, "mo")
        } else if let Some(n) = range.strip_suffix('d') {
            (n, "d")
        } else if let Some(n) = range.strip_suffix('y') {
            (n, "y")
        } else {
            return Err(invalid());
        };

        let count: u32 = count.parse().map_err(|_| invalid())?;
        if count == 0 {
            return Err(invalid());
        }

        let period = match unit {
            "d" => Self::Days(count),
            "mo" => Self::Months(count),
            _ => Self::Years(count),
        };
        period.validate()?;
        Ok(period)
    }

    /// Window length in days; `None` for `ytd`
    fn span_days(&self) -> Option<i64> {
        match self {
            Self::Days(n) => Some(i64::from(*n)),
            Self::Months(n) => Some(30 * i64::from(*n)),
            Self::Years(n) => Some(365 * i64::from(*n)),
            Self::YearToDate => None,
            Self::Max => Some(MAX_LOOKBACK_DAYS),
        }
    }

    /// Reject windows longer than [`MAX_LOOKBACK_DAYS`]
    pub fn validate(&self) -> Result<()> {
        match self.span_days() {
            Some(days) if days > MAX_LOOKBACK_DAYS => Err(ScopeError::ConfigError(format!(
                "History period {self} exceeds the {MAX_LOOKBACK_DAYS} day lookback limit, use max"
            ))),
            _ => Ok(()),
        }
    }

    /// Start of the window ending at `end`
    pub fn start_from(&self, end: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let Some(days) = self.span_days() else {
            return Ok(NaiveDate::from_ymd_opt(end.year(), 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map_or(end, |d| d.and_utc()));
        };

        TimeDelta::try_days(days)
            .and_then(|delta| end.checked_sub_signed(delta))
            .ok_or_else(|| {
                ScopeError::ConfigError(format!(
                    "History period {self} starts before the earliest date"
                ))
            })
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days(n) => write!(f, "{n}d"),
            Self::Months(n) => write!(f, "{n}mo"),
            Self::Years(n) => write!(f, "{n}y"),
            Self::YearToDate => f.write_str("ytd"),
            Self::Max => f.write_str("max"),
        }
    }
}

impl std::str::FromStr for HistoryPeriod {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Company information with the fields the analysis recognises
///
/// Anything else the provider sends lands in `extra` so no data is lost and
/// nothing downstream depends on untyped lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentMetadata {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exchange: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl InstrumentMetadata {
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Sector, or [`UNKNOWN_SECTOR`] when missing or blank
    pub fn sector_or_unknown(&self) -> &str {
        match self.sector.as_deref() {
            Some(s) if !s.trim().is_empty() => s,
            _ => UNKNOWN_SECTOR,
        }
    }
}

/// One reported line of a financial statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub concept: String,
    pub label: String,
    pub value: f64,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Most recent reported income statement, balance sheet and cash flow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    /// Reporting period, e.g. `FY2024`
    pub period_label: String,
    pub income: Vec<LineItem>,
    pub balance_sheet: Vec<LineItem>,
    pub cash_flow: Vec<LineItem>,
}

impl FinancialStatements {
    pub fn is_empty(&self) -> bool {
        self.income.is_empty() && self.balance_sheet.is_empty() && self.cash_flow.is_empty()
    }
}

/// A report field that is either computed or explicitly unavailable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability<T> {
    Available { value: T },
    Unavailable { kind: ErrorKind, reason: String },
}

impl<T> Availability<T> {
    pub fn unavailable(error: &ScopeError) -> Self {
        Availability::Unavailable {
            kind: error.kind(),
            reason: error.to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Availability::Available { value } => Some(value),
            Availability::Unavailable { .. } => None,
        }
    }
}

impl<T> From<Result<T>> for Availability<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Availability::Available { value },
            Err(e) => Availability::unavailable(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_price_series_sorted_and_deduplicated() {
        let series = PriceSeries::new(vec![
            PricePoint::new(ts(3), 3.0),
            PricePoint::new(ts(1), 1.0),
            PricePoint::new(ts(2), 2.0),
            PricePoint::new(ts(2), 2.5),
        ]);

        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![1.0, 2.5, 3.0]);
        assert_eq!(series.close_at(ts(2)), Some(2.5));
        assert_eq!(series.close_at(ts(4)), None);
    }

    #[test]
    fn test_price_series_serde_normalizes() {
        let json = serde_json::json!([
            {"timestamp": "2024-01-02T14:30:00Z", "close": 2.0},
            {"timestamp": "2024-01-01T14:30:00Z", "close": 1.0},
        ]);
        let series: PriceSeries = serde_json::from_value(json).unwrap();
        assert_eq!(series.closes(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_history_period_parse() {
        assert_eq!(HistoryPeriod::parse("5y").unwrap(), HistoryPeriod::Years(5));
        assert_eq!(HistoryPeriod::parse("3d").unwrap(), HistoryPeriod::Days(3));
        assert_eq!(HistoryPeriod::parse("6mo").unwrap(), HistoryPeriod::Months(6));
        assert_eq!(HistoryPeriod::parse("YTD").unwrap(), HistoryPeriod::YearToDate);
        assert_eq!(HistoryPeriod::parse("max").unwrap(), HistoryPeriod::Max);
        assert!(HistoryPeriod::parse("0d").is_err());
        assert!(HistoryPeriod::parse("week").is_err());
        assert_eq!(HistoryPeriod::Months(3).to_string(), "3mo");
    }

    #[test]
    fn test_history_period_start() {
        let end = ts(10);
        assert_eq!(HistoryPeriod::Days(3).start_from(end).unwrap(), ts(7));
        assert_eq!(
            HistoryPeriod::YearToDate.start_from(end).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert!(HistoryPeriod::Max.start_from(end).is_ok());
    }

    #[test]
    fn test_history_period_out_of_range() {
        assert!(matches!(
            HistoryPeriod::parse("300000y"),
            Err(ScopeError::ConfigError(_))
        ));
        assert!(HistoryPeriod::parse("100y").is_ok());
        assert!(HistoryPeriod::parse("101y").is_err());

        // constructed directly, bypassing parse
        let huge = HistoryPeriod::Years(300_000);
        assert!(huge.validate().is_err());
        assert!(matches!(
            huge.start_from(Utc::now()),
            Err(ScopeError::ConfigError(_))
        ));
        assert!(HistoryPeriod::Years(u32::MAX).start_from(Utc::now()).is_err());
    }

    #[test]
    fn test_metadata_extra_fields() {
        let json = serde_json::json!({
            "symbol": "AAPL",
            "sector": "Technology",
            "weburl": "https://www.apple.com/",
            "ipo": "1980-12-12"
        });
        let meta: InstrumentMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(meta.sector_or_unknown(), "Technology");
        assert_eq!(meta.extra.len(), 2);
        assert_eq!(meta.extra["ipo"], "1980-12-12");
    }

    #[test]
    fn test_metadata_unknown_sector() {
        let mut meta = InstrumentMetadata::for_symbol("XYZ");
        assert_eq!(meta.sector_or_unknown(), UNKNOWN_SECTOR);
        meta.sector = Some("  ".to_string());
        assert_eq!(meta.sector_or_unknown(), UNKNOWN_SECTOR);
    }

    #[test]
    fn test_availability_from_result() {
        let ok: Availability<u32> = Ok(3).into();
        assert_eq!(ok.value(), Some(&3));

        let err: Availability<u32> = Err(ScopeError::EmptyPriceSeries).into();
        assert!(!err.is_available());
        match err {
            Availability::Unavailable { kind, .. } => assert_eq!(kind, ErrorKind::EmptyPriceSeries),
            Availability::Available { .. } => panic!("expected unavailable"),
        }
    }
}
