//! Output of reports, charts and batch summaries
//!
//! Sinks never feed anything back into the analysis. [`present`] drives all
//! configured sinks over a finished batch and only logs sink errors.

use crate::analysis::TrendResult;
use crate::analyzer::InstrumentReport;
use crate::batch::BatchSummary;
use crate::error::{Result, ScopeError};
use crate::identifiers::Identifier;
use crate::models::{Availability, InstrumentMetadata, LineItem, PriceSeries};
use chrono::{DateTime, Utc};
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use plotters::prelude::*;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Line items shown per financial statement in the console
pub const STATEMENT_LINES: usize = 8;

/// Receives finished reports
///
/// Chart methods default to doing nothing so text-only sinks skip them.
pub trait PresentationSink: Send + Sync {
    fn render_report(&self, report: &InstrumentReport) -> Result<()>;

    /// Closing prices with the fitted regression line
    fn render_trend_chart(
        &self,
        _id: &Identifier,
        _prices: &PriceSeries,
        _trend: &TrendResult,
    ) -> Result<()> {
        Ok(())
    }

    /// Closing prices with dividend payments marked
    fn render_dividend_chart(
        &self,
        _id: &Identifier,
        _prices: &PriceSeries,
        _markers: &[(DateTime<Utc>, f64)],
    ) -> Result<()> {
        Ok(())
    }

    /// Short-term closing prices
    fn render_recent_chart(&self, _id: &Identifier, _prices: &PriceSeries) -> Result<()> {
        Ok(())
    }

    fn render_summary(&self, summary: &BatchSummary) -> Result<()>;
}

/// Render every report and the summary through every sink
pub fn present(sinks: &[Box<dyn PresentationSink>], summary: &BatchSummary) {
    for report in &summary.reports {
        for sink in sinks {
            present_report(sink.as_ref(), report);
        }
    }
    for sink in sinks {
        log_failure("summary", sink.render_summary(summary));
    }
}

fn present_report(sink: &dyn PresentationSink, report: &InstrumentReport) {
    let id = &report.identifier;
    log_failure("report", sink.render_report(report));

    if let (Some(prices), Some(trend)) = (report.history.value(), report.trend.value()) {
        log_failure("trend chart", sink.render_trend_chart(id, prices, trend));
    }
    if let (Some(prices), Some(markers)) =
        (report.history.value(), report.dividend_markers.value())
    {
        log_failure("dividend chart", sink.render_dividend_chart(id, prices, markers));
    }
    if let Some(prices) = report.recent_history.value() {
        log_failure("recent chart", sink.render_recent_chart(id, prices));
    }
}

fn log_failure(what: &str, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!("Failed to render {}: {}", what, e);
    }
}

/// Human readable tables on stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl PresentationSink for ConsoleSink {
    fn render_report(&self, report: &InstrumentReport) -> Result<()> {
        println!("{}", format_report(report));
        Ok(())
    }

    fn render_summary(&self, summary: &BatchSummary) -> Result<()> {
        println!("{}", format_summary(summary));
        Ok(())
    }
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header);
    table
}

fn unavailable_text<T>(field: &Availability<T>) -> String {
    match field {
        Availability::Available { .. } => String::new(),
        Availability::Unavailable { kind, reason } => format!("unavailable ({kind}): {reason}"),
    }
}

fn format_money(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e12 {
        format!("{:.2}T", value / 1e12)
    } else if abs >= 1e9 {
        format!("{:.2}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", value / 1e6)
    } else {
        format!("{value:.2}")
    }
}

fn statement_rows(table: &mut Table, statement: &str, items: &[LineItem]) {
    for item in items.iter().take(STATEMENT_LINES) {
        table.add_row(vec![
            statement.to_string(),
            item.label.clone(),
            format_money(item.value),
            item.unit.clone().unwrap_or_default(),
        ]);
    }
}

/// Every metadata field the provider sent, recognised ones first
fn key_statistics(meta: &InstrumentMetadata) -> Table {
    let mut stats = table(vec!["Key", "Value"]);
    let typed = [
        ("name", meta.name.clone()),
        ("exchange", meta.exchange.clone()),
        ("sector", meta.sector.clone()),
        ("industry", meta.industry.clone()),
        ("marketCap", meta.market_cap.map(format_money)),
        ("currency", meta.currency.clone()),
        ("country", meta.country.clone()),
    ];
    for (key, value) in typed {
        if let Some(value) = value {
            stats.add_row(vec![key.to_string(), value]);
        }
    }
    for (key, value) in &meta.extra {
        let value = match value {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        stats.add_row(vec![key.clone(), value]);
    }
    stats
}

/// Text dump of one report
pub fn format_report(report: &InstrumentReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ({}) ===", report.display_name(), report.identifier);

    let mut overview = table(vec!["Field", "Value"]);
    overview.add_row(vec![
        "Symbol".to_string(),
        report.resolved_symbol.clone().unwrap_or_else(|| "-".to_string()),
    ]);
    overview.add_row(vec!["Sector".to_string(), report.sector().to_string()]);
    if !report.metadata.is_available() {
        overview.add_row(vec!["Metadata".to_string(), unavailable_text(&report.metadata)]);
    }

    let trend = match report.trend.value() {
        Some(t) => format!(
            "{} (slope {:.4}, intercept {:.2}, R² {:.3})",
            t.direction.describe(),
            t.slope,
            t.intercept,
            t.r_squared
        ),
        None => unavailable_text(&report.trend),
    };
    overview.add_row(vec!["Trend".to_string(), trend]);

    let dividend_yield = match report.yield_result.value() {
        Some(y) => format!(
            "{:.2}% ({} payments, {:.2} total, average price {:.2})",
            y.yield_percent, y.dividend_count, y.total_dividends, y.average_price
        ),
        None => unavailable_text(&report.yield_result),
    };
    overview.add_row(vec!["Dividend yield".to_string(), dividend_yield]);

    if let Some(recent) = report.recent_history.value() {
        if let (Some(first), Some(last)) = (recent.first(), recent.last()) {
            overview.add_row(vec![
                "Recent closes".to_string(),
                format!("{:.2} → {:.2} ({} points)", first.close, last.close, recent.len()),
            ]);
        }
    }

    let peers = match report.peers.value() {
        Some(peers) => peers.iter().map(Identifier::as_str).collect::<Vec<_>>().join(", "),
        None => unavailable_text(&report.peers),
    };
    overview.add_row(vec!["Sector peers".to_string(), peers]);
    let _ = writeln!(out, "{overview}");

    if let Some(meta) = report.metadata.value() {
        let _ = writeln!(out, "Key statistics");
        let _ = writeln!(out, "{}", key_statistics(meta));
    }

    match report.headlines.value() {
        Some(headlines) => {
            let mut news = table(vec!["Headline", "Compound", "Sentiment"]);
            for h in headlines {
                news.add_row(vec![
                    h.title.clone(),
                    format!("{:+.4}", h.compound),
                    h.label.to_string(),
                ]);
            }
            let _ = writeln!(out, "{news}");
            if let Some(tally) = report.sentiment_tally() {
                let _ = writeln!(
                    out,
                    "Sentiment: {} good, {} bad, {} neutral",
                    tally.good, tally.bad, tally.neutral
                );
            }
        }
        None => {
            let _ = writeln!(out, "News: {}", unavailable_text(&report.headlines));
        }
    }

    match report.financials.value() {
        Some(statements) => {
            let mut financials = table(vec!["Statement", "Line", "Value", "Unit"]);
            statement_rows(&mut financials, "Income", &statements.income);
            statement_rows(&mut financials, "Balance sheet", &statements.balance_sheet);
            statement_rows(&mut financials, "Cash flow", &statements.cash_flow);
            let _ = writeln!(out, "Financial statements {}", statements.period_label);
            let _ = writeln!(out, "{financials}");
        }
        None => {
            let _ = writeln!(out, "Financials: {}", unavailable_text(&report.financials));
        }
    }

    out
}

/// Text dump of a batch summary
pub fn format_summary(summary: &BatchSummary) -> String {
    let mut out = String::new();
    let mut overview = table(vec![
        "Identifier",
        "Status",
        "Sector",
        "Trend",
        "Yield %",
        "Sentiment",
    ]);

    for report in &summary.reports {
        let trend = report
            .trend
            .value()
            .map_or_else(|| "-".to_string(), |t| t.direction.to_string());
        let dividend_yield = report
            .yield_result
            .value()
            .map_or_else(|| "-".to_string(), |y| format!("{:.2}", y.yield_percent));
        let sentiment = report.sentiment_tally().map_or_else(
            || "-".to_string(),
            |t| format!("+{} / -{} / ={}", t.good, t.bad, t.neutral),
        );
        overview.add_row(vec![
            report.identifier.to_string(),
            "ok".to_string(),
            report.sector().to_string(),
            trend,
            dividend_yield,
            sentiment,
        ]);
    }
    for failure in &summary.failures {
        overview.add_row(vec![
            failure.identifier.clone(),
            format!("failed: {}", failure.kind),
            "-".to_string(),
            "-".to_string(),
            "-".to_string(),
            "-".to_string(),
        ]);
    }

    let _ = writeln!(out, "Run {} ({})", summary.run_id, summary.state);
    let _ = writeln!(out, "{overview}");
    let _ = writeln!(
        out,
        "{} attempted: {} analysed, {} failed, {} skipped{}",
        summary.attempted(),
        summary.reports.len(),
        summary.failures.len(),
        summary.skipped,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    for failure in &summary.failures {
        let _ = writeln!(out, "  {}: {}", failure.identifier, failure.message);
    }
    out
}

/// One JSON document per report and per summary on stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSink;

impl PresentationSink for JsonSink {
    fn render_report(&self, report: &InstrumentReport) -> Result<()> {
        println!("{}", serde_json::to_string(report)?);
        Ok(())
    }

    fn render_summary(&self, summary: &BatchSummary) -> Result<()> {
        // reports were already written one by one
        let outline = serde_json::json!({
            "run_id": summary.run_id,
            "state": summary.state,
            "reports": summary.reports.len(),
            "failures": summary.failures,
            "skipped": summary.skipped,
            "cancelled": summary.cancelled,
            "started_at": summary.started_at,
            "finished_at": summary.finished_at,
        });
        println!("{}", serde_json::to_string(&outline)?);
        Ok(())
    }
}

/// SVG chart files, one set per instrument
#[derive(Debug, Clone)]
pub struct SvgChartSink {
    dir: PathBuf,
    size: (u32, u32),
}

impl SvgChartSink {
    /// Charts are written to `dir`, which is created if missing
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir, size: (1024, 600) })
    }

    /// Chart file for `id` and `kind`
    pub fn chart_path(&self, id: &Identifier, kind: &str) -> PathBuf {
        let stem: String = id
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{stem}_{kind}.svg"))
    }

    fn draw_prices(
        &self,
        path: &Path,
        title: &str,
        prices: &PriceSeries,
        fitted: Option<&[f64]>,
        markers: &[(DateTime<Utc>, f64)],
    ) -> Result<()> {
        let points = prices.points();
        if points.is_empty() {
            return Err(ScopeError::EmptyPriceSeries);
        }

        let closes = prices.closes();
        let (mut low, mut high) = closes
            .iter()
            .chain(fitted.unwrap_or_default())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
        let pad = ((high - low) * 0.05).max(0.01);
        low -= pad;
        high += pad;
        let x_max = (points.len().saturating_sub(1)).max(1) as f64;

        let root = SVGBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0f64..x_max, low..high)
            .map_err(chart_error)?;

        let date_label = |x: &f64| {
            points
                .get(x.round().max(0.0) as usize)
                .map(|p| p.timestamp.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };
        chart
            .configure_mesh()
            .x_labels(6)
            .x_label_formatter(&date_label)
            .y_desc("Close")
            .draw()
            .map_err(chart_error)?;

        chart
            .draw_series(LineSeries::new(
                closes.iter().enumerate().map(|(i, c)| (i as f64, *c)),
                &BLUE,
            ))
            .map_err(chart_error)?
            .label("Close")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));

        if let Some(fitted) = fitted {
            chart
                .draw_series(LineSeries::new(
                    fitted.iter().enumerate().map(|(i, v)| (i as f64, *v)),
                    &RED,
                ))
                .map_err(chart_error)?
                .label("Trend")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
        }

        if !markers.is_empty() {
            let positioned = markers.iter().filter_map(|(ts, close)| {
                points
                    .binary_search_by_key(ts, |p| p.timestamp)
                    .ok()
                    .map(|i| (i as f64, *close))
            });
            chart
                .draw_series(positioned.map(|(x, y)| Circle::new((x, y), 5, GREEN.filled())))
                .map_err(chart_error)?
                .label("Dividend")
                .legend(|(x, y)| Circle::new((x + 10, y), 5, GREEN.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(chart_error)?;

        root.present().map_err(chart_error)?;
        tracing::debug!("Wrote chart {}", path.display());
        Ok(())
    }
}

fn chart_error<E: std::fmt::Display>(e: E) -> ScopeError {
    ScopeError::ChartError(e.to_string())
}

impl PresentationSink for SvgChartSink {
    fn render_report(&self, _report: &InstrumentReport) -> Result<()> {
        Ok(())
    }

    fn render_trend_chart(
        &self,
        id: &Identifier,
        prices: &PriceSeries,
        trend: &TrendResult,
    ) -> Result<()> {
        let title = format!("{id}: {} trend", trend.direction.describe());
        self.draw_prices(
            &self.chart_path(id, "trend"),
            &title,
            prices,
            Some(&trend.fitted_values),
            &[],
        )
    }

    fn render_dividend_chart(
        &self,
        id: &Identifier,
        prices: &PriceSeries,
        markers: &[(DateTime<Utc>, f64)],
    ) -> Result<()> {
        let title = format!("{id}: dividends");
        self.draw_prices(&self.chart_path(id, "dividends"), &title, prices, None, markers)
    }

    fn render_recent_chart(&self, id: &Identifier, prices: &PriceSeries) -> Result<()> {
        let title = format!("{id}: recent closes");
        self.draw_prices(&self.chart_path(id, "recent"), &title, prices, None, &[])
    }

    fn render_summary(&self, summary: &BatchSummary) -> Result<()> {
        tracing::info!(
            "Charts for {} instruments written to {}",
            summary.reports.len(),
            self.dir.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{SentimentLabel, fit_prices};
    use crate::analysis::sentiment::HeadlineSentiment;
    use crate::batch::{BatchState, FailureRecord};
    use crate::error::ErrorKind;
    use crate::models::PricePoint;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, day, 20, 0, 0).unwrap()
    }

    fn prices() -> PriceSeries {
        PriceSeries::new((1..=6).map(|d| PricePoint::new(ts(d), 10.0 + f64::from(d))).collect())
    }

    fn report() -> InstrumentReport {
        let id = Identifier::parse("AAPL").unwrap();
        let mut meta = InstrumentMetadata::for_symbol("AAPL");
        meta.name = Some("Apple Inc".to_string());
        meta.sector = Some("Technology".to_string());
        meta.market_cap = Some(2.5e12);
        meta.currency = Some("USD".to_string());
        meta.extra.insert("ipo".to_string(), serde_json::json!("1980-12-12"));
        meta.extra.insert("shareOutstanding".to_string(), serde_json::json!(15_204.14));

        InstrumentReport {
            identifier: id.clone(),
            resolved_symbol: Some("AAPL".to_string()),
            metadata: Availability::Available { value: meta },
            headlines: Availability::Available {
                value: vec![HeadlineSentiment {
                    title: "Record quarter".to_string(),
                    compound: 0.6249,
                    label: SentimentLabel::Good,
                }],
            },
            trend: fit_prices(&prices()).into(),
            yield_result: Availability::Unavailable {
                kind: ErrorKind::Provider,
                reason: "API error: Yahoo connection failed".to_string(),
            },
            dividend_markers: Availability::Available { value: vec![(ts(2), 12.0)] },
            history: Availability::Available { value: prices() },
            recent_history: Availability::Available { value: prices() },
            peers: Availability::Available { value: vec![id] },
            financials: Availability::Unavailable {
                kind: ErrorKind::DataUnavailable,
                reason: "financial statements require a Finnhub API key".to_string(),
            },
            generated_at: ts(7),
        }
    }

    fn summary() -> BatchSummary {
        BatchSummary {
            run_id: Uuid::nil(),
            state: BatchState::PartiallyFailed,
            reports: vec![report()],
            failures: vec![FailureRecord {
                identifier: "??".to_string(),
                kind: ErrorKind::MalformedIdentifier,
                message: "Malformed identifier: \"??\"".to_string(),
            }],
            skipped: 0,
            cancelled: false,
            started_at: ts(7),
            finished_at: ts(7),
        }
    }

    #[test]
    fn test_format_report() {
        let text = format_report(&report());
        assert!(text.contains("Apple Inc (AAPL)"));
        assert!(text.contains("Technology"));
        assert!(text.contains("1980-12-12"));
        assert!(text.contains("upward"));
        assert!(text.contains("Record quarter"));
        assert!(text.contains("unavailable (provider error): API error: Yahoo connection failed"));
        assert!(text.contains("Finnhub API key"));
    }

    #[test]
    fn test_key_statistics_list_every_metadata_field() {
        let text = format_report(&report());
        assert!(text.contains("Key statistics"));
        assert!(text.contains("marketCap"));
        assert!(text.contains("2.50T"));
        assert!(text.contains("USD"));
        assert!(text.contains("ipo"));
        assert!(text.contains("1980-12-12"));
        assert!(text.contains("shareOutstanding"));
        assert!(text.contains("15204.14"));
    }

    #[test]
    fn test_format_summary() {
        let text = format_summary(&summary());
        assert!(text.contains("partially failed"));
        assert!(text.contains("failed: malformed identifier"));
        assert!(text.contains("2 attempted: 1 analysed, 1 failed, 0 skipped"));
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(2.5e12), "2.50T");
        assert_eq!(format_money(-3.2e9), "-3.20B");
        assert_eq!(format_money(1234.5), "1234.50");
    }

    #[test]
    fn test_report_json_marks_unavailable_fields() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["trend"]["status"], "available");
        assert_eq!(json["yield_result"]["status"], "unavailable");
        assert_eq!(json["yield_result"]["kind"], "provider");
    }

    #[test]
    fn test_svg_charts_written() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SvgChartSink::new(dir.path().join("charts")).unwrap();
        let report = report();

        let sinks: Vec<Box<dyn PresentationSink>> = vec![Box::new(sink.clone())];
        present(&sinks, &summary());

        for kind in ["trend", "dividends", "recent"] {
            let path = sink.chart_path(&report.identifier, kind);
            let svg = std::fs::read_to_string(&path).unwrap();
            assert!(svg.contains("<svg"), "{} is not an SVG", path.display());
        }
    }

    #[test]
    fn test_chart_of_empty_series_fails() {
        let dir = tempfile::tempdir().unwrap();
        let sink = SvgChartSink::new(dir.path()).unwrap();
        let id = Identifier::parse("AAPL").unwrap();

        let result = sink.render_recent_chart(&id, &PriceSeries::empty());
        assert!(matches!(result, Err(ScopeError::EmptyPriceSeries)));
    }

    #[test]
    fn test_chart_path_sanitised() {
        let sink = SvgChartSink {
            dir: PathBuf::from("out"),
            size: (10, 10),
        };
        let id = Identifier::parse("BRK.B").unwrap();
        assert_eq!(sink.chart_path(&id, "trend"), PathBuf::from("out/BRK_B_trend.svg"));
    }
}
