//! Command-line interface for stockscope

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use stockscope::{
    AnalyzerSettings, BatchOrchestrator, ConsoleSink, DEFAULT_IDENTIFIER_FILE, HistoryPeriod,
    InstrumentAnalyzer, JsonSink, Lexicon, MarketDataService, PresentationSink, ScopeConfig,
    SentimentClassifier, SvgChartSink, present, read_identifier_list,
};
use stockscope_utils::{AppSettings, LogFormat};
use tokio::sync::watch;
use tracing::{info, warn};

/// Exit code when some identifiers failed or the run was cancelled
const EXIT_PARTIAL: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "stockscope")]
#[command(
    about = "News sentiment, price trend and dividend yield for a list of instruments",
    long_about = None
)]
struct Args {
    /// Identifiers to analyse (ISIN, WKN or ticker); overrides --input
    identifiers: Vec<String>,

    /// File with one identifier per line
    #[arg(short, long, default_value = DEFAULT_IDENTIFIER_FILE)]
    input: PathBuf,

    /// Peer candidates: comma separated identifiers or a file with one per line
    #[arg(short, long)]
    peers: Option<String>,

    /// Number of most recent news items to score
    #[arg(long)]
    news_window: Option<usize>,

    /// Lookback for trend and yield (e.g. 1y, 5y, ytd, max)
    #[arg(long)]
    history: Option<HistoryPeriod>,

    /// Instruments analysed at the same time
    #[arg(short, long)]
    concurrency: Option<usize>,

    /// Timeout for a single provider request in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// VADER format lexicon replacing the built-in one
    #[arg(long)]
    lexicon: Option<PathBuf>,

    /// Write SVG charts to this directory
    #[arg(long)]
    charts_dir: Option<PathBuf>,

    /// Print reports as JSON instead of tables
    #[arg(long)]
    json: bool,

    /// Log output format (pretty or json)
    #[arg(long, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    AppSettings::default()
        .with_log_format(args.log_format)
        .init_logging()?;

    info!("Starting stockscope");

    let config = build_config(&args)?;
    let identifiers = if args.identifiers.is_empty() {
        read_identifier_list(&args.input)
            .with_context(|| format!("cannot read identifier list {}", args.input.display()))?
    } else {
        args.identifiers.clone()
    };

    if identifiers.is_empty() {
        warn!("No identifiers to analyse");
        return Ok(ExitCode::SUCCESS);
    }

    let lexicon = match &config.lexicon_path {
        Some(path) => Lexicon::from_path(path)
            .with_context(|| format!("cannot load lexicon {}", path.display()))?,
        None => Lexicon::builtin(),
    };
    let classifier = SentimentClassifier::new(Arc::new(lexicon));

    let provider = Arc::new(MarketDataService::new(&config));
    let settings = AnalyzerSettings::from_config(&config)?;
    let analyzer = InstrumentAnalyzer::new(provider, classifier, settings);
    let batch = BatchOrchestrator::new(analyzer, config.concurrency);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing running analyses");
            cancel_tx.send_replace(true);
        }
    });

    let summary = batch.run_until(&identifiers, cancel_rx).await;

    let mut sinks: Vec<Box<dyn PresentationSink>> = Vec::new();
    if args.json {
        sinks.push(Box::new(JsonSink));
    } else {
        sinks.push(Box::new(ConsoleSink));
    }
    if let Some(dir) = &args.charts_dir {
        let charts = SvgChartSink::new(dir)
            .with_context(|| format!("cannot create chart directory {}", dir.display()))?;
        sinks.push(Box::new(charts));
    }
    present(&sinks, &summary);

    Ok(if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL)
    })
}

/// Defaults, then environment, then command-line flags
fn build_config(args: &Args) -> anyhow::Result<ScopeConfig> {
    let mut config = ScopeConfig::default().from_env()?;

    if let Some(window) = args.news_window {
        config.news_window = window;
    }
    if let Some(period) = args.history {
        config.history_period = period;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if let Some(secs) = args.timeout_secs {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(path) = &args.lexicon {
        config.lexicon_path = Some(path.clone());
    }
    if let Some(peers) = &args.peers {
        config.peer_universe = parse_peers(peers)?;
    }

    config.validate()?;
    Ok(config)
}

fn parse_peers(value: &str) -> anyhow::Result<Vec<String>> {
    let path = Path::new(value);
    if path.is_file() {
        return Ok(read_identifier_list(path)?);
    }

    Ok(value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_peers_list() {
        let peers = parse_peers("AAPL, MSFT,,GOOGL ").unwrap();
        assert_eq!(peers, vec!["AAPL", "MSFT", "GOOGL"]);
    }

    #[test]
    fn test_parse_peers_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.txt");
        std::fs::write(&path, "# tech\nAAPL\n\nMSFT\n").unwrap();

        let peers = parse_peers(path.to_str().unwrap()).unwrap();
        assert_eq!(peers, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "stockscope",
            "--news-window",
            "5",
            "--history",
            "2y",
            "--concurrency",
            "3",
            "--peers",
            "AAPL,MSFT",
            "US0378331005",
        ]);
        let config = build_config(&args).unwrap();

        assert_eq!(config.news_window, 5);
        assert_eq!(config.history_period, HistoryPeriod::Years(2));
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.peer_universe, vec!["AAPL", "MSFT"]);
        assert_eq!(args.identifiers, vec!["US0378331005"]);
        assert_eq!(args.input, PathBuf::from(DEFAULT_IDENTIFIER_FILE));
    }

    #[test]
    fn test_invalid_concurrency_rejected() {
        let args = Args::parse_from(["stockscope", "--concurrency", "0"]);
        assert!(build_config(&args).is_err());
    }
}
