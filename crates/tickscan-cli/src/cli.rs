//! CLI argument definitions for tickscan.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scan` | Screen a universe and filter by indicator thresholds |
//! | `analyze` | Stochastic analysis for a list of tickers with market context |
//! | `chart` | Price, moving averages and stochastic lines for one ticker |
//! | `sentiment` | Market sentiment widgets |
//! | `universe` | Show or edit the ticker universe |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--mock` | `false` | Use synthetic data instead of live providers |
//! | `--strict` | `false` | Treat warnings as errors |
//! | `--concurrency` | `6` | Worker pool size |
//! | `--timeout-ms` | `10000` | Per-request timeout in ms |
//! | `-v` | off | Log level (`-v` info, `-vv` debug) |
//!
//! # Examples
//!
//! ```bash
//! # Top 50 KOSPI/KOSDAQ names with RSI under 30
//! tickscan scan --market kr --rsi-below 30 --csv-auto
//!
//! # Curated U.S. list plus one extra ticker, table output
//! tickscan scan --market us --add PLTR --format table
//!
//! # Offline run on synthetic data
//! tickscan --mock analyze AAPL MSFT
//! ```

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tickscan_core::{CsvLayout, Region, RsiMode};

/// Technical-indicator screener for Korean and U.S. equities.
#[derive(Debug, Parser)]
#[command(
    name = "tickscan",
    author,
    version,
    about = "Technical-indicator screener for Korean and U.S. equities",
    long_about = "tickscan builds a ticker universe, fetches daily history with bounded \
concurrency, computes RSI, Bollinger %B / band width and stochastic oscillators, \
and filters the results.\n\
\n\
  • KRX Open API for Korean stocks (set TICKSCAN_KRX_API_KEY)\n\
  • Yahoo chart API for U.S. stocks, indices, FX and crypto\n\
  • alternative.me fear/greed index\n\
\n\
Use 'tickscan <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Serve deterministic synthetic data instead of calling providers.
    #[arg(long, global = true, default_value_t = false)]
    pub mock: bool,

    /// Treat warnings and errors as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Maximum tickers in flight at once.
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Increase log verbosity on stderr.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object output.
    Json,
    /// Plain text layout for terminals.
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MarketArg {
    /// KOSPI and KOSDAQ, top N by market cap.
    Kr,
    /// Curated U.S. list.
    Us,
}

impl From<MarketArg> for Region {
    fn from(value: MarketArg) -> Self {
        match value {
            MarketArg::Kr => Region::Korea,
            MarketArg::Us => Region::UnitedStates,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayoutArg {
    /// Korean column headers.
    Ko,
    /// English column headers.
    En,
}

impl From<LayoutArg> for CsvLayout {
    fn from(value: LayoutArg) -> Self {
        match value {
            LayoutArg::Ko => CsvLayout::Korean,
            LayoutArg::En => CsvLayout::English,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RsiModeArg {
    /// Wilder smoothing.
    Wilder,
    /// Simple rolling means.
    Simple,
}

impl From<RsiModeArg> for RsiMode {
    fn from(value: RsiModeArg) -> Self {
        match value {
            RsiModeArg::Wilder => RsiMode::Wilder,
            RsiModeArg::Simple => RsiMode::Simple,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Screen a universe by indicator thresholds.
    ///
    /// # Examples
    ///
    ///   tickscan scan --market kr --top 100 --rsi-below 30
    ///   tickscan scan --market us --percent-b-below 0.2 --narrow-bands
    ///   tickscan scan --market kr --csv-auto --layout en
    Scan(ScanArgs),

    /// Stochastic analysis for several tickers plus VIX and fear/greed.
    ///
    /// Without symbols the default U.S. list is used.
    ///
    /// # Examples
    ///
    ///   tickscan analyze
    ///   tickscan analyze AAPL NVDA TSLA --pretty
    Analyze(AnalyzeArgs),

    /// Chart series for one ticker.
    ///
    /// # Examples
    ///
    ///   tickscan chart 005930
    ///   tickscan chart AAPL --pretty
    Chart(ChartArgs),

    /// Market sentiment widgets (VIX, indices, FX, crypto, fear/greed).
    Sentiment,

    /// Show the ticker universe, optionally editing the curated list.
    ///
    /// # Examples
    ///
    ///   tickscan universe --market kr --top 20
    ///   tickscan universe --market us --add PLTR --remove TSLA
    Universe(UniverseArgs),
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Market to screen.
    #[arg(long, value_enum, default_value_t = MarketArg::Kr)]
    pub market: MarketArg,

    /// Number of Korean tickers by market cap.
    #[arg(long)]
    pub top: Option<usize>,

    /// Trading date to end the history window (YYYY-MM-DD, default today).
    #[arg(long)]
    pub date: Option<String>,

    /// Keep results with RSI strictly below the threshold.
    #[arg(long)]
    pub rsi_below: Option<f64>,

    /// Keep results with %B strictly below the threshold.
    #[arg(long)]
    pub percent_b_below: Option<f64>,

    /// Keep results whose band width is below the 52-week average.
    #[arg(long, default_value_t = false)]
    pub narrow_bands: bool,

    /// Keep results trading under their 20-day average.
    #[arg(long, default_value_t = false)]
    pub below_ma20: bool,

    /// Keep results where every stochastic %K is under 30.
    #[arg(long, default_value_t = false)]
    pub oversold: bool,

    /// Add a ticker to the curated U.S. list for this run.
    #[arg(long, value_name = "SYMBOL")]
    pub add: Vec<String>,

    /// Remove a ticker from the curated U.S. list for this run.
    #[arg(long, value_name = "SYMBOL")]
    pub remove: Vec<String>,

    /// Write filtered results to this CSV file.
    #[arg(long, conflicts_with = "csv_auto")]
    pub csv: Option<PathBuf>,

    /// Write filtered results to a timestamped CSV file in the working directory.
    #[arg(long, default_value_t = false)]
    pub csv_auto: bool,

    /// CSV header language.
    #[arg(long, value_enum, default_value_t = LayoutArg::Ko)]
    pub layout: LayoutArg,

    /// RSI smoothing.
    #[arg(long, value_enum)]
    pub rsi_mode: Option<RsiModeArg>,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Tickers to analyse.
    pub symbols: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ChartArgs {
    /// Six-digit KRX code or Yahoo symbol.
    pub symbol: String,
}

#[derive(Debug, Args)]
pub struct UniverseArgs {
    #[arg(long, value_enum, default_value_t = MarketArg::Kr)]
    pub market: MarketArg,

    /// Number of Korean tickers by market cap.
    #[arg(long)]
    pub top: Option<usize>,

    /// Snapshot date (YYYY-MM-DD, default today).
    #[arg(long)]
    pub date: Option<String>,

    /// Add a ticker to the curated U.S. list.
    #[arg(long, value_name = "SYMBOL")]
    pub add: Vec<String>,

    /// Remove a ticker from the curated U.S. list.
    #[arg(long, value_name = "SYMBOL")]
    pub remove: Vec<String>,

    /// Start from the default U.S. list before applying edits.
    #[arg(long, default_value_t = false)]
    pub reset: bool,
}
