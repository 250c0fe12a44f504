use serde_json::json;
use tickscan_core::payload::{FearGreedSnapshot, VixSnapshot};
use tickscan_core::universe::DEFAULT_US_TICKERS;
use tickscan_core::{
    CuratedUniverse, EngineConfig, FearGreedSource, MultiTickerAnalysis, Period,
    PriceHistorySource, ProviderId, Region, SourceError, Ticker, TickerAnalysis, TradingDate,
    UtcDateTime,
};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{CommandResult, Context};
use crate::cli::AnalyzeArgs;
use crate::error::CliError;

const VIX_SYMBOL: &str = "^VIX";

pub async fn run(args: &AnalyzeArgs, context: &Context) -> Result<CommandResult, CliError> {
    let tickers = parse_symbols(&args.symbols)?;
    let universe = CuratedUniverse::new(context.yahoo.clone(), tickers).to_universe();

    let pipeline = context.pipeline(
        Region::UnitedStates,
        EngineConfig::default().with_rsi_mode(context.config.rsi_mode),
        TradingDate::today(),
    );
    let report = pipeline.run(&universe, &CancellationToken::new()).await;

    let mut warnings = Vec::new();
    let (vix, fear_greed) = tokio::join!(vix(context), context.fear_greed.fear_greed());
    let vix_data = match vix {
        Ok(snapshot) => snapshot,
        Err(error) => {
            warnings.push(format!("VIX unavailable: {error}"));
            None
        }
    };
    let fear_greed_data = match fear_greed {
        Ok(history) => Some(FearGreedSnapshot::from(&history.latest)),
        Err(error) => {
            warn!(code = error.code(), %error, "fear/greed unavailable");
            warnings.push(format!("fear/greed unavailable: {error}"));
            None
        }
    };

    let results: Vec<TickerAnalysis> = report
        .results
        .iter()
        .map(|item| TickerAnalysis::from(&item.indicators))
        .collect();
    let payload = MultiTickerAnalysis::new(
        results,
        report.error_lines(),
        vix_data,
        fear_greed_data,
        UtcDateTime::now(),
    );

    Ok(CommandResult::ok(
        json!(payload),
        vec![ProviderId::Yahoo, ProviderId::AlternativeMe],
    )
    .with_warnings(warnings)
    .with_empty(report.results.is_empty()))
}

async fn vix(context: &Context) -> Result<Option<VixSnapshot>, SourceError> {
    let ticker = Ticker::parse(VIX_SYMBOL)?;
    let series = context
        .yahoo
        .quote_history(ticker, Period::parse("5d")?)
        .await?;
    Ok(VixSnapshot::from_series(&series))
}

/// Requested symbols, or the default U.S. list when none are given.
fn parse_symbols(symbols: &[String]) -> Result<Vec<Ticker>, CliError> {
    if symbols.is_empty() {
        return DEFAULT_US_TICKERS
            .iter()
            .map(|symbol| Ticker::parse(symbol).map_err(CliError::from))
            .collect();
    }

    let mut tickers: Vec<Ticker> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let ticker = Ticker::parse(symbol)?;
        if !tickers.contains(&ticker) {
            tickers.push(ticker);
        }
    }
    Ok(tickers)
}
