use serde_json::json;
use tickscan_core::payload::CHART_LOOKBACK_DAYS;
use tickscan_core::{
    ChartPayload, EngineConfig, HistoryRequest, PriceHistorySource, ProviderId, Region, Ticker,
    TradingDate,
};

use super::{CommandResult, Context};
use crate::cli::ChartArgs;
use crate::error::CliError;

pub async fn run(args: &ChartArgs, context: &Context) -> Result<CommandResult, CliError> {
    let ticker = Ticker::parse(&args.symbol)?;
    let (region, provider) = if ticker.is_krx_code() {
        (Region::Korea, ProviderId::Krx)
    } else {
        (Region::UnitedStates, ProviderId::Yahoo)
    };

    let request =
        HistoryRequest::lookback(ticker.clone(), TradingDate::today(), CHART_LOOKBACK_DAYS);
    let series = context.history_for(region).fetch_ohlcv(request).await?;

    let engine = EngineConfig::default().with_rsi_mode(context.config.rsi_mode);
    let chart = ChartPayload::build(&series, &engine);

    let mut result = CommandResult::ok(json!(chart), vec![provider]).with_empty(chart.is_empty());
    if chart.is_empty() {
        result = result.with_warning(format!(
            "{ticker}: {} bars is not enough history for the 200-day average",
            series.len()
        ));
    }
    Ok(result)
}
