use serde::Serialize;
use serde_json::json;
use tickscan_core::sentiment::IndicatorSpec;
use tickscan_core::{MarketIndicator, ProviderId, SentimentAggregator};

use super::{CommandResult, Context};
use crate::error::CliError;

/// Flat widget row with derived change fields.
#[derive(Debug, Serialize)]
struct WidgetRow<'a> {
    name: &'a str,
    symbol: Option<&'a str>,
    value: f64,
    previous: Option<f64>,
    change_percent: f64,
    direction: &'static str,
    unit: &'a str,
    label: Option<&'a str>,
}

impl<'a> From<&'a MarketIndicator> for WidgetRow<'a> {
    fn from(indicator: &'a MarketIndicator) -> Self {
        Self {
            name: &indicator.name,
            symbol: indicator.symbol.as_ref().map(|ticker| ticker.as_str()),
            value: indicator.current_value,
            previous: indicator.previous_value,
            change_percent: indicator.change_percent(),
            direction: indicator.direction().arrow(),
            unit: &indicator.unit_symbol,
            label: indicator.label.as_deref(),
        }
    }
}

pub async fn run(context: &Context) -> Result<CommandResult, CliError> {
    let aggregator = SentimentAggregator::new(
        context.yahoo.clone(),
        context.fear_greed.clone(),
        IndicatorSpec::defaults()?,
    );
    let report = aggregator.collect().await;

    let rows: Vec<WidgetRow<'_>> = report.indicators.iter().map(WidgetRow::from).collect();
    let warnings = report
        .failures
        .iter()
        .map(|failure| format!("{}: {} ({})", failure.name, failure.message, failure.code))
        .collect();

    Ok(CommandResult::ok(
        json!({ "results": rows }),
        vec![ProviderId::Yahoo, ProviderId::AlternativeMe],
    )
    .with_warnings(warnings)
    .with_empty(report.indicators.is_empty()))
}
