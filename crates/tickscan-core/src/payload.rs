//! JSON payloads served to the presentation layer.
//!
//! Field names are part of the wire contract consumed by dashboards, so the
//! structs here are flat and kept separate from the engine types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{EngineConfig, IndicatorResult};
use crate::data_source::FearGreedReading;
use crate::indicators::stochastic::OVERSOLD;
use crate::indicators::{sma, stochastic, CHART_MA_WINDOWS};
use crate::{PriceSeries, Ticker, UtcDateTime};

/// Rows kept in a chart payload.
pub const CHART_ROWS: usize = 60;
/// Calendar days of history fetched for a chart.
pub const CHART_LOOKBACK_DAYS: i64 = 500;

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticSignal {
    pub k_value: Option<f64>,
    pub k_below_30: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub all_stoch_oversold: bool,
    pub price_and_stoch_bearish: bool,
}

/// Per-ticker stochastic analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerAnalysis {
    pub ticker: Ticker,
    pub current_price: f64,
    pub ma_20: Option<f64>,
    pub price_below_ma20: bool,
    pub stochastic_analysis: BTreeMap<String, StochasticSignal>,
    pub summary: AnalysisSummary,
}

impl From<&IndicatorResult> for TickerAnalysis {
    fn from(result: &IndicatorResult) -> Self {
        let stochastic_analysis = result
            .stochastic
            .iter()
            .map(|reading| {
                (
                    reading.label.clone(),
                    StochasticSignal {
                        k_value: reading.k.map(round2),
                        k_below_30: reading.is_oversold(OVERSOLD),
                    },
                )
            })
            .collect();

        Self {
            ticker: result.ticker.clone(),
            current_price: round2(result.current_price),
            ma_20: result.ma_20.map(round2),
            price_below_ma20: result.price_below_ma20(),
            stochastic_analysis,
            summary: AnalysisSummary {
                all_stoch_oversold: result.all_stoch_oversold(OVERSOLD),
                price_and_stoch_bearish: result.price_and_stoch_bearish(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VixSnapshot {
    pub value: f64,
    pub timestamp: String,
}

impl VixSnapshot {
    /// Last close of a volatility-index series; `None` on an empty series.
    pub fn from_series(series: &PriceSeries) -> Option<Self> {
        let last = series.last()?;
        let timestamp = UtcDateTime::from_unix_seconds(last.date.unix_seconds()).ok()?;
        Some(Self {
            value: round2(last.close),
            timestamp: timestamp.format_display(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearGreedSnapshot {
    pub value: u32,
    pub classification: String,
    pub timestamp: String,
}

impl From<&FearGreedReading> for FearGreedSnapshot {
    fn from(reading: &FearGreedReading) -> Self {
        Self {
            value: reading.value,
            classification: reading.classification.clone(),
            timestamp: reading.timestamp.format_display(),
        }
    }
}

/// Batch analysis payload with market context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTickerAnalysis {
    pub results: Vec<TickerAnalysis>,
    /// `"<ticker>: <reason>"` per ticker that could not be analysed.
    pub errors: Vec<String>,
    pub vix_data: Option<VixSnapshot>,
    pub fear_greed_data: Option<FearGreedSnapshot>,
    pub last_updated: String,
}

impl MultiTickerAnalysis {
    pub fn new(
        results: Vec<TickerAnalysis>,
        errors: Vec<String>,
        vix_data: Option<VixSnapshot>,
        fear_greed_data: Option<FearGreedSnapshot>,
        generated_at: UtcDateTime,
    ) -> Self {
        Self {
            results,
            errors,
            vix_data,
            fear_greed_data,
            last_updated: generated_at.format_display(),
        }
    }
}

/// Price, moving averages and stochastic lines for one ticker.
///
/// Only rows where the longest moving average is defined are kept, and of
/// those only the last [`CHART_ROWS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPayload {
    pub ticker: Ticker,
    pub dates: Vec<String>,
    pub close: Vec<f64>,
    pub ma5: Vec<Option<f64>>,
    pub ma20: Vec<Option<f64>>,
    pub ma50: Vec<Option<f64>>,
    pub ma120: Vec<Option<f64>>,
    pub ma200: Vec<Option<f64>>,
    /// `stoch_5_3_3_k`, `stoch_5_3_3_d`, ... per configured preset.
    #[serde(flatten)]
    pub stochastic: BTreeMap<String, Vec<Option<f64>>>,
}

impl ChartPayload {
    pub fn build(series: &PriceSeries, config: &EngineConfig) -> Self {
        let closes = series.closes();
        let highs = series.highs();
        let lows = series.lows();

        let averages: Vec<Vec<Option<f64>>> = CHART_MA_WINDOWS
            .iter()
            .map(|&window| sma(&closes, window))
            .collect();

        let defined: Vec<usize> = averages[averages.len() - 1]
            .iter()
            .enumerate()
            .filter_map(|(i, value)| value.map(|_| i))
            .collect();
        let rows = &defined[defined.len().saturating_sub(CHART_ROWS)..];

        let pick = |line: &[Option<f64>]| -> Vec<Option<f64>> {
            rows.iter().map(|&i| line[i].map(round2)).collect()
        };

        let mut stochastic_lines = BTreeMap::new();
        for &preset in &config.stochastic {
            let lines = stochastic(&highs, &lows, &closes, preset);
            stochastic_lines.insert(format!("{}_k", preset.label()), pick(&lines.k));
            stochastic_lines.insert(format!("{}_d", preset.label()), pick(&lines.d));
        }

        Self {
            ticker: series.ticker().clone(),
            dates: rows
                .iter()
                .map(|&i| series.bars()[i].date.format_iso())
                .collect(),
            close: rows.iter().map(|&i| round2(closes[i])).collect(),
            ma5: pick(&averages[0]),
            ma20: pick(&averages[1]),
            ma50: pick(&averages[2]),
            ma120: pick(&averages[3]),
            ma200: pick(&averages[4]),
            stochastic: stochastic_lines,
        }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::IndicatorEngine;
    use crate::{PriceBar, TradingDate};

    fn series(len: usize) -> PriceSeries {
        let start = TradingDate::from_ymd(2023, 1, 1).expect("date");
        let bars = (0..len)
            .map(|i| {
                let close = 100.0 + (i as f64 / 5.0).sin() * 10.0;
                let date = TradingDate::new(start.into_inner() + time::Duration::days(i as i64));
                PriceBar::new(date, close, close + 1.0, close - 1.0, close, Some(1_000))
                    .expect("bar")
            })
            .collect();
        PriceSeries::new(Ticker::parse("MSFT").expect("ticker"), bars).expect("series")
    }

    #[test]
    fn ticker_analysis_serialises_expected_shape() {
        let result = IndicatorEngine::default()
            .compute(&series(150))
            .expect("result");
        let value = serde_json::to_value(TickerAnalysis::from(&result)).expect("json");

        assert_eq!(value["ticker"], "MSFT");
        for key in ["stoch_5_3_3", "stoch_10_6_6", "stoch_20_12_12"] {
            assert!(value["stochastic_analysis"][key]["k_below_30"].is_boolean());
        }
        assert!(value["summary"]["all_stoch_oversold"].is_boolean());
        assert!(value["price_below_ma20"].is_boolean());
    }

    #[test]
    fn chart_keeps_last_rows_with_long_average() {
        let chart = ChartPayload::build(&series(300), &EngineConfig::default());

        assert_eq!(chart.len(), CHART_ROWS);
        assert!(chart.ma200.iter().all(Option::is_some));
        assert_eq!(chart.stochastic.len(), 6);
        assert_eq!(chart.stochastic["stoch_5_3_3_k"].len(), CHART_ROWS);

        let json = serde_json::to_value(&chart).expect("json");
        assert!(json.get("stoch_20_12_12_d").is_some());
    }

    #[test]
    fn chart_is_empty_without_enough_history_for_long_average() {
        let chart = ChartPayload::build(&series(150), &EngineConfig::default());
        assert!(chart.is_empty());
    }

    #[test]
    fn unavailable_k_is_null_and_not_oversold() {
        let result = IndicatorEngine::default()
            .compute(&series(25))
            .expect("result");
        let analysis = TickerAnalysis::from(&result);
        let slow = &analysis.stochastic_analysis["stoch_20_12_12"];

        assert_eq!(slow.k_value, None);
        assert!(!slow.k_below_30);
    }
}
