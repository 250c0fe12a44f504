//! Per-ticker indicator computation.
//!
//! [`IndicatorEngine`] turns one [`PriceSeries`] into one [`IndicatorResult`].
//! It owns no state beyond its configuration, so a single engine is shared by
//! every pipeline worker.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::indicators::bollinger::BASELINE_BARS;
use crate::indicators::rsi::RSI_PERIOD;
use crate::indicators::stochastic::OVERSOLD;
use crate::indicators::{
    avg_band_width, bollinger_series, latest, rsi_series, sma, stochastic, BollingerConfig,
    RsiMode, StochasticConfig,
};
use crate::{PriceSeries, SourceError, Ticker, TradingDate, MIN_BARS};

/// Too few bars for the configured windows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{ticker} has {bars} bars, at least {required} required")]
pub struct InsufficientData {
    pub ticker: Ticker,
    pub bars: usize,
    pub required: usize,
}

impl From<InsufficientData> for SourceError {
    fn from(value: InsufficientData) -> Self {
        SourceError::insufficient_data(&value.ticker, value.bars, value.required)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub rsi_mode: RsiMode,
    pub rsi_period: usize,
    pub bollinger: BollingerConfig,
    pub baseline_bars: usize,
    pub ma_window: usize,
    pub stochastic: Vec<StochasticConfig>,
    pub min_bars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rsi_mode: RsiMode::default(),
            rsi_period: RSI_PERIOD,
            bollinger: BollingerConfig::default(),
            baseline_bars: BASELINE_BARS,
            ma_window: 20,
            stochastic: StochasticConfig::PRESETS.to_vec(),
            min_bars: MIN_BARS,
        }
    }
}

impl EngineConfig {
    pub fn with_rsi_mode(mut self, rsi_mode: RsiMode) -> Self {
        self.rsi_mode = rsi_mode;
        self
    }
}

/// Latest `%K`/`%D` for one stochastic preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StochasticReading {
    pub label: String,
    pub config: StochasticConfig,
    pub k: Option<f64>,
    pub d: Option<f64>,
}

impl StochasticReading {
    pub fn is_oversold(&self, threshold: f64) -> bool {
        self.k.is_some_and(|k| k < threshold)
    }
}

/// Latest-bar indicator values for one ticker. `None` marks a value the
/// history was too short (or too flat) to define.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    pub ticker: Ticker,
    pub as_of: TradingDate,
    pub current_price: f64,
    pub rsi: Option<f64>,
    pub percent_b: Option<f64>,
    pub band_width: Option<f64>,
    pub avg_52w_band_width: Option<f64>,
    pub ma_20: Option<f64>,
    pub stochastic: Vec<StochasticReading>,
}

impl IndicatorResult {
    pub fn stoch(&self, label: &str) -> Option<&StochasticReading> {
        self.stochastic.iter().find(|reading| reading.label == label)
    }

    pub fn stoch_k(&self, label: &str) -> Option<f64> {
        self.stoch(label).and_then(|reading| reading.k)
    }

    /// `false` when MA20 is unavailable.
    pub fn price_below_ma20(&self) -> bool {
        self.ma_20.is_some_and(|ma| self.current_price < ma)
    }

    /// Every preset has a defined `%K` below `threshold`.
    pub fn all_stoch_oversold(&self, threshold: f64) -> bool {
        !self.stochastic.is_empty()
            && self
                .stochastic
                .iter()
                .all(|reading| reading.is_oversold(threshold))
    }

    pub fn price_and_stoch_bearish(&self) -> bool {
        self.price_below_ma20() && self.all_stoch_oversold(OVERSOLD)
    }
}

/// An indicator result joined with universe metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedTicker {
    pub ticker: Ticker,
    pub name: String,
    pub market_cap: Option<f64>,
    pub indicators: IndicatorResult,
}

impl AsRef<IndicatorResult> for AnalyzedTicker {
    fn as_ref(&self) -> &IndicatorResult {
        &self.indicators
    }
}

impl AsRef<IndicatorResult> for IndicatorResult {
    fn as_ref(&self) -> &IndicatorResult {
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    config: EngineConfig,
}

impl IndicatorEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Computes every configured indicator on the last bar of `series`.
    ///
    /// # Errors
    ///
    /// [`InsufficientData`] below `min_bars`. Shorter-than-window values for
    /// individual indicators (e.g. the 20/12/12 stochastic on 25 bars) come
    /// back as `None` instead.
    pub fn compute(&self, series: &PriceSeries) -> Result<IndicatorResult, InsufficientData> {
        series
            .require_min_bars(self.config.min_bars)
            .map_err(|bars| InsufficientData {
                ticker: series.ticker().clone(),
                bars,
                required: self.config.min_bars,
            })?;
        let Some(last) = series.last() else {
            return Err(InsufficientData {
                ticker: series.ticker().clone(),
                bars: 0,
                required: self.config.min_bars,
            });
        };

        let closes = series.closes();
        let highs = series.highs();
        let lows = series.lows();

        let rsi = latest(&rsi_series(&closes, self.config.rsi_period, self.config.rsi_mode));
        let bands = bollinger_series(&closes, self.config.bollinger);
        let latest_band = bands.last().copied().flatten();
        let ma_20 = latest(&sma(&closes, self.config.ma_window));

        let readings = self
            .config
            .stochastic
            .iter()
            .map(|&config| {
                let lines = stochastic(&highs, &lows, &closes, config);
                StochasticReading {
                    label: config.label(),
                    config,
                    k: lines.latest_k(),
                    d: lines.latest_d(),
                }
            })
            .collect();

        Ok(IndicatorResult {
            ticker: series.ticker().clone(),
            as_of: last.date,
            current_price: last.close,
            rsi,
            percent_b: latest_band.map(|band| band.percent_b),
            band_width: latest_band.map(|band| band.width),
            avg_52w_band_width: avg_band_width(&bands, self.config.baseline_bars),
            ma_20,
            stochastic: readings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PriceBar;

    fn series(closes: &[f64]) -> PriceSeries {
        let start = TradingDate::from_ymd(2024, 1, 1).expect("date");
        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let date = TradingDate::new(
                    start.into_inner() + time::Duration::days(i as i64),
                );
                PriceBar::new(date, close, close + 1.0, close - 1.0, close, None).expect("bar")
            })
            .collect();
        PriceSeries::new(Ticker::parse("TEST").expect("ticker"), bars).expect("series")
    }

    #[test]
    fn rejects_short_series() {
        let err = IndicatorEngine::default()
            .compute(&series(&[10.0; 19]))
            .expect_err("must fail");
        assert_eq!(err.bars, 19);
        assert_eq!(err.required, 20);

        let source: SourceError = err.into();
        assert!(source.is_skip());
    }

    #[test]
    fn short_history_leaves_slow_presets_unavailable() {
        let closes: Vec<f64> = (0..25).map(|i| 100.0 + (i % 4) as f64).collect();
        let result = IndicatorEngine::default()
            .compute(&series(&closes))
            .expect("result");

        assert_eq!(result.current_price, closes[24]);
        assert!(result.rsi.is_some());
        assert!(result.ma_20.is_some());
        assert!(result.stoch_k("stoch_5_3_3").is_some());
        assert!(result.stoch_k("stoch_20_12_12").is_none());
        assert!(!result.all_stoch_oversold(OVERSOLD));
    }

    #[test]
    fn falling_series_is_bearish() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64 * 2.0).collect();
        let result = IndicatorEngine::default()
            .compute(&series(&closes))
            .expect("result");

        assert!(result.price_below_ma20());
        assert!(result.all_stoch_oversold(OVERSOLD));
        assert!(result.price_and_stoch_bearish());
        assert_eq!(result.rsi, Some(0.0));
    }
}
