//! Market sentiment widgets.
//!
//! Each indicator is fetched independently; a failing source only removes
//! its own widget from the report.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data_source::FearGreedSource;
use crate::{Period, PriceHistorySource, SourceError, Ticker, UtcDateTime};

/// Change direction between two readings. `Flat` only on exact equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Direction {
    pub fn between(current: f64, previous: f64) -> Self {
        if current > previous {
            Self::Up
        } else if current < previous {
            Self::Down
        } else {
            Self::Flat
        }
    }

    pub const fn arrow(self) -> &'static str {
        match self {
            Self::Up => "▲",
            Self::Down => "▼",
            Self::Flat => "-",
        }
    }
}

/// One single-value market widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketIndicator {
    pub name: String,
    pub symbol: Option<Ticker>,
    pub current_value: f64,
    pub previous_value: Option<f64>,
    pub unit_symbol: String,
    /// Classification text for composite scores.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<UtcDateTime>,
}

impl MarketIndicator {
    /// `(current - previous) / previous`; 0 without a previous value or when
    /// the previous value is 0.
    pub fn change_ratio(&self) -> f64 {
        match self.previous_value {
            Some(previous) if previous != 0.0 => (self.current_value - previous) / previous,
            _ => 0.0,
        }
    }

    pub fn change_percent(&self) -> f64 {
        self.change_ratio() * 100.0
    }

    pub fn direction(&self) -> Direction {
        match self.previous_value {
            Some(previous) if previous != 0.0 => Direction::between(self.current_value, previous),
            _ => Direction::Flat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndicatorSource {
    /// Last two daily closes of a quote series.
    Quote(Ticker),
    FearGreed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorSpec {
    pub name: String,
    pub source: IndicatorSource,
    pub unit_symbol: String,
}

impl IndicatorSpec {
    pub fn quote(name: &str, symbol: &str, unit_symbol: &str) -> Result<Self, SourceError> {
        Ok(Self {
            name: name.to_owned(),
            source: IndicatorSource::Quote(Ticker::parse(symbol)?),
            unit_symbol: unit_symbol.to_owned(),
        })
    }

    pub fn fear_greed() -> Self {
        Self {
            name: String::from("Fear & Greed"),
            source: IndicatorSource::FearGreed,
            unit_symbol: String::new(),
        }
    }

    /// Volatility index, two broad indices, USD/KRW, BTC, ETH and the
    /// fear/greed composite.
    pub fn defaults() -> Result<Vec<Self>, SourceError> {
        Ok(vec![
            Self::quote("VIX", "^VIX", "")?,
            Self::quote("S&P 500", "^GSPC", "")?,
            Self::quote("NASDAQ", "^IXIC", "")?,
            Self::quote("USD/KRW", "KRW=X", "₩")?,
            Self::quote("Bitcoin", "BTC-USD", "$")?,
            Self::quote("Ethereum", "ETH-USD", "$")?,
            Self::fear_greed(),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentFailure {
    pub name: String,
    pub code: String,
    pub message: String,
}

/// Widgets that loaded plus the ones that did not. Partial reports are normal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentReport {
    pub indicators: Vec<MarketIndicator>,
    pub failures: Vec<SentimentFailure>,
}

impl SentimentReport {
    pub fn get(&self, name: &str) -> Option<&MarketIndicator> {
        self.indicators.iter().find(|indicator| indicator.name == name)
    }
}

pub struct SentimentAggregator {
    quotes: Arc<dyn PriceHistorySource>,
    fear_greed: Arc<dyn FearGreedSource>,
    specs: Vec<IndicatorSpec>,
}

impl SentimentAggregator {
    pub fn new(
        quotes: Arc<dyn PriceHistorySource>,
        fear_greed: Arc<dyn FearGreedSource>,
        specs: Vec<IndicatorSpec>,
    ) -> Self {
        Self {
            quotes,
            fear_greed,
            specs,
        }
    }

    pub fn specs(&self) -> &[IndicatorSpec] {
        &self.specs
    }

    /// Fetches every widget concurrently. Never fails as a whole.
    pub async fn collect(&self) -> SentimentReport {
        let outcomes = join_all(self.specs.iter().map(|spec| self.fetch(spec))).await;

        let mut report = SentimentReport::default();
        for (spec, outcome) in self.specs.iter().zip(outcomes) {
            match outcome {
                Ok(indicator) => report.indicators.push(indicator),
                Err(error) => {
                    warn!(
                        indicator = %spec.name,
                        code = error.code(),
                        %error,
                        "sentiment source failed"
                    );
                    report.failures.push(SentimentFailure {
                        name: spec.name.clone(),
                        code: error.code().to_owned(),
                        message: error.message().to_owned(),
                    });
                }
            }
        }

        info!(
            loaded = report.indicators.len(),
            failed = report.failures.len(),
            "sentiment collected"
        );
        report
    }

    async fn fetch(&self, spec: &IndicatorSpec) -> Result<MarketIndicator, SourceError> {
        match &spec.source {
            IndicatorSource::Quote(symbol) => {
                let series = self
                    .quotes
                    .quote_history(symbol.clone(), Period::parse("5d")?)
                    .await?;
                let closes = series.closes();
                let (current, previous) = match closes.as_slice() {
                    [] => {
                        return Err(SourceError::not_found(format!("no quotes for {symbol}")));
                    }
                    [only] => (*only, None),
                    [.., previous, current] => (*current, Some(*previous)),
                };
                let as_of = series
                    .last()
                    .and_then(|bar| UtcDateTime::from_unix_seconds(bar.date.unix_seconds()).ok());

                Ok(MarketIndicator {
                    name: spec.name.clone(),
                    symbol: Some(symbol.clone()),
                    current_value: current,
                    previous_value: previous,
                    unit_symbol: spec.unit_symbol.clone(),
                    label: None,
                    as_of,
                })
            }
            IndicatorSource::FearGreed => {
                let history = self.fear_greed.fear_greed().await?;
                Ok(MarketIndicator {
                    name: spec.name.clone(),
                    symbol: None,
                    current_value: f64::from(history.latest.value),
                    previous_value: history.previous.map(|reading| f64::from(reading.value)),
                    unit_symbol: spec.unit_symbol.clone(),
                    label: Some(history.latest.classification),
                    as_of: Some(history.latest.timestamp),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicator(current: f64, previous: Option<f64>) -> MarketIndicator {
        MarketIndicator {
            name: String::from("VIX"),
            symbol: None,
            current_value: current,
            previous_value: previous,
            unit_symbol: String::new(),
            label: None,
            as_of: None,
        }
    }

    #[test]
    fn change_and_direction() {
        let up = indicator(110.0, Some(100.0));
        assert!((up.change_ratio() - 0.1).abs() < 1e-12);
        assert_eq!(up.direction(), Direction::Up);

        assert_eq!(indicator(90.0, Some(100.0)).direction(), Direction::Down);
        assert_eq!(indicator(100.0, Some(100.0)).direction(), Direction::Flat);
    }

    #[test]
    fn zero_or_missing_previous_is_flat() {
        let zero = indicator(5.0, Some(0.0));
        assert_eq!(zero.change_ratio(), 0.0);
        assert_eq!(zero.direction(), Direction::Flat);

        let missing = indicator(5.0, None);
        assert_eq!(missing.change_percent(), 0.0);
        assert_eq!(missing.direction(), Direction::Flat);
    }

    #[test]
    fn default_specs_cover_every_widget() {
        let specs = IndicatorSpec::defaults().expect("specs");
        assert_eq!(specs.len(), 7);
        assert!(specs
            .iter()
            .any(|spec| matches!(spec.source, IndicatorSource::FearGreed)));
    }
}
