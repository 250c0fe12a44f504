use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Ticker, TradingDate, ValidationError};

/// Minimum number of bars any indicator needs.
pub const MIN_BARS: usize = 20;

/// Korean exchange sub-market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Kospi,
    Kosdaq,
}

impl Market {
    pub const ALL: [Self; 2] = [Self::Kospi, Self::Kosdaq];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kospi => "kospi",
            Self::Kosdaq => "kosdaq",
        }
    }
}

impl Display for Market {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Market {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "kospi" => Ok(Self::Kospi),
            "kosdaq" => Ok(Self::Kosdaq),
            other => Err(ValidationError::InvalidMarket {
                value: other.to_owned(),
            }),
        }
    }
}

/// Daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPriceBar")]
pub struct PriceBar {
    pub date: TradingDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

impl PriceBar {
    pub fn new(
        date: TradingDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: Option<u64>,
    ) -> Result<Self, ValidationError> {
        validate_positive("open", open)?;
        validate_positive("high", high)?;
        validate_positive("low", low)?;
        validate_positive("close", close)?;

        if high < low {
            return Err(ValidationError::InvalidBarRange);
        }

        if open < low || open > high || close < low || close > high {
            return Err(ValidationError::InvalidBarBounds);
        }

        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}

/// Ascending, duplicate-free daily bars for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPriceSeries")]
pub struct PriceSeries {
    ticker: Ticker,
    bars: Vec<PriceBar>,
}

// Wire shapes; deserialized values go through the validating constructors.
#[derive(Deserialize)]
struct RawPriceBar {
    date: TradingDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: Option<u64>,
}

impl TryFrom<RawPriceBar> for PriceBar {
    type Error = ValidationError;

    fn try_from(raw: RawPriceBar) -> Result<Self, Self::Error> {
        Self::new(raw.date, raw.open, raw.high, raw.low, raw.close, raw.volume)
    }
}

#[derive(Deserialize)]
struct RawPriceSeries {
    ticker: Ticker,
    bars: Vec<PriceBar>,
}

impl TryFrom<RawPriceSeries> for PriceSeries {
    type Error = ValidationError;

    fn try_from(raw: RawPriceSeries) -> Result<Self, Self::Error> {
        Self::new(raw.ticker, raw.bars)
    }
}

impl PriceSeries {
    /// Builds a series from bars that must already be strictly ascending.
    pub fn new(ticker: Ticker, bars: Vec<PriceBar>) -> Result<Self, ValidationError> {
        for (index, pair) in bars.windows(2).enumerate() {
            if pair[1].date <= pair[0].date {
                return Err(ValidationError::UnorderedBars { index: index + 1 });
            }
        }
        Ok(Self { ticker, bars })
    }

    /// Sorts by date and keeps the last bar seen for each date.
    pub fn from_unordered(ticker: Ticker, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|bar| bar.date);
        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self {
            ticker,
            bars: deduped,
        }
    }

    /// Drops bars outside `[start, end]`.
    pub fn retain_range(&mut self, start: TradingDate, end: TradingDate) {
        self.bars.retain(|bar| bar.date >= start && bar.date <= end);
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|bar| bar.low).collect()
    }

    pub fn dates(&self) -> Vec<TradingDate> {
        self.bars.iter().map(|bar| bar.date).collect()
    }

    /// Returns the number of bars when it meets `min`, the bar count otherwise.
    pub fn require_min_bars(&self, min: usize) -> Result<usize, usize> {
        if self.bars.len() >= min {
            Ok(self.bars.len())
        } else {
            Err(self.bars.len())
        }
    }
}

/// One row of a market-cap ranking snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCapEntry {
    pub ticker: Ticker,
    pub name: Option<String>,
    pub market: Market,
    pub market_cap: f64,
}

/// Identifying fields returned by the global provider for a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentProfile {
    pub ticker: Ticker,
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub instrument_type: Option<String>,
    pub currency: Option<String>,
}

impl InstrumentProfile {
    /// A profile identifies a real instrument when any descriptive field is present.
    pub fn is_identified(&self) -> bool {
        [
            &self.name,
            &self.exchange,
            &self.instrument_type,
            &self.currency,
        ]
        .iter()
        .any(|field| field.as_deref().is_some_and(|value| !value.trim().is_empty()))
    }
}

fn validate_positive(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }
    if value <= 0.0 {
        return Err(ValidationError::NonPositiveValue { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u8) -> TradingDate {
        TradingDate::from_ymd(2024, 1, day).expect("valid date")
    }

    fn bar(day: u8, close: f64) -> PriceBar {
        PriceBar::new(date(day), close, close, close, close, Some(10)).expect("valid bar")
    }

    #[test]
    fn rejects_invalid_bar_bounds() {
        let err = PriceBar::new(date(1), 10.0, 12.0, 9.0, 12.5, Some(10)).expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidBarBounds));
    }

    #[test]
    fn rejects_zero_price() {
        let err = PriceBar::new(date(1), 0.0, 1.0, 0.0, 1.0, None).expect_err("must fail");
        assert!(matches!(err, ValidationError::NonPositiveValue { field: "open" }));
    }

    #[test]
    fn series_rejects_duplicate_dates() {
        let ticker = Ticker::parse("AAPL").expect("ticker");
        let err = PriceSeries::new(ticker, vec![bar(2, 1.0), bar(2, 1.5)]).expect_err("must fail");
        assert!(matches!(err, ValidationError::UnorderedBars { index: 1 }));
    }

    #[test]
    fn deserializing_checks_bar_order() {
        let ticker = Ticker::parse("AAPL").expect("ticker");
        let valid = PriceSeries::new(ticker, vec![bar(2, 1.0), bar(3, 1.5)]).expect("series");
        let json = serde_json::to_string(&valid).expect("serialize");
        let back: PriceSeries = serde_json::from_str(&json).expect("ascending bars load");
        assert_eq!(back, valid);

        let mut value = serde_json::to_value(&valid).expect("value");
        value["bars"]
            .as_array_mut()
            .expect("bars array")
            .reverse();
        let err = serde_json::from_value::<PriceSeries>(value).expect_err("descending bars");
        assert!(err.to_string().contains("index 1"), "{err}");
    }

    #[test]
    fn deserializing_checks_bar_bounds() {
        let json = r#"{"date":"2024-01-02","open":10.0,"high":9.0,"low":11.0,"close":10.0}"#;
        assert!(serde_json::from_str::<PriceBar>(json).is_err());
    }

    #[test]
    fn from_unordered_sorts_and_keeps_latest_duplicate() {
        let ticker = Ticker::parse("AAPL").expect("ticker");
        let series =
            PriceSeries::from_unordered(ticker, vec![bar(3, 3.0), bar(1, 1.0), bar(3, 3.5)]);

        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![1.0, 3.5]);
    }

    #[test]
    fn profile_requires_an_identifying_field() {
        let ticker = Ticker::parse("ZZZZ").expect("ticker");
        let empty = InstrumentProfile {
            ticker: ticker.clone(),
            name: Some(String::from("  ")),
            exchange: None,
            instrument_type: None,
            currency: None,
        };
        assert!(!empty.is_identified());

        let named = InstrumentProfile {
            exchange: Some(String::from("NMS")),
            ..empty
        };
        assert!(named.is_identified());
    }
}
