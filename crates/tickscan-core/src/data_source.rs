//! Provider traits and request/error types.
//!
//! Adapters implement the narrow capability traits below instead of one wide
//! contract, because the three upstreams expose very different surfaces:
//!
//! | Trait | Capability | Implemented by |
//! |-------|------------|----------------|
//! | [`PriceHistorySource`] | daily OHLCV over a date range or period | KRX, Yahoo |
//! | [`MarketCapSource`] | market-cap ranking snapshot and ticker names | KRX |
//! | [`SymbolLookup`] | identifying fields for a symbol | Yahoo |
//! | [`FearGreedSource`] | fear/greed composite score | Alternative.me |
//!
//! Methods return boxed futures so the traits stay object safe and can be
//! shared across pipeline workers as `Arc<dyn …>`.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::{
    InstrumentProfile, Market, MarketCapEntry, PriceSeries, ProviderId, Ticker, TradingDate,
    UtcDateTime, ValidationError,
};

/// Boxed future returned by provider trait methods.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    Unavailable,
    RateLimited,
    Timeout,
    InvalidRequest,
    NotFound,
    InsufficientData,
    Internal,
}

/// Structured source error carried through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::RateLimited,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Timeout,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::NotFound,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn insufficient_data(ticker: &Ticker, bars: usize, required: usize) -> Self {
        Self {
            kind: SourceErrorKind::InsufficientData,
            message: format!("{ticker} returned {bars} bars, at least {required} required"),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    /// `true` for errors that mean "skip this ticker" rather than a provider fault.
    pub const fn is_skip(&self) -> bool {
        matches!(
            self.kind,
            SourceErrorKind::InsufficientData | SourceErrorKind::NotFound
        )
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::NotFound => "source.not_found",
            SourceErrorKind::InsufficientData => "source.insufficient_data",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<ValidationError> for SourceError {
    fn from(value: ValidationError) -> Self {
        Self::invalid_request(value.to_string())
    }
}

/// Request payload for OHLCV history over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryRequest {
    pub ticker: Ticker,
    pub start: TradingDate,
    pub end: TradingDate,
}

impl HistoryRequest {
    pub fn new(ticker: Ticker, start: TradingDate, end: TradingDate) -> Result<Self, SourceError> {
        if start > end {
            return Err(ValidationError::InvertedDateRange {
                start: start.to_string(),
                end: end.to_string(),
            }
            .into());
        }
        Ok(Self { ticker, start, end })
    }

    /// Window ending at `end` and reaching back `days` calendar days.
    pub fn lookback(ticker: Ticker, end: TradingDate, days: i64) -> Self {
        Self {
            ticker,
            start: end.minus_days(days),
            end,
        }
    }

    /// Stable identity used by the compute cache.
    pub fn cache_key(&self) -> String {
        format!("{}:{}:{}", self.ticker, self.start, self.end)
    }
}

/// Period string accepted by the global provider (`5d`, `1mo`, `1y`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Period(String);

impl Period {
    const ALLOWED: [&'static str; 11] = [
        "1d", "5d", "1mo", "3mo", "6mo", "1y", "2y", "5y", "10y", "ytd", "max",
    ];

    pub fn parse(value: &str) -> Result<Self, SourceError> {
        let normalized = value.trim().to_ascii_lowercase();
        if Self::ALLOWED.contains(&normalized.as_str()) {
            Ok(Self(normalized))
        } else {
            Err(SourceError::invalid_request(format!(
                "unsupported period '{value}'"
            )))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Calendar days covered by the period, counted back from `today`.
    /// Used by providers that only take explicit date ranges.
    pub fn calendar_days(&self, today: TradingDate) -> i64 {
        match self.0.as_str() {
            "1d" => 1,
            "5d" => 7,
            "1mo" => 31,
            "3mo" => 92,
            "6mo" => 183,
            "1y" => 366,
            "2y" => 731,
            "5y" => 1_827,
            "10y" => 3_653,
            "ytd" => i64::from(today.into_inner().ordinal()) - 1,
            _ => 36_525,
        }
    }
}

/// Market-cap snapshot for one sub-market on one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCapSnapshot {
    pub market: Market,
    pub date: TradingDate,
    pub entries: Vec<MarketCapEntry>,
}

/// Fear/greed composite reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearGreedReading {
    pub value: u32,
    pub classification: String,
    pub timestamp: UtcDateTime,
}

/// Latest and previous fear/greed readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FearGreedHistory {
    pub latest: FearGreedReading,
    pub previous: Option<FearGreedReading>,
}

/// Daily OHLCV history provider.
pub trait PriceHistorySource: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Fetches bars for `[start, end]`.
    ///
    /// # Errors
    ///
    /// `InsufficientData` when fewer than 20 bars come back; provider errors
    /// otherwise.
    fn fetch_ohlcv<'a>(&'a self, req: HistoryRequest) -> SourceFuture<'a, PriceSeries>;

    /// Fetches the most recent `period` of daily bars. Unlike
    /// [`fetch_ohlcv`](PriceHistorySource::fetch_ohlcv) this applies no
    /// minimum length, since sentiment widgets need only two points.
    fn quote_history<'a>(&'a self, ticker: Ticker, period: Period)
        -> SourceFuture<'a, PriceSeries>;
}

/// Market-cap ranking provider (local exchange).
pub trait MarketCapSource: Send + Sync {
    fn id(&self) -> ProviderId;

    fn market_caps<'a>(
        &'a self,
        date: TradingDate,
        market: Market,
    ) -> SourceFuture<'a, MarketCapSnapshot>;

    /// Display name for a ticker; `NotFound` when the exchange does not know it.
    fn ticker_name<'a>(&'a self, ticker: Ticker) -> SourceFuture<'a, String>;
}

/// Symbol validation against the global provider.
pub trait SymbolLookup: Send + Sync {
    fn lookup<'a>(&'a self, ticker: Ticker) -> SourceFuture<'a, InstrumentProfile>;
}

/// External fear/greed composite.
pub trait FearGreedSource: Send + Sync {
    fn fear_greed<'a>(&'a self) -> SourceFuture<'a, FearGreedHistory>;
}

/// Finds the first value among several candidate field names.
///
/// Upstream rows use either API codes or localized labels for the same field.
pub(crate) fn first_field<'r>(
    row: &'r BTreeMap<String, serde_json::Value>,
    names: &[&str],
) -> Option<&'r serde_json::Value> {
    names.iter().find_map(|name| row.get(*name))
}
