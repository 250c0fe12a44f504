//! # Domain Models
//!
//! Validated value types shared by adapters, the indicator engine and the
//! presentation layer.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Ticker`] | KRX short code or global provider symbol |
//! | [`TradingDate`] | Calendar date of a daily bar |
//! | [`PriceBar`] | Daily OHLCV bar, prices strictly positive |
//! | [`PriceSeries`] | Ascending, duplicate-free bars for one ticker |
//! | [`MarketCapEntry`] | One row of a market-cap ranking snapshot |
//! | [`InstrumentProfile`] | Identifying fields used to validate curated tickers |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Construction validates invariants, so code holding a `PriceSeries` never
//! sees out-of-order or non-positive bars.

mod models;
mod symbol;
mod timestamp;
mod trading_date;

pub use models::{InstrumentProfile, Market, MarketCapEntry, PriceBar, PriceSeries, MIN_BARS};
pub use symbol::Ticker;
pub use timestamp::UtcDateTime;
pub use trading_date::TradingDate;
