//! Provider adapters.
//!
//! Each adapter talks to one upstream through an [`HttpClient`](crate::HttpClient).
//! When the client reports `is_mock()`, adapters skip the network entirely and
//! synthesize deterministic data from the ticker, so the whole pipeline can run
//! offline.

mod alternative_me;
mod krx;
mod yahoo;

pub use alternative_me::AlternativeMeAdapter;
pub use krx::KrxAdapter;
pub use yahoo::YahooAdapter;

use time::Weekday;

use crate::{
    HttpError, HttpResponse, PriceBar, PriceSeries, ProviderId, SourceError, Ticker, TradingDate,
    MIN_BARS,
};

/// Stable per-ticker seed for synthetic data.
pub(crate) fn ticker_seed(ticker: &Ticker) -> u64 {
    ticker
        .as_str()
        .bytes()
        .fold(0_u64, |acc, byte| acc.wrapping_mul(33).wrapping_add(u64::from(byte)))
}

/// Deterministic weekday bars between `start` and `end` inclusive.
pub(crate) fn synthetic_series(
    ticker: &Ticker,
    start: TradingDate,
    end: TradingDate,
    base_price: f64,
) -> Result<PriceSeries, SourceError> {
    let seed = ticker_seed(ticker);
    let phase = (seed % 17) as f64;
    let drift = ((seed % 7) as f64 - 3.0) / 4_000.0;

    let mut bars = Vec::new();
    let mut date = start.into_inner();
    let mut index = 0_u32;
    while date <= end.into_inner() {
        if !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday) {
            let t = f64::from(index);
            let wave = 0.08 * ((t + phase) / 9.0).sin() + 0.03 * ((t + phase) / 2.7).cos();
            let close = base_price * (1.0 + drift * t) * (1.0 + wave);
            let open = close * (1.0 - 0.004 * ((t + phase) / 1.9).sin());
            let high = open.max(close) * 1.008;
            let low = open.min(close) * 0.992;
            let volume = 100_000 + (seed.wrapping_add(u64::from(index) * 7_919) % 50_000);

            bars.push(PriceBar::new(
                TradingDate::new(date),
                open,
                high,
                low,
                close,
                Some(volume),
            )?);
            index += 1;
        }
        match date.next_day() {
            Some(next) => date = next,
            None => break,
        }
    }

    Ok(PriceSeries::from_unordered(ticker.clone(), bars))
}

/// `InsufficientData` when the series is shorter than the indicator minimum.
pub(crate) fn ensure_min_bars(series: PriceSeries) -> Result<PriceSeries, SourceError> {
    match series.require_min_bars(MIN_BARS) {
        Ok(_) => Ok(series),
        Err(bars) => Err(SourceError::insufficient_data(series.ticker(), bars, MIN_BARS)),
    }
}

/// Parses upstream numerics that may be JSON numbers or strings with
/// thousands separators (`"1,234,500"`). Blank and `-` cells are `None`.
pub(crate) fn parse_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(number) => number.as_f64(),
        serde_json::Value::String(text) => {
            let cleaned: String = text.chars().filter(|ch| *ch != ',').collect();
            let cleaned = cleaned.trim();
            if cleaned.is_empty() || cleaned == "-" {
                None
            } else {
                cleaned.parse().ok()
            }
        }
        _ => None,
    }
}

pub(crate) fn transport_error(provider: ProviderId, error: HttpError) -> SourceError {
    if error.timed_out() {
        SourceError::timeout(format!("{provider} request timed out: {}", error.message()))
    } else if error.retryable() {
        SourceError::unavailable(format!("{provider} transport error: {}", error.message()))
    } else {
        SourceError::internal(format!("{provider} transport error: {}", error.message()))
    }
}

/// Maps a non-2xx response to the matching error kind.
pub(crate) fn status_error(provider: ProviderId, response: &HttpResponse) -> SourceError {
    let message = format!("{provider} returned status {}", response.status);
    match response.status {
        401 | 403 => SourceError::invalid_request(format!("{message} (check API key)")),
        404 => SourceError::not_found(message),
        408 => SourceError::timeout(message),
        429 => SourceError::rate_limited(message),
        400..=499 => SourceError::invalid_request(message),
        _ => SourceError::unavailable(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_localized_numbers() {
        assert_eq!(parse_number(&serde_json::json!("1,234,500")), Some(1_234_500.0));
        assert_eq!(parse_number(&serde_json::json!(71.5)), Some(71.5));
        assert_eq!(parse_number(&serde_json::json!("-")), None);
        assert_eq!(parse_number(&serde_json::json!("")), None);
    }

    #[test]
    fn synthetic_series_is_deterministic_and_skips_weekends() {
        let ticker = Ticker::parse("005930").expect("ticker");
        let start = TradingDate::parse("2024-01-01").expect("date");
        let end = TradingDate::parse("2024-01-31").expect("date");

        let first = synthetic_series(&ticker, start, end, 70_000.0).expect("series");
        let second = synthetic_series(&ticker, start, end, 70_000.0).expect("series");

        assert_eq!(first, second);
        assert_eq!(first.len(), 23);
    }

    #[test]
    fn status_codes_map_to_error_kinds() {
        let err = status_error(ProviderId::Yahoo, &HttpResponse::with_status(429, ""));
        assert_eq!(err.code(), "source.rate_limited");
        let err = status_error(ProviderId::Yahoo, &HttpResponse::with_status(503, ""));
        assert!(err.retryable());
    }
}
