//! # Indicator Engine
//!
//! Pure functions over closing (and high/low) prices. Every series function
//! returns a vector aligned index-for-index with its input, holding `None`
//! wherever the window is not yet filled or the value is undefined.
//!
//! | Indicator | Function | Defined from index |
//! |-----------|----------|--------------------|
//! | Simple moving average | [`sma`] | `window - 1` |
//! | RSI (Wilder / simple) | [`rsi::rsi_series`] | `period` |
//! | Bollinger Bands | [`bollinger::bollinger_series`] | `window - 1` |
//! | Stochastic %K / %D | [`stochastic::stochastic`] | `k_period + smooth_k + d_period - 3` |
//!
//! Nothing in this module performs I/O, caches, or keeps state between calls.

pub mod bollinger;
pub mod rsi;
pub mod stochastic;

pub use bollinger::{avg_band_width, bollinger_series, BandPoint, BollingerConfig};
pub use rsi::{latest_rsi, rsi_series, RsiMode};
pub use stochastic::{stochastic, StochasticConfig, StochasticSeries};

/// Moving-average windows plotted on charts.
pub const CHART_MA_WINDOWS: [usize; 5] = [5, 20, 50, 120, 200];

/// Simple moving average of `values` over `window`.
pub fn sma(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |slice| {
        Some(slice.iter().sum::<f64>() / slice.len() as f64)
    })
}

/// Rolling mean over an optional series. A window containing `None` is `None`.
pub fn rolling_mean_opt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |slice| {
        let sum = slice.iter().copied().sum::<Option<f64>>()?;
        Some(sum / slice.len() as f64)
    })
}

/// Rolling sample standard deviation (n - 1 denominator).
pub fn rolling_sample_std(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, sample_std)
}

pub fn rolling_min(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |slice| slice.iter().copied().reduce(f64::min))
}

pub fn rolling_max(values: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |slice| slice.iter().copied().reduce(f64::max))
}

/// Latest element of an aligned series, if defined.
pub fn latest(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

fn sample_std(slice: &[f64]) -> Option<f64> {
    if slice.len() < 2 {
        return None;
    }
    let n = slice.len() as f64;
    let mean = slice.iter().sum::<f64>() / n;
    let variance = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

fn rolling<T, F>(values: &[T], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[T]) -> Option<f64>,
{
    if window == 0 {
        return vec![None; values.len()];
    }
    (0..values.len())
        .map(|end| {
            if end + 1 < window {
                None
            } else {
                f(&values[end + 1 - window..=end])
            }
        })
        .collect()
}
