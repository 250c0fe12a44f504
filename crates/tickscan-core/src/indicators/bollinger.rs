//! Bollinger Bands, %B and relative band width.

use serde::{Deserialize, Serialize};

use super::{rolling_sample_std, sma};
use crate::ValidationError;

/// Trading days in the band-width baseline.
pub const BASELINE_BARS: usize = 252;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerConfig {
    pub window: usize,
    pub num_std: f64,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self {
            window: 20,
            num_std: 2.0,
        }
    }
}

impl BollingerConfig {
    pub fn new(window: usize, num_std: f64) -> Result<Self, ValidationError> {
        if window < 2 {
            return Err(ValidationError::ZeroWindow {
                name: "bollinger.window",
            });
        }
        if !num_std.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "bollinger.num_std",
            });
        }
        Ok(Self { window, num_std })
    }
}

/// Bands and derived measures on one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandPoint {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
    /// `(close - lower) / (upper - lower)`, 0 when the bands collapse.
    pub percent_b: f64,
    /// `(upper - lower) / middle`.
    pub width: f64,
}

/// Bands aligned with `closes`.
pub fn bollinger_series(closes: &[f64], config: BollingerConfig) -> Vec<Option<BandPoint>> {
    let means = sma(closes, config.window);
    let stds = rolling_sample_std(closes, config.window);

    closes
        .iter()
        .zip(means)
        .zip(stds)
        .map(|((&close, mean), std)| {
            let (middle, std) = (mean?, std?);
            let upper = middle + config.num_std * std;
            let lower = middle - config.num_std * std;
            let spread = upper - lower;

            let collapsed = spread <= f64::EPSILON * middle.abs();
            let percent_b = if collapsed {
                0.0
            } else {
                (close - lower) / spread
            };
            let width = if collapsed || middle == 0.0 {
                0.0
            } else {
                spread / middle
            };

            Some(BandPoint {
                middle,
                upper,
                lower,
                percent_b,
                width,
            })
        })
        .collect()
}

/// Mean band width over the trailing `lookback` bars, ignoring bars where the
/// bands are not yet defined. `None` when no bar in range has bands.
pub fn avg_band_width(points: &[Option<BandPoint>], lookback: usize) -> Option<f64> {
    let start = points.len().saturating_sub(lookback);
    let widths: Vec<f64> = points[start..]
        .iter()
        .filter_map(|point| point.map(|p| p.width))
        .collect();

    if widths.is_empty() {
        None
    } else {
        Some(widths.iter().sum::<f64>() / widths.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_before_window_fills() {
        let closes: Vec<f64> = (1..=25).map(f64::from).collect();
        let out = bollinger_series(&closes, BollingerConfig::default());
        assert!(out[18].is_none());
        assert!(out[19].is_some());
    }

    #[test]
    fn flat_series_collapses_to_zero() {
        let closes = vec![50.0; 30];
        let out = bollinger_series(&closes, BollingerConfig::default());
        let last = out.last().copied().flatten().expect("defined");

        assert_eq!(last.width, 0.0);
        assert_eq!(last.percent_b, 0.0);
        assert!(last.percent_b.is_finite());
    }

    #[test]
    fn close_on_the_middle_band_is_half() {
        let mut closes: Vec<f64> = (0..19).map(|i| if i % 2 == 0 { 99.0 } else { 101.0 }).collect();
        // Appending the mean of the first 19 keeps the 20-bar mean unchanged.
        let mean = closes.iter().sum::<f64>() / 19.0;
        closes.push(mean);
        let point = bollinger_series(&closes, BollingerConfig::default())[19].expect("defined");

        assert!((point.percent_b - 0.5).abs() < 1e-9, "percent_b={}", point.percent_b);
        assert!(point.width > 0.0);
    }

    #[test]
    fn baseline_ignores_undefined_bars() {
        let points = vec![
            None,
            Some(BandPoint {
                middle: 1.0,
                upper: 1.2,
                lower: 0.8,
                percent_b: 0.5,
                width: 0.4,
            }),
            Some(BandPoint {
                middle: 1.0,
                upper: 1.1,
                lower: 0.9,
                percent_b: 0.5,
                width: 0.2,
            }),
        ];
        let avg = avg_band_width(&points, BASELINE_BARS).expect("defined");
        assert!((avg - 0.3).abs() < 1e-12);
        assert_eq!(avg_band_width(&points[..1], BASELINE_BARS), None);
    }

    #[test]
    fn rejects_degenerate_window() {
        assert!(BollingerConfig::new(1, 2.0).is_err());
    }
}
