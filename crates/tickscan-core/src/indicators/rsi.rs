//! Relative Strength Index.
//!
//! Both modes work on per-bar gains `max(Δclose, 0)` and losses
//! `max(-Δclose, 0)` and report `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`.
//!
//! - [`RsiMode::Wilder`] seeds the averages with the mean of the first
//!   `period` deltas, then folds `avg = (prev * (period - 1) + x) / period`
//!   over the rest of the series.
//! - [`RsiMode::Simple`] takes a plain rolling mean of the last `period`
//!   gains and losses at every bar.
//!
//! An average loss of zero reports 100, including a perfectly flat window.

use std::fmt::{Display, Formatter};
use std::iter;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::sma;
use crate::ValidationError;

pub const RSI_PERIOD: usize = 14;

/// Averaging method for gains and losses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsiMode {
    #[default]
    Wilder,
    Simple,
}

impl RsiMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wilder => "wilder",
            Self::Simple => "simple",
        }
    }
}

impl Display for RsiMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RsiMode {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wilder" => Ok(Self::Wilder),
            "simple" => Ok(Self::Simple),
            other => Err(ValidationError::InvalidConfig {
                key: "rsi_mode",
                value: other.to_owned(),
            }),
        }
    }
}

/// RSI aligned with `closes`; the first `period` entries are `None`.
pub fn rsi_series(closes: &[f64], period: usize, mode: RsiMode) -> Vec<Option<f64>> {
    if period == 0 || closes.len() <= period {
        return vec![None; closes.len()];
    }

    let (gains, losses): (Vec<f64>, Vec<f64>) = closes
        .windows(2)
        .map(|pair| {
            let delta = pair[1] - pair[0];
            (delta.max(0.0), (-delta).max(0.0))
        })
        .unzip();

    match mode {
        RsiMode::Wilder => wilder(&gains, &losses, period),
        RsiMode::Simple => simple(&gains, &losses, period),
    }
}

/// RSI on the last bar, if defined.
pub fn latest_rsi(closes: &[f64], period: usize, mode: RsiMode) -> Option<f64> {
    rsi_series(closes, period, mode).last().copied().flatten()
}

fn wilder(gains: &[f64], losses: &[f64], period: usize) -> Vec<Option<f64>> {
    let p = period as f64;
    let seed = (
        gains[..period].iter().sum::<f64>() / p,
        losses[..period].iter().sum::<f64>() / p,
    );

    let smoothed = gains[period..]
        .iter()
        .zip(&losses[period..])
        .scan(seed, |(avg_gain, avg_loss), (&gain, &loss)| {
            *avg_gain = (*avg_gain * (p - 1.0) + gain) / p;
            *avg_loss = (*avg_loss * (p - 1.0) + loss) / p;
            Some((*avg_gain, *avg_loss))
        });

    iter::repeat(None)
        .take(period)
        .chain(iter::once(seed).chain(smoothed).map(|(g, l)| Some(from_averages(g, l))))
        .collect()
}

fn simple(gains: &[f64], losses: &[f64], period: usize) -> Vec<Option<f64>> {
    let avg_gains = sma(gains, period);
    let avg_losses = sma(losses, period);

    // Deltas start at bar 1, so the first bar has no RSI.
    iter::once(None)
        .chain(
            avg_gains
                .into_iter()
                .zip(avg_losses)
                .map(|(g, l)| Some(from_averages(g?, l?))),
        )
        .collect()
}

fn from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(len: usize, step: f64) -> Vec<f64> {
        (0..len).map(|i| 100.0 + step * i as f64).collect()
    }

    #[test]
    fn first_value_lands_on_index_period_in_both_modes() {
        let closes = ramp(20, 1.0);
        for mode in [RsiMode::Wilder, RsiMode::Simple] {
            let out = rsi_series(&closes, RSI_PERIOD, mode);
            assert_eq!(out.len(), closes.len());
            assert!(out[RSI_PERIOD - 1].is_none(), "mode={mode}");
            assert!(out[RSI_PERIOD].is_some(), "mode={mode}");
        }
    }

    #[test]
    fn too_short_series_is_all_undefined() {
        let out = rsi_series(&ramp(14, 1.0), RSI_PERIOD, RsiMode::Wilder);
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn modes_diverge_after_the_seed() {
        let closes = [
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            45.61, 46.28, 46.28, 46.00, 46.03, 46.41, 46.22, 45.64,
        ];
        let wilder = rsi_series(&closes, RSI_PERIOD, RsiMode::Wilder);
        let simple = rsi_series(&closes, RSI_PERIOD, RsiMode::Simple);

        assert_eq!(wilder[RSI_PERIOD], simple[RSI_PERIOD]);
        let w = wilder[19].expect("defined");
        let s = simple[19].expect("defined");
        assert!((w - s).abs() > 1e-6);
        assert!((0.0..=100.0).contains(&w));
    }

    #[test]
    fn wilder_matches_reference_value() {
        let closes = [
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            45.61, 46.28, 46.28,
        ];
        let rsi = latest_rsi(&closes, RSI_PERIOD, RsiMode::Wilder).expect("defined");
        assert!((rsi - 70.46).abs() < 0.05, "rsi={rsi}");
    }

    #[test]
    fn parses_mode_names() {
        assert_eq!("Simple".parse::<RsiMode>().expect("mode"), RsiMode::Simple);
        assert!("ema".parse::<RsiMode>().is_err());
    }
}
