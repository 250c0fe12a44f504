//! Stochastic oscillator.
//!
//! Raw `%K = 100 * (close - LL) / (HH - LL)` over `k_period`; `%K` is then
//! smoothed by a `smooth_k` rolling mean (1 = no smoothing) and `%D` is the
//! `d_period` rolling mean of the smoothed `%K`. A flat range (`HH == LL`)
//! leaves that bar undefined.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use super::{rolling_max, rolling_mean_opt, rolling_min};
use crate::ValidationError;

/// Oversold threshold used by summaries and filters.
pub const OVERSOLD: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StochasticConfig {
    pub k_period: usize,
    pub d_period: usize,
    pub smooth_k: usize,
}

impl StochasticConfig {
    pub const FAST: Self = Self {
        k_period: 5,
        d_period: 3,
        smooth_k: 3,
    };
    pub const MEDIUM: Self = Self {
        k_period: 10,
        d_period: 6,
        smooth_k: 6,
    };
    pub const SLOW: Self = Self {
        k_period: 20,
        d_period: 12,
        smooth_k: 12,
    };

    /// Named presets computed for every ticker.
    pub const PRESETS: [Self; 3] = [Self::FAST, Self::MEDIUM, Self::SLOW];

    pub fn new(k_period: usize, d_period: usize, smooth_k: usize) -> Result<Self, ValidationError> {
        for (name, value) in [
            ("stochastic.k_period", k_period),
            ("stochastic.d_period", d_period),
            ("stochastic.smooth_k", smooth_k),
        ] {
            if value == 0 {
                return Err(ValidationError::ZeroWindow { name });
            }
        }
        Ok(Self {
            k_period,
            d_period,
            smooth_k,
        })
    }

    /// Key used in payloads, e.g. `stoch_5_3_3`.
    pub fn label(&self) -> String {
        format!("stoch_{}_{}_{}", self.k_period, self.d_period, self.smooth_k)
    }

    /// Bars needed before `%D` is first defined.
    pub const fn warmup(&self) -> usize {
        self.k_period + self.smooth_k + self.d_period - 2
    }
}

impl Display for StochasticConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Smoothed `%K` and `%D` aligned with the input bars.
#[derive(Debug, Clone, PartialEq)]
pub struct StochasticSeries {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

impl StochasticSeries {
    pub fn latest_k(&self) -> Option<f64> {
        super::latest(&self.k)
    }

    pub fn latest_d(&self) -> Option<f64> {
        super::latest(&self.d)
    }
}

pub fn stochastic(
    highs: &[f64],
    lows: &[f64],
    closes: &[f64],
    config: StochasticConfig,
) -> StochasticSeries {
    let lowest = rolling_min(lows, config.k_period);
    let highest = rolling_max(highs, config.k_period);

    let raw_k: Vec<Option<f64>> = closes
        .iter()
        .zip(lowest)
        .zip(highest)
        .map(|((&close, low), high)| {
            let (low, high) = (low?, high?);
            let range = high - low;
            if range <= 0.0 {
                None
            } else {
                Some(100.0 * (close - low) / range)
            }
        })
        .collect();

    let k = if config.smooth_k > 1 {
        rolling_mean_opt(&raw_k, config.smooth_k)
    } else {
        raw_k
    };
    let d = rolling_mean_opt(&k, config.d_period);

    StochasticSeries { k, d }
}
