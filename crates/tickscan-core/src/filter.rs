//! Threshold filters over indicator results.
//!
//! Predicates read the raw `f64` fields only. A value that is unavailable
//! never satisfies a predicate.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::analysis::IndicatorResult;
use crate::indicators::stochastic::OVERSOLD;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterPredicate {
    RsiBelow { threshold: f64 },
    PercentBBelow { threshold: f64 },
    /// Current band width below its 52-week average.
    BandWidthBelowAverage,
    PriceBelowMa20,
    AllStochOversold { threshold: f64 },
}

impl FilterPredicate {
    pub const DEFAULT_RSI: f64 = 40.0;
    pub const DEFAULT_PERCENT_B: f64 = 0.5;

    pub fn all_stoch_oversold() -> Self {
        Self::AllStochOversold {
            threshold: OVERSOLD,
        }
    }

    pub fn matches(&self, result: &IndicatorResult) -> bool {
        match *self {
            Self::RsiBelow { threshold } => result.rsi.is_some_and(|rsi| rsi < threshold),
            Self::PercentBBelow { threshold } => {
                result.percent_b.is_some_and(|value| value < threshold)
            }
            Self::BandWidthBelowAverage => match (result.band_width, result.avg_52w_band_width) {
                (Some(width), Some(average)) => width < average,
                _ => false,
            },
            Self::PriceBelowMa20 => result.price_below_ma20(),
            Self::AllStochOversold { threshold } => result.all_stoch_oversold(threshold),
        }
    }
}

impl Display for FilterPredicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RsiBelow { threshold } => write!(f, "RSI < {threshold}"),
            Self::PercentBBelow { threshold } => write!(f, "%B < {threshold}"),
            Self::BandWidthBelowAverage => f.write_str("band width < 52w average"),
            Self::PriceBelowMa20 => f.write_str("price < MA20"),
            Self::AllStochOversold { threshold } => write!(f, "all %K < {threshold}"),
        }
    }
}

/// Conjunction of predicates; no predicates keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultFilter {
    predicates: Vec<FilterPredicate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterReport {
    pub total: usize,
    pub matched: usize,
    pub filter_applied: bool,
}

impl FilterReport {
    /// Results existed but none passed.
    pub fn all_filtered_out(&self) -> bool {
        self.total > 0 && self.matched == 0
    }
}

impl ResultFilter {
    pub fn new(predicates: Vec<FilterPredicate>) -> Self {
        Self { predicates }
    }

    pub fn with(mut self, predicate: FilterPredicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[FilterPredicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, result: &IndicatorResult) -> bool {
        self.predicates
            .iter()
            .all(|predicate| predicate.matches(result))
    }

    /// Keeps items whose indicators pass every predicate, preserving order.
    pub fn apply<T>(&self, items: Vec<T>) -> (Vec<T>, FilterReport)
    where
        T: AsRef<IndicatorResult>,
    {
        let total = items.len();
        let kept: Vec<T> = items
            .into_iter()
            .filter(|item| self.matches(item.as_ref()))
            .collect();

        let report = FilterReport {
            total,
            matched: kept.len(),
            filter_applied: !self.is_empty(),
        };
        (kept, report)
    }
}

impl Display for ResultFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.predicates.is_empty() {
            return f.write_str("none");
        }
        let parts: Vec<String> = self.predicates.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(" AND "))
    }
}
