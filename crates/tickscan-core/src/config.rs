//! Scan configuration with environment overlay.
//!
//! | Variable | Field |
//! |----------|-------|
//! | `TICKSCAN_TOP_N` | `top_n` |
//! | `TICKSCAN_CONCURRENCY` | `concurrency` |
//! | `TICKSCAN_TIMEOUT_MS` | `timeout_ms` |
//! | `TICKSCAN_REQUESTS_PER_SECOND` | `requests_per_second` |
//! | `TICKSCAN_RSI_MODE` | `rsi_mode` (`wilder` or `simple`) |
//! | `TICKSCAN_LOOKBACK_DAYS` | `lookback_days` |
//! | `TICKSCAN_KRX_API_KEY`, then `KRX_API_KEY` | `krx_api_key` |

use std::str::FromStr;

use crate::indicators::RsiMode;
use crate::pipeline::DEFAULT_CONCURRENCY;
use crate::universe::{Region, DEFAULT_TOP_N};
use crate::ValidationError;

#[derive(Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub top_n: usize,
    pub concurrency: usize,
    pub timeout_ms: u64,
    pub requests_per_second: u32,
    pub rsi_mode: RsiMode,
    /// Overrides the per-region default when set.
    pub lookback_days: Option<i64>,
    pub krx_api_key: Option<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            concurrency: DEFAULT_CONCURRENCY,
            timeout_ms: 10_000,
            requests_per_second: 5,
            rsi_mode: RsiMode::Wilder,
            lookback_days: None,
            krx_api_key: None,
        }
    }
}

impl std::fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanConfig")
            .field("top_n", &self.top_n)
            .field("concurrency", &self.concurrency)
            .field("timeout_ms", &self.timeout_ms)
            .field("requests_per_second", &self.requests_per_second)
            .field("rsi_mode", &self.rsi_mode)
            .field("lookback_days", &self.lookback_days)
            .field("krx_api_key", &self.krx_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ScanConfig {
    /// Defaults overlaid with process environment variables.
    pub fn from_env() -> Result<Self, ValidationError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ValidationError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlays values from `lookup`. Blank values are ignored.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("TICKSCAN_TOP_N") {
            self.top_n = parse("top_n", &value)?;
        }
        if let Some(value) = get("TICKSCAN_CONCURRENCY") {
            self.concurrency = parse("concurrency", &value)?;
        }
        if let Some(value) = get("TICKSCAN_TIMEOUT_MS") {
            self.timeout_ms = parse("timeout_ms", &value)?;
        }
        if let Some(value) = get("TICKSCAN_REQUESTS_PER_SECOND") {
            self.requests_per_second = parse("requests_per_second", &value)?;
        }
        if let Some(value) = get("TICKSCAN_RSI_MODE") {
            self.rsi_mode = value.parse()?;
        }
        if let Some(value) = get("TICKSCAN_LOOKBACK_DAYS") {
            self.lookback_days = Some(parse("lookback_days", &value)?);
        }
        if let Some(value) = get("TICKSCAN_KRX_API_KEY").or_else(|| get("KRX_API_KEY")) {
            self.krx_api_key = Some(value.trim().to_owned());
        }

        self.validate()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let positive: [(&'static str, u64); 4] = [
            ("top_n", self.top_n as u64),
            ("concurrency", self.concurrency as u64),
            ("timeout_ms", self.timeout_ms),
            ("requests_per_second", u64::from(self.requests_per_second)),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ValidationError::InvalidConfig {
                    key,
                    value: value.to_string(),
                });
            }
        }
        if let Some(days) = self.lookback_days {
            if days <= 0 {
                return Err(ValidationError::InvalidConfig {
                    key: "lookback_days",
                    value: days.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn lookback_for(&self, region: Region) -> i64 {
        self.lookback_days
            .unwrap_or_else(|| region.default_lookback_days())
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ValidationError> {
    value
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidConfig {
            key,
            value: value.to_owned(),
        })
}
