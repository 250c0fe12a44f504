//! Ticker universe construction.
//!
//! | Region | Builder | Source of tickers |
//! |--------|---------|-------------------|
//! | Korea | [`MarketCapUniverse`] | top N of the KOSPI ∪ KOSDAQ market-cap ranking |
//! | United States | [`CuratedUniverse`] | user-edited list validated against the global provider |
//!
//! Both hand the pipeline a [`TickerUniverse`], an immutable snapshot with an
//! id; nothing here keeps session state between runs.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    Market, MarketCapSource, SourceError, SymbolLookup, Ticker, TradingDate, ValidationError,
};

/// Calendar days of history fetched per Korean ticker (252 trading days plus margin).
pub const KOREA_LOOKBACK_DAYS: i64 = 352;
/// Calendar days of history fetched per U.S. ticker.
pub const US_LOOKBACK_DAYS: i64 = 150;
pub const DEFAULT_TOP_N: usize = 50;

pub const DEFAULT_US_TICKERS: [&str; 17] = [
    "MSFT", "GOOG", "META", "AMZN", "AAPL", "TSLA", "NVDA", "AVGO", "ORCL", "PLTR", "IONQ",
    "RKLB", "TEM", "HIMS", "CRDO", "CLS", "MSTY",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Korea,
    UnitedStates,
}

impl Region {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Korea => "kr",
            Self::UnitedStates => "us",
        }
    }

    pub const fn default_lookback_days(self) -> i64 {
        match self {
            Self::Korea => KOREA_LOOKBACK_DAYS,
            Self::UnitedStates => US_LOOKBACK_DAYS,
        }
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "kr" | "korea" | "krx" => Ok(Self::Korea),
            "us" | "usa" | "united_states" => Ok(Self::UnitedStates),
            other => Err(ValidationError::InvalidConfig {
                key: "region",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UniverseError {
    /// No sub-market snapshot could be fetched; the pass cannot run.
    #[error("market-cap snapshot for {date} unavailable: {}", .failures.join("; "))]
    SnapshotUnavailable {
        date: TradingDate,
        failures: Vec<String>,
    },
    #[error("ticker {ticker} rejected: {reason}")]
    Rejected { ticker: Ticker, reason: String },
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniverseMember {
    pub ticker: Ticker,
    pub name: String,
    pub market: Option<Market>,
    pub market_cap: Option<f64>,
}

/// Snapshot of tickers for one analysis pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerUniverse {
    pub snapshot_id: String,
    pub region: Region,
    pub members: Vec<UniverseMember>,
    /// Non-fatal problems met while building (partial snapshots, name fallbacks).
    pub warnings: Vec<String>,
}

impl TickerUniverse {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn tickers(&self) -> Vec<Ticker> {
        self.members.iter().map(|member| member.ticker.clone()).collect()
    }

    pub fn member(&self, ticker: &Ticker) -> Option<&UniverseMember> {
        self.members.iter().find(|member| &member.ticker == ticker)
    }
}

/// Top-N by market cap across every Korean sub-market.
pub struct MarketCapUniverse {
    source: Arc<dyn MarketCapSource>,
    top_n: usize,
    markets: Vec<Market>,
}

impl MarketCapUniverse {
    pub fn new(source: Arc<dyn MarketCapSource>, top_n: usize) -> Self {
        Self {
            source,
            top_n,
            markets: Market::ALL.to_vec(),
        }
    }

    pub fn with_markets(mut self, markets: Vec<Market>) -> Self {
        self.markets = markets;
        self
    }

    /// Ranks the union of sub-market snapshots by cap (desc), then ticker (asc).
    ///
    /// # Errors
    ///
    /// [`UniverseError::Validation`] when no market is configured, and
    /// [`UniverseError::SnapshotUnavailable`] when every sub-market fails. A
    /// single failing sub-market only adds a warning.
    pub async fn build(&self, date: TradingDate) -> Result<TickerUniverse, UniverseError> {
        if self.markets.is_empty() {
            return Err(ValidationError::NoMarkets.into());
        }

        let mut warnings = Vec::new();
        let mut failures = Vec::new();
        let mut by_ticker: HashMap<Ticker, (Market, f64, Option<String>)> = HashMap::new();

        for &market in &self.markets {
            match self.source.market_caps(date, market).await {
                Ok(snapshot) => {
                    debug!(%market, entries = snapshot.entries.len(), "market-cap snapshot");
                    for entry in snapshot.entries {
                        if !entry.market_cap.is_finite() || entry.market_cap <= 0.0 {
                            continue;
                        }
                        let keep = by_ticker
                            .get(&entry.ticker)
                            .map_or(true, |(_, cap, _)| entry.market_cap > *cap);
                        if keep {
                            by_ticker.insert(
                                entry.ticker,
                                (entry.market, entry.market_cap, entry.name),
                            );
                        }
                    }
                }
                Err(error) => {
                    warn!(%market, code = error.code(), %error, "market-cap snapshot failed");
                    failures.push(format!("{market}: {error}"));
                }
            }
        }

        if failures.len() == self.markets.len() {
            return Err(UniverseError::SnapshotUnavailable { date, failures });
        }
        warnings.extend(failures);

        let mut ranked: Vec<_> = by_ticker.into_iter().collect();
        ranked.sort_by(|(a_ticker, (_, a_cap, _)), (b_ticker, (_, b_cap, _))| {
            b_cap.total_cmp(a_cap).then_with(|| a_ticker.cmp(b_ticker))
        });
        ranked.truncate(self.top_n);

        let mut members = Vec::with_capacity(ranked.len());
        for (ticker, (market, market_cap, name)) in ranked {
            let name = match name.filter(|name| !name.trim().is_empty()) {
                Some(name) => name,
                None => self.resolve_name(&ticker, &mut warnings).await,
            };
            members.push(UniverseMember {
                ticker,
                name,
                market: Some(market),
                market_cap: Some(market_cap),
            });
        }

        Ok(TickerUniverse {
            snapshot_id: format!("kr-{}-top{}", date.format_compact(), self.top_n),
            region: Region::Korea,
            members,
            warnings,
        })
    }

    async fn resolve_name(&self, ticker: &Ticker, warnings: &mut Vec<String>) -> String {
        match self.source.ticker_name(ticker.clone()).await {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) => fallback_name(ticker),
            Err(error) => {
                warn!(ticker = %ticker, %error, "name lookup failed, using fallback label");
                warnings.push(format!("{ticker}: name lookup failed ({})", error.code()));
                fallback_name(ticker)
            }
        }
    }
}

pub fn fallback_name(ticker: &Ticker) -> String {
    format!("Unknown-{ticker}")
}

/// Outcome of [`CuratedUniverse::add`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added { name: String },
    AlreadyPresent,
}

/// Outcome of [`CuratedUniverse::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotPresent,
}

/// User-edited U.S. ticker list.
pub struct CuratedUniverse {
    lookup: Arc<dyn SymbolLookup>,
    defaults: Vec<Ticker>,
    members: Vec<(Ticker, Option<String>)>,
}

impl CuratedUniverse {
    pub fn new(lookup: Arc<dyn SymbolLookup>, defaults: Vec<Ticker>) -> Self {
        let mut universe = Self {
            lookup,
            defaults,
            members: Vec::new(),
        };
        universe.reset();
        universe
    }

    /// Seeded with [`DEFAULT_US_TICKERS`].
    pub fn with_default_list(lookup: Arc<dyn SymbolLookup>) -> Result<Self, ValidationError> {
        let defaults = DEFAULT_US_TICKERS
            .iter()
            .map(|symbol| Ticker::parse(symbol))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(lookup, defaults))
    }

    pub fn tickers(&self) -> Vec<Ticker> {
        self.members.iter().map(|(ticker, _)| ticker.clone()).collect()
    }

    pub fn contains(&self, ticker: &Ticker) -> bool {
        self.members.iter().any(|(member, _)| member == ticker)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Validates `symbol` against the provider and appends it.
    ///
    /// Adding a ticker already in the list is a silent no-op and performs no
    /// lookup.
    ///
    /// # Errors
    ///
    /// [`UniverseError::Validation`] for a malformed symbol,
    /// [`UniverseError::Rejected`] when the provider does not know it.
    pub async fn add(&mut self, symbol: &str) -> Result<AddOutcome, UniverseError> {
        let ticker = Ticker::parse(symbol)?;
        if self.contains(&ticker) {
            return Ok(AddOutcome::AlreadyPresent);
        }

        let profile = self
            .lookup
            .lookup(ticker.clone())
            .await
            .map_err(|error: SourceError| UniverseError::Rejected {
                ticker: ticker.clone(),
                reason: error.to_string(),
            })?;

        if !profile.is_identified() {
            return Err(UniverseError::Rejected {
                ticker,
                reason: String::from("provider returned no identifying fields"),
            });
        }

        let name = profile
            .name
            .clone()
            .unwrap_or_else(|| ticker.as_str().to_owned());
        self.members.push((ticker, Some(name.clone())));
        Ok(AddOutcome::Added { name })
    }

    /// Removing an absent ticker only logs a warning.
    pub fn remove(&mut self, symbol: &str) -> Result<RemoveOutcome, UniverseError> {
        let ticker = Ticker::parse(symbol)?;
        let before = self.members.len();
        self.members.retain(|(member, _)| member != &ticker);

        if self.members.len() == before {
            warn!(ticker = %ticker, "remove ignored, ticker not in universe");
            Ok(RemoveOutcome::NotPresent)
        } else {
            Ok(RemoveOutcome::Removed)
        }
    }

    pub fn reset(&mut self) {
        self.members = self
            .defaults
            .iter()
            .map(|ticker| (ticker.clone(), None))
            .collect();
    }

    pub fn to_universe(&self) -> TickerUniverse {
        let members = self
            .members
            .iter()
            .map(|(ticker, name)| UniverseMember {
                ticker: ticker.clone(),
                name: name.clone().unwrap_or_else(|| ticker.as_str().to_owned()),
                market: None,
                market_cap: None,
            })
            .collect();

        TickerUniverse {
            snapshot_id: format!("us-curated-{}", self.members.len()),
            region: Region::UnitedStates,
            members,
            warnings: Vec::new(),
        }
    }
}
