//! Batch scan: fetch and compute every universe member on a bounded worker pool.
//!
//! Workers share one history source, whose adapter paces every HTTP attempt
//! through its [`RequestThrottle`](crate::RequestThrottle). A ticker that
//! fails is recorded and skipped; the batch itself never fails. Once the
//! cancellation token fires no new fetches start, and members that had not
//! started are reported as cancelled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::analysis::{AnalyzedTicker, IndicatorEngine};
use crate::universe::{TickerUniverse, UniverseMember};
use crate::{HistoryRequest, PriceHistorySource, SourceError, Ticker, TradingDate};

pub const DEFAULT_CONCURRENCY: usize = 6;
/// Budget for one ticker's fetch, retries and backoff included.
pub const DEFAULT_TICKER_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub concurrency: usize,
    /// Wall-clock budget for one ticker's history fetch, including the
    /// adapter's retries. Each HTTP attempt also has its own transport timeout.
    pub ticker_deadline: Duration,
    pub lookback_days: i64,
    pub end_date: TradingDate,
}

impl PipelineConfig {
    pub fn new(end_date: TradingDate, lookback_days: i64) -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            ticker_deadline: DEFAULT_TICKER_DEADLINE,
            lookback_days,
            end_date,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_ticker_deadline(mut self, ticker_deadline: Duration) -> Self {
        self.ticker_deadline = ticker_deadline;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerFailure {
    pub ticker: Ticker,
    pub code: String,
    pub message: String,
    /// Too little history or unknown ticker, as opposed to a provider fault.
    pub skipped: bool,
}

impl TickerFailure {
    fn from_error(ticker: Ticker, error: &SourceError) -> Self {
        Self {
            ticker,
            code: error.code().to_owned(),
            message: error.message().to_owned(),
            skipped: error.is_skip(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Every member produced a result.
    Complete,
    /// Some results, some failures or cancellations.
    Partial,
    /// Members existed but none produced a result.
    AllFailed,
    /// The universe was empty.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Successful results in universe order.
    pub results: Vec<AnalyzedTicker>,
    pub failures: Vec<TickerFailure>,
    pub cancelled: Vec<Ticker>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.results.len() + self.failures.len() + self.cancelled.len()
    }

    pub fn status(&self) -> BatchStatus {
        if self.total() == 0 {
            BatchStatus::Empty
        } else if self.results.is_empty() {
            BatchStatus::AllFailed
        } else if self.failures.is_empty() && self.cancelled.is_empty() {
            BatchStatus::Complete
        } else {
            BatchStatus::Partial
        }
    }

    pub fn skipped_count(&self) -> usize {
        self.failures.iter().filter(|failure| failure.skipped).count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len() - self.skipped_count()
    }

    /// `"<ticker>: <reason>"` lines for payloads.
    pub fn error_lines(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|failure| format!("{}: {}", failure.ticker, failure.message))
            .chain(
                self.cancelled
                    .iter()
                    .map(|ticker| format!("{ticker}: cancelled")),
            )
            .collect()
    }
}

enum Outcome {
    Analyzed(AnalyzedTicker),
    Failed(TickerFailure),
    Cancelled(Ticker),
}

pub struct ScanPipeline {
    history: Arc<dyn PriceHistorySource>,
    engine: Arc<IndicatorEngine>,
    config: PipelineConfig,
}

impl ScanPipeline {
    pub fn new(
        history: Arc<dyn PriceHistorySource>,
        engine: Arc<IndicatorEngine>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            history,
            engine,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self, universe: &TickerUniverse, cancel: &CancellationToken) -> BatchReport {
        let started = Instant::now();

        let mut outcomes: Vec<(usize, Outcome)> = stream::iter(universe.members.iter().enumerate())
            .map(|(index, member)| async move { (index, self.process(member, cancel).await) })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let mut report = BatchReport {
            results: Vec::new(),
            failures: Vec::new(),
            cancelled: Vec::new(),
            elapsed_ms: 0,
        };
        for (_, outcome) in outcomes {
            match outcome {
                Outcome::Analyzed(result) => report.results.push(result),
                Outcome::Failed(failure) => report.failures.push(failure),
                Outcome::Cancelled(ticker) => report.cancelled.push(ticker),
            }
        }
        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            snapshot = %universe.snapshot_id,
            total = report.total(),
            succeeded = report.results.len(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            cancelled = report.cancelled.len(),
            elapsed_ms = report.elapsed_ms,
            "scan finished"
        );
        report
    }

    async fn process(&self, member: &UniverseMember, cancel: &CancellationToken) -> Outcome {
        let ticker = member.ticker.clone();
        if cancel.is_cancelled() {
            return Outcome::Cancelled(ticker);
        }

        let request = HistoryRequest::lookback(
            ticker.clone(),
            self.config.end_date,
            self.config.lookback_days,
        );
        debug!(ticker = %ticker, start = %request.start, end = %request.end, "fetching history");

        let fetched = tokio::time::timeout(
            self.config.ticker_deadline,
            self.history.fetch_ohlcv(request),
        )
        .await
        .unwrap_or_else(|_| {
            Err(SourceError::timeout(format!(
                "{ticker} history fetch exceeded its {} ms deadline",
                self.config.ticker_deadline.as_millis()
            )))
        });

        let outcome = fetched.and_then(|series| {
            self.engine
                .compute(&series)
                .map_err(SourceError::from)
        });

        match outcome {
            Ok(indicators) => Outcome::Analyzed(AnalyzedTicker {
                ticker,
                name: member.name.clone(),
                market_cap: member.market_cap,
                indicators,
            }),
            Err(error) => {
                warn!(ticker = %ticker, code = error.code(), %error, "ticker skipped");
                Outcome::Failed(TickerFailure::from_error(ticker, &error))
            }
        }
    }
}
