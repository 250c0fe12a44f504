//! # Tickscan Core
//!
//! Price history adapters, technical indicator engine and screening pipeline
//! for Korean and U.S. equities.
//!
//! ## Overview
//!
//! - **Provider adapters** normalise KRX and Yahoo daily bars into one
//!   ascending [`PriceSeries`] shape, and read the alternative.me fear/greed score
//! - **Indicator engine** computes RSI, Bollinger %B / band width and
//!   stochastic %K/%D as pure functions
//! - **Universe builders** pick the tickers for a pass (market-cap top N or a
//!   curated list)
//! - **Scan pipeline** fetches and computes on a bounded worker pool with a
//!   shared rate limiter, isolating per-ticker failures
//! - **Result filter, payloads and CSV export** hand results to the
//!   presentation layer
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | KRX, Yahoo and alternative.me adapters |
//! | [`analysis`] | Indicator engine and per-ticker results |
//! | [`cache`] | Time-bucketed compute cache with injectable clock |
//! | [`circuit_breaker`] | Circuit breaker for resilient calls |
//! | [`config`] | Scan configuration and environment overlay |
//! | [`data_source`] | Provider traits and request/error types |
//! | [`domain`] | Tickers, dates, bars and series |
//! | [`envelope`] | Response envelope with metadata |
//! | [`error`] | Core error types |
//! | [`export`] | CSV export and re-import |
//! | [`filter`] | Threshold predicates over results |
//! | [`http_client`] | HTTP client abstraction |
//! | [`indicators`] | RSI, Bollinger and stochastic series functions |
//! | [`payload`] | JSON payloads for dashboards |
//! | [`pipeline`] | Concurrent batch scan |
//! | [`provider_policy`] | Per-provider quotas and backoff |
//! | [`retry`] | Retry with backoff for retryable errors |
//! | [`sentiment`] | Market sentiment widgets |
//! | [`source`] | Provider identifiers |
//! | [`throttling`] | Per-provider outbound rate limiter |
//! | [`universe`] | Ticker universe construction |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tickscan_core::{
//!     CuratedUniverse, IndicatorEngine, PipelineConfig, RequestThrottle, ScanPipeline,
//!     TradingDate, YahooAdapter,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let yahoo = Arc::new(YahooAdapter::default().with_throttle(RequestThrottle::per_second(5)));
//!     let universe = CuratedUniverse::with_default_list(yahoo.clone())?.to_universe();
//!
//!     let pipeline = ScanPipeline::new(
//!         yahoo,
//!         Arc::new(IndicatorEngine::default()),
//!         PipelineConfig::new(TradingDate::today(), 150),
//!     );
//!     let report = pipeline.run(&universe, &CancellationToken::new()).await;
//!
//!     for item in &report.results {
//!         println!("{} RSI {:?}", item.ticker, item.indicators.rsi);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │ Universe Builder │     │ Sentiment        │
//! └────────┬─────────┘     │ Aggregator       │
//!          │               └────────┬─────────┘
//!          ▼                        │
//! ┌──────────────────┐     ┌────────┴─────────┐
//! │ Scan Pipeline    │────▶│ Provider Adapter │──▶ HTTP client
//! │ (bounded pool)   │     │ + circuit/retry  │
//! └────────┬─────────┘     └──────────────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Indicator Engine │
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Filter / Payload │
//! │ / CSV export     │
//! └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Provider failures are [`SourceError`]s classified by [`SourceErrorKind`].
//! The pipeline turns them into per-ticker [`TickerFailure`]s instead of
//! failing the batch:
//!
//! ```rust
//! use tickscan_core::{SourceError, SourceErrorKind};
//!
//! fn describe(error: &SourceError) -> &'static str {
//!     match error.kind() {
//!         SourceErrorKind::InsufficientData | SourceErrorKind::NotFound => "skipped",
//!         SourceErrorKind::RateLimited | SourceErrorKind::Timeout => "retry later",
//!         _ => "failed",
//!     }
//! }
//! ```

pub mod adapters;
pub mod analysis;
pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod export;
pub mod filter;
pub mod http_client;
pub mod indicators;
pub mod payload;
pub mod pipeline;
pub mod provider_policy;
pub mod retry;
pub mod sentiment;
pub mod source;
pub mod throttling;
pub mod universe;

// Adapter implementations
pub use adapters::{AlternativeMeAdapter, KrxAdapter, YahooAdapter};

// Indicator engine
pub use analysis::{
    AnalyzedTicker, EngineConfig, IndicatorEngine, IndicatorResult, InsufficientData,
    StochasticReading,
};
pub use indicators::{BollingerConfig, RsiMode, StochasticConfig};

// Caching
pub use cache::{CachedHistorySource, Clock, ComputeCache, ManualClock, SystemClock};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Configuration
pub use config::ScanConfig;

// Provider traits and types
pub use data_source::{
    FearGreedHistory, FearGreedReading, FearGreedSource, HistoryRequest, MarketCapSnapshot,
    MarketCapSource, Period, PriceHistorySource, SourceError, SourceErrorKind, SymbolLookup,
};

// Domain models
pub use domain::{
    InstrumentProfile, Market, MarketCapEntry, PriceBar, PriceSeries, Ticker, TradingDate,
    UtcDateTime, MIN_BARS,
};

// Envelope types
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta, SCHEMA_VERSION};

// Error types
pub use error::{CoreError, ValidationError};

// Presentation
pub use export::{CsvLayout, ExportRow, PriceStyle};
pub use filter::{FilterPredicate, FilterReport, ResultFilter};
pub use payload::{ChartPayload, MultiTickerAnalysis, TickerAnalysis};

// HTTP client types
pub use http_client::{
    FixtureHttpClient, HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse,
    NoopHttpClient, ReqwestHttpClient,
};

// Pipeline
pub use pipeline::{BatchReport, BatchStatus, PipelineConfig, ScanPipeline, TickerFailure};

// Provider policies
pub use provider_policy::{BackoffPolicy, ProviderPolicy};

// Retry logic
pub use retry::{Backoff, RetryPolicy};

// Sentiment
pub use sentiment::{Direction, MarketIndicator, SentimentAggregator, SentimentReport};

// Source identifiers
pub use source::ProviderId;

// Throttling
pub use throttling::RequestThrottle;

// Universe
pub use universe::{CuratedUniverse, MarketCapUniverse, Region, TickerUniverse, UniverseError};
