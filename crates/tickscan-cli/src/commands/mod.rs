mod analyze;
mod chart;
mod scan;
mod sentiment;
mod universe;

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tickscan_core::{
    AlternativeMeAdapter, EngineConfig, Envelope, EnvelopeError, HttpClient, IndicatorEngine,
    KrxAdapter, NoopHttpClient, PipelineConfig, ProviderId, ProviderPolicy, ReqwestHttpClient,
    RequestThrottle, ScanConfig, ScanPipeline, TradingDate, YahooAdapter,
};
use tickscan_core::{PriceHistorySource, Region};

use crate::cli::{Cli, Command};
use crate::error::CliError;
use crate::metadata::Metadata;

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<EnvelopeError>,
    pub source_chain: Vec<ProviderId>,
    /// The command analysed nothing.
    pub empty: bool,
}

impl CommandResult {
    pub fn ok(data: Value, source_chain: Vec<ProviderId>) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
            source_chain,
            empty: false,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<EnvelopeError>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn with_empty(mut self, empty: bool) -> Self {
        self.empty = empty;
        self
    }
}

/// Adapters and settings shared by every command of one invocation.
pub struct Context {
    pub config: ScanConfig,
    pub krx: Arc<KrxAdapter>,
    pub yahoo: Arc<YahooAdapter>,
    pub fear_greed: Arc<AlternativeMeAdapter>,
}

impl Context {
    pub fn new(cli: &Cli) -> Result<Self, CliError> {
        let mut config = ScanConfig::from_env()?;
        if let Some(concurrency) = cli.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(timeout_ms) = cli.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
        config.validate()?;

        let http_client: Arc<dyn HttpClient> = if cli.mock {
            Arc::new(NoopHttpClient)
        } else {
            Arc::new(ReqwestHttpClient::new())
        };

        // One bucket per upstream, capped at the configured rate.
        let krx = KrxAdapter::with_http_client(http_client.clone(), config.krx_api_key.clone())
            .with_timeout_ms(config.timeout_ms)
            .with_throttle(throttle_for(&ProviderPolicy::krx_default(), &config));
        let yahoo = YahooAdapter::with_http_client(http_client.clone())
            .with_timeout_ms(config.timeout_ms)
            .with_throttle(throttle_for(&ProviderPolicy::yahoo_default(), &config));
        let fear_greed =
            AlternativeMeAdapter::with_http_client(http_client).with_timeout_ms(config.timeout_ms);

        Ok(Self {
            config,
            krx: Arc::new(krx),
            yahoo: Arc::new(yahoo),
            fear_greed: Arc::new(fear_greed),
        })
    }

    pub fn history_for(&self, region: Region) -> Arc<dyn PriceHistorySource> {
        let source: Arc<dyn PriceHistorySource> = match region {
            Region::Korea => self.krx.clone(),
            Region::UnitedStates => self.yahoo.clone(),
        };
        source
    }

    pub fn pipeline(
        &self,
        region: Region,
        engine: EngineConfig,
        end_date: TradingDate,
    ) -> ScanPipeline {
        let policy = match region {
            Region::Korea => ProviderPolicy::krx_default(),
            Region::UnitedStates => ProviderPolicy::yahoo_default(),
        };
        let config = PipelineConfig::new(end_date, self.config.lookback_for(region))
            .with_concurrency(self.config.concurrency)
            .with_ticker_deadline(ticker_deadline(&policy, self.config.timeout_ms));

        ScanPipeline::new(
            self.history_for(region),
            Arc::new(IndicatorEngine::new(engine)),
            config,
        )
    }
}

/// The provider quota, lowered to `requests_per_second` when that is stricter.
fn throttle_for(policy: &ProviderPolicy, config: &ScanConfig) -> RequestThrottle {
    let quota = RequestThrottle::from_policy(policy);
    if config.requests_per_second < quota.rate() {
        RequestThrottle::per_second(config.requests_per_second)
    } else {
        quota
    }
}

/// Room for every retry attempt at `timeout_ms` each, plus the longest backoffs.
fn ticker_deadline(policy: &ProviderPolicy, timeout_ms: u64) -> Duration {
    let backoff = &policy.retry_backoff;
    let attempts = u64::from(backoff.max_retries) + 1;
    Duration::from_millis(timeout_ms.saturating_mul(attempts))
        .saturating_add(backoff.max_delay.saturating_mul(backoff.max_retries))
}

/// Command output wrapped in an envelope, and whether it analysed nothing.
pub async fn run(cli: &Cli) -> Result<(Envelope<Value>, bool), CliError> {
    let started = Instant::now();
    let context = Context::new(cli)?;

    let command_result = match &cli.command {
        Command::Scan(args) => scan::run(args, &context).await?,
        Command::Analyze(args) => analyze::run(args, &context).await?,
        Command::Chart(args) => chart::run(args, &context).await?,
        Command::Sentiment => sentiment::run(&context).await?,
        Command::Universe(args) => universe::run(args, &context).await?,
    };

    let CommandResult {
        data,
        warnings,
        errors,
        source_chain,
        empty,
    } = command_result;

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let mut metadata = Metadata::new(source_chain, latency_ms)?;
    for warning in warnings {
        metadata.push_warning(warning);
    }
    let meta = metadata.into_envelope_meta()?;

    let envelope = Envelope::with_errors(meta, data, errors)?;
    Ok((envelope, empty))
}

/// `--date` or today.
pub fn resolve_date(raw: Option<&str>) -> Result<TradingDate, CliError> {
    match raw {
        Some(raw) => Ok(TradingDate::parse(raw)?),
        None => Ok(TradingDate::today()),
    }
}
