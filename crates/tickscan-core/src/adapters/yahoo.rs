use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::{ensure_min_bars, status_error, synthetic_series, ticker_seed, transport_error};
use crate::data_source::SourceFuture;
use crate::provider_policy::ProviderPolicy;
use crate::{
    CircuitBreaker, HistoryRequest, HttpClient, HttpRequest, InstrumentProfile, NoopHttpClient,
    Period, PriceBar, PriceHistorySource, PriceSeries, ProviderId, RequestThrottle, RetryPolicy,
    SourceError, SymbolLookup, Ticker, TradingDate,
};

const DEFAULT_CHART_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const SECONDS_PER_DAY: i64 = 86_400;

/// Global market-data adapter over the Yahoo chart endpoint.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    chart_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    throttle: RequestThrottle,
    timeout_ms: u64,
    use_real_api: bool,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            chart_url: String::from(DEFAULT_CHART_URL),
            circuit_breaker: Arc::new(CircuitBreaker::for_provider(ProviderId::Yahoo)),
            retry: RetryPolicy::from_backoff(&ProviderPolicy::yahoo_default().retry_backoff),
            throttle: RequestThrottle::from_policy(&ProviderPolicy::yahoo_default()),
            timeout_ms: 10_000,
            use_real_api: false,
        }
    }
}

impl YahooAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            use_real_api,
            ..Self::default()
        }
    }

    pub fn with_chart_url(mut self, chart_url: impl Into<String>) -> Self {
        self.chart_url = chart_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_throttle(mut self, throttle: RequestThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn is_mock(&self) -> bool {
        !self.use_real_api
    }

    async fn fetch_chart(
        &self,
        ticker: &Ticker,
        window: ChartWindow,
    ) -> Result<ChartResult, SourceError> {
        self.circuit_breaker.check()?;
        let outcome = self
            .retry
            .run(|| self.fetch_chart_once(ticker, &window))
            .await;
        self.circuit_breaker.record(&outcome);
        outcome
    }

    async fn fetch_chart_once(
        &self,
        ticker: &Ticker,
        window: &ChartWindow,
    ) -> Result<ChartResult, SourceError> {
        let mut request = HttpRequest::get(format!(
            "{}/{}",
            self.chart_url,
            urlencoding::encode(ticker.as_str())
        ))
        .with_header("referer", "https://finance.yahoo.com/")
        .with_timeout_ms(self.timeout_ms);

        request = match window {
            ChartWindow::Range { start, end } => request
                .with_query("period1", start.unix_seconds().to_string())
                .with_query("period2", (end.unix_seconds() + SECONDS_PER_DAY).to_string()),
            ChartWindow::Period(period) => request.with_query("range", period.as_str()),
        }
        .with_query("interval", "1d")
        .with_query("includePrePost", "false");

        self.throttle.until_ready().await;
        debug!(ticker = %ticker, "yahoo chart request");
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| transport_error(ProviderId::Yahoo, e))?;

        // Unknown symbols come back as 404 with a chart error body.
        if !response.is_success() && response.status != 404 {
            return Err(status_error(ProviderId::Yahoo, &response));
        }

        let parsed: ChartResponse = serde_json::from_str(&response.body).map_err(|e| {
            if response.status == 404 {
                SourceError::not_found(format!("yahoo has no chart for {ticker}"))
            } else {
                SourceError::internal(format!("failed to parse yahoo chart: {e}"))
            }
        })?;

        if let Some(error) = parsed.chart.error {
            let message = format!("yahoo chart error for {ticker}: {}", error.description());
            return Err(if error.is_not_found() || response.status == 404 {
                SourceError::not_found(message)
            } else {
                SourceError::unavailable(message)
            });
        }

        parsed
            .chart
            .result
            .and_then(|mut results| (!results.is_empty()).then(|| results.remove(0)))
            .ok_or_else(|| SourceError::not_found(format!("yahoo returned no chart for {ticker}")))
    }

    fn mock_series(
        ticker: &Ticker,
        start: TradingDate,
        end: TradingDate,
    ) -> Result<PriceSeries, SourceError> {
        let base = if ticker.is_index() {
            15.0 + (ticker_seed(ticker) % 40) as f64 * 100.0
        } else {
            20.0 + (ticker_seed(ticker) % 480) as f64
        };
        synthetic_series(ticker, start, end, base)
    }
}

impl PriceHistorySource for YahooAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Yahoo
    }

    fn fetch_ohlcv<'a>(&'a self, req: HistoryRequest) -> SourceFuture<'a, PriceSeries> {
        Box::pin(async move {
            let series = if self.use_real_api {
                let chart = self
                    .fetch_chart(
                        &req.ticker,
                        ChartWindow::Range {
                            start: req.start,
                            end: req.end,
                        },
                    )
                    .await?;
                let mut series = chart.into_series(&req.ticker);
                series.retain_range(req.start, req.end);
                series
            } else {
                Self::mock_series(&req.ticker, req.start, req.end)?
            };
            ensure_min_bars(series)
        })
    }

    fn quote_history<'a>(
        &'a self,
        ticker: Ticker,
        period: Period,
    ) -> SourceFuture<'a, PriceSeries> {
        Box::pin(async move {
            if self.use_real_api {
                let chart = self.fetch_chart(&ticker, ChartWindow::Period(period)).await?;
                Ok(chart.into_series(&ticker))
            } else {
                let today = TradingDate::today();
                let start = today.minus_days(period.calendar_days(today));
                Self::mock_series(&ticker, start, today)
            }
        })
    }
}

impl SymbolLookup for YahooAdapter {
    fn lookup<'a>(&'a self, ticker: Ticker) -> SourceFuture<'a, InstrumentProfile> {
        Box::pin(async move {
            if !self.use_real_api {
                return Ok(InstrumentProfile {
                    name: Some(format!("Sample {ticker}")),
                    exchange: Some(String::from("MOCK")),
                    instrument_type: Some(String::from("EQUITY")),
                    currency: Some(String::from("USD")),
                    ticker,
                });
            }

            let period = Period::parse("5d")?;
            let chart = self.fetch_chart(&ticker, ChartWindow::Period(period)).await?;
            let meta = chart.meta.unwrap_or_default();
            Ok(InstrumentProfile {
                name: meta.long_name.or(meta.short_name),
                exchange: meta.exchange_name,
                instrument_type: meta.instrument_type,
                currency: meta.currency,
                ticker,
            })
        })
    }
}

enum ChartWindow {
    Range { start: TradingDate, end: TradingDate },
    Period(Period),
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl ChartError {
    fn is_not_found(&self) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| code.eq_ignore_ascii_case("not found"))
    }

    fn description(&self) -> &str {
        self.description
            .as_deref()
            .or(self.code.as_deref())
            .unwrap_or("unknown error")
    }
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    exchange_name: Option<String>,
    #[serde(default)]
    instrument_type: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

impl ChartResult {
    /// Bars with any missing OHLC value are dropped. Timestamps are shifted by
    /// the exchange offset so each bar lands on its local trading date.
    fn into_series(self, ticker: &Ticker) -> PriceSeries {
        let offset = self.meta.as_ref().map(|meta| meta.gmtoffset).unwrap_or(0);
        let quote = self.indicators.quote.into_iter().next().unwrap_or_default();

        let bars = self
            .timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                let date = time::OffsetDateTime::from_unix_timestamp(ts + offset).ok()?.date();
                let bar = PriceBar::new(
                    TradingDate::new(date),
                    quote.open.get(i).copied().flatten()?,
                    quote.high.get(i).copied().flatten()?,
                    quote.low.get(i).copied().flatten()?,
                    quote.close.get(i).copied().flatten()?,
                    quote.volume.get(i).copied().flatten(),
                );
                match bar {
                    Ok(bar) => Some(bar),
                    Err(error) => {
                        debug!(ticker = %ticker, %error, "dropping invalid yahoo bar");
                        None
                    }
                }
            })
            .collect();

        PriceSeries::from_unordered(ticker.clone(), bars)
    }
}
