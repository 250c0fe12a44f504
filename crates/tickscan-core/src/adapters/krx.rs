use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    ensure_min_bars, parse_number, status_error, synthetic_series, ticker_seed, transport_error,
};
use crate::data_source::{first_field, MarketCapSnapshot, SourceFuture};
use crate::provider_policy::ProviderPolicy;
use crate::{
    CircuitBreaker, HistoryRequest, HttpAuth, HttpClient, HttpRequest, Market, MarketCapEntry,
    MarketCapSource, NoopHttpClient, Period, PriceBar, PriceHistorySource, PriceSeries, ProviderId,
    RequestThrottle, RetryPolicy, SourceError, Ticker, TradingDate,
};

const DEFAULT_BASE_URL: &str = "https://data-dbg.krx.co.kr/svc/sample/apis/stk";

type Row = BTreeMap<String, serde_json::Value>;

// Field aliases: Open API codes first, localized labels second.
const DATE: &[&str] = &["TRD_DD", "BAS_DD", "일자", "날짜"];
const OPEN: &[&str] = &["TDD_OPNPRC", "시가"];
const HIGH: &[&str] = &["TDD_HGPRC", "고가"];
const LOW: &[&str] = &["TDD_LWPRC", "저가"];
const CLOSE: &[&str] = &["TDD_CLSPRC", "종가"];
const VOLUME: &[&str] = &["ACC_TRDVOL", "거래량"];
const CODE: &[&str] = &["ISU_SRT_CD", "ISU_CD", "종목코드"];
const NAME: &[&str] = &["ISU_ABBRV", "ISU_NM", "종목명"];
const MARKET_CAP: &[&str] = &["MKTCAP", "시가총액"];

#[derive(Debug, Deserialize)]
struct KrxResponse {
    #[serde(rename = "OutBlock_1", default)]
    out_block: Vec<Row>,
}

/// Korea Exchange Open API adapter (local exchange).
#[derive(Clone)]
pub struct KrxAdapter {
    http_client: Arc<dyn HttpClient>,
    auth: Option<HttpAuth>,
    base_url: String,
    circuit_breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    throttle: RequestThrottle,
    timeout_ms: u64,
    names: Arc<RwLock<HashMap<Ticker, String>>>,
    use_real_api: bool,
}

impl Default for KrxAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            auth: None,
            base_url: String::from(DEFAULT_BASE_URL),
            circuit_breaker: Arc::new(CircuitBreaker::for_provider(ProviderId::Krx)),
            retry: RetryPolicy::from_backoff(&ProviderPolicy::krx_default().retry_backoff),
            throttle: RequestThrottle::from_policy(&ProviderPolicy::krx_default()),
            timeout_ms: 10_000,
            names: Arc::new(RwLock::new(HashMap::new())),
            use_real_api: false,
        }
    }
}

impl KrxAdapter {
    /// Real adapter unless `http_client` is a mock transport. Calls fail with
    /// `InvalidRequest` when no API key is configured.
    pub fn with_http_client(http_client: Arc<dyn HttpClient>, api_key: Option<String>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            auth: api_key
                .filter(|key| !key.trim().is_empty())
                .map(|value| HttpAuth::Header {
                    name: String::from("AUTH_KEY"),
                    value,
                }),
            use_real_api,
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
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

    /// Shares `throttle` with other adapters instead of the KRX quota bucket.
    pub fn with_throttle(mut self, throttle: RequestThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn is_mock(&self) -> bool {
        !self.use_real_api
    }

    async fn get_rows(
        &self,
        api_id: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<Row>, SourceError> {
        let auth = self.auth.as_ref().ok_or_else(|| {
            SourceError::invalid_request(
                "KRX API key is not configured (set TICKSCAN_KRX_API_KEY or KRX_API_KEY, or use mock mode)",
            )
        })?;

        self.circuit_breaker.check()?;
        let outcome = self
            .retry
            .run(|| self.request_once(api_id, query, auth))
            .await;
        self.circuit_breaker.record(&outcome);
        outcome
    }

    async fn request_once(
        &self,
        api_id: &str,
        query: &[(&str, String)],
        auth: &HttpAuth,
    ) -> Result<Vec<Row>, SourceError> {
        let mut request = HttpRequest::get(format!("{}/{}", self.base_url, api_id))
            .with_header("accept", "application/json")
            .with_auth(auth)
            .with_timeout_ms(self.timeout_ms);
        for (name, value) in query {
            request = request.with_query(*name, value.clone());
        }

        self.throttle.until_ready().await;
        debug!(api_id, "krx request");
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| transport_error(ProviderId::Krx, e))?;

        if !response.is_success() {
            return Err(status_error(ProviderId::Krx, &response));
        }

        let parsed: KrxResponse = serde_json::from_str(&response.body)
            .map_err(|e| SourceError::internal(format!("failed to parse krx {api_id}: {e}")))?;
        Ok(parsed.out_block)
    }

    /// Bars inside the requested range, without the minimum-length check.
    async fn fetch_real_series(&self, req: &HistoryRequest) -> Result<PriceSeries, SourceError> {
        let rows = self
            .get_rows(
                "stk_isu_ohlcv",
                &[
                    ("isuCd", req.ticker.to_string()),
                    ("strtDd", req.start.format_compact()),
                    ("endDd", req.end.format_compact()),
                ],
            )
            .await?;

        let bars: Vec<PriceBar> = rows
            .iter()
            .filter_map(|row| match parse_bar(row) {
                Some(bar) => Some(bar),
                None => {
                    debug!(ticker = %req.ticker, "dropping malformed krx row");
                    None
                }
            })
            .filter(|bar| bar.date >= req.start && bar.date <= req.end)
            .collect();

        Ok(PriceSeries::from_unordered(req.ticker.clone(), bars))
    }

    async fn fetch_real_market_caps(
        &self,
        date: TradingDate,
        market: Market,
    ) -> Result<MarketCapSnapshot, SourceError> {
        let api_id = match market {
            Market::Kospi => "stk_bydd_trd",
            Market::Kosdaq => "ksq_bydd_trd",
        };
        let rows = self
            .get_rows(api_id, &[("basDd", date.format_compact())])
            .await?;

        let entries: Vec<MarketCapEntry> = rows
            .iter()
            .filter_map(|row| parse_market_cap(row, market))
            .collect();

        if entries.is_empty() {
            return Err(SourceError::not_found(format!(
                "krx returned no {market} market-cap rows for {date}"
            )));
        }

        let mut names = self.names.write().await;
        for entry in &entries {
            if let Some(name) = &entry.name {
                names.insert(entry.ticker.clone(), name.clone());
            }
        }

        Ok(MarketCapSnapshot {
            market,
            date,
            entries,
        })
    }

    async fn fetch_real_name(&self, ticker: &Ticker) -> Result<String, SourceError> {
        if let Some(name) = self.names.read().await.get(ticker) {
            return Ok(name.clone());
        }

        let today = TradingDate::today().format_compact();
        let mut last_error = None;
        for api_id in ["stk_isu_base_info", "ksq_isu_base_info"] {
            let rows = match self.get_rows(api_id, &[("basDd", today.clone())]).await {
                Ok(rows) => rows,
                Err(error) => {
                    debug!(api_id, %error, "krx name lookup failed, trying next market");
                    last_error = Some(error);
                    continue;
                }
            };
            let mut names = self.names.write().await;
            for row in &rows {
                if let (Some(code), Some(name)) = (row_ticker(row), row_text(row, NAME)) {
                    names.insert(code, name);
                }
            }
            if let Some(name) = names.get(ticker) {
                return Ok(name.clone());
            }
        }

        Err(last_error
            .unwrap_or_else(|| SourceError::not_found(format!("krx has no name for {ticker}"))))
    }
}

impl PriceHistorySource for KrxAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Krx
    }

    fn fetch_ohlcv<'a>(&'a self, req: HistoryRequest) -> SourceFuture<'a, PriceSeries> {
        Box::pin(async move {
            let series = if self.use_real_api {
                self.fetch_real_series(&req).await?
            } else {
                synthetic_series(&req.ticker, req.start, req.end, mock_base_price(&req.ticker))?
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
            let today = TradingDate::today();
            let req = HistoryRequest::lookback(ticker, today, period.calendar_days(today));
            if self.use_real_api {
                self.fetch_real_series(&req).await
            } else {
                synthetic_series(&req.ticker, req.start, req.end, mock_base_price(&req.ticker))
            }
        })
    }
}

impl MarketCapSource for KrxAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Krx
    }

    fn market_caps<'a>(
        &'a self,
        date: TradingDate,
        market: Market,
    ) -> SourceFuture<'a, MarketCapSnapshot> {
        Box::pin(async move {
            if self.use_real_api {
                self.fetch_real_market_caps(date, market).await
            } else {
                Ok(mock_market_caps(date, market))
            }
        })
    }

    fn ticker_name<'a>(&'a self, ticker: Ticker) -> SourceFuture<'a, String> {
        Box::pin(async move {
            if self.use_real_api {
                self.fetch_real_name(&ticker).await
            } else {
                Ok(format!("Sample {ticker}"))
            }
        })
    }
}

fn row_text(row: &Row, names: &[&str]) -> Option<String> {
    first_field(row, names)
        .and_then(|value| value.as_str())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_owned)
}

fn row_number(row: &Row, names: &[&str]) -> Option<f64> {
    first_field(row, names).and_then(parse_number)
}

fn row_ticker(row: &Row) -> Option<Ticker> {
    row_text(row, CODE).and_then(|code| Ticker::parse(&code).ok())
}

fn parse_bar(row: &Row) -> Option<PriceBar> {
    let date = TradingDate::parse(&row_text(row, DATE)?).ok()?;
    let volume = row_number(row, VOLUME).map(|v| v.max(0.0) as u64);
    PriceBar::new(
        date,
        row_number(row, OPEN)?,
        row_number(row, HIGH)?,
        row_number(row, LOW)?,
        row_number(row, CLOSE)?,
        volume,
    )
    .ok()
}

fn parse_market_cap(row: &Row, market: Market) -> Option<MarketCapEntry> {
    let market_cap = row_number(row, MARKET_CAP)?;
    if market_cap <= 0.0 {
        return None;
    }
    Some(MarketCapEntry {
        ticker: row_ticker(row)?,
        name: row_text(row, NAME),
        market,
        market_cap,
    })
}

fn mock_base_price(ticker: &Ticker) -> f64 {
    1_000.0 + (ticker_seed(ticker) % 900) as f64 * 100.0
}

fn mock_market_caps(date: TradingDate, market: Market) -> MarketCapSnapshot {
    let (first_code, step, scale) = match market {
        Market::Kospi => (5_000_u32, 10_010_u32, 400_000_000_000_000.0),
        Market::Kosdaq => (600_000, 3_331, 40_000_000_000_000.0),
    };

    let entries = (0..60_u32)
        .filter_map(|index| {
            let ticker = Ticker::parse(&format!("{:06}", first_code + index * step)).ok()?;
            let jitter = 1.0 + (ticker_seed(&ticker) % 100) as f64 / 1_000.0;
            Some(MarketCapEntry {
                name: Some(format!("{} Sample {:02}", market.as_str().to_uppercase(), index + 1)),
                ticker,
                market,
                market_cap: (scale / f64::from(index + 1) * jitter).round(),
            })
        })
        .collect();

    MarketCapSnapshot {
        market,
        date,
        entries,
    }
}
