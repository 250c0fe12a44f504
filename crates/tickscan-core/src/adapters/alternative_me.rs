use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::{status_error, transport_error};
use crate::data_source::{FearGreedHistory, FearGreedReading, SourceFuture};
use crate::provider_policy::ProviderPolicy;
use crate::{
    CircuitBreaker, FearGreedSource, HttpClient, HttpRequest, NoopHttpClient, ProviderId,
    RequestThrottle, RetryPolicy, SourceError, TradingDate, UtcDateTime,
};

const DEFAULT_URL: &str = "https://api.alternative.me/fng/";

/// Fear/greed composite from alternative.me.
#[derive(Clone)]
pub struct AlternativeMeAdapter {
    http_client: Arc<dyn HttpClient>,
    url: String,
    circuit_breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    throttle: RequestThrottle,
    timeout_ms: u64,
    use_real_api: bool,
}

impl Default for AlternativeMeAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            url: String::from(DEFAULT_URL),
            circuit_breaker: Arc::new(CircuitBreaker::for_provider(ProviderId::AlternativeMe)),
            retry: RetryPolicy::from_backoff(
                &ProviderPolicy::alternative_me_default().retry_backoff,
            ),
            throttle: RequestThrottle::from_policy(&ProviderPolicy::alternative_me_default()),
            timeout_ms: 10_000,
            use_real_api: false,
        }
    }
}

impl AlternativeMeAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        let use_real_api = !http_client.is_mock();
        Self {
            http_client,
            use_real_api,
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_throttle(mut self, throttle: RequestThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    async fn fetch_once(&self) -> Result<FearGreedHistory, SourceError> {
        let request = HttpRequest::get(self.url.as_str())
            .with_query("limit", "2")
            .with_timeout_ms(self.timeout_ms);

        self.throttle.until_ready().await;
        debug!("fear/greed request");
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| transport_error(ProviderId::AlternativeMe, e))?;
        if !response.is_success() {
            return Err(status_error(ProviderId::AlternativeMe, &response));
        }

        let parsed: FngResponse = serde_json::from_str(&response.body).map_err(|e| {
            SourceError::internal(format!("failed to parse fear/greed payload: {e}"))
        })?;

        let mut readings = parsed.data.into_iter().map(FngEntry::into_reading);
        let latest = readings
            .next()
            .ok_or_else(|| SourceError::not_found("fear/greed payload has no data"))??;
        let previous = readings.next().transpose()?;

        Ok(FearGreedHistory { latest, previous })
    }
}

impl FearGreedSource for AlternativeMeAdapter {
    fn fear_greed<'a>(&'a self) -> SourceFuture<'a, FearGreedHistory> {
        Box::pin(async move {
            if !self.use_real_api {
                return mock_history();
            }
            self.circuit_breaker.check()?;
            let outcome = self.retry.run(|| self.fetch_once()).await;
            self.circuit_breaker.record(&outcome);
            outcome
        })
    }
}

/// Label bands published by alternative.me.
pub fn classify(value: u32) -> &'static str {
    match value {
        0..=24 => "Extreme Fear",
        25..=46 => "Fear",
        47..=54 => "Neutral",
        55..=75 => "Greed",
        _ => "Extreme Greed",
    }
}

fn mock_history() -> Result<FearGreedHistory, SourceError> {
    let today = TradingDate::today();
    let day = i64::from(today.into_inner().ordinal());
    let reading = |value: u32, seconds: i64| -> Result<FearGreedReading, SourceError> {
        Ok(FearGreedReading {
            value,
            classification: classify(value).to_owned(),
            timestamp: UtcDateTime::from_unix_seconds(seconds)?,
        })
    };

    let midnight = today.unix_seconds();
    Ok(FearGreedHistory {
        latest: reading(20 + (day * 7 % 60) as u32, midnight)?,
        previous: Some(reading(20 + ((day - 1) * 7).rem_euclid(60) as u32, midnight - 86_400)?),
    })
}

#[derive(Debug, Deserialize)]
struct FngResponse {
    #[serde(default)]
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    value_classification: String,
    timestamp: String,
}

impl FngEntry {
    fn into_reading(self) -> Result<FearGreedReading, SourceError> {
        let value = self.value.trim().parse::<u32>().map_err(|_| {
            SourceError::internal(format!("invalid fear/greed value '{}'", self.value))
        })?;
        let seconds = self.timestamp.trim().parse::<i64>().map_err(|_| {
            SourceError::internal(format!("invalid fear/greed timestamp '{}'", self.timestamp))
        })?;

        Ok(FearGreedReading {
            value,
            classification: self.value_classification,
            timestamp: UtcDateTime::from_unix_seconds(seconds)?,
        })
    }
}
