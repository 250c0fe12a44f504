//! Time-bucketed compute cache.
//!
//! Entries are keyed by `(function, arguments, bucket)` where
//! `bucket = now / ttl`. Moving into a new bucket makes every older entry
//! unreachable, and stale buckets are purged on the next insert. The clock is
//! injectable so expiry can be driven by tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;
use tracing::debug;

use crate::data_source::SourceFuture;
use crate::{HistoryRequest, Period, PriceHistorySource, PriceSeries, ProviderId, Ticker};

/// Default time-to-live for cached history.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub trait Clock: Send + Sync {
    /// Time elapsed since the Unix epoch.
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new(start: Duration) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("manual clock lock poisoned");
        *now += by;
    }

    pub fn set(&self, to: Duration) {
        *self.now.lock().expect("manual clock lock poisoned") = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().expect("manual clock lock poisoned")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    function: String,
    args: String,
    bucket: u128,
}

pub struct ComputeCache<V> {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Arc<RwLock<HashMap<CacheKey, V>>>,
}

impl<V> Clone for ComputeCache<V> {
    fn clone(&self) -> Self {
        Self {
            clock: Arc::clone(&self.clock),
            ttl: self.ttl,
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<V: Clone + Send + Sync> ComputeCache<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_system_clock(ttl: Duration) -> Self {
        Self::new(ttl, Arc::new(SystemClock))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn bucket(&self) -> u128 {
        self.clock.now().as_millis() / self.ttl.as_millis().max(1)
    }

    fn key(&self, function: &str, args: &str) -> CacheKey {
        CacheKey {
            function: function.to_owned(),
            args: args.to_owned(),
            bucket: self.bucket(),
        }
    }

    pub async fn get(&self, function: &str, args: &str) -> Option<V> {
        let key = self.key(function, args);
        self.entries.read().await.get(&key).cloned()
    }

    pub async fn insert(&self, function: &str, args: &str, value: V) {
        let key = self.key(function, args);
        let current = key.bucket;
        let mut entries = self.entries.write().await;
        entries.retain(|existing, _| existing.bucket == current);
        entries.insert(key, value);
    }

    /// Returns the cached value or computes, stores and returns a new one.
    /// Errors are passed through and never cached.
    pub async fn get_or_try_insert_with<E, F, Fut>(
        &self,
        function: &str,
        args: &str,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(function, args).await {
            debug!(function, args, "compute cache hit");
            return Ok(value);
        }

        let value = compute().await?;
        self.insert(function, args, value.clone()).await;
        Ok(value)
    }

    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }

    pub async fn invalidate_function(&self, function: &str) {
        self.entries
            .write()
            .await
            .retain(|key, _| key.function != function);
    }

    /// Entry count including entries from past buckets not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Caches successful history fetches of the wrapped source.
pub struct CachedHistorySource {
    inner: Arc<dyn PriceHistorySource>,
    cache: ComputeCache<PriceSeries>,
}

impl CachedHistorySource {
    pub fn new(inner: Arc<dyn PriceHistorySource>, cache: ComputeCache<PriceSeries>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &ComputeCache<PriceSeries> {
        &self.cache
    }
}

impl PriceHistorySource for CachedHistorySource {
    fn id(&self) -> ProviderId {
        self.inner.id()
    }

    fn fetch_ohlcv<'a>(&'a self, req: HistoryRequest) -> SourceFuture<'a, PriceSeries> {
        Box::pin(async move {
            let args = format!("{}:{}", self.inner.id(), req.cache_key());
            self.cache
                .get_or_try_insert_with("fetch_ohlcv", &args, || self.inner.fetch_ohlcv(req))
                .await
        })
    }

    fn quote_history<'a>(
        &'a self,
        ticker: Ticker,
        period: Period,
    ) -> SourceFuture<'a, PriceSeries> {
        Box::pin(async move {
            let args = format!("{}:{ticker}:{}", self.inner.id(), period.as_str());
            self.cache
                .get_or_try_insert_with("quote_history", &args, || {
                    self.inner.quote_history(ticker, period)
                })
                .await
        })
    }
}
