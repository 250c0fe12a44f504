use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

use crate::provider_policy::ProviderPolicy;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Outbound token bucket for one provider.
///
/// Cloning shares the bucket. Adapters `await` a permit before every HTTP
/// attempt, retries included.
#[derive(Clone)]
pub struct RequestThrottle {
    limiter: Arc<DirectRateLimiter>,
    per_second: u32,
    granted: Arc<AtomicU64>,
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("per_second", &self.per_second)
            .field("granted", &self.granted())
            .finish()
    }
}

impl RequestThrottle {
    /// `per_second` permits per second with a burst of the same size.
    pub fn per_second(per_second: u32) -> Self {
        let safe = NonZeroU32::MIN.saturating_add(per_second.saturating_sub(1));
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(safe))),
            per_second: safe.get(),
            granted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bucket sized to the provider's documented quota.
    pub fn from_policy(policy: &ProviderPolicy) -> Self {
        Self::per_second(policy.requests_per_second().ceil() as u32)
    }

    /// Waits until a permit is available.
    pub async fn until_ready(&self) {
        self.limiter.until_ready().await;
        self.granted.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a permit without waiting; `Err` carries a suggested wait.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.limiter
            .check()
            .map_err(|_| Duration::from_secs_f64(1.0 / f64::from(self.per_second)))?;
        self.granted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn rate(&self) -> u32 {
        self.per_second
    }

    /// Permits handed out so far, across every clone.
    pub fn granted(&self) -> u64 {
        self.granted.load(Ordering::Relaxed)
    }
}
