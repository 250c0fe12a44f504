use std::time::Duration;

use crate::ProviderId;

/// Quota and retry settings for one upstream provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub max_concurrency: usize,
    pub quota_window: Duration,
    pub quota_limit: u32,
    pub retry_backoff: BackoffPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_retries: u32,
}

impl ProviderPolicy {
    /// Open API allows roughly 10 calls per second per key.
    pub fn krx_default() -> Self {
        Self {
            provider_id: ProviderId::Krx,
            max_concurrency: 4,
            quota_window: Duration::from_secs(1),
            quota_limit: 10,
            retry_backoff: BackoffPolicy {
                initial_delay: Duration::from_millis(200),
                max_delay: Duration::from_secs(5),
                multiplier: 2.0,
                max_retries: 2,
            },
        }
    }

    pub fn yahoo_default() -> Self {
        Self {
            provider_id: ProviderId::Yahoo,
            max_concurrency: 6,
            quota_window: Duration::from_secs(1),
            quota_limit: 5,
            retry_backoff: BackoffPolicy {
                initial_delay: Duration::from_millis(250),
                max_delay: Duration::from_secs(5),
                multiplier: 2.0,
                max_retries: 2,
            },
        }
    }

    pub fn alternative_me_default() -> Self {
        Self {
            provider_id: ProviderId::AlternativeMe,
            max_concurrency: 1,
            quota_window: Duration::from_secs(60),
            quota_limit: 60,
            retry_backoff: BackoffPolicy {
                initial_delay: Duration::from_millis(500),
                max_delay: Duration::from_secs(5),
                multiplier: 2.0,
                max_retries: 1,
            },
        }
    }

    pub fn default_for(provider_id: ProviderId) -> Self {
        match provider_id {
            ProviderId::Krx => Self::krx_default(),
            ProviderId::Yahoo => Self::yahoo_default(),
            ProviderId::AlternativeMe => Self::alternative_me_default(),
        }
    }

    /// Sustained request rate implied by the quota.
    pub fn requests_per_second(&self) -> f64 {
        f64::from(self.quota_limit.max(1)) / self.quota_window.as_secs_f64().max(0.001)
    }
}
