use crate::error::AppError;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Per-key attempt limiter for login and public signup endpoints.
#[derive(Clone)]
pub struct Throttle {
    limiter: Arc<DefaultKeyedRateLimiter<String>>,
}

impl Throttle {
    pub fn per_minute(attempts: u32) -> Self {
        let burst = NonZeroU32::MIN.saturating_add(attempts.saturating_sub(1));
        Self {
            limiter: Arc::new(RateLimiter::keyed(Quota::per_minute(burst))),
        }
    }

    /// Keys are case-insensitive so `Bob` and `bob` share a budget.
    pub fn check(&self, scope: &str, key: &str) -> Result<(), AppError> {
        let key = format!("{scope}:{}", key.trim().to_lowercase());
        self.limiter
            .check_key(&key)
            .map_err(|_| AppError::RateLimited)
    }

    /// Drop idle keys.
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }
}
