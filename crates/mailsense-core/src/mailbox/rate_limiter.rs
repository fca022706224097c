//! Request pacing for mailbox provider calls

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::trace;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Process-wide limiter shared by every provider request.
///
/// Gmail enforces per-user quotas; one limiter paces all concurrent
/// pipeline tasks together so a large batch cannot trip upstream 429s.
#[derive(Clone)]
pub struct ProviderRateLimiter {
    limiter: Arc<DirectLimiter>,
}

impl ProviderRateLimiter {
    /// Limiter allowing `requests_per_second` sustained requests; zero is
    /// clamped to one request per second.
    pub fn new(requests_per_second: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second.max(1)).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate))),
        }
    }

    /// Suspend until the next request is allowed
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
        trace!("Provider request slot acquired");
    }
}
