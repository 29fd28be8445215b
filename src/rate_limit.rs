//! Per-provider pacing for outbound metadata calls.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::time::Duration;

use governor::state::NotKeyed;
use governor::{Quota, RateLimiter};

const WAIT_POLL_TICK: Duration = Duration::from_millis(50);

type DirectLimiter =
    RateLimiter<NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// Grants call slots per provider id no closer together than that provider's
/// configured minimum interval. Providers pace independently; concurrent
/// callers for the same provider are serialized by the limiter state.
pub struct RateGate {
    limiters: HashMap<String, DirectLimiter>,
}

impl RateGate {
    /// Builds one limiter per `(provider id, minimum interval)` pair. A zero
    /// interval is rounded up to one millisecond.
    pub fn new<I>(intervals: I) -> Self
    where
        I: IntoIterator<Item = (String, Duration)>,
    {
        let mut limiters = HashMap::new();
        for (provider_id, interval) in intervals {
            let period = if interval.is_zero() {
                Duration::from_millis(1)
            } else {
                interval
            };
            let limiter = RateLimiter::direct(
                Quota::with_period(period)
                    .expect("valid limiter period")
                    .allow_burst(NonZeroU32::new(1).expect("non-zero limiter burst")),
            );
            limiters.insert(provider_id, limiter);
        }
        Self { limiters }
    }

    /// Blocks until the provider's interval has elapsed since its last granted
    /// call, recording the grant atomically. Unknown provider ids are not
    /// paced and return immediately.
    pub fn wait_turn(&self, provider_id: &str) {
        let Some(limiter) = self.limiters.get(provider_id) else {
            return;
        };
        loop {
            if limiter.check().is_ok() {
                return;
            }
            std::thread::sleep(WAIT_POLL_TICK);
        }
    }
}
