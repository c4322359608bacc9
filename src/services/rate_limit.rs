use std::{net::IpAddr, num::NonZeroU32, time::Duration};

use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
    Quota, RateLimiter,
};
use tracing::warn;

use crate::error::AppError;

const WINDOW: Duration = Duration::from_secs(60 * 60);

type KeyedLimiter<C> =
    RateLimiter<IpAddr, DashMapStateStore<IpAddr>, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Per-address budget for order submissions.
///
/// An address may spend its whole budget at once; it then regains one
/// submission per full window, so no address ever gets more than the budget
/// inside any single hour.
pub struct OrderRateLimiter<C: Clock = DefaultClock> {
    limiter: KeyedLimiter<C>,
}

impl OrderRateLimiter {
    pub fn per_hour(submissions: NonZeroU32) -> Self {
        Self::with_clock(submissions, DefaultClock::default())
    }
}

impl<C: Clock> OrderRateLimiter<C> {
    pub fn with_clock(submissions: NonZeroU32, clock: C) -> Self {
        Self {
            limiter: RateLimiter::dashmap_with_clock(hourly_quota(submissions), clock),
        }
    }

    /// Consumes one submission from `addr`'s budget.
    pub fn check(&self, addr: IpAddr) -> Result<(), AppError> {
        self.limiter.check_key(&addr).map_err(|_| {
            warn!(%addr, "Order rate limit exceeded");
            AppError::RateLimited
        })
    }

    /// Drops state for addresses whose budget has fully refilled.
    pub fn shrink(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }
}

fn hourly_quota(submissions: NonZeroU32) -> Quota {
    Quota::with_period(WINDOW)
        .unwrap_or_else(|| Quota::per_hour(NonZeroU32::MIN))
        .allow_burst(submissions)
}
