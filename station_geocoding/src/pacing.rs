//! Client-side rate limiting.
//!
//! Public geocoding providers ban clients that send requests too quickly.
//! Every request of a run goes through one [`Pacer`].

use log::debug;
use rand::Rng;
use std::time::{Duration, Instant};

#[derive(PartialEq, Debug, Clone, Copy)]
pub struct RateLimitPolicy {
    /// Maximum sustained request rate. Zero, negative or infinite values disable pacing.
    pub requests_per_second: f64,
    /// Upper bound of the random delay added to every interval.
    pub jitter: Duration,
}

impl RateLimitPolicy {
    /// One request per second: the absolute maximum of the public Nominatim instance.
    pub const DEFAULT_POLICY: RateLimitPolicy = RateLimitPolicy {
        requests_per_second: 1.0,
        jitter: Duration::from_millis(250),
    };

    pub const UNLIMITED: RateLimitPolicy = RateLimitPolicy {
        requests_per_second: 0.0,
        jitter: Duration::ZERO,
    };

    /// The minimum interval between two requests, without jitter.
    ///
    /// `None` when the rate is so low that the interval does not fit in a `Duration`.
    pub fn checked_interval(&self) -> Option<Duration> {
        if self.requests_per_second.is_finite() && self.requests_per_second > 0.0 {
            Duration::try_from_secs_f64(1.0 / self.requests_per_second).ok()
        } else {
            Some(Duration::ZERO)
        }
    }

    /// The minimum interval between two requests, saturating at `Duration::MAX`.
    pub fn interval(&self) -> Duration {
        self.checked_interval().unwrap_or(Duration::MAX)
    }

    pub fn is_unlimited(&self) -> bool {
        self.interval().is_zero()
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::DEFAULT_POLICY
    }
}

/// Spaces out requests according to a [`RateLimitPolicy`].
pub struct Pacer {
    policy: RateLimitPolicy,
    last_request: Option<Instant>,
}

impl Pacer {
    pub fn new(policy: RateLimitPolicy) -> Pacer {
        Pacer {
            policy,
            last_request: None,
        }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Blocks until the next request may be sent, then records it as sent.
    pub fn wait(&mut self) {
        let jitter = self.sample_jitter();
        let delay = self.delay_at(Instant::now(), jitter);
        if !delay.is_zero() {
            debug!("Pacer: sleeping {:?}", delay);
            std::thread::sleep(delay);
        }
        self.last_request = Some(Instant::now());
    }

    /// The remaining wait at `now`, given an already drawn jitter.
    pub fn delay_at(&self, now: Instant, jitter: Duration) -> Duration {
        if self.policy.is_unlimited() {
            return Duration::ZERO;
        }
        match self.last_request {
            None => Duration::ZERO,
            Some(last) => {
                let target = self.policy.interval().saturating_add(jitter);
                target.saturating_sub(now.saturating_duration_since(last))
            }
        }
    }

    fn sample_jitter(&self) -> Duration {
        let max_ms = self.policy.jitter.as_millis() as u64;
        if max_ms == 0 || self.policy.is_unlimited() {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
        }
    }
}
