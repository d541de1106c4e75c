//! Quota backoff: doubling delay per consecutive quota failure, one alert
//! per escalation episode, full reset on the next successful fetch.

use std::time::Duration;

/// Per-worker backoff state. Zero delay means not currently backing off.
#[derive(Debug)]
pub struct Backoff {
    delay: Duration,
    alerted: bool,
    initial: Duration,
    max: Duration,
}

/// What the worker should do after a quota failure.
#[derive(Debug, PartialEq, Eq)]
pub struct QuotaStep {
    /// Delay before the next cycle.
    pub delay: Duration,
    /// True exactly once per episode, on the idle→backoff transition.
    pub alert: bool,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            delay: Duration::ZERO,
            alerted: false,
            initial,
            max,
        }
    }

    pub fn is_backing_off(&self) -> bool {
        !self.delay.is_zero()
    }

    /// Escalate after a quota-exceeded fetch: initial on first hit, then
    /// doubling up to the cap. Alerts only on the first hit of an episode.
    pub fn on_quota(&mut self) -> QuotaStep {
        self.delay = if self.delay.is_zero() {
            self.initial
        } else {
            (self.delay * 2).min(self.max)
        };
        let alert = !self.alerted;
        self.alerted = true;
        QuotaStep {
            delay: self.delay,
            alert,
        }
    }

    /// Any successful fetch ends the episode. Returns whether the worker
    /// was backing off, so the caller can log the recovery.
    pub fn on_success(&mut self) -> bool {
        let was_backing_off = self.is_backing_off();
        self.delay = Duration::ZERO;
        self.alerted = false;
        was_backing_off
    }
}
