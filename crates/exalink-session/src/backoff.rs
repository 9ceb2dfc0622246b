//! Reconnect backoff policy.
//!
//! The delay schedule is a pure function of the attempt number so it can
//! be tested without a clock: doubling from the initial delay up to a
//! cap. [`BackoffPolicy::delay`] adds jitter on top so a fleet of
//! gateways does not hammer a recovering server in lockstep; the jitter
//! is additive, keeping actual delays at or above the base schedule.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff schedule with a cap.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound on the base delay.
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy {
            initial: Duration::from_secs(1),
            cap: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// The base delay before retry number `attempt` (0-based):
    /// `min(initial * 2^attempt, cap)`. Pure and monotone non-decreasing.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        // 2^30 * any sane initial already exceeds any sane cap.
        let factor = 1u32.checked_shl(attempt.min(30)).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(factor)
            .unwrap_or(self.cap)
            .min(self.cap)
    }

    /// The base delay plus uniform jitter in `[0, base/4]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter_max = (base / 4).as_nanos() as u64;
        if jitter_max == 0 {
            return base;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_max);
        base + Duration::from_nanos(jitter)
    }
}
