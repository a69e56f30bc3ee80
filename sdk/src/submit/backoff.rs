//! Exponential backoff with bounded upward jitter.
//!
//! The base schedule doubles per attempt from a floor up to a cap and is
//! strictly non-decreasing. Jitter is applied on top, upward only and
//! bounded at a quarter of the base delay, so a jittered delay can never
//! undercut the monotone schedule — retries from many clients desynchronize
//! without any of them retrying *sooner* than the schedule allows.

use std::time::Duration;

use rand::Rng;

/// The transient-retry delay schedule.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    /// Delay for the first retry.
    pub floor: Duration,
    /// Ceiling the doubling schedule saturates at.
    pub cap: Duration,
}

impl Backoff {
    /// Creates a schedule. `cap` below `floor` is clamped up to `floor`.
    pub fn new(floor: Duration, cap: Duration) -> Self {
        Self {
            floor,
            cap: cap.max(floor),
        }
    }

    /// The unjittered delay before retry number `attempt` (1-based).
    /// `floor * 2^(attempt-1)`, saturating at the cap.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(63);
        let delay = self
            .floor
            .checked_mul(1u32.checked_shl(doublings).unwrap_or(u32::MAX))
            .unwrap_or(self.cap);
        delay.min(self.cap)
    }

    /// The actual sleep for retry `attempt`: base delay plus up to 25%
    /// random jitter, added (never subtracted).
    pub fn jittered(&self, attempt: u32) -> Duration {
        let base = self.delay_for(attempt);
        let jitter_ceiling = base / 4;
        if jitter_ceiling.is_zero() {
            return base;
        }
        let jitter_nanos = rand::thread_rng().gen_range(0..=jitter_ceiling.as_nanos() as u64);
        base + Duration::from_nanos(jitter_nanos)
    }
}
