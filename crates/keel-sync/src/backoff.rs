//! Exponential backoff schedule for per-resource retries.

use std::time::Duration;

/// An exponential backoff schedule with a cap.
///
/// Delay for retry `n` (zero-based) is `base * factor^n`, capped at
/// `cap`. Defaults: base 5s, factor 2, cap 5m.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    factor: u32,
    cap: Duration,
}

impl Backoff {
    /// Creates a schedule with the given base, factor, and cap.
    #[must_use]
    pub const fn new(base: Duration, factor: u32, cap: Duration) -> Self {
        Self { base, factor, cap }
    }

    /// Returns the delay before the retry with the given zero-based index.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let multiplier = self
            .factor
            .checked_pow(retry)
            .map_or(u64::MAX, u64::from);
        self.base
            .checked_mul(u32::try_from(multiplier).unwrap_or(u32::MAX))
            .map_or(self.cap, |d| d.min(self.cap))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(5),
            factor: 2,
            cap: Duration::from_secs(300),
        }
    }
}
