use std::time::Duration;

use rand::Rng;

/// Expiry with uniform jitter so that entries written together do not all
/// expire in the same second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TtlPolicy {
    pub base: Duration,
    /// Fraction of `base` the expiry may deviate by, e.g. `0.10`.
    pub jitter: f64,
}

impl TtlPolicy {
    pub const DEFAULT_JITTER: f64 = 0.10;

    pub fn new(base: Duration, jitter: f64) -> Self {
        Self {
            base,
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    /// Catalog reads: 300 s ± 10 %.
    pub fn catalog() -> Self {
        Self::new(Duration::from_secs(300), Self::DEFAULT_JITTER)
    }

    /// Order reads: 60 s ± 10 %.
    pub fn orders() -> Self {
        Self::new(Duration::from_secs(60), Self::DEFAULT_JITTER)
    }

    /// Draws an expiry in whole seconds from `[base - delta, base + delta]`,
    /// never below one second.
    pub fn sample(&self) -> Duration {
        let base = self.base.as_secs() as i64;
        let delta = (base as f64 * self.jitter) as i64;
        let offset = if delta > 0 {
            rand::thread_rng().gen_range(-delta..=delta)
        } else {
            0
        };
        Duration::from_secs((base + offset).max(1) as u64)
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::catalog()
    }
}
