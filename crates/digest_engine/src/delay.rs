use std::time::Duration;

use digest_logging::digest_debug;
use rand::Rng;

/// Source of pauses between browser steps.
pub trait DelayPolicy: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// Uniformly distributed pause between `min` and `max` (inclusive, millisecond resolution).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterDelay {
    min: Duration,
    max: Duration,
}

impl JitterDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// One to three seconds, the pacing used between login steps.
    pub fn human() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(3))
    }
}

impl DelayPolicy for JitterDelay {
    fn next_delay(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

/// Never pauses. For tests and dry runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl DelayPolicy for NoDelay {
    fn next_delay(&self) -> Duration {
        Duration::ZERO
    }
}

pub async fn pause(policy: &dyn DelayPolicy, before: &str) {
    let delay = policy.next_delay();
    if delay.is_zero() {
        return;
    }
    digest_debug!("Pausing {:?} before {}", delay, before);
    tokio::time::sleep(delay).await;
}
