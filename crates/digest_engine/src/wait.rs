use std::time::Duration;

use digest_logging::digest_debug;
use tokio::time::{sleep, Instant};

use crate::{BrowserError, Locator, PageDriver};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitBounds {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitBounds {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// At least one element matched; carries the match count.
    Found(usize),
    TimedOut,
}

/// Polls until `locator` matches or `bounds.timeout` elapses.
///
/// The locator is always checked at least once, so a zero timeout is a plain
/// presence check. Driver errors are returned as-is, never folded into `TimedOut`.
pub async fn wait_for(
    driver: &dyn PageDriver,
    locator: &Locator,
    bounds: WaitBounds,
) -> Result<WaitOutcome, BrowserError> {
    let started = Instant::now();
    loop {
        let count = driver.count(locator).await?;
        if count > 0 {
            return Ok(WaitOutcome::Found(count));
        }
        let elapsed = started.elapsed();
        if elapsed >= bounds.timeout {
            digest_debug!("Gave up waiting for {} after {:?}", locator, elapsed);
            return Ok(WaitOutcome::TimedOut);
        }
        sleep(bounds.poll_interval.min(bounds.timeout - elapsed)).await;
    }
}
