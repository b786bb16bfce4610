use std::time::Duration;

use ferry_core::error::Result;
use ferry_core::Interrupt;
use tracing::{info, warn};

pub const DEFAULT_ATTEMPTS: u32 = 6;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(10);

/// Fixed-delay retry for transient transfer failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. The delay is cut short by `interrupt`.
    pub fn run<T, F>(&self, interrupt: &Interrupt, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            interrupt.check()?;
            match op() {
                Ok(value) => {
                    if attempt > 1 {
                        info!(attempt, "{} succeeded after retrying", what);
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() || attempt >= attempts => return Err(e),
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "{} failed, retrying in {:?}", what, self.delay);
                    interrupt.sleep(self.delay)?;
                    attempt += 1;
                }
            }
        }
    }
}
