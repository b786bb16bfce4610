//! Cooperative interruption.
//!
//! SIGINT/SIGTERM only flip a shared flag; long-running work polls it between
//! steps so cleanup (draining pulled images) always gets a chance to run. A
//! second SIGINT while the flag is already set terminates the process.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;
use tracing::debug;

use crate::error::{FerryError, Result};

/// Granularity of interruptible sleeps.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a flag wired to SIGINT and SIGTERM.
    pub fn install() -> io::Result<Self> {
        let interrupt = Self::new();
        for signal in [SIGINT, SIGTERM] {
            // Order matters: the conditional shutdown must see the flag before it is set.
            flag::register_conditional_shutdown(signal, 1, Arc::clone(&interrupt.flag))?;
            flag::register(signal, Arc::clone(&interrupt.flag))?;
        }
        debug!("Signal handlers installed");
        Ok(interrupt)
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Returns `FerryError::Interrupted` once the flag has been raised.
    pub fn check(&self) -> Result<()> {
        if self.is_set() {
            Err(FerryError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, waking early if interrupted.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}
