//! Hour-granularity time source for access timestamps.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time in whole hours since the Unix epoch.
pub trait Clock: Send + Sync + Debug {
    fn now_hours(&self) -> u32;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_hours(&self) -> u32 {
        // A clock set before 1970 reads as hour 0.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| (elapsed.as_secs() / 3600) as u32)
            .unwrap_or(0)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU32);

impl ManualClock {
    pub fn new(hours: u32) -> Self {
        Self(AtomicU32::new(hours))
    }

    pub fn set(&self, hours: u32) {
        self.0.store(hours, Ordering::SeqCst);
    }

    pub fn advance(&self, hours: u32) {
        self.0.fetch_add(hours, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_hours(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}
