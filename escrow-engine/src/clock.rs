//! Time source for expiry checks

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

pub trait Clock: Send + Sync {
    /// Current unix time in seconds
    fn now_ts(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ts(&self) -> u64 {
        Utc::now().timestamp().max(0) as u64
    }
}

/// Settable clock for tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ts(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
