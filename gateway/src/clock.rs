//! Wall-clock source used to stamp `CreateTime` on replies.

use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the current time in epoch seconds.
pub trait Clock: Send + Sync {
    fn now_epoch_secs(&self) -> i64;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }
}

/// A clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_epoch_secs(&self) -> i64 {
        self.0
    }
}
