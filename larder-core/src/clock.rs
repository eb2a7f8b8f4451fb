//! Time source for usage timestamps

use crate::Timestamp;
use chrono::Utc;

/// Supplies "now" to the tracker. Stores never read the clock themselves.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}
