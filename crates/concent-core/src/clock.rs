use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current UTC time for deadline comparisons.
///
/// Injectable so that deadline behavior is deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Current unix timestamp in whole seconds.
    fn timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Test support.
pub struct ManualClock {
    timestamp: AtomicI64,
}

impl ManualClock {
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp: AtomicI64::new(timestamp),
        }
    }

    pub fn set(&self, timestamp: i64) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.timestamp.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.timestamp.load(Ordering::SeqCst), 0)
            .single()
            .expect("manual clock holds a representable timestamp")
    }

    fn timestamp(&self) -> i64 {
        self.timestamp.load(Ordering::SeqCst)
    }
}
