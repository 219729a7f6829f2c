use chrono::{DateTime, Local, NaiveDate};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of "now" for the stopwatch and the host's daily bookkeeping.
pub trait TimeSource: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> u64;

    /// Local calendar date of `now_ms()`.
    fn today(&self) -> NaiveDate {
        DateTime::from_timestamp_millis(self.now_ms() as i64)
            .map(|utc| utc.with_timezone(&Local).date_naive())
            .unwrap_or_else(|| Local::now().date_naive())
    }
}

/// Wall clock read once at construction, advanced by a monotonic anchor so
/// readings never step backwards while the process is alive.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin_ms: u64,
    anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        let origin_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            origin_ms,
            anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin_ms
            .saturating_add(self.anchor.elapsed().as_millis() as u64)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
