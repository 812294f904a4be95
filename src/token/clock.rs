//! Time sources for token minting and checking.
//!
//! All times are milliseconds since the Unix epoch, signed so that the
//! arithmetic against the base timestamp never has to special-case underflow.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Converts a duration to whole milliseconds, saturating at `i64::MAX`.
pub(crate) fn saturating_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// A source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Returns the current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Wall-clock time from [`SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        // A clock set before 1970 yields a negative value instead of panicking.
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_millis() as i64,
            Err(e) => -(e.duration().as_millis() as i64),
        }
    }
}

/// A clock that starts at a fixed timestamp and advances in real time.
///
/// This is the "frozen timestamp" test hook: every process configured with the
/// same origin agrees on the time, but the clock still moves forward so TTLs
/// behave normally. It is refused in production mode.
#[derive(Debug, Clone)]
pub struct FrozenClock {
    origin: i64,
    started: Instant,
}

impl FrozenClock {
    pub fn new(origin: i64) -> Self {
        Self {
            origin,
            started: Instant::now(),
        }
    }

    pub fn origin(&self) -> i64 {
        self.origin
    }
}

impl Clock for FrozenClock {
    fn now_millis(&self) -> i64 {
        self.origin + self.started.elapsed().as_millis() as i64
    }
}

/// A clock that only moves when told to.
///
/// # Example
///
/// ```rust
/// use fast_token::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new(1_700_000_000_000);
/// clock.advance(Duration::from_secs(60));
/// assert_eq!(clock.now_millis(), 1_700_000_060_000);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(saturating_millis(by), Ordering::SeqCst);
    }

    /// Sets the clock to an absolute timestamp.
    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock() {
        let ts = SystemClock.now_millis();
        // After 2020-01-01 00:00:00 UTC
        assert!(ts > 1_577_836_800_000);
    }

    #[test]
    fn test_frozen_clock_advances_from_origin() {
        let clock = FrozenClock::new(1_000);
        let first = clock.now_millis();
        assert!(first >= 1_000);
        assert!(first < 1_000 + 5_000);

        std::thread::sleep(Duration::from_millis(20));
        assert!(clock.now_millis() >= first + 20);
        assert_eq!(clock.origin(), 1_000);
    }

    #[test]
    fn test_saturating_millis() {
        assert_eq!(saturating_millis(Duration::from_secs(600)), 600_000);
        assert_eq!(saturating_millis(Duration::from_secs(u64::MAX / 1000)), i64::MAX);
        assert_eq!(saturating_millis(Duration::MAX), i64::MAX);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(5_000);
        assert_eq!(clock.now_millis(), 5_000);

        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now_millis(), 5_250);

        clock.set(42);
        assert_eq!(clock.now_millis(), 42);
    }
}
