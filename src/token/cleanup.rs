use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::Duration;

use crate::token::clock::{Clock, saturating_millis};

/// Strategy for deciding when a [`TokenCache`](crate::TokenCache) sweeps
/// expired entries out of its tables.
///
/// Expired entries are already invisible to lookups, so sweeping only reclaims
/// memory. The strategy is consulted after every issued token.
pub trait CleanupStrategy: Send + Sync {
    /// Determines whether a sweep should run now.
    fn should_cleanup(&self) -> bool;

    /// Marks that a sweep has run and resets internal state.
    fn mark_as_cleaned(&self);
}

/// Sweeps after a number of issued tokens or after a time interval, whichever
/// comes first.
pub struct HybridCleanupStrategy {
    count_threshold: u32,
    time_threshold: Duration,
    request_count: AtomicU32,
    last_cleanup_time: AtomicI64,
    clock: Arc<dyn Clock>,
}

impl HybridCleanupStrategy {
    /// Creates a strategy measuring time with `clock`.
    ///
    /// # Example
    ///
    /// ```
    /// use fast_token::{HybridCleanupStrategy, SystemClock};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// // Sweep every 1000 tokens or every 5 minutes
    /// let strategy =
    ///     HybridCleanupStrategy::new(1000, Duration::from_secs(300), Arc::new(SystemClock));
    /// ```
    pub fn new(count_threshold: u32, time_threshold: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now_millis();
        Self {
            count_threshold,
            time_threshold,
            request_count: AtomicU32::new(0),
            last_cleanup_time: AtomicI64::new(now),
            clock,
        }
    }
}

impl CleanupStrategy for HybridCleanupStrategy {
    fn should_cleanup(&self) -> bool {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.count_threshold {
            return true;
        }

        let elapsed = self.clock.now_millis() - self.last_cleanup_time.load(Ordering::SeqCst);
        elapsed >= saturating_millis(self.time_threshold)
    }

    fn mark_as_cleaned(&self) {
        self.request_count.store(0, Ordering::SeqCst);
        self.last_cleanup_time
            .store(self.clock.now_millis(), Ordering::SeqCst);
    }
}

/// Wraps a closure deciding when to sweep. State, if any, lives in the closure.
pub struct CustomCleanupStrategy<F>
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    strategy_fn: F,
}

impl<F> CustomCleanupStrategy<F>
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    pub fn new(strategy_fn: F) -> Self {
        Self { strategy_fn }
    }
}

impl<F> CleanupStrategy for CustomCleanupStrategy<F>
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn should_cleanup(&self) -> bool {
        (self.strategy_fn)()
    }

    fn mark_as_cleaned(&self) {}
}

/// Type alias for boxed cleanup strategies.
pub type BoxedCleanupStrategy = Box<dyn CleanupStrategy>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::clock::ManualClock;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_hybrid_strategy_count_threshold() {
        let clock = Arc::new(ManualClock::new(0));
        let strategy = HybridCleanupStrategy::new(3, Duration::from_secs(3600), clock);

        assert!(!strategy.should_cleanup());
        assert!(!strategy.should_cleanup());
        assert!(strategy.should_cleanup());
    }

    #[test]
    fn test_hybrid_strategy_time_threshold() {
        let clock = Arc::new(ManualClock::new(0));
        let strategy = HybridCleanupStrategy::new(100, Duration::from_secs(1), clock.clone());

        assert!(!strategy.should_cleanup(), "fresh strategy should not sweep");

        clock.advance(Duration::from_millis(1100));
        assert!(
            strategy.should_cleanup(),
            "request after time threshold should sweep"
        );
    }

    #[test]
    fn test_hybrid_strategy_huge_time_threshold() {
        let clock = Arc::new(ManualClock::new(0));
        let strategy = HybridCleanupStrategy::new(100, Duration::MAX, clock.clone());

        clock.advance(Duration::from_secs(3600));
        assert!(!strategy.should_cleanup());
    }

    #[test]
    fn test_hybrid_strategy_reset_after_cleanup() {
        let clock = Arc::new(ManualClock::new(0));
        let strategy = HybridCleanupStrategy::new(2, Duration::from_secs(3600), clock);

        assert!(!strategy.should_cleanup());
        assert!(strategy.should_cleanup());

        strategy.mark_as_cleaned();
        assert!(!strategy.should_cleanup());
    }

    #[test]
    fn test_custom_strategy() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let strategy = CustomCleanupStrategy::new(move || {
            let count = counter_clone.fetch_add(1, Ordering::SeqCst) + 1;
            count % 2 == 0
        });

        assert!(!strategy.should_cleanup());
        assert!(strategy.should_cleanup());
        assert!(!strategy.should_cleanup());
    }

    #[test]
    fn test_custom_strategy_mark_as_cleaned_noop() {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&flag);

        let strategy = CustomCleanupStrategy::new(move || flag_clone.load(Ordering::SeqCst));

        assert!(!strategy.should_cleanup());
        strategy.mark_as_cleaned();
        assert!(!strategy.should_cleanup());

        flag.store(true, Ordering::SeqCst);
        assert!(strategy.should_cleanup());
    }
}
