//! Restart rate limiting and exponential backoff.
//!
//! Prevents restart storms: restarts are tracked in a sliding time window,
//! and each successive restart waits exponentially longer. When the window
//! budget is exhausted a Restart directive degrades to Stop-and-escalate.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};

// Layer 3: Internal module imports
// (none)

/// Default maximum restarts per window.
pub const DEFAULT_MAX_RESTARTS: u32 = 10;

/// Default sliding window.
pub const DEFAULT_RESTART_WINDOW: Duration = Duration::from_secs(60);

/// Restart backoff and rate limiting.
///
/// # Sliding Window Behavior
///
/// The restart window slides forward as time passes. Old restarts expire and
/// no longer count toward the limit, so a transient failure burst does not
/// permanently lock an actor out of restarting.
///
/// # Exponential Backoff Formula
///
/// ```text
/// delay = base_delay * 2^(min(restart_count, 10))
/// delay = min(delay, max_delay)
/// ```
///
/// # Example
/// ```rust
/// use herald_rt::supervisor::RestartBackoff;
/// use std::time::Duration;
///
/// // Allow 5 restarts per minute
/// let mut backoff = RestartBackoff::new(5, Duration::from_secs(60));
///
/// backoff.record_restart();
/// assert!(!backoff.is_limit_exceeded());
/// assert!(backoff.calculate_delay() >= Duration::from_millis(100));
/// ```
#[derive(Debug, Clone)]
pub struct RestartBackoff {
    /// Maximum restarts allowed in the window
    max_restarts: u32,

    /// Time window for counting restarts (sliding)
    restart_window: Duration,

    /// History of restart timestamps (oldest first)
    restart_history: VecDeque<DateTime<Utc>>,

    /// Base delay for exponential backoff
    base_delay: Duration,

    /// Maximum delay for exponential backoff
    max_delay: Duration,
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESTARTS, DEFAULT_RESTART_WINDOW)
    }
}

impl RestartBackoff {
    /// Create a tracker allowing `max_restarts` per `restart_window`.
    pub fn new(max_restarts: u32, restart_window: Duration) -> Self {
        Self {
            max_restarts,
            restart_window,
            restart_history: VecDeque::new(),
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
        }
    }

    /// Create a tracker with custom backoff delays.
    pub fn with_delays(
        max_restarts: u32,
        restart_window: Duration,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_restarts,
            restart_window,
            restart_history: VecDeque::new(),
            base_delay,
            max_delay,
        }
    }

    /// Record a restart at the current time.
    pub fn record_restart(&mut self) {
        self.expire_old_entries();
        self.restart_history.push_back(Utc::now());
    }

    /// Restarts currently counted in the window.
    pub fn restart_count(&mut self) -> u32 {
        self.expire_old_entries();
        self.restart_history.len() as u32
    }

    /// Whether the window budget is exhausted.
    pub fn is_limit_exceeded(&mut self) -> bool {
        self.restart_count() >= self.max_restarts
    }

    /// Exponential delay for the next restart attempt.
    pub fn calculate_delay(&mut self) -> Duration {
        let count = self.restart_count().min(10);
        let factor = 1u32 << count;
        let delay = self.base_delay.saturating_mul(factor);
        delay.min(self.max_delay)
    }

    fn expire_old_entries(&mut self) {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.restart_window)
                .unwrap_or_else(|_| chrono::Duration::seconds(60));
        while let Some(front) = self.restart_history.front() {
            if *front < cutoff {
                self.restart_history.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_tracker_is_under_limit() {
        let mut backoff = RestartBackoff::new(3, Duration::from_secs(60));
        assert_eq!(backoff.restart_count(), 0);
        assert!(!backoff.is_limit_exceeded());
    }

    #[test]
    fn test_limit_exceeded_after_max_restarts() {
        let mut backoff = RestartBackoff::new(3, Duration::from_secs(60));

        for _ in 0..3 {
            backoff.record_restart();
        }

        assert!(backoff.is_limit_exceeded());
    }

    #[test]
    fn test_delay_grows_exponentially() {
        let mut backoff = RestartBackoff::with_delays(
            10,
            Duration::from_secs(60),
            Duration::from_millis(100),
            Duration::from_secs(60),
        );

        let d0 = backoff.calculate_delay();
        backoff.record_restart();
        let d1 = backoff.calculate_delay();
        backoff.record_restart();
        let d2 = backoff.calculate_delay();

        assert_eq!(d0, Duration::from_millis(100));
        assert_eq!(d1, Duration::from_millis(200));
        assert_eq!(d2, Duration::from_millis(400));
    }

    #[test]
    fn test_delay_is_capped() {
        let mut backoff = RestartBackoff::with_delays(
            64,
            Duration::from_secs(600),
            Duration::from_secs(1),
            Duration::from_secs(5),
        );

        for _ in 0..20 {
            backoff.record_restart();
        }

        assert_eq!(backoff.calculate_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_old_entries_expire() {
        let mut backoff = RestartBackoff::new(2, Duration::from_millis(10));

        backoff.record_restart();
        backoff.record_restart();
        assert!(backoff.is_limit_exceeded());

        std::thread::sleep(Duration::from_millis(30));
        assert!(!backoff.is_limit_exceeded());
        assert_eq!(backoff.restart_count(), 0);
    }
}
