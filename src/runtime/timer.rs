//! Fixed-period timer for the event loop.
//!
//! The loop has no timer wheel; it bounds each poll by the time left until
//! the next deadline and checks the deadline after every wakeup.

use std::time::{Duration, Instant};

/// Recurring deadline, re-armed one period after each firing.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicTimer {
    period: Duration,
    next: Instant,
}

impl PeriodicTimer {
    /// First firing one period after `now`.
    pub fn new(period: Duration, now: Instant) -> Self {
        Self {
            period,
            next: now + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// How long a poll may block before the timer is due.
    pub fn timeout(&self, now: Instant) -> Duration {
        self.next.saturating_duration_since(now)
    }

    /// Returns true and re-arms if the deadline has passed.
    ///
    /// Missed periods are not made up: the next deadline counts from `now`.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next = now + self.period;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_due_before_period() {
        let start = Instant::now();
        let mut timer = PeriodicTimer::new(Duration::from_secs(10), start);

        assert_eq!(timer.timeout(start), Duration::from_secs(10));
        assert!(!timer.fire_if_due(start + Duration::from_secs(9)));
        assert_eq!(timer.timeout(start + Duration::from_secs(4)), Duration::from_secs(6));
    }

    #[test]
    fn test_fires_and_rearms_from_firing_time() {
        let start = Instant::now();
        let mut timer = PeriodicTimer::new(Duration::from_secs(10), start);

        let late = start + Duration::from_secs(13);
        assert!(timer.fire_if_due(late));
        assert!(!timer.fire_if_due(late));
        assert_eq!(timer.timeout(late), Duration::from_secs(10));
        assert!(timer.fire_if_due(late + Duration::from_secs(10)));
    }

    #[test]
    fn test_missed_periods_fire_once() {
        let start = Instant::now();
        let mut timer = PeriodicTimer::new(Duration::from_secs(1), start);

        let much_later = start + Duration::from_secs(60);
        assert!(timer.fire_if_due(much_later));
        assert!(!timer.fire_if_due(much_later));
    }

    #[test]
    fn test_overdue_timeout_is_zero() {
        let start = Instant::now();
        let timer = PeriodicTimer::new(Duration::from_millis(5), start);
        assert_eq!(timer.timeout(start + Duration::from_secs(1)), Duration::ZERO);
        assert_eq!(timer.period(), Duration::from_millis(5));
    }
}
