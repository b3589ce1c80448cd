//! Fetch window tests. Time is passed in explicitly, so nothing sleeps.

use crate::rate_limit::{FetchWindow, FETCH_WINDOW};
use std::time::{Duration, Instant};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_enforced_within_window() {
        let mut window = FetchWindow::new(3);
        let start = Instant::now();

        assert!(window.try_acquire(start));
        assert!(window.try_acquire(start + Duration::from_secs(1)));
        assert!(window.try_acquire(start + Duration::from_secs(2)));
        assert!(!window.try_acquire(start + Duration::from_secs(3)));
        assert_eq!(window.remaining(start + Duration::from_secs(3)), 0);
    }

    #[test]
    fn test_slots_free_up_as_window_rolls() {
        let mut window = FetchWindow::new(2);
        let start = Instant::now();

        assert!(window.try_acquire(start));
        assert!(window.try_acquire(start + Duration::from_secs(30)));
        assert!(!window.try_acquire(start + Duration::from_secs(59)));

        // The first fetch leaves the window at exactly 60s.
        assert!(window.try_acquire(start + FETCH_WINDOW));
        assert!(!window.try_acquire(start + Duration::from_secs(61)));
        assert!(window.try_acquire(start + Duration::from_secs(90)));
    }

    #[test]
    fn test_refusals_do_not_consume_slots() {
        let mut window = FetchWindow::with_window(1, Duration::from_millis(100));
        let start = Instant::now();

        assert!(window.try_acquire(start));
        for i in 1..10 {
            assert!(!window.try_acquire(start + Duration::from_millis(i * 5)));
        }
        assert!(window.try_acquire(start + Duration::from_millis(100)));
    }

    #[test]
    fn test_remaining_and_limit() {
        let mut window = FetchWindow::new(10);
        let start = Instant::now();

        assert_eq!(window.limit(), 10);
        assert_eq!(window.remaining(start), 10);
        window.try_acquire(start);
        window.try_acquire(start);
        assert_eq!(window.remaining(start), 8);
        assert_eq!(window.remaining(start + FETCH_WINDOW), 10);
    }

    #[test]
    fn test_large_limit_does_not_preallocate() {
        let mut window = FetchWindow::new(u32::MAX);
        let start = Instant::now();

        assert!(window.try_acquire(start));
        assert_eq!(window.remaining(start), u32::MAX - 1);
    }

    #[test]
    fn test_window_goes_idle_after_last_fetch_expires() {
        let mut window = FetchWindow::new(5);
        let start = Instant::now();

        assert!(window.is_idle(start));
        window.try_acquire(start);
        assert!(!window.is_idle(start + Duration::from_secs(59)));
        assert!(window.is_idle(start + FETCH_WINDOW));
    }
}
