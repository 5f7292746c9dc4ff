//! Exponential reconnect backoff

use std::time::Duration;

/// Delay after the first failed attempt
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Growth factor between consecutive failures
const BACKOFF_FACTOR: u32 = 2;

/// Delay schedule for connection attempts
///
/// The first attempt after construction or [`Backoff::reset`] is immediate.
/// Each following delay doubles, starting at [`INITIAL_BACKOFF`], and never
/// exceeds the configured ceiling.
#[derive(Debug, Clone)]
pub struct Backoff {
    max: Duration,
    next: Duration,
}

impl Backoff {
    pub fn new(max: Duration) -> Self {
        Self {
            max,
            next: Duration::ZERO,
        }
    }

    /// Delay to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = if delay.is_zero() {
            INITIAL_BACKOFF.min(self.max)
        } else {
            delay.saturating_mul(BACKOFF_FACTOR).min(self.max)
        };
        delay
    }

    /// Return to an immediate first attempt after a successful connect.
    pub fn reset(&mut self) {
        self.next = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt_is_immediate() {
        let mut backoff = Backoff::new(Duration::from_secs(300));
        assert_eq!(backoff.next_delay(), Duration::ZERO);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
    }

    #[test]
    fn test_delays_are_monotonic_and_capped() {
        let max = Duration::from_secs(5);
        let mut backoff = Backoff::new(max);

        let mut previous = Duration::ZERO;
        for _ in 0..64 {
            let delay = backoff.next_delay();
            assert!(delay >= previous);
            assert!(delay <= max);
            previous = delay;
        }
        assert_eq!(previous, max);
    }

    #[test]
    fn test_reset_restarts_schedule() {
        let mut backoff = Backoff::new(Duration::from_secs(300));
        for _ in 0..10 {
            backoff.next_delay();
        }

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::ZERO);
        assert_eq!(backoff.next_delay(), INITIAL_BACKOFF);
    }

    #[test]
    fn test_ceiling_below_initial_delay() {
        let mut backoff = Backoff::new(Duration::from_millis(50));
        backoff.next_delay();
        assert_eq!(backoff.next_delay(), Duration::from_millis(50));
        assert_eq!(backoff.next_delay(), Duration::from_millis(50));
    }
}
