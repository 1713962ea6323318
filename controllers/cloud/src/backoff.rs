//! # Fibonacci Backoff
//!
//! Retry delays for reconcile passes that could not record their outcome (status
//! write conflicts, cancelled passes, unreachable API server). The delay grows as a
//! Fibonacci sequence, which stays short for the first few retries and reaches the
//! cap after about ten failures.
//!
//! Default sequence in seconds: 5, 5, 10, 15, 25, 40, 65, 105, 170, 275, 300, 300, ...

use std::time::Duration;

const DEFAULT_FLOOR: Duration = Duration::from_secs(5);
const DEFAULT_CEILING: Duration = Duration::from_secs(300);

/// Per-object retry delay, advanced on every failed pass
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    floor: Duration,
    ceiling: Duration,
    previous: Duration,
    current: Duration,
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::bounded(DEFAULT_FLOOR, DEFAULT_CEILING)
    }
}

impl FibonacciBackoff {
    /// Sequence starting at `floor` (used twice) and never exceeding `ceiling`
    #[must_use]
    pub fn bounded(floor: Duration, ceiling: Duration) -> Self {
        Self {
            floor,
            ceiling,
            previous: Duration::ZERO,
            current: floor.min(ceiling),
        }
    }

    /// Delay for this failure; the following call returns the next term
    pub fn next_backoff(&mut self) -> Duration {
        let wait = self.current;
        let next = self.previous.saturating_add(self.current).min(self.ceiling);
        self.previous = self.current;
        self.current = next;
        wait
    }

    /// Start over from the floor after a pass succeeds
    pub fn reset(&mut self) {
        self.previous = Duration::ZERO;
        self.current = self.floor.min(self.ceiling);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(backoff: &mut FibonacciBackoff, count: usize) -> Vec<u64> {
        (0..count).map(|_| backoff.next_backoff().as_secs()).collect()
    }

    #[test]
    fn test_default_sequence_reaches_five_minutes() {
        let mut backoff = FibonacciBackoff::default();
        assert_eq!(
            seconds(&mut backoff, 12),
            vec![5, 5, 10, 15, 25, 40, 65, 105, 170, 275, 300, 300]
        );
    }

    #[test]
    fn test_ceiling_holds() {
        let mut backoff = FibonacciBackoff::bounded(Duration::from_secs(5), Duration::from_secs(30));
        assert_eq!(seconds(&mut backoff, 7), vec![5, 5, 10, 15, 25, 30, 30]);
    }

    #[test]
    fn test_reset_starts_over() {
        let mut backoff = FibonacciBackoff::default();
        seconds(&mut backoff, 6);

        backoff.reset();
        assert_eq!(seconds(&mut backoff, 3), vec![5, 5, 10]);
    }
}
