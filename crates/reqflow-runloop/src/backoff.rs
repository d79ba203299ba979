//! Idle backoff for empty queue reads.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Doubling sleep between `min` and `max`, reset as soon as work shows up.
#[derive(Debug, Clone)]
pub struct IdleBackoff {
    min: Duration,
    max: Duration,
    current: Duration,
}

impl IdleBackoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        let max = max.max(min);
        Self {
            min,
            max,
            current: min,
        }
    }

    /// The sleep to take now. The next one doubles, capped at `max`.
    pub fn next_sleep(&mut self) -> Duration {
        let sleep = self.current;
        self.current = (self.current * 2).min(self.max);
        sleep
    }

    /// Back to the floor after a non-empty read.
    pub fn reset(&mut self) {
        self.current = self.min;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

/// Sleep for `duration` unless `token` fires first. Returns whether it fired.
pub async fn pause(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = token.cancelled() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_up_to_ceiling() {
        let mut backoff = IdleBackoff::new(Duration::from_secs(2), Duration::from_secs(20));
        let sleeps: Vec<u64> = (0..6).map(|_| backoff.next_sleep().as_secs()).collect();
        assert_eq!(sleeps, vec![2, 4, 8, 16, 20, 20]);
    }

    #[test]
    fn test_reset_returns_to_floor() {
        let mut backoff = IdleBackoff::new(Duration::from_secs(2), Duration::from_secs(20));
        backoff.next_sleep();
        backoff.next_sleep();
        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_returns_early_on_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(pause(Duration::from_secs(3600), &token).await);
        assert!(!pause(Duration::from_millis(10), &CancellationToken::new()).await);
    }

    #[test]
    fn test_max_below_min_is_raised() {
        let mut backoff = IdleBackoff::new(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(backoff.next_sleep(), Duration::from_secs(5));
        assert_eq!(backoff.next_sleep(), Duration::from_secs(5));
    }
}
