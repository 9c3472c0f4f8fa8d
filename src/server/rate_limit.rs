// ABOUTME: Payload rate limiter
// ABOUTME: Minimum inter-frame interval gate on the audio hot path

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Default minimum interval between forwarded payload frames
pub const DEFAULT_MIN_FRAME_INTERVAL_MS: u64 = 10;

/// Pure throttle on source payload frames
///
/// Excess frames are dropped, never queued or delayed. The state is global:
/// there is only one source at a time, and switching sources does not reset
/// the timer early.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_forwarded: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Create a limiter with the given minimum inter-frame interval
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_forwarded: Mutex::new(None),
        }
    }

    /// Decide whether a frame arriving at `now` may be forwarded
    ///
    /// Returns true and records `now` if at least the minimum interval has
    /// elapsed since the last forwarded frame; otherwise returns false and
    /// leaves the state untouched.
    pub fn allow(&self, now: Instant) -> bool {
        let mut last = self.last_forwarded.lock();
        match *last {
            Some(prev) if now.duration_since(prev) < self.min_interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// The configured minimum inter-frame interval
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_MIN_FRAME_INTERVAL_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_allowed() {
        let limiter = RateLimiter::default();
        assert!(limiter.allow(Instant::now()));
    }

    #[test]
    fn test_frame_inside_interval_dropped() {
        let limiter = RateLimiter::new(Duration::from_millis(10));
        let t0 = Instant::now();

        assert!(limiter.allow(t0));
        assert!(!limiter.allow(t0 + Duration::from_millis(5)));
        assert!(limiter.allow(t0 + Duration::from_millis(10)));
    }

    #[test]
    fn test_denied_frame_does_not_reset_timer() {
        let limiter = RateLimiter::new(Duration::from_millis(10));
        let t0 = Instant::now();

        assert!(limiter.allow(t0));
        // Denied at t0+8; the interval still counts from t0, so t0+12 passes
        assert!(!limiter.allow(t0 + Duration::from_millis(8)));
        assert!(limiter.allow(t0 + Duration::from_millis(12)));
    }

    #[test]
    fn test_burst_thins_to_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(10));
        let t0 = Instant::now();

        let forwarded = (0..50)
            .filter(|i| limiter.allow(t0 + Duration::from_millis(i * 2)))
            .count();
        // 2ms spacing over 98ms: frames at 0, 10, 20, ... 90
        assert_eq!(forwarded, 10);
    }
}
