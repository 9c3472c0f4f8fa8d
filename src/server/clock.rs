// ABOUTME: Server-side clock
// ABOUTME: Wall-clock timestamps for protocol messages plus process uptime

use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Clock for protocol timestamps and uptime reporting
///
/// Protocol timestamps are Unix epoch milliseconds so listeners can compare
/// them against their own wall clocks; uptime is measured against a monotonic
/// start instant.
#[derive(Debug)]
pub struct RelayClock {
    /// When the relay was created
    started: Instant,
}

impl RelayClock {
    /// Create a new clock starting now
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Current wall-clock time in Unix epoch milliseconds
    #[inline]
    pub fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    /// Seconds elapsed since the relay was created
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

impl Default for RelayClock {
    fn default() -> Self {
        Self::new()
    }
}
