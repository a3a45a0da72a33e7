//! Time source shared by every time-dependent decision (cache expiry, proof validity).
//!
//! One clock instance is threaded through the whole service so a batch never sees two
//! different notions of "now".

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, never moving backwards.
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall-clock anchored at construction and advanced by a monotonic `Instant`.
#[derive(Debug)]
pub struct SystemClock {
    anchor_secs: u64,
    anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        let anchor_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self { anchor_secs, anchor: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        self.anchor_secs + self.anchor.elapsed().as_secs()
    }
}

/// Manually driven clock.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self { secs: AtomicU64::new(start) }
    }

    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, secs: u64) {
        self.secs.fetch_max(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_forward() {
        let clock = ManualClock::new(100);
        clock.advance(5);
        clock.set(50);
        assert_eq!(clock.now(), 105);
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(a > 1_600_000_000);
    }
}
