//! Unguarded counter, kept for contrast
//!
//! Each step is a load followed by a separate store, the same shape as
//! `cats_alive += 1` on a shared global with no lock. Two threads can load
//! the same value and both store `value + 1`, losing an update. The atomics
//! only keep the program free of undefined behaviour; they do not make the
//! step atomic.

use std::sync::atomic::{AtomicI64, Ordering};
use std::thread;
use std::time::Duration;

/// Counter whose read-modify-write can interleave
#[derive(Debug, Default)]
pub struct RacyCounter {
    value: AtomicI64,
}

impl RacyCounter {
    /// Create a counter at zero
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one, racily
    #[inline]
    pub fn increment(&self) {
        self.step(1, Duration::ZERO);
    }

    /// Subtract one, racily
    #[inline]
    pub fn decrement(&self) {
        self.step(-1, Duration::ZERO);
    }

    /// Current value
    #[inline]
    #[must_use]
    pub fn read(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Load, wait `dwell`, then store `loaded + delta`
    ///
    /// A zero dwell still yields between the load and the store.
    pub fn step(&self, delta: i64, dwell: Duration) {
        let loaded = self.value.load(Ordering::SeqCst);
        pause(dwell);
        self.value.store(loaded.wrapping_add(delta), Ordering::SeqCst);
    }
}

pub(crate) fn pause(dwell: Duration) {
    if dwell.is_zero() {
        thread::yield_now();
    } else {
        thread::sleep(dwell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_thread_is_exact() {
        let counter = RacyCounter::new();
        counter.increment();
        counter.increment();
        counter.decrement();
        assert_eq!(counter.read(), 1);
    }

    #[test]
    fn dwell_step_applies_delta() {
        let counter = RacyCounter::new();
        counter.step(5, Duration::from_micros(10));
        assert_eq!(counter.read(), 5);
    }
}
