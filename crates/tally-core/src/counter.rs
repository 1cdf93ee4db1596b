//! Blocking guarded counter
//!
//! One `parking_lot` mutex owns the value. There is no way to reach the
//! value without going through the guard, so a caller cannot forget to lock
//! or lock the wrong thing.

use crate::config::CounterConfig;
use crate::error::CounterError;
use crate::section::CriticalSection;
use crate::state::{CounterState, CounterStats, WaitStats};
use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;

/// Shared integer with race-free increment, decrement and read
///
/// Share it by reference or through an `Arc`. The counter is deliberately
/// not `Clone`: a clone would carry its own guard and silently stop
/// coordinating with the original.
///
/// # Characteristics
/// - Every read-modify-write runs inside one critical section
/// - No fairness between waiters
/// - Not reentrant: do not call the counter from inside [`Self::with_lock`]
#[derive(Debug, Default)]
pub struct GuardedCounter {
    state: Mutex<CounterState>,
    config: CounterConfig,
    waits: WaitStats,
}

impl GuardedCounter {
    /// Create a counter at zero with default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counter at zero with the given configuration
    #[must_use]
    pub fn with_config(config: CounterConfig) -> Self {
        Self {
            state: Mutex::new(CounterState::default()),
            config,
            waits: WaitStats::default(),
        }
    }

    /// Add one
    ///
    /// Blocks until the guard is free.
    ///
    /// # Errors
    /// `CounterError::Overflow` at `i64::MAX` under the default policy.
    #[inline]
    pub fn increment(&self) -> Result<(), CounterError> {
        self.add(1).map(drop)
    }

    /// Subtract one
    ///
    /// # Errors
    /// `CounterError::Overflow` at `i64::MIN` under the default policy.
    #[inline]
    pub fn decrement(&self) -> Result<(), CounterError> {
        self.add(-1).map(drop)
    }

    /// Add `delta` and return the value it produced
    ///
    /// # Errors
    /// `CounterError::Overflow` when the policy rejects the step; nothing is written.
    pub fn add(&self, delta: i64) -> Result<i64, CounterError> {
        let mut state = self.acquire();
        state.step(delta, self.config.overflow, &self.config.label)
    }

    /// Value at the instant the guard was held
    ///
    /// The result may already be stale when it is returned.
    #[must_use]
    pub fn read(&self) -> i64 {
        self.acquire().value
    }

    /// Whether the most recent read saw zero
    ///
    /// This is a convenience over [`Self::read`]; it is not atomic with
    /// whatever the caller does next. Use [`Self::when_zero`] to act on the
    /// answer.
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.read() == 0
    }

    /// Run `f` inside a single critical section
    ///
    /// Any sequence of checks and mutations performed through the section
    /// is atomic with respect to every other caller. Mutations made before
    /// a panic in `f` are kept.
    pub fn with_lock<R>(&self, f: impl FnOnce(&mut CriticalSection<'_>) -> R) -> R {
        let mut state = self.acquire();
        let mut section = CriticalSection::new(&mut *state, self.config.overflow, &self.config.label);
        f(&mut section)
    }

    /// Run `act` only if the value is zero, holding the guard for both
    ///
    /// Returns `None` without calling `act` when the value is non-zero.
    pub fn when_zero<R>(&self, act: impl FnOnce(&mut CriticalSection<'_>) -> R) -> Option<R> {
        self.with_lock(|section| section.is_zero().then(|| act(section)))
    }

    /// [`Self::increment`] with a bounded wait
    ///
    /// # Errors
    /// `CounterError::LockTimeout` if the guard stays held for `timeout`;
    /// the value is not touched. Overflow as for `increment`.
    #[inline]
    pub fn try_increment_for(&self, timeout: Duration) -> Result<(), CounterError> {
        self.try_add_for(1, timeout).map(drop)
    }

    /// [`Self::decrement`] with a bounded wait
    ///
    /// # Errors
    /// See [`Self::try_increment_for`].
    #[inline]
    pub fn try_decrement_for(&self, timeout: Duration) -> Result<(), CounterError> {
        self.try_add_for(-1, timeout).map(drop)
    }

    /// [`Self::add`] with a bounded wait
    ///
    /// # Errors
    /// See [`Self::try_increment_for`].
    pub fn try_add_for(&self, delta: i64, timeout: Duration) -> Result<i64, CounterError> {
        let mut state = self.acquire_for(timeout)?;
        state.step(delta, self.config.overflow, &self.config.label)
    }

    /// [`Self::read`] with a bounded wait
    ///
    /// # Errors
    /// `CounterError::LockTimeout` if the guard stays held for `timeout`.
    pub fn try_read_for(&self, timeout: Duration) -> Result<i64, CounterError> {
        Ok(self.acquire_for(timeout)?.value)
    }

    /// [`Self::with_lock`] with a bounded wait
    ///
    /// # Errors
    /// `CounterError::LockTimeout` if the guard stays held for `timeout`;
    /// `f` is not called.
    pub fn try_with_lock_for<R>(
        &self,
        timeout: Duration,
        f: impl FnOnce(&mut CriticalSection<'_>) -> R,
    ) -> Result<R, CounterError> {
        let mut state = self.acquire_for(timeout)?;
        let mut section = CriticalSection::new(&mut *state, self.config.overflow, &self.config.label);
        Ok(f(&mut section))
    }

    /// Snapshot of operation statistics
    #[must_use]
    pub fn stats(&self) -> CounterStats {
        let state = self.state.lock();
        self.waits.snapshot(&state)
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    /// Consume the counter and return its final value
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> i64 {
        self.state.into_inner().value
    }

    fn acquire(&self) -> MutexGuard<'_, CounterState> {
        if let Some(guard) = self.state.try_lock() {
            return guard;
        }
        self.waits.record_contended();
        tracing::trace!(counter = %self.config.label, "waiting for guard");
        self.state.lock()
    }

    fn acquire_for(&self, timeout: Duration) -> Result<MutexGuard<'_, CounterState>, CounterError> {
        if let Some(guard) = self.state.try_lock() {
            return Ok(guard);
        }
        self.waits.record_contended();
        self.state.try_lock_for(timeout).ok_or_else(|| {
            self.waits.record_timeout();
            tracing::warn!(counter = %self.config.label, ?timeout, "guard not acquired in time");
            CounterError::LockTimeout { waited: timeout }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::OverflowPolicy;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn fresh_counter_reads_zero() {
        let counter = GuardedCounter::new();
        assert_eq!(counter.read(), 0);
        assert!(counter.is_zero());
    }

    #[test]
    fn sequential_operations() {
        let counter = GuardedCounter::new();
        counter.increment().unwrap();
        counter.increment().unwrap();
        counter.decrement().unwrap();
        assert_eq!(counter.read(), 1);
    }

    #[test]
    fn values_may_go_negative() {
        let counter = GuardedCounter::new();
        counter.decrement().unwrap();
        counter.decrement().unwrap();
        assert_eq!(counter.read(), -2);
        assert_eq!(counter.add(5), Ok(3));
    }

    #[test]
    fn rejected_overflow_does_not_mutate() {
        let counter = GuardedCounter::new();
        counter.add(i64::MAX).unwrap();

        let err = counter.increment().unwrap_err();
        assert_eq!(
            err,
            CounterError::Overflow {
                value: i64::MAX,
                delta: 1
            }
        );
        assert_eq!(counter.read(), i64::MAX);
        assert_eq!(counter.stats().rejected, 1);
    }

    #[test]
    fn wrap_policy_wraps() {
        let counter =
            GuardedCounter::with_config(CounterConfig::new().with_overflow(OverflowPolicy::Wrap));
        counter.add(i64::MAX).unwrap();
        counter.increment().unwrap();
        assert_eq!(counter.read(), i64::MIN);
    }

    #[test]
    fn saturate_policy_clamps() {
        let counter = GuardedCounter::with_config(
            CounterConfig::new().with_overflow(OverflowPolicy::Saturate),
        );
        counter.add(i64::MIN).unwrap();
        counter.decrement().unwrap();
        assert_eq!(counter.read(), i64::MIN);
    }

    #[test]
    fn when_zero_acts_only_on_zero() {
        let counter = GuardedCounter::new();
        assert_eq!(counter.when_zero(|_| "fed"), Some("fed"));

        counter.increment().unwrap();
        assert_eq!(counter.when_zero(|_| "fed"), None);
    }

    #[test]
    fn with_lock_sees_its_own_writes() {
        let counter = GuardedCounter::new();
        let seen = counter.with_lock(|section| {
            section.increment().unwrap();
            section.increment().unwrap();
            section.decrement().unwrap();
            section.value()
        });
        assert_eq!(seen, 1);
        assert_eq!(counter.read(), 1);
    }

    #[test]
    fn timeout_while_held_leaves_value() {
        let owned = GuardedCounter::new();
        let counter = &owned;
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        thread::scope(|scope| {
            scope.spawn(move || {
                counter.with_lock(|_| {
                    held_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                });
            });

            held_rx.recv().unwrap();
            let err = counter
                .try_increment_for(Duration::from_millis(20))
                .unwrap_err();
            assert!(matches!(err, CounterError::LockTimeout { .. }));
            assert!(counter
                .try_with_lock_for(Duration::from_millis(1), |_| ())
                .is_err());
            release_tx.send(()).unwrap();
        });

        assert_eq!(counter.read(), 0);
        let stats = counter.stats();
        assert_eq!(stats.timeouts, 2);
        assert!(stats.contended >= 2);
        assert_eq!(stats.increments, 0);
    }

    #[test]
    fn bounded_variants_succeed_when_free() {
        let counter = GuardedCounter::new();
        let wait = Duration::from_millis(10);
        counter.try_increment_for(wait).unwrap();
        counter.try_increment_for(wait).unwrap();
        counter.try_decrement_for(wait).unwrap();
        assert_eq!(counter.try_add_for(3, wait), Ok(4));
        assert_eq!(counter.try_read_for(wait), Ok(4));
        assert_eq!(counter.try_with_lock_for(wait, |s| s.value()), Ok(4));
    }

    #[test]
    fn stats_count_mutations() {
        let counter = GuardedCounter::new();
        counter.increment().unwrap();
        counter.increment().unwrap();
        counter.decrement().unwrap();
        let stats = counter.stats();
        assert_eq!(stats.increments, 2);
        assert_eq!(stats.decrements, 1);
        assert_eq!(stats.mutations(), 3);
    }

    #[test]
    fn into_inner_returns_final_value() {
        let counter = GuardedCounter::new();
        counter.add(41).unwrap();
        counter.increment().unwrap();
        assert_eq!(counter.into_inner(), 42);
    }
}
