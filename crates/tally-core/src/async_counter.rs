//! Guarded counter for tokio tasks
//!
//! Same contract as [`crate::GuardedCounter`], but waiting for the guard
//! yields to the runtime instead of parking the thread. Once the guard is
//! held there are no await points, so dropping a pending future (or a
//! bounded wait expiring) can never leave a half-applied step.

use crate::config::CounterConfig;
use crate::error::CounterError;
use crate::section::CriticalSection;
use crate::state::{CounterState, CounterStats, WaitStats};
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

/// Async guarded counter
#[derive(Debug, Default)]
pub struct AsyncGuardedCounter {
    state: Mutex<CounterState>,
    config: CounterConfig,
    waits: WaitStats,
}

impl AsyncGuardedCounter {
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
    /// # Errors
    /// `CounterError::Overflow` under [`crate::OverflowPolicy::Reject`].
    pub async fn increment(&self) -> Result<(), CounterError> {
        self.add(1).await.map(drop)
    }

    /// Subtract one
    ///
    /// # Errors
    /// `CounterError::Overflow` under [`crate::OverflowPolicy::Reject`].
    pub async fn decrement(&self) -> Result<(), CounterError> {
        self.add(-1).await.map(drop)
    }

    /// Add `delta` and return the new value
    ///
    /// # Errors
    /// `CounterError::Overflow` when the policy rejects the step.
    pub async fn add(&self, delta: i64) -> Result<i64, CounterError> {
        let mut state = self.acquire().await;
        state.step(delta, self.config.overflow, &self.config.label)
    }

    /// Value at the instant the guard was held
    pub async fn read(&self) -> i64 {
        self.acquire().await.value
    }

    /// Whether a fresh read saw zero; not atomic with later calls
    pub async fn is_zero(&self) -> bool {
        self.read().await == 0
    }

    /// Run `f` inside a single critical section
    ///
    /// `f` is synchronous on purpose: the guard is never held across an
    /// await point.
    pub async fn with_lock<R>(&self, f: impl FnOnce(&mut CriticalSection<'_>) -> R) -> R {
        let mut state = self.acquire().await;
        let mut section = CriticalSection::new(&mut *state, self.config.overflow, &self.config.label);
        f(&mut section)
    }

    /// Run `act` only if the value is zero, holding the guard for both
    pub async fn when_zero<R>(
        &self,
        act: impl FnOnce(&mut CriticalSection<'_>) -> R,
    ) -> Option<R> {
        self.with_lock(|section| section.is_zero().then(|| act(section)))
            .await
    }

    /// [`Self::increment`] with a bounded wait
    ///
    /// # Errors
    /// `CounterError::LockTimeout` when the guard is not acquired within
    /// `timeout`; nothing is written.
    pub async fn try_increment_for(&self, timeout: Duration) -> Result<(), CounterError> {
        self.try_add_for(1, timeout).await.map(drop)
    }

    /// [`Self::decrement`] with a bounded wait
    ///
    /// # Errors
    /// See [`Self::try_increment_for`].
    pub async fn try_decrement_for(&self, timeout: Duration) -> Result<(), CounterError> {
        self.try_add_for(-1, timeout).await.map(drop)
    }

    /// [`Self::add`] with a bounded wait
    ///
    /// # Errors
    /// See [`Self::try_increment_for`].
    pub async fn try_add_for(&self, delta: i64, timeout: Duration) -> Result<i64, CounterError> {
        let mut state = self.acquire_for(timeout).await?;
        state.step(delta, self.config.overflow, &self.config.label)
    }

    /// [`Self::read`] with a bounded wait
    ///
    /// # Errors
    /// `CounterError::LockTimeout` when the guard is not acquired within `timeout`.
    pub async fn try_read_for(&self, timeout: Duration) -> Result<i64, CounterError> {
        Ok(self.acquire_for(timeout).await?.value)
    }

    /// [`Self::with_lock`] with a bounded wait
    ///
    /// # Errors
    /// `CounterError::LockTimeout`; `f` is not called.
    pub async fn try_with_lock_for<R>(
        &self,
        timeout: Duration,
        f: impl FnOnce(&mut CriticalSection<'_>) -> R,
    ) -> Result<R, CounterError> {
        let mut state = self.acquire_for(timeout).await?;
        let mut section = CriticalSection::new(&mut *state, self.config.overflow, &self.config.label);
        Ok(f(&mut section))
    }

    /// Snapshot of operation statistics
    pub async fn stats(&self) -> CounterStats {
        let state = self.state.lock().await;
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

    async fn acquire(&self) -> MutexGuard<'_, CounterState> {
        if let Ok(guard) = self.state.try_lock() {
            return guard;
        }
        self.waits.record_contended();
        tracing::trace!(counter = %self.config.label, "task waiting for guard");
        self.state.lock().await
    }

    async fn acquire_for(
        &self,
        timeout: Duration,
    ) -> Result<MutexGuard<'_, CounterState>, CounterError> {
        if let Ok(guard) = self.state.try_lock() {
            return Ok(guard);
        }
        self.waits.record_contended();
        match tokio::time::timeout(timeout, self.state.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                self.waits.record_timeout();
                tracing::warn!(counter = %self.config.label, ?timeout, "guard not acquired in time");
                Err(CounterError::LockTimeout { waited: timeout })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn fresh_counter_reads_zero() {
        let counter = AsyncGuardedCounter::new();
        assert_eq!(counter.read().await, 0);
        assert!(counter.is_zero().await);
    }

    #[tokio::test]
    async fn sequential_operations() {
        let counter = AsyncGuardedCounter::new();
        counter.increment().await.unwrap();
        counter.increment().await.unwrap();
        counter.decrement().await.unwrap();
        assert_eq!(counter.read().await, 1);
    }

    #[tokio::test]
    async fn when_zero_is_atomic_check_and_act() {
        let counter = AsyncGuardedCounter::new();
        let fed = counter
            .when_zero(|section| {
                section.increment().unwrap();
                section.value()
            })
            .await;
        assert_eq!(fed, Some(1));
        assert_eq!(counter.when_zero(|_| ()).await, None);
    }

    #[tokio::test]
    async fn timeout_while_held_leaves_value() {
        let counter = Arc::new(AsyncGuardedCounter::new());
        let (held_tx, held_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let holder = {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let _guard = counter.state.lock().await;
                held_tx.send(()).unwrap();
                release_rx.await.unwrap();
            })
        };

        held_rx.await.unwrap();
        let err = counter
            .try_increment_for(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(counter.try_read_for(Duration::from_millis(1)).await.is_err());

        release_tx.send(()).unwrap();
        holder.await.unwrap();

        assert_eq!(counter.read().await, 0);
        let stats = counter.stats().await;
        assert_eq!(stats.timeouts, 2);
        assert_eq!(stats.increments, 0);
    }

    #[tokio::test]
    async fn dropped_wait_performs_no_mutation() {
        let counter = AsyncGuardedCounter::new();
        let guard = counter.state.lock().await;

        let mut pending = Box::pin(counter.increment());
        assert!(poll_once(pending.as_mut()).await.is_none());
        drop(pending);
        drop(guard);

        assert_eq!(counter.read().await, 0);
        assert_eq!(counter.stats().await.increments, 0);
    }

    async fn poll_once<F: std::future::Future + Unpin>(fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            out = fut => Some(out),
            () = std::future::ready(()) => None,
        }
    }
}
