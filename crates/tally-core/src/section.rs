//! Critical section view for composite operations

use crate::error::CounterError;
use crate::policy::OverflowPolicy;
use crate::state::CounterState;

/// Access to the counter while its guard is held
///
/// Handed to [`crate::GuardedCounter::with_lock`] and friends. Every call on
/// a section happens inside one critical section, so a check followed by an
/// action cannot be interleaved with another caller.
///
/// The section borrows the guarded state; it cannot escape the closure.
#[derive(Debug)]
pub struct CriticalSection<'a> {
    state: &'a mut CounterState,
    policy: OverflowPolicy,
    label: &'a str,
}

impl<'a> CriticalSection<'a> {
    pub(crate) fn new(state: &'a mut CounterState, policy: OverflowPolicy, label: &'a str) -> Self {
        Self {
            state,
            policy,
            label,
        }
    }

    /// Current value
    #[inline]
    #[must_use]
    pub fn value(&self) -> i64 {
        self.state.value
    }

    /// Whether the current value is zero
    ///
    /// Unlike [`crate::GuardedCounter::is_zero`], the answer stays true for
    /// the rest of this section unless the section itself changes it.
    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.state.value == 0
    }

    /// Add one
    ///
    /// # Errors
    /// `CounterError::Overflow` under [`OverflowPolicy::Reject`].
    #[inline]
    pub fn increment(&mut self) -> Result<(), CounterError> {
        self.add(1).map(drop)
    }

    /// Subtract one
    ///
    /// # Errors
    /// `CounterError::Overflow` under [`OverflowPolicy::Reject`].
    #[inline]
    pub fn decrement(&mut self) -> Result<(), CounterError> {
        self.add(-1).map(drop)
    }

    /// Add `delta` and return the new value
    ///
    /// # Errors
    /// `CounterError::Overflow` under [`OverflowPolicy::Reject`]; the value
    /// is left as it was.
    #[inline]
    pub fn add(&mut self, delta: i64) -> Result<i64, CounterError> {
        self.state.step(delta, self.policy, self.label)
    }
}
