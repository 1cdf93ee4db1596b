//! Guarded state and statistics

use crate::error::CounterError;
use crate::policy::OverflowPolicy;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Everything that lives inside the guard
#[derive(Debug, Default)]
pub(crate) struct CounterState {
    pub(crate) value: i64,
    increments: u64,
    decrements: u64,
    rejected: u64,
}

impl CounterState {
    /// Apply one step; the value is only written when the policy accepts it
    pub(crate) fn step(
        &mut self,
        delta: i64,
        policy: OverflowPolicy,
        label: &str,
    ) -> Result<i64, CounterError> {
        match policy.apply(self.value, delta) {
            Ok(next) => {
                self.value = next;
                if delta > 0 {
                    self.increments += 1;
                } else if delta < 0 {
                    self.decrements += 1;
                }
                Ok(next)
            }
            Err(e) => {
                self.rejected += 1;
                tracing::debug!(counter = %label, value = self.value, delta, "step rejected");
                Err(e)
            }
        }
    }
}

/// Counters kept outside the guard, touched while waiting for it
#[derive(Debug, Default)]
pub(crate) struct WaitStats {
    contended: AtomicU64,
    timeouts: AtomicU64,
}

impl WaitStats {
    pub(crate) fn record_contended(&self) {
        self.contended.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, state: &CounterState) -> CounterStats {
        CounterStats {
            increments: state.increments,
            decrements: state.decrements,
            rejected: state.rejected,
            contended: self.contended.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }
}

/// Operation statistics for a counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterStats {
    /// Successful steps with a positive delta
    pub increments: u64,
    /// Successful steps with a negative delta
    pub decrements: u64,
    /// Steps refused by [`OverflowPolicy::Reject`]
    pub rejected: u64,
    /// Acquisitions that found the guard held and had to wait
    pub contended: u64,
    /// Bounded waits that expired
    pub timeouts: u64,
}

impl CounterStats {
    /// Total successful mutations
    #[inline]
    #[must_use]
    pub fn mutations(&self) -> u64 {
        self.increments + self.decrements
    }
}
