//! Error types for guarded counters

use std::time::Duration;

/// Errors surfaced by counter operations
///
/// A failed operation never mutates the counter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CounterError {
    /// A bounded wait for the guard expired before it was acquired
    #[error("lock not acquired within {waited:?}")]
    LockTimeout {
        /// How long the caller was willing to wait
        waited: Duration,
    },

    /// The step would leave the `i64` range under [`crate::OverflowPolicy::Reject`]
    #[error("adding {delta} to {value} overflows")]
    Overflow {
        /// Value before the rejected step
        value: i64,
        /// Requested step
        delta: i64,
    },
}

impl CounterError {
    /// Check if the caller may simply try again
    ///
    /// Only timeouts are transient; an overflow will overflow again.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_retryable() {
        let err = CounterError::LockTimeout {
            waited: Duration::from_millis(5),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn overflow_is_not_retryable() {
        let err = CounterError::Overflow {
            value: i64::MAX,
            delta: 1,
        };
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            format!("adding 1 to {} overflows", i64::MAX)
        );
    }
}
