//! Overflow handling for counter steps

use crate::error::CounterError;
use serde::{Deserialize, Serialize};

/// What happens when a step would leave the `i64` range
///
/// Negative values are ordinary counter values; only the edges of `i64`
/// are governed by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Fail with [`CounterError::Overflow`] and leave the value untouched
    #[default]
    Reject,
    /// Two's complement wraparound
    Wrap,
    /// Clamp at `i64::MIN` / `i64::MAX`
    Saturate,
}

impl OverflowPolicy {
    /// Compute `value + delta` under this policy
    ///
    /// # Errors
    /// `CounterError::Overflow` when the policy is `Reject` and the sum
    /// does not fit in an `i64`.
    #[inline]
    pub fn apply(self, value: i64, delta: i64) -> Result<i64, CounterError> {
        match self {
            Self::Reject => value
                .checked_add(delta)
                .ok_or(CounterError::Overflow { value, delta }),
            Self::Wrap => Ok(value.wrapping_add(delta)),
            Self::Saturate => Ok(value.saturating_add(delta)),
        }
    }

    /// Policy name as used in configuration files
    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Reject => "reject",
            Self::Wrap => "wrap",
            Self::Saturate => "saturate",
        }
    }
}
