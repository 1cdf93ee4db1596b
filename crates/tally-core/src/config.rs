//! Counter configuration

use crate::policy::OverflowPolicy;
use serde::{Deserialize, Serialize};

/// Configuration shared by [`crate::GuardedCounter`] and [`crate::AsyncGuardedCounter`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Name used in tracing output
    pub label: String,
    /// Behaviour at the edges of the `i64` range
    pub overflow: OverflowPolicy,
}

impl CounterConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With tracing label
    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// With overflow policy
    #[inline]
    #[must_use]
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            label: "counter".to_string(),
            overflow: OverflowPolicy::Reject,
        }
    }
}
