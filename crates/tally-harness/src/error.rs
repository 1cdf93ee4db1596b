//! Error types for harness runs

use tally_core::CounterError;

/// Errors that abort a harness run
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Run parameters make no sense
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A counter operation failed
    #[error("counter error: {0}")]
    Counter(#[from] CounterError),

    /// A worker thread or task panicked
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
}

impl HarnessError {
    /// Create invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
