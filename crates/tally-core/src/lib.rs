//! Tally Core
//!
//! Race-free shared counters built on a single mutual-exclusion guard.
//!
//! # Core Concepts
//!
//! - [`GuardedCounter`]: blocking counter, one `parking_lot` mutex owns the value
//! - [`AsyncGuardedCounter`]: the same contract for tokio tasks
//! - [`CriticalSection`]: view handed to composite operations while the guard is held
//! - [`OverflowPolicy`]: what a step past the `i64` range does
//! - [`CounterError`]: lock timeouts and rejected overflow
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//! use tally_core::GuardedCounter;
//!
//! let cats_alive = Arc::new(GuardedCounter::new());
//!
//! let born = {
//!     let cats_alive = Arc::clone(&cats_alive);
//!     thread::spawn(move || cats_alive.increment())
//! };
//! let gone = {
//!     let cats_alive = Arc::clone(&cats_alive);
//!     thread::spawn(move || cats_alive.decrement())
//! };
//! born.join().unwrap().unwrap();
//! gone.join().unwrap().unwrap();
//!
//! // Check and act under one guard.
//! let fed = cats_alive.when_zero(|_| "fed");
//! assert_eq!(fed, Some("fed"));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod async_counter;
mod config;
mod counter;
mod error;
mod policy;
mod section;
mod state;

// Re-exports
pub use async_counter::AsyncGuardedCounter;
pub use config::CounterConfig;
pub use counter::GuardedCounter;
pub use error::CounterError;
pub use policy::OverflowPolicy;
pub use section::CriticalSection;
pub use state::CounterStats;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types
pub mod prelude {
    pub use crate::{
        AsyncGuardedCounter, CounterConfig, CounterError, CounterStats, CriticalSection,
        GuardedCounter, OverflowPolicy,
    };
}
