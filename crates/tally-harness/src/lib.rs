//! Tally Harness
//!
//! Tools for showing that a guarded counter keeps its promises, and that
//! an unguarded one does not.
//!
//! # Core Concepts
//!
//! - [`RacyCounter`]: read-modify-write without a guard (lost updates on purpose)
//! - [`OverlapProbe`]: detects two threads inside the same region at once
//! - [`SharedCounter`]: seam the simulator drives, implemented by both counters
//! - [`run_simulator`]: seeded random operation mix with post-run checks
//! - [`run_stress`] / [`run_async_stress`]: N x M increments, timed
//! - [`run_probe`]: one instrumented increment per thread
//!
//! # Example
//!
//! ```rust,ignore
//! use tally_harness::{run_simulator, CounterMode, SimulatorConfig};
//!
//! let config = SimulatorConfig::default().with_mode(CounterMode::Unguarded);
//! let report = run_simulator(&config)?;
//! assert!(!report.passed());
//! println!("{}", report.generate_text());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod probe;
mod racy;
mod simulator;
mod stress;
mod target;

// Re-exports
pub use error::HarnessError;
pub use probe::{OverlapProbe, ProbeGuard};
pub use racy::RacyCounter;
pub use simulator::{
    run_simulator, CounterMode, SimulatedOperation, SimulatorConfig, SimulatorReport,
    SimulatorStats, Violation,
};
pub use stress::{run_async_stress, run_probe, run_stress, ProbeReport, StressReport};
pub use target::{FeedOutcome, SharedCounter};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
