//! Tally CLI support
//!
//! Configuration loading and logging setup for the `tally` binary.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config;
mod logging;

pub use config::{load_config, ConfigError, FileConfig, SimulateOverrides};
pub use logging::init_logging;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
