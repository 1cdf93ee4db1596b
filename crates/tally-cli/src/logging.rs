//! Logging setup

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "tally=info,tally_cli=info,tally_core=info,tally_harness=info";

/// Install the global subscriber, writing to stderr
///
/// `RUST_LOG` takes precedence over the default filter. With `json` set,
/// events are emitted as one JSON object per line.
///
/// # Errors
/// If a global subscriber is already installed.
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))
}
