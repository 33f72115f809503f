//! Log setup for the `autoseccomp` binary.
//!
//! `trace` prints its syscall list and `trace-run` its verdict on stdout, and
//! both are commonly piped into other tools. Every log line therefore goes to
//! stderr, in either text or JSON form.

use tracing::{debug, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` when set and valid, else everything at `level` and above.
fn filter_for(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber, logging to stderr.
///
/// `--verbose` maps to `Level::DEBUG`, `--json` to `json = true`. A second
/// call keeps the subscriber that is already installed.
pub fn init_tracing(json: bool, level: Level) {
    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter_for(level));

    let installed = if json {
        registry.with(stderr_layer.json()).try_init()
    } else {
        registry.with(stderr_layer).try_init()
    };
    if installed.is_err() {
        debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }
}
