#![forbid(unsafe_code)]

//! Tracing subscriber setup.
//!
//! Logs go to stderr so stdout stays free for command replies. The filter
//! comes from `ALLOT_LOG`, then `RUST_LOG`, then [`DEFAULT_FILTER`].

use tracing_subscriber::EnvFilter;

/// Filter used when neither `ALLOT_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "warn,allot_runtime=info";

/// Build the filter from the environment.
#[must_use]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("ALLOT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init(json: bool) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(true);
    let installed = if json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    if installed {
        tracing::debug!(json, "logging initialised");
    }
    installed
}
