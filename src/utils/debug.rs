//! Logging setup.

use tracing_subscriber::EnvFilter;

/// Environment variable for debug mode.
pub const FILEBOX_DEBUG_ENV: &str = "FILEBOX_DEBUG";

/// Directives used when `RUST_LOG` is not set.
fn default_directives(debug: bool) -> &'static str {
    if debug {
        "filebox=debug,hyper=info,warn"
    } else {
        "filebox=info,warn"
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when present; otherwise `-d` or FILEBOX_DEBUG switch the
/// crate to debug level.
pub fn init_debug_logging(force_debug: bool) {
    let debug = force_debug || std::env::var_os(FILEBOX_DEBUG_ENV).is_some();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .try_init()
        .ok();
}
