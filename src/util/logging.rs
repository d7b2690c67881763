//! Tracing subscriber setup.

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the filter passed to [`init_tracing`].
pub const LOG_ENV: &str = "HYDROGENT_LOG";

/// Install a global `fmt` subscriber filtered by `filter` (e.g. `"hydrogent=debug"`).
///
/// Returns `false` if a global subscriber is already set.
pub fn init_tracing(filter: &str) -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true));

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
