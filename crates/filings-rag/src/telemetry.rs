//! Tracing subscriber setup for processes embedding the library

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_DIRECTIVES: &str = "filings_rag=info";

/// Install a formatted subscriber filtered by `RUST_LOG`
///
/// Falls back to `default_directives` (or [`DEFAULT_DIRECTIVES`]) when
/// the environment does not set a filter. Returns false if a global
/// subscriber was already installed.
pub fn init_tracing(default_directives: Option<&str>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directives.unwrap_or(DEFAULT_DIRECTIVES).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}
