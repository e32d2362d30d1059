//! Structured logging setup (C10, ambient): a `tracing_subscriber::fmt`
//! subscriber installed once at process start, honoring `RUST_LOG`.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global tracing subscriber. `default_filter` is used when
/// `RUST_LOG` isn't set in the environment.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
