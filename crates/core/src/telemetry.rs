//! Tracing initialization shared by the gateway binary and tests.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "template_gateway=debug,template_gateway_core=debug,actix_web=info";

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG` when set; otherwise enables debug logging for the
/// gateway crates. Safe to call once per process; later calls are ignored.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
