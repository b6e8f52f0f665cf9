//! stderr logging for hosts that don't install a `tracing` subscriber.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Filter directives, e.g. `hbase_bridge=debug`.
pub const ENV_LOG: &str = "HBASE_BRIDGE_LOG";
/// Set to `1` for JSON log lines.
pub const ENV_LOG_JSON: &str = "HBASE_BRIDGE_LOG_JSON";

const DEFAULT_FILTER: &str = "hbase_bridge=info,hbase_bridge_ffi=info";

static INIT: Once = Once::new();

/// Install the stderr subscriber once. A subscriber the host already set
/// stays in place.
pub fn init() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let json = std::env::var(ENV_LOG_JSON).unwrap_or_default() == "1";
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);
        let installed = if json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        if installed.is_err() {
            tracing::debug!("keeping the host's tracing subscriber");
        }
    });
}
