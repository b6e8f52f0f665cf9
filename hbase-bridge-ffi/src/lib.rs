//! C ABI bridge between the HBase GUI desktop shell and the embedded JVM.
//!
//! Exposes an `extern "C"` surface that the shell loads through its FFI layer.
//! Every call goes to one process-wide [`Bridge`] over the real JVM; failures
//! come back as `false` / null, with details in a per-thread last-error slot.

pub mod bridge;
pub mod error;
pub mod logging;

use hbase_bridge::{Bridge, BridgeConfig, JvmLauncher};
use once_cell::sync::Lazy;

/// The process's bridge. Building it only reads configuration; the JVM starts
/// on the first `hbase_bridge_initialize` or `hbase_bridge_connect`.
pub(crate) static BRIDGE: Lazy<Bridge<JvmLauncher>> = Lazy::new(|| {
    logging::init();
    Bridge::new(JvmLauncher, BridgeConfig::load())
});
