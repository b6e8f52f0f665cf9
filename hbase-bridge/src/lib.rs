//! Lifecycle manager and call facade for an embedded JVM hosting the HBase
//! GUI's Java bridge (`com.hbasegui.bridge.HBaseBridge`).
//!
//! [`Bridge`] owns at most one runtime, built on first use by a [`Launcher`]
//! and shared by every thread. Each call binds the calling thread, resolves
//! a static [`entry::EntryPoint`], and releases every local reference it
//! acquired before returning.
//!
//! ```no_run
//! use hbase_bridge::{Bridge, BridgeConfig, JvmLauncher, ScanRequest};
//!
//! let bridge = Bridge::new(JvmLauncher, BridgeConfig::load());
//! bridge.connect("zk1:2181,zk2:2181", "/hbase")?;
//! for row in bridge.scan_rows(&ScanRequest::new("users", 10))? {
//!     println!("{}", row.row);
//! }
//! bridge.disconnect();
//! # Ok::<(), hbase_bridge::BridgeError>(())
//! ```

pub mod bridge;
pub mod config;
pub mod entry;
pub mod error;
pub mod lifecycle;
pub mod managed;
pub mod model;
pub mod scope;

#[cfg(feature = "jvm")]
pub mod jvm;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use bridge::Bridge;
pub use config::BridgeConfig;
pub use error::{BridgeError, ErrorKind};
pub use managed::{Launcher, ManagedEnv, ManagedRuntime};
pub use model::{CommandKind, CommandOutcome, CommandRequest, ScanRequest, TableRow};

#[cfg(feature = "jvm")]
pub use jvm::JvmLauncher;
