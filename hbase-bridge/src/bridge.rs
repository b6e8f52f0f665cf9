//! `Bridge`: the synchronous facade over the embedded JVM.
//!
//! Every call runs to completion on the caller's thread. The thread is bound
//! to the runtime first, then all local references the call acquires live in
//! a [`CallScope`] that releases them on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{BridgeConfig, IDENTITY_VAR};
use crate::entry::{
    self, BRIDGE_CLASS, CONNECT, DISCONNECT, EXECUTE_COMMAND, GET_TABLE_DATA, LIST_TABLES,
    STRING_CLASS, SYSTEM_CLASS,
};
use crate::error::{BridgeError, Result};
use crate::lifecycle::RuntimeSlot;
use crate::managed::{Arg, Launcher, ManagedRuntime};
use crate::model::{self, CommandOutcome, CommandRequest, ScanRequest, TableRow};
use crate::scope::CallScope;

pub struct Bridge<L: Launcher> {
    launcher: L,
    config: BridgeConfig,
    runtime: RuntimeSlot<L::Runtime>,
    connected: AtomicBool,
}

impl<L: Launcher> Bridge<L> {
    pub fn new(launcher: L, config: BridgeConfig) -> Self {
        Self {
            launcher,
            config,
            runtime: RuntimeSlot::default(),
            connected: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.is_initialized()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    // ─── Lifecycle ───────────────────────────────────────────────────

    /// Start or adopt the JVM and bind the calling thread to it.
    ///
    /// Safe to call repeatedly and from several threads; the runtime is built
    /// once. After a failure the next call starts over.
    pub fn initialize(&self) -> Result<()> {
        let runtime = self.runtime.get_or_try_init(|| self.start_runtime())?;
        runtime.attach()?;
        Ok(())
    }

    fn start_runtime(&self) -> Result<L::Runtime> {
        export_identity(&self.config.identity);

        if let Some(runtime) = self.launcher.existing(self.config.libjvm.as_deref())? {
            tracing::info!("adopting the JVM already running in this process");
            runtime.attach()?;
            return Ok(runtime);
        }

        let archive = self.config.locate_archive()?;
        let options = self.config.launch_options(&archive);
        tracing::info!(
            archive = %archive.display(),
            identity = %self.config.identity,
            options = options.options.len(),
            "starting JVM"
        );
        let runtime = self.launcher.launch(&options)?;
        if let Err(e) = verify(&runtime, &self.config.identity) {
            tracing::error!("JVM started but is not usable: {e}");
            return Err(e);
        }
        tracing::info!("JVM ready");
        Ok(runtime)
    }

    fn live_runtime(&self) -> Result<Arc<L::Runtime>> {
        self.runtime.get().ok_or(BridgeError::NotInitialized)
    }

    fn connected_runtime(&self) -> Result<Arc<L::Runtime>> {
        let runtime = self.live_runtime()?;
        if !self.is_connected() {
            return Err(BridgeError::NotConnected);
        }
        Ok(runtime)
    }

    // ─── Connect / Disconnect ────────────────────────────────────────

    /// Open the HBase connection, initializing the JVM first if needed.
    ///
    /// Any failure leaves the bridge disconnected, including on a reconnect.
    pub fn connect(&self, quorum: &str, znode: &str) -> Result<()> {
        let opened = self.open_connection(quorum, znode);
        self.connected.store(opened.is_ok(), Ordering::Release);
        opened?;
        tracing::info!(quorum, znode, "connected to HBase");
        Ok(())
    }

    fn open_connection(&self, quorum: &str, znode: &str) -> Result<()> {
        let runtime = match self.runtime.get() {
            Some(runtime) => runtime,
            None => {
                tracing::info!("JVM not initialized, initializing before connect");
                self.initialize()?;
                self.live_runtime()?
            }
        };

        let mut env = runtime.attach()?;
        let mut scope = CallScope::new(&mut env, CONNECT.label());
        let class = scope.class(BRIDGE_CLASS)?;
        let quorum_arg = scope.string(quorum)?;
        let znode_arg = scope.string(znode)?;
        let args = [Arg::Object(Some(quorum_arg)), Arg::Object(Some(znode_arg))];
        if !scope.invoke_bool(class, &CONNECT, &args)? {
            return Err(BridgeError::Rejected {
                call: CONNECT.label(),
            });
        }
        Ok(())
    }

    /// Close the HBase connection. Best effort: failures are logged only.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        let Some(runtime) = self.runtime.get() else {
            tracing::debug!("disconnect: JVM not running, nothing to do");
            return;
        };
        match call_disconnect(runtime.as_ref()) {
            Ok(()) => tracing::info!("disconnected from HBase"),
            Err(e) => tracing::warn!("disconnect failed: {e}"),
        }
    }

    // ─── Data ────────────────────────────────────────────────────────

    /// Table names as a JSON array.
    pub fn list_tables(&self) -> Result<String> {
        let runtime = self.connected_runtime()?;
        let mut env = runtime.attach()?;
        let mut scope = CallScope::new(&mut env, LIST_TABLES.label());
        let class = scope.class(BRIDGE_CLASS)?;
        scope.invoke_string(class, &LIST_TABLES, &[])
    }

    /// Up to `request.limit` rows as a JSON array of
    /// `{"row": .., "families": {family: {qualifier: value}}}`.
    pub fn get_table_data(&self, request: &ScanRequest) -> Result<String> {
        request.validate()?;
        let runtime = self.connected_runtime()?;
        let mut env = runtime.attach()?;
        let mut scope = CallScope::new(&mut env, GET_TABLE_DATA.label());
        let class = scope.class(BRIDGE_CLASS)?;
        let args = [
            Arg::Object(Some(scope.string(&request.table)?)),
            scope.optional_string(request.start_row.as_deref())?,
            scope.optional_string(request.end_row.as_deref())?,
            Arg::Int(request.limit),
            scope.optional_string(request.prefix.as_deref())?,
        ];
        scope.invoke_string(class, &GET_TABLE_DATA, &args)
    }

    /// Run a single-row command; returns the Java side's JSON result.
    pub fn execute_command(&self, request: &CommandRequest) -> Result<String> {
        let runtime = self.connected_runtime()?;
        let mut env = runtime.attach()?;
        let mut scope = CallScope::new(&mut env, EXECUTE_COMMAND.label());
        let class = scope.class(BRIDGE_CLASS)?;
        let args = [
            Arg::Object(Some(scope.string(&request.table)?)),
            Arg::Object(Some(scope.string(&request.command)?)),
            scope.optional_string(request.row_key.as_deref())?,
            scope.optional_string(request.family.as_deref())?,
            scope.optional_string(request.qualifier.as_deref())?,
            scope.optional_string(request.value.as_deref())?,
        ];
        scope.invoke_string(class, &EXECUTE_COMMAND, &args)
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        model::parse_table_names(&self.list_tables()?)
    }

    pub fn scan_rows(&self, request: &ScanRequest) -> Result<Vec<TableRow>> {
        model::parse_rows(&self.get_table_data(request)?)
    }

    pub fn run_command(&self, request: &CommandRequest) -> Result<CommandOutcome> {
        model::parse_outcome(&self.execute_command(request)?)
    }
}

fn call_disconnect<R: ManagedRuntime>(runtime: &R) -> Result<()> {
    let mut env = runtime.attach()?;
    let mut scope = CallScope::new(&mut env, DISCONNECT.label());
    let class = scope.class(BRIDGE_CLASS)?;
    scope.invoke(class, &DISCONNECT, &[])?;
    Ok(())
}

/// Resolve a built-in class and the bridge class, then make sure the JVM
/// carries the identity property.
fn verify<R: ManagedRuntime>(runtime: &R, identity: &str) -> Result<()> {
    let mut env = runtime.attach()?;
    let mut scope = CallScope::new(&mut env, "verify");
    scope.class(STRING_CLASS)?;
    scope.class(BRIDGE_CLASS)?;
    tracing::debug!("{BRIDGE_CLASS} resolved");

    let system = scope.class(SYSTEM_CLASS)?;
    let name = scope.string(IDENTITY_VAR)?;
    let current =
        scope.invoke_optional_string(system, &entry::GET_PROPERTY, &[Arg::Object(Some(name))])?;
    match current {
        Some(value) => tracing::debug!("JVM property {IDENTITY_VAR}={value}"),
        None => {
            let value = scope.string(identity)?;
            let args = [Arg::Object(Some(name)), Arg::Object(Some(value))];
            scope.invoke(system, &entry::SET_PROPERTY, &args)?;
            tracing::info!("set JVM property {IDENTITY_VAR}={identity} after start");
        }
    }
    Ok(())
}

fn export_identity(identity: &str) {
    // SAFETY: requires that no other thread reads or writes the process
    // environment concurrently. The slot lock only serialises bridge callers;
    // a host embedding the library must not touch the environment while the
    // first initialize runs.
    unsafe { std::env::set_var(IDENTITY_VAR, identity) };
    tracing::debug!("exported {IDENTITY_VAR}={identity}");
}
