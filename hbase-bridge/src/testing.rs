//! In-memory managed runtime for exercising the bridge without a JVM.
//!
//! `FakeRuntime` hands out numbered local references and counts every
//! acquire and release, so tests can assert that a call left nothing behind.
//! Its static methods mirror the JSON the Java `HBaseBridge` class produces
//! over a small in-memory table store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::entry::{EntryPoint, BRIDGE_CLASS, STRING_CLASS, SYSTEM_CLASS};
use crate::error::{BridgeError, Result};
use crate::managed::{Arg, Fault, LaunchOptions, Launcher, ManagedEnv, ManagedRuntime, Ret};
use crate::model::Families;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Object {
    Class(String),
    Str(String),
}

/// Scripted misbehaviour of one static method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Raise an exception with this message.
    Throw(String),
    /// Return the managed null.
    ReturnNull,
    /// Return `false` from a boolean method.
    ReturnFalse,
    /// Behave as if the class lacks the method.
    Missing,
}

/// A recorded static call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    Str(Option<String>),
    Int(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub args: Vec<CallArg>,
}

#[derive(Default)]
struct Store {
    connection: Option<(String, String)>,
    tables: BTreeMap<String, BTreeMap<String, Families>>,
}

/// Shared state behind a fake runtime and every env attached to it.
pub struct FakeState {
    objects: Mutex<HashMap<u32, Object>>,
    next_ref: AtomicU32,
    acquired: AtomicUsize,
    bad_releases: AtomicUsize,
    pending: Mutex<Option<String>>,
    classes: Mutex<HashSet<String>>,
    properties: Mutex<HashMap<String, String>>,
    store: Mutex<Store>,
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<HashMap<&'static str, Failure>>,
    attached: Mutex<HashSet<ThreadId>>,
}

impl Default for FakeState {
    fn default() -> Self {
        let classes = [STRING_CLASS, SYSTEM_CLASS, BRIDGE_CLASS]
            .into_iter()
            .map(String::from)
            .collect();
        Self {
            objects: Mutex::new(HashMap::new()),
            next_ref: AtomicU32::new(1),
            acquired: AtomicUsize::new(0),
            bad_releases: AtomicUsize::new(0),
            pending: Mutex::new(None),
            classes: Mutex::new(classes),
            properties: Mutex::new(HashMap::new()),
            store: Mutex::new(Store::default()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            attached: Mutex::new(HashSet::new()),
        }
    }
}

impl FakeState {
    /// Local references acquired and not yet released.
    pub fn live_refs(&self) -> usize {
        self.objects.lock().len()
    }

    /// Total local references ever handed out.
    pub fn acquired_refs(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Releases of references that were not live.
    pub fn bad_releases(&self) -> usize {
        self.bad_releases.load(Ordering::SeqCst)
    }

    pub fn exception_pending(&self) -> bool {
        self.pending.lock().is_some()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn last_call(&self, method: &str) -> Option<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|c| c.method == method)
            .cloned()
    }

    pub fn remove_class(&self, name: &str) {
        self.classes.lock().remove(name);
    }

    pub fn fail(&self, method: &'static str, failure: Failure) {
        self.failures.lock().insert(method, failure);
    }

    pub fn property(&self, name: &str) -> Option<String> {
        self.properties.lock().get(name).cloned()
    }

    pub fn set_property(&self, name: &str, value: &str) {
        self.properties
            .lock()
            .insert(name.to_string(), value.to_string());
    }

    pub fn connection(&self) -> Option<(String, String)> {
        self.store.lock().connection.clone()
    }

    pub fn create_table(&self, name: &str) {
        self.store.lock().tables.entry(name.to_string()).or_default();
    }

    pub fn put_cell(&self, table: &str, row: &str, family: &str, qualifier: &str, value: &str) {
        self.store
            .lock()
            .tables
            .entry(table.to_string())
            .or_default()
            .entry(row.to_string())
            .or_default()
            .entry(family.to_string())
            .or_default()
            .insert(qualifier.to_string(), value.to_string());
    }

    pub fn cell(&self, table: &str, row: &str, family: &str, qualifier: &str) -> Option<String> {
        self.store
            .lock()
            .tables
            .get(table)?
            .get(row)?
            .get(family)?
            .get(qualifier)
            .cloned()
    }

    pub fn attached_threads(&self) -> usize {
        self.attached.lock().len()
    }

    fn alloc(&self, object: Object) -> u32 {
        let id = self.next_ref.fetch_add(1, Ordering::SeqCst);
        self.objects.lock().insert(id, object);
        self.acquired.fetch_add(1, Ordering::SeqCst);
        id
    }

    fn throw(&self, description: impl Into<String>) -> Fault {
        *self.pending.lock() = Some(description.into());
        Fault::Exception
    }

    fn string_arg(&self, arg: Option<&Arg<u32>>) -> Result<Option<String>, Fault> {
        match arg {
            Some(Arg::Object(None)) => Ok(None),
            Some(Arg::Object(Some(id))) => match self.objects.lock().get(id) {
                Some(Object::Str(s)) => Ok(Some(s.clone())),
                Some(other) => Err(Fault::Failed(format!("expected string, got {other:?}"))),
                None => Err(Fault::Failed(format!("stale reference {id}"))),
            },
            Some(Arg::Int(_)) => Err(Fault::Failed("expected object, got int".into())),
            None => Err(Fault::Failed("missing argument".into())),
        }
    }

    fn record(&self, entry: &EntryPoint, args: &[Arg<u32>]) -> Result<Vec<CallArg>, Fault> {
        let mut recorded = Vec::with_capacity(args.len());
        for arg in args {
            recorded.push(match arg {
                Arg::Int(i) => CallArg::Int(*i),
                other => CallArg::Str(self.string_arg(Some(other))?),
            });
        }
        self.calls.lock().push(RecordedCall {
            method: entry.name,
            args: recorded.clone(),
        });
        Ok(recorded)
    }

    fn string_ret(&self, value: String) -> Ret<u32> {
        Ret::Object(Some(self.alloc(Object::Str(value))))
    }

    fn dispatch(&self, entry: &EntryPoint, args: Vec<CallArg>) -> Result<Ret<u32>, Fault> {
        let text = |i: usize| match args.get(i) {
            Some(CallArg::Str(s)) => s.clone(),
            _ => None,
        };
        match (entry.class, entry.name) {
            (SYSTEM_CLASS, "getProperty") => {
                let name = text(0).ok_or_else(|| self.throw("java.lang.NullPointerException: key"))?;
                Ok(match self.property(&name) {
                    Some(value) => self.string_ret(value),
                    None => Ret::Object(None),
                })
            }
            (SYSTEM_CLASS, "setProperty") => {
                let name = text(0).ok_or_else(|| self.throw("java.lang.NullPointerException: key"))?;
                let value = text(1).ok_or_else(|| self.throw("java.lang.NullPointerException: value"))?;
                let previous = self.properties.lock().insert(name, value);
                Ok(match previous {
                    Some(value) => self.string_ret(value),
                    None => Ret::Object(None),
                })
            }
            (BRIDGE_CLASS, "connect") => {
                let (Some(quorum), Some(znode)) = (text(0), text(1)) else {
                    return Err(self.throw("java.lang.NullPointerException"));
                };
                self.store.lock().connection = Some((quorum, znode));
                Ok(Ret::Boolean(true))
            }
            (BRIDGE_CLASS, "disconnect") => {
                self.store.lock().connection = None;
                Ok(Ret::Void)
            }
            (BRIDGE_CLASS, "listTables") => {
                let store = self.store.lock();
                if store.connection.is_none() {
                    return Err(self.throw("java.lang.NullPointerException: admin"));
                }
                let names: Vec<&String> = store.tables.keys().collect();
                let json = json!(names).to_string();
                drop(store);
                Ok(self.string_ret(json))
            }
            (BRIDGE_CLASS, "getTableData") => {
                let limit = match args.get(3) {
                    Some(CallArg::Int(limit)) => *limit,
                    _ => return Err(Fault::Failed("limit must be an int".into())),
                };
                let json = self.scan(text(0), text(1), text(2), limit, text(4))?;
                Ok(self.string_ret(json))
            }
            (BRIDGE_CLASS, "executeCommand") => {
                let json = self.execute(text(0), text(1), text(2), text(3), text(4), text(5))?;
                Ok(self.string_ret(json))
            }
            _ => Err(Fault::Unresolved(format!("{}.{}", entry.class, entry.name))),
        }
    }

    fn scan(
        &self,
        table: Option<String>,
        start: Option<String>,
        end: Option<String>,
        limit: i32,
        prefix: Option<String>,
    ) -> Result<String, Fault> {
        let store = self.store.lock();
        if store.connection.is_none() {
            return Err(self.throw("java.lang.NullPointerException: connection"));
        }
        let table = table.ok_or_else(|| self.throw("java.lang.NullPointerException: table"))?;
        let Some(rows) = store.tables.get(&table) else {
            return Ok("[]".to_string());
        };
        let non_empty = |s: &Option<String>| s.clone().filter(|s| !s.is_empty());
        let (start, end, prefix) = (non_empty(&start), non_empty(&end), non_empty(&prefix));
        let limit = usize::try_from(limit).unwrap_or(0).max(1);
        let encoded: Vec<Value> = rows
            .iter()
            .filter(|(key, _)| start.as_ref().is_none_or(|s| key.as_str() >= s.as_str()))
            .filter(|(key, _)| end.as_ref().is_none_or(|e| key.as_str() < e.as_str()))
            .filter(|(key, _)| prefix.as_ref().is_none_or(|p| key.starts_with(p.as_str())))
            .take(limit)
            .map(|(key, families)| json!({ "row": key, "families": families }))
            .collect();
        Ok(Value::Array(encoded).to_string())
    }

    fn execute(
        &self,
        table: Option<String>,
        command: Option<String>,
        row: Option<String>,
        family: Option<String>,
        qualifier: Option<String>,
        value: Option<String>,
    ) -> Result<String, Fault> {
        let mut store = self.store.lock();
        if store.connection.is_none() {
            return Err(self.throw("java.lang.NullPointerException: connection"));
        }
        let table = table.ok_or_else(|| self.throw("java.lang.NullPointerException: table"))?;
        let command = command.ok_or_else(|| self.throw("java.lang.NullPointerException: command"))?;
        let Some(rows) = store.tables.get_mut(&table) else {
            let message = format!("org.apache.hadoop.hbase.TableNotFoundException: {table}");
            return Ok(json!({ "status": "error", "message": message }).to_string());
        };
        let family = family.filter(|f| !f.is_empty());
        let qualifier = qualifier.filter(|q| !q.is_empty());
        let result = match command.to_lowercase().as_str() {
            "get" => {
                let row = row.ok_or_else(|| self.throw("java.lang.NullPointerException: row"))?;
                let mut families = rows.get(&row).cloned().unwrap_or_default();
                if let Some(family) = &family {
                    families.retain(|f, _| f == family);
                    if let Some(qualifier) = &qualifier {
                        for cells in families.values_mut() {
                            cells.retain(|q, _| q == qualifier);
                        }
                    }
                }
                families.retain(|_, cells| !cells.is_empty());
                if families.is_empty() {
                    json!({})
                } else {
                    json!({ "data": { "row": row, "families": families } })
                }
            }
            "put" => {
                let row = row.ok_or_else(|| self.throw("java.lang.NullPointerException: row"))?;
                match (family, qualifier, value) {
                    (Some(family), Some(qualifier), Some(value)) => {
                        rows.entry(row)
                            .or_default()
                            .entry(family)
                            .or_default()
                            .insert(qualifier, value);
                        json!({ "status": "success" })
                    }
                    _ => json!({
                        "status": "error",
                        "message": "Missing required parameters for put operation",
                    }),
                }
            }
            "delete" => {
                let row = row.ok_or_else(|| self.throw("java.lang.NullPointerException: row"))?;
                match (family, qualifier) {
                    (None, _) => {
                        rows.remove(&row);
                    }
                    (Some(family), None) => {
                        if let Some(families) = rows.get_mut(&row) {
                            families.remove(&family);
                        }
                    }
                    (Some(family), Some(qualifier)) => {
                        if let Some(cells) = rows.get_mut(&row).and_then(|f| f.get_mut(&family)) {
                            cells.remove(&qualifier);
                        }
                    }
                }
                json!({ "status": "success" })
            }
            _ => json!({
                "status": "error",
                "message": format!("Unsupported command: {command}"),
            }),
        };
        Ok(result.to_string())
    }
}

/// A fake runtime; cloning shares the same state.
#[derive(Clone, Default)]
pub struct FakeRuntime {
    state: Arc<FakeState>,
}

impl FakeRuntime {
    pub fn state(&self) -> &Arc<FakeState> {
        &self.state
    }
}

impl ManagedRuntime for FakeRuntime {
    type Env<'a>
        = FakeEnv
    where
        Self: 'a;

    fn attach(&self) -> Result<FakeEnv> {
        self.state.attached.lock().insert(std::thread::current().id());
        Ok(FakeEnv {
            state: Arc::clone(&self.state),
        })
    }
}

pub struct FakeEnv {
    state: Arc<FakeState>,
}

impl ManagedEnv for FakeEnv {
    type Ref = u32;

    fn find_class(&mut self, name: &str) -> Result<u32, Fault> {
        if !self.state.classes.lock().contains(name) {
            return Err(self
                .state
                .throw(format!("java.lang.NoClassDefFoundError: {name}")));
        }
        Ok(self.state.alloc(Object::Class(name.to_string())))
    }

    fn new_string(&mut self, value: &str) -> Result<u32, Fault> {
        Ok(self.state.alloc(Object::Str(value.to_string())))
    }

    fn call_static(
        &mut self,
        class: u32,
        entry: &EntryPoint,
        args: &[Arg<u32>],
    ) -> Result<Ret<u32>, Fault> {
        match self.state.objects.lock().get(&class) {
            Some(Object::Class(name)) if name == entry.class => {}
            _ => {
                return Err(Fault::Unresolved(format!(
                    "{}.{}{}",
                    entry.class, entry.name, entry.signature
                )))
            }
        }
        let failure = self.state.failures.lock().get(entry.name).cloned();
        if failure == Some(Failure::Missing) {
            return Err(Fault::Unresolved(format!("{}{}", entry.name, entry.signature)));
        }
        let recorded = self.state.record(entry, args)?;
        match failure {
            Some(Failure::Throw(message)) => Err(self.state.throw(message)),
            Some(Failure::ReturnNull) => Ok(Ret::Object(None)),
            Some(Failure::ReturnFalse) => Ok(Ret::Boolean(false)),
            Some(Failure::Missing) | None => self.state.dispatch(entry, recorded),
        }
    }

    fn read_string(&mut self, string: u32) -> Result<String, Fault> {
        match self.state.objects.lock().get(&string) {
            Some(Object::Str(s)) => Ok(s.clone()),
            other => Err(Fault::Failed(format!("not a string: {other:?}"))),
        }
    }

    fn take_exception(&mut self) -> Option<String> {
        self.state.pending.lock().take()
    }

    fn release(&mut self, local: u32) {
        if self.state.objects.lock().remove(&local).is_none() {
            self.state.bad_releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Launcher over [`FakeRuntime`] that counts constructions.
pub struct FakeLauncher {
    runtime: FakeRuntime,
    preexisting: bool,
    launch_error: Option<String>,
    launch_delay: Duration,
    launches: AtomicUsize,
    last_options: Mutex<Option<LaunchOptions>>,
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self {
            runtime: FakeRuntime::default(),
            preexisting: false,
            launch_error: None,
            launch_delay: Duration::ZERO,
            launches: AtomicUsize::new(0),
            last_options: Mutex::new(None),
        }
    }
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the host process already runs a runtime.
    pub fn with_existing_runtime(mut self) -> Self {
        self.preexisting = true;
        self
    }

    pub fn failing_launch(mut self, message: impl Into<String>) -> Self {
        self.launch_error = Some(message.into());
        self
    }

    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    pub fn state(&self) -> &Arc<FakeState> {
        self.runtime.state()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn last_options(&self) -> Option<LaunchOptions> {
        self.last_options.lock().clone()
    }
}

impl Launcher for FakeLauncher {
    type Runtime = FakeRuntime;

    fn existing(&self, _libjvm: Option<&std::path::Path>) -> Result<Option<FakeRuntime>> {
        Ok(self.preexisting.then(|| self.runtime.clone()))
    }

    fn launch(&self, options: &LaunchOptions) -> Result<FakeRuntime> {
        if !self.launch_delay.is_zero() {
            std::thread::sleep(self.launch_delay);
        }
        self.launches.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(options.clone());
        match &self.launch_error {
            Some(message) => Err(BridgeError::Launch(message.clone())),
            None => Ok(self.runtime.clone()),
        }
    }
}
