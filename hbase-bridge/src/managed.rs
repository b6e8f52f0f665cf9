//! Seam between the bridge facade and an embedded managed runtime.
//!
//! The JNI backend lives in [`crate::jvm`]; an in-memory double lives in
//! [`crate::testing`]. Neither the facade nor [`crate::scope::CallScope`]
//! know which one they drive.

use std::path::PathBuf;

use crate::entry::EntryPoint;
use crate::error::Result;

/// A failed primitive operation on a [`ManagedEnv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The runtime raised an exception; it is still pending.
    Exception,
    /// A class or method could not be found.
    Unresolved(String),
    /// Any other runtime-level failure.
    Failed(String),
}

/// One argument of a static call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arg<R> {
    /// An object reference, or the managed null.
    Object(Option<R>),
    Int(i32),
}

/// The value a static call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ret<R> {
    Void,
    Boolean(bool),
    Object(Option<R>),
}

/// Per-thread view of a runtime: the primitives every call is built from.
///
/// References returned by `find_class`, `new_string` and object-returning
/// `call_static` are local references owned by the caller, who must hand each
/// one back to `release` exactly once.
pub trait ManagedEnv {
    type Ref: Copy + std::fmt::Debug;

    fn find_class(&mut self, name: &str) -> Result<Self::Ref, Fault>;

    fn new_string(&mut self, value: &str) -> Result<Self::Ref, Fault>;

    fn call_static(
        &mut self,
        class: Self::Ref,
        entry: &EntryPoint,
        args: &[Arg<Self::Ref>],
    ) -> Result<Ret<Self::Ref>, Fault>;

    /// Copy a managed string into an owned Rust string.
    fn read_string(&mut self, string: Self::Ref) -> Result<String, Fault>;

    /// Describe and clear a pending exception, if any.
    fn take_exception(&mut self) -> Option<String>;

    fn release(&mut self, local: Self::Ref);
}

/// A live runtime instance shared by every thread of the process.
pub trait ManagedRuntime: Send + Sync + 'static {
    type Env<'a>: ManagedEnv
    where
        Self: 'a;

    /// Bind the calling thread (if not already bound) and return its env.
    fn attach(&self) -> Result<Self::Env<'_>>;
}

/// Options the runtime is constructed with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub options: Vec<String>,
    /// Explicit path to the runtime's shared library.
    pub libjvm: Option<PathBuf>,
}

/// Creates or adopts the runtime.
pub trait Launcher: Send + Sync {
    type Runtime: ManagedRuntime;

    /// A runtime the hosting process already started, if any.
    fn existing(&self, libjvm: Option<&std::path::Path>) -> Result<Option<Self::Runtime>>;

    fn launch(&self, options: &LaunchOptions) -> Result<Self::Runtime>;
}
