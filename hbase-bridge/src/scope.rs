//! Scoped local-reference management for a single bridge call.

use crate::entry::EntryPoint;
use crate::error::{BridgeError, Result};
use crate::managed::{Arg, Fault, ManagedEnv, Ret};

/// Tracks every local reference acquired during one call and releases them
/// all, newest first, when dropped.
pub struct CallScope<'e, E: ManagedEnv> {
    env: &'e mut E,
    held: Vec<E::Ref>,
    call: String,
}

impl<'e, E: ManagedEnv> CallScope<'e, E> {
    pub fn new(env: &'e mut E, call: impl Into<String>) -> Self {
        Self {
            env,
            held: Vec::new(),
            call: call.into(),
        }
    }

    fn hold(&mut self, local: E::Ref) -> E::Ref {
        self.held.push(local);
        local
    }

    /// Turn a fault into a bridge error, clearing any pending exception so
    /// the thread can keep using the runtime.
    fn fail(&mut self, fault: Fault, what: &str) -> BridgeError {
        let pending = self.env.take_exception();
        match fault {
            Fault::Unresolved(name) => BridgeError::Unresolved { what: name },
            Fault::Exception => BridgeError::ManagedException {
                call: self.call.clone(),
                description: pending.unwrap_or_else(|| format!("exception during {what}")),
            },
            Fault::Failed(reason) => match pending {
                Some(description) => BridgeError::ManagedException {
                    call: self.call.clone(),
                    description,
                },
                None => BridgeError::Transfer(format!("{what}: {reason}")),
            },
        }
    }

    pub fn class(&mut self, name: &str) -> Result<E::Ref> {
        match self.env.find_class(name) {
            Ok(class) => Ok(self.hold(class)),
            Err(Fault::Exception) => {
                let pending = self.env.take_exception();
                tracing::debug!(class = name, ?pending, "class lookup raised");
                Err(BridgeError::Unresolved {
                    what: format!("class {name}"),
                })
            }
            Err(fault) => Err(self.fail(fault, "class lookup")),
        }
    }

    pub fn string(&mut self, value: &str) -> Result<E::Ref> {
        match self.env.new_string(value) {
            Ok(string) => Ok(self.hold(string)),
            Err(fault) => Err(self.fail(fault, "string conversion")),
        }
    }

    /// A string argument that is the managed null when `value` is `None`.
    pub fn optional_string(&mut self, value: Option<&str>) -> Result<Arg<E::Ref>> {
        match value {
            Some(value) => Ok(Arg::Object(Some(self.string(value)?))),
            None => Ok(Arg::Object(None)),
        }
    }

    /// Invoke a static method and check for a pending exception right after.
    pub fn invoke(
        &mut self,
        class: E::Ref,
        entry: &EntryPoint,
        args: &[Arg<E::Ref>],
    ) -> Result<Ret<E::Ref>> {
        let ret = match self.env.call_static(class, entry, args) {
            Ok(ret) => ret,
            Err(Fault::Unresolved(name)) => {
                self.env.take_exception();
                return Err(BridgeError::Unresolved {
                    what: format!("method {} {} ({name})", entry.label(), entry.signature),
                });
            }
            Err(fault) => return Err(self.fail(fault, "call")),
        };
        if let Ret::Object(Some(object)) = ret {
            self.hold(object);
        }
        if let Some(description) = self.env.take_exception() {
            return Err(BridgeError::ManagedException {
                call: self.call.clone(),
                description,
            });
        }
        Ok(ret)
    }

    /// Invoke a string-returning method and copy the result out.
    pub fn invoke_string(
        &mut self,
        class: E::Ref,
        entry: &EntryPoint,
        args: &[Arg<E::Ref>],
    ) -> Result<String> {
        match self.invoke(class, entry, args)? {
            Ret::Object(Some(string)) => self.read(string),
            Ret::Object(None) => Err(BridgeError::NullResult {
                call: self.call.clone(),
            }),
            other => Err(BridgeError::Transfer(format!(
                "{} returned {other:?}, expected a string",
                entry.label()
            ))),
        }
    }

    /// Like [`Self::invoke_string`] but a managed null is `None`.
    pub fn invoke_optional_string(
        &mut self,
        class: E::Ref,
        entry: &EntryPoint,
        args: &[Arg<E::Ref>],
    ) -> Result<Option<String>> {
        match self.invoke_string(class, entry, args) {
            Ok(value) => Ok(Some(value)),
            Err(BridgeError::NullResult { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn invoke_bool(
        &mut self,
        class: E::Ref,
        entry: &EntryPoint,
        args: &[Arg<E::Ref>],
    ) -> Result<bool> {
        match self.invoke(class, entry, args)? {
            Ret::Boolean(value) => Ok(value),
            other => Err(BridgeError::Transfer(format!(
                "{} returned {other:?}, expected a boolean",
                entry.label()
            ))),
        }
    }

    pub fn read(&mut self, string: E::Ref) -> Result<String> {
        self.env
            .read_string(string)
            .map_err(|fault| self.fail(fault, "string copy"))
    }
}

impl<E: ManagedEnv> Drop for CallScope<'_, E> {
    fn drop(&mut self) {
        while let Some(local) = self.held.pop() {
            self.env.release(local);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{self, BRIDGE_CLASS, STRING_CLASS};
    use crate::testing::FakeRuntime;
    use crate::managed::ManagedRuntime;

    #[test]
    fn test_scope_releases_on_success() {
        let runtime = FakeRuntime::default();
        {
            let mut env = runtime.attach().unwrap();
            let mut scope = CallScope::new(&mut env, "test");
            scope.class(STRING_CLASS).unwrap();
            scope.string("hello").unwrap();
            assert_eq!(runtime.state().live_refs(), 2);
        }
        assert_eq!(runtime.state().live_refs(), 0);
        assert_eq!(runtime.state().bad_releases(), 0);
    }

    #[test]
    fn test_scope_releases_on_error_path() {
        let runtime = FakeRuntime::default();
        {
            let mut env = runtime.attach().unwrap();
            let mut scope = CallScope::new(&mut env, "test");
            scope.string("first").unwrap();
            let err = scope.class("com/example/Missing").unwrap_err();
            assert!(matches!(err, BridgeError::Unresolved { .. }));
        }
        assert_eq!(runtime.state().live_refs(), 0);
        assert!(!runtime.state().exception_pending());
    }

    #[test]
    fn test_optional_string_none_is_null() {
        let runtime = FakeRuntime::default();
        let mut env = runtime.attach().unwrap();
        let mut scope = CallScope::new(&mut env, "test");
        assert_eq!(scope.optional_string(None).unwrap(), Arg::Object(None));
    }

    #[test]
    fn test_unknown_method_is_unresolved() {
        let runtime = FakeRuntime::default();
        let mut env = runtime.attach().unwrap();
        let mut scope = CallScope::new(&mut env, "test");
        let class = scope.class(STRING_CLASS).unwrap();
        let err = scope.invoke(class, &entry::LIST_TABLES, &[]).unwrap_err();
        assert!(matches!(err, BridgeError::Unresolved { .. }), "{err}");
    }

    #[test]
    fn test_return_shape_mismatch_is_transfer_error() {
        let runtime = FakeRuntime::default();
        {
            let mut env = runtime.attach().unwrap();
            let mut scope = CallScope::new(&mut env, "test");
            let class = scope.class(BRIDGE_CLASS).unwrap();
            let args = [
                Arg::Object(Some(scope.string("zk1:2181").unwrap())),
                Arg::Object(Some(scope.string("/hbase").unwrap())),
            ];
            let err = scope.invoke_string(class, &entry::CONNECT, &args).unwrap_err();
            match err {
                BridgeError::Transfer(message) => {
                    assert!(message.contains("Boolean(true)"), "{message}")
                }
                other => panic!("unexpected: {other}"),
            }
        }
        assert_eq!(runtime.state().live_refs(), 0);
    }
}
