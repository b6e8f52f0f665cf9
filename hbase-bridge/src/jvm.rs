//! JNI backend: a real JVM through the `jni` crate's invocation API.
//!
//! libjvm is loaded at runtime (explicit path from config, else located via
//! `JAVA_HOME`), so nothing links against it at build time.

use std::path::{Path, PathBuf};
use std::ptr;

use jni::objects::{JClass, JObject, JString, JThrowable};
use jni::signature::{Primitive, ReturnType};
use jni::sys::{jint, jobject, jsize, jvalue, JNI_OK};
use jni::{InitArgsBuilder, JNIEnv, JNIVersion, JavaVM};
use once_cell::sync::OnceCell;

use crate::entry::{EntryPoint, Returns};
use crate::error::{BridgeError, Result};
use crate::managed::{Arg, Fault, LaunchOptions, Launcher, ManagedEnv, ManagedRuntime, Ret};

type GetCreatedJavaVms =
    unsafe extern "system" fn(*mut *mut jni::sys::JavaVM, jsize, *mut jsize) -> jint;

/// libjvm as loaded for probing; stays mapped for the life of the process.
static PROBED_LIBJVM: OnceCell<libloading::Library> = OnceCell::new();

fn libjvm_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let dir = java_locator::locate_jvm_dyn_library()
        .map_err(|e| BridgeError::Launch(format!("cannot locate libjvm: {e}")))?;
    Ok(Path::new(&dir).join(java_locator::get_jvm_dyn_lib_file_name()))
}

fn load_libjvm(path: &Path) -> Result<&'static libloading::Library> {
    PROBED_LIBJVM.get_or_try_init(|| {
        // SAFETY: libjvm has no load-time initializers that depend on us.
        unsafe { libloading::Library::new(path) }
            .map_err(|e| BridgeError::Launch(format!("cannot load {}: {e}", path.display())))
    })
}

/// Starts or adopts the process JVM.
#[derive(Debug, Default, Clone, Copy)]
pub struct JvmLauncher;

impl Launcher for JvmLauncher {
    type Runtime = JvmRuntime;

    fn existing(&self, libjvm: Option<&Path>) -> Result<Option<JvmRuntime>> {
        let library = match libjvm_path(libjvm).and_then(|path| load_libjvm(&path)) {
            Ok(library) => library,
            Err(e) => {
                tracing::debug!("not probing for a running JVM: {e}");
                return Ok(None);
            }
        };

        let mut vm: *mut jni::sys::JavaVM = ptr::null_mut();
        let mut count: jsize = 0;
        // SAFETY: the symbol has the JNI invocation signature and the out
        // pointers are valid for one element.
        let rc = unsafe {
            let get_created: libloading::Symbol<GetCreatedJavaVms> = library
                .get(b"JNI_GetCreatedJavaVMs\0")
                .map_err(|e| BridgeError::Launch(format!("JNI_GetCreatedJavaVMs: {e}")))?;
            get_created(&mut vm, 1, &mut count)
        };
        if rc != JNI_OK || count == 0 || vm.is_null() {
            return Ok(None);
        }

        // SAFETY: `vm` was just returned by JNI_GetCreatedJavaVMs.
        let vm = unsafe { JavaVM::from_raw(vm) }.map_err(|e| BridgeError::Launch(e.to_string()))?;
        Ok(Some(JvmRuntime { vm }))
    }

    fn launch(&self, options: &LaunchOptions) -> Result<JvmRuntime> {
        let mut builder = InitArgsBuilder::new()
            .version(JNIVersion::V8)
            .ignore_unrecognized(true);
        for option in &options.options {
            builder = builder.option(option.as_str());
        }
        let args = builder
            .build()
            .map_err(|e| BridgeError::Launch(format!("invalid JVM options: {e}")))?;

        let libjvm = libjvm_path(options.libjvm.as_deref())?;
        tracing::debug!("creating JVM from {}", libjvm.display());
        let vm = JavaVM::with_libjvm(args, || Ok(libjvm))
            .map_err(|e| BridgeError::Launch(e.to_string()))?;
        Ok(JvmRuntime { vm })
    }
}

pub struct JvmRuntime {
    vm: JavaVM,
}

impl JvmRuntime {
    pub fn vm(&self) -> &JavaVM {
        &self.vm
    }
}

impl ManagedRuntime for JvmRuntime {
    type Env<'a>
        = JvmEnv<'a>
    where
        Self: 'a;

    fn attach(&self) -> Result<JvmEnv<'_>> {
        let env = self
            .vm
            .attach_current_thread_permanently()
            .map_err(|e| BridgeError::Attach(e.to_string()))?;
        Ok(JvmEnv { env })
    }
}

/// JNI environment of one attached thread. References are raw local
/// `jobject`s created through this env.
pub struct JvmEnv<'local> {
    env: JNIEnv<'local>,
}

fn fault(error: jni::errors::Error) -> Fault {
    use jni::errors::Error;
    match error {
        Error::JavaException => Fault::Exception,
        Error::MethodNotFound { name, sig } => Fault::Unresolved(format!("{name}{sig}")),
        other => Fault::Failed(other.to_string()),
    }
}

impl JvmEnv<'_> {
    /// `toString()` of a throwable. Runs in its own local frame so nothing the
    /// lookup creates outlives it.
    fn describe(&mut self, throwable: &JThrowable<'_>) -> String {
        let described: jni::errors::Result<String> = self.env.with_local_frame(4, |env| {
            let text = env
                .call_method(throwable, "toString", "()Ljava/lang/String;", &[])?
                .l()?;
            let text = JString::from(text);
            // SAFETY: `toString` returns a java.lang.String.
            let copied = unsafe { env.get_string_unchecked(&text) }?;
            Ok(String::from(copied))
        });
        if self.env.exception_check().unwrap_or(false) {
            let _ = self.env.exception_clear();
        }
        described.unwrap_or_else(|_| "java exception".to_string())
    }
}

impl ManagedEnv for JvmEnv<'_> {
    type Ref = jobject;

    fn find_class(&mut self, name: &str) -> Result<jobject, Fault> {
        self.env.find_class(name).map(JClass::into_raw).map_err(fault)
    }

    fn new_string(&mut self, value: &str) -> Result<jobject, Fault> {
        self.env.new_string(value).map(JString::into_raw).map_err(fault)
    }

    fn call_static(
        &mut self,
        class: jobject,
        entry: &EntryPoint,
        args: &[Arg<jobject>],
    ) -> Result<Ret<jobject>, Fault> {
        // SAFETY: `class` was created by this env and is still live; wrapping
        // does not take ownership.
        let class = unsafe { JClass::from_raw(class) };
        let method = match self
            .env
            .get_static_method_id(&class, entry.name, entry.signature)
        {
            Ok(method) => method,
            Err(e) => {
                // A failed lookup leaves NoSuchMethodError pending.
                if self.env.exception_check().unwrap_or(false) {
                    let _ = self.env.exception_clear();
                }
                tracing::debug!("{} {}: {e}", entry.label(), entry.signature);
                return Err(Fault::Unresolved(format!("{}{}", entry.name, entry.signature)));
            }
        };

        let values: Vec<jvalue> = args
            .iter()
            .map(|arg| match arg {
                Arg::Int(value) => jvalue { i: *value },
                Arg::Object(Some(raw)) => jvalue { l: *raw },
                Arg::Object(None) => jvalue { l: ptr::null_mut() },
            })
            .collect();
        let ret = match entry.returns {
            Returns::Void => ReturnType::Primitive(Primitive::Void),
            Returns::Boolean => ReturnType::Primitive(Primitive::Boolean),
            Returns::Object => ReturnType::Object,
        };

        // SAFETY: `method` was resolved from `entry.signature`, and callers
        // build `args` to match that signature.
        let value = unsafe {
            self.env
                .call_static_method_unchecked(&class, method, ret, &values)
        }
        .map_err(fault)?;
        let ret = match entry.returns {
            Returns::Void => value.v().map(|()| Ret::Void),
            Returns::Boolean => value.z().map(Ret::Boolean),
            Returns::Object => value.l().map(|object| {
                if object.is_null() {
                    Ret::Object(None)
                } else {
                    Ret::Object(Some(object.into_raw()))
                }
            }),
        };
        ret.map_err(fault)
    }

    fn read_string(&mut self, string: jobject) -> Result<String, Fault> {
        // SAFETY: `string` is a live local reference to a java.lang.String;
        // every entry point that yields one declares a String return.
        // The checked `get_string` would leave two class references behind.
        let string = unsafe { JString::from_raw(string) };
        unsafe { self.env.get_string_unchecked(&string) }
            .map(String::from)
            .map_err(fault)
    }

    fn take_exception(&mut self) -> Option<String> {
        if !self.env.exception_check().unwrap_or(false) {
            return None;
        }
        let throwable = self.env.exception_occurred().ok();
        // Prints the stack trace to stderr.
        let _ = self.env.exception_describe();
        let _ = self.env.exception_clear();
        let description = match throwable {
            Some(throwable) => {
                let description = self.describe(&throwable);
                let _ = self.env.delete_local_ref(throwable);
                description
            }
            None => "java exception".to_string(),
        };
        Some(description)
    }

    fn release(&mut self, local: jobject) {
        // SAFETY: `local` was created by this env and is released once.
        let object = unsafe { JObject::from_raw(local) };
        if let Err(e) = self.env.delete_local_ref(object) {
            tracing::warn!("delete_local_ref failed: {e}");
        }
    }
}
