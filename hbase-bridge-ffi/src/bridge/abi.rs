//! C ABI exports consumed by the desktop shell.
//!
//! All functions are `extern "C"` and `#[no_mangle]`. Failures return
//! `false` or null and leave a code and message in the calling thread's
//! last-error slot. Strings returned here are owned by the caller and must go
//! back through `hbase_bridge_free_string`.

use std::ffi::{c_char, c_int, CStr, CString};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use hbase_bridge::{BridgeError, CommandRequest, ScanRequest};

use crate::bridge::last_error;
use crate::error::FfiErrorKind;
use crate::BRIDGE;

/// Helper: read a C string pointer into a Rust String, returning None on null or invalid UTF-8.
unsafe fn read_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok().map(String::from)
}

unsafe fn required(ptr: *const c_char, name: &'static str) -> Result<String, BridgeError> {
    unsafe { read_c_str(ptr) }.ok_or(BridgeError::InvalidArgument(name))
}

/// Null means absent; non-null must still be valid UTF-8.
unsafe fn optional(ptr: *const c_char, name: &'static str) -> Result<Option<String>, BridgeError> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { read_c_str(ptr) }
        .map(Some)
        .ok_or(BridgeError::InvalidArgument(name))
}

fn into_raw_string(value: String) -> Result<*mut c_char, BridgeError> {
    CString::new(value)
        .map(CString::into_raw)
        .map_err(|e| BridgeError::Transfer(format!("result contains NUL at byte {}", e.nul_position())))
}

/// Run `body` at the boundary: record failures, log them, and never unwind
/// into the caller.
fn boundary<T>(call: &'static str, failed: T, body: impl FnOnce() -> Result<T, BridgeError>) -> T {
    last_error::clear();
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            tracing::error!("{call}: {e}");
            last_error::record(&e);
            failed
        }
        Err(_) => {
            tracing::error!("{call}: panicked");
            last_error::set(FfiErrorKind::Internal, format!("{call} panicked"));
            failed
        }
    }
}

fn string_boundary(
    call: &'static str,
    body: impl FnOnce() -> Result<String, BridgeError>,
) -> *mut c_char {
    boundary(call, ptr::null_mut(), || body().and_then(into_raw_string))
}

// ─── Lifecycle ───────────────────────────────────────────────────────

/// Start (or adopt) the JVM and check that the bridge class is loadable.
///
/// Idempotent: returns `true` immediately once a runtime is up.
#[unsafe(no_mangle)]
pub extern "C" fn hbase_bridge_initialize() -> bool {
    boundary("hbase_bridge_initialize", false, || {
        BRIDGE.initialize().map(|()| true)
    })
}

/// Connect to HBase through the given ZooKeeper quorum and parent znode,
/// initializing the JVM first if needed.
///
/// # Safety
///
/// `quorum` and `znode` must be valid, NUL-terminated UTF-8 C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hbase_bridge_connect(quorum: *const c_char, znode: *const c_char) -> bool {
    boundary("hbase_bridge_connect", false, || {
        let quorum = unsafe { required(quorum, "quorum") }?;
        let znode = unsafe { required(znode, "znode") }?;
        BRIDGE.connect(&quorum, &znode).map(|()| true)
    })
}

/// Close the HBase connection. Safe to call at any time; the JVM stays up.
#[unsafe(no_mangle)]
pub extern "C" fn hbase_bridge_disconnect() {
    boundary("hbase_bridge_disconnect", (), || {
        BRIDGE.disconnect();
        Ok(())
    })
}

// ─── Data ────────────────────────────────────────────────────────────

/// JSON array of table names, or null on failure.
#[unsafe(no_mangle)]
pub extern "C" fn hbase_bridge_list_tables() -> *mut c_char {
    string_boundary("hbase_bridge_list_tables", || BRIDGE.list_tables())
}

/// Scan up to `limit` rows of `table` as a JSON array, or null on failure.
///
/// # Safety
///
/// `table` must be a valid, NUL-terminated UTF-8 C string. `start_row`,
/// `end_row` and `prefix` must each be such a string, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hbase_bridge_get_table_data(
    table: *const c_char,
    start_row: *const c_char,
    end_row: *const c_char,
    limit: c_int,
    prefix: *const c_char,
) -> *mut c_char {
    string_boundary("hbase_bridge_get_table_data", || {
        let mut request = ScanRequest::new(unsafe { required(table, "table") }?, limit);
        request.start_row = unsafe { optional(start_row, "start_row") }?;
        request.end_row = unsafe { optional(end_row, "end_row") }?;
        request.prefix = unsafe { optional(prefix, "prefix") }?;
        BRIDGE.get_table_data(&request)
    })
}

/// Run a `get`, `put` or `delete` against one row. Returns the JSON result
/// document, or null on failure. Unknown commands still return a document
/// with `"status": "error"`.
///
/// # Safety
///
/// `table` and `command` must be valid, NUL-terminated UTF-8 C strings. The
/// remaining arguments must each be such a string, or null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hbase_bridge_execute_command(
    table: *const c_char,
    command: *const c_char,
    row_key: *const c_char,
    family: *const c_char,
    qualifier: *const c_char,
    value: *const c_char,
) -> *mut c_char {
    string_boundary("hbase_bridge_execute_command", || {
        let mut request = CommandRequest::new(
            unsafe { required(table, "table") }?,
            unsafe { required(command, "command") }?,
        );
        request.row_key = unsafe { optional(row_key, "row_key") }?;
        request.family = unsafe { optional(family, "family") }?;
        request.qualifier = unsafe { optional(qualifier, "qualifier") }?;
        request.value = unsafe { optional(value, "value") }?;
        BRIDGE.execute_command(&request)
    })
}

// ─── Memory / Errors ─────────────────────────────────────────────────

/// Free a string returned by this library.
///
/// # Safety
///
/// `s` must be a pointer returned by an `hbase_bridge_*` function, or null.
/// Each pointer may be freed once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn hbase_bridge_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Code of the calling thread's last failure (see `FfiErrorKind`), 0 if the
/// last call succeeded.
#[unsafe(no_mangle)]
pub extern "C" fn hbase_bridge_last_error_kind() -> i32 {
    last_error::kind() as i32
}

/// Message of the calling thread's last failure, or null if there is none.
/// Free with `hbase_bridge_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn hbase_bridge_last_error_message() -> *mut c_char {
    last_error::message()
        .and_then(|message| into_raw_string(message.replace('\0', " ")).ok())
        .unwrap_or(ptr::null_mut())
}
