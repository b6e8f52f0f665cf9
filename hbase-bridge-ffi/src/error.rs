//! Failure codes reported by `hbase_bridge_last_error_kind`.

use hbase_bridge::{BridgeError, ErrorKind};

/// Category of the calling thread's last failure.
///
/// `Init`, `Invocation` and `Resource` mirror [`ErrorKind`]; argument
/// problems caught before the JVM is touched get their own code.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorKind {
    /// The last call succeeded.
    Ok = 0,
    /// The JVM could not be started or the bridge class is missing.
    Init = 1,
    /// The call failed on the Java side, or the bridge was not ready.
    Invocation = 2,
    /// A result could not be copied out.
    Resource = 3,
    /// A required argument was null or not valid UTF-8.
    InvalidArgument = 4,
    /// A panic was caught at the boundary.
    Internal = 5,
}

impl From<&BridgeError> for FfiErrorKind {
    fn from(err: &BridgeError) -> Self {
        if let BridgeError::InvalidArgument(_) = err {
            return Self::InvalidArgument;
        }
        match err.kind() {
            ErrorKind::Init => Self::Init,
            ErrorKind::Invocation => Self::Invocation,
            ErrorKind::Resource => Self::Resource,
        }
    }
}
