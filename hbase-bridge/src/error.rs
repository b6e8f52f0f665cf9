//! Error taxonomy for bridge operations.

use std::path::PathBuf;

/// Failure category preserved across the bridge boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The runtime could not be brought up (archive missing, launch failed,
    /// class or method unresolved).
    Init,
    /// A call was refused or failed on the managed side.
    Invocation,
    /// A managed result could not be turned into an owned value.
    Resource,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("java-bridge archive not found (searched: {})", display_paths(.searched))]
    ArchiveNotFound { searched: Vec<PathBuf> },

    #[error("failed to start the JVM: {0}")]
    Launch(String),

    #[error("failed to attach thread to the JVM: {0}")]
    Attach(String),

    #[error("unresolved {what}")]
    Unresolved { what: String },

    #[error("JVM not initialized")]
    NotInitialized,

    #[error("not connected to HBase")]
    NotConnected,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("java exception in {call}: {description}")]
    ManagedException { call: String, description: String },

    #[error("{call} returned null")]
    NullResult { call: String },

    #[error("{call} reported failure")]
    Rejected { call: String },

    #[error("string transfer failed: {0}")]
    Transfer(String),

    #[error("malformed bridge response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ArchiveNotFound { .. }
            | Self::Launch(_)
            | Self::Attach(_)
            | Self::Unresolved { .. } => ErrorKind::Init,
            Self::NotInitialized
            | Self::NotConnected
            | Self::InvalidArgument(_)
            | Self::ManagedException { .. }
            | Self::NullResult { .. }
            | Self::Rejected { .. } => ErrorKind::Invocation,
            Self::Transfer(_) | Self::Decode(_) => ErrorKind::Resource,
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let missing = BridgeError::ArchiveNotFound { searched: vec![] };
        assert_eq!(missing.kind(), ErrorKind::Init);
        assert_eq!(BridgeError::NotConnected.kind(), ErrorKind::Invocation);
        assert_eq!(
            BridgeError::Transfer("bad utf-8".into()).kind(),
            ErrorKind::Resource
        );
    }

    #[test]
    fn test_archive_message_lists_paths() {
        let err = BridgeError::ArchiveNotFound {
            searched: vec![PathBuf::from("a.jar"), PathBuf::from("b/c.jar")],
        };
        assert_eq!(
            err.to_string(),
            "java-bridge archive not found (searched: a.jar, b/c.jar)"
        );
    }
}
