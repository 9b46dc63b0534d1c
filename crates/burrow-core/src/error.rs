//! Error types for the burrow control plane.
//!
//! Errors are grouped the way callers need to react to them: resolution and
//! I/O failures, "not ready" states, transport failures, process failures and
//! configuration problems.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the burrow library.
#[derive(Debug, Error)]
pub enum BurrowError {
    // Resolution errors
    #[error("Could not determine the user home directory")]
    HomeDirUnavailable,

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Invalid pid {value:?} for instance {id}")]
    InvalidPid { id: String, value: String },

    // Not-ready / not-found states
    #[error("Instance {id} has not published an rpc address")]
    InstanceNotReady { id: String },

    #[error("No instance with id {id} is running")]
    NoInstanceRunning { id: String },

    #[error("Alias not found: {name}")]
    AliasNotFound { name: String },

    // Process errors
    #[error("Process not found: {pid}")]
    ProcessNotFound { pid: u32 },

    #[error("Failed to signal process {pid}: {message}")]
    SignalFailed { pid: u32, message: String },

    #[error("Failed to detach instance: {message}")]
    Detach { message: String },

    // Transport errors
    #[error("Connection to {addr} failed: {message}")]
    Connection { addr: String, message: String },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Invalid params: {message}")]
    InvalidParams { message: String },

    #[error("Remote error {code}: {message}")]
    Remote { code: i32, message: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Invalid duration for {field}: {value:?} ({message})")]
    InvalidDuration {
        field: String,
        value: String,
        message: String,
    },

    #[error("Invalid address {value:?}: {message}")]
    InvalidAddress { value: String, message: String },

    // Tunnel engine errors
    #[error("Tunnel error: {message}")]
    Tunnel { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for burrow operations.
pub type Result<T> = std::result::Result<T, BurrowError>;

impl From<std::io::Error> for BurrowError {
    fn from(err: std::io::Error) -> Self {
        BurrowError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for BurrowError {
    fn from(err: serde_json::Error) -> Self {
        BurrowError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl BurrowError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        BurrowError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Standard JSON-RPC error codes:
    /// - -32700: Parse error
    /// - -32600: Invalid Request
    /// - -32601: Method not found
    /// - -32602: Invalid params
    /// - -32603: Internal error
    ///
    /// Custom error codes (application-defined, -32000 to -32099):
    /// - -32000: Transport error
    /// - -32001: Instance not ready or not running
    /// - -32002: Process error
    /// - -32003: Configuration error
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            BurrowError::Protocol { .. } => -32700,

            BurrowError::MethodNotFound { .. } => -32601,

            BurrowError::InvalidParams { .. } => -32602,

            BurrowError::Remote { code, .. } => *code,

            BurrowError::Connection { .. }
            | BurrowError::Timeout(_)
            | BurrowError::Cancelled => -32000,

            BurrowError::InstanceNotReady { .. }
            | BurrowError::NoInstanceRunning { .. }
            | BurrowError::AliasNotFound { .. } => -32001,

            BurrowError::ProcessNotFound { .. }
            | BurrowError::SignalFailed { .. }
            | BurrowError::Detach { .. } => -32002,

            BurrowError::InvalidDuration { .. }
            | BurrowError::InvalidAddress { .. }
            | BurrowError::InvalidPid { .. } => -32003,

            // All other errors are internal errors
            _ => -32603,
        }
    }

    /// Check if this error came from reaching (or failing to reach) a remote instance.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            BurrowError::Connection { .. }
                | BurrowError::Timeout(_)
                | BurrowError::Cancelled
                | BurrowError::Protocol { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BurrowError::NoInstanceRunning {
            id: "db-tunnel".into(),
        };
        assert_eq!(err.to_string(), "No instance with id db-tunnel is running");
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            BurrowError::MethodNotFound {
                method: "nope".into()
            }
            .to_rpc_error_code(),
            -32601
        );
        assert_eq!(
            BurrowError::Other("boom".into()).to_rpc_error_code(),
            -32603
        );
        assert_eq!(
            BurrowError::Remote {
                code: -32001,
                message: "x".into()
            }
            .to_rpc_error_code(),
            -32001
        );
    }

    #[test]
    fn test_transport_errors() {
        assert!(BurrowError::Timeout(Duration::from_secs(1)).is_transport());
        assert!(!BurrowError::InstanceNotReady { id: "a".into() }.is_transport());
    }
}
