//! Unified error types for the shipyard workspace.
//!
//! Every library crate returns [`Result`]; the CLI wraps these in `anyhow`.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ShipyardError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value or request argument is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A resource with the same identity already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists {
        /// Type of the conflicting resource.
        kind: &'static str,
        /// Identifier of the conflicting resource.
        id: String,
    },

    /// The operation is not allowed in the resource's current state.
    #[error("precondition failed: {message}")]
    Precondition {
        /// Description of the violated precondition.
        message: String,
    },

    /// A mount or unmount syscall failed.
    #[error("mount operation on {target} failed: {message}")]
    Mount {
        /// Mount point the operation targeted.
        target: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// Creating or joining a namespace failed.
    #[error("namespace operation failed: {message}")]
    Namespace {
        /// Description of the failure.
        message: String,
    },

    /// Delivering a signal to a process failed.
    #[error("signal to pid {pid} failed: {message}")]
    Signal {
        /// Target process id.
        pid: i32,
        /// Description of the failure.
        message: String,
    },

    /// Spawning, waiting on, or replacing a process failed.
    #[error("process error: {message}")]
    Process {
        /// Description of the failure.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },

    /// Some steps of a best-effort sequence failed.
    #[error("{failed} step(s) failed: {summary}")]
    Partial {
        /// Number of failed steps.
        failed: usize,
        /// Semicolon-separated description of each failure.
        summary: String,
    },
}

impl ShipyardError {
    /// Wraps an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ShipyardError>;
