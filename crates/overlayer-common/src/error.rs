//! Unified error types for the overlayer workspace.
//!
//! Local, recoverable conditions (a vanished nested mount point, a module
//! without an override at some path) never surface here; they are logged
//! and absorbed where they happen. What remains are the structural failures
//! that abort an operation.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// A mount table record is malformed.
    #[error("malformed mount table record at line {line}: {message}")]
    Parse {
        /// 1-based line number of the offending record.
        line: usize,
        /// Description of what was wrong with the record.
        message: String,
    },

    /// The mount table holds no record that can serve as the namespace root.
    #[error("mount table has no root mount")]
    NoRoot,

    /// A path could not be mapped onto any mount in the namespace.
    #[error("no mount governs {path}")]
    Resolution {
        /// Path that failed to resolve.
        path: PathBuf,
    },

    /// A path could not be inspected for a reason other than vanishing.
    #[error("failed to stat {path}: {source}")]
    Stat {
        /// Path that could not be inspected.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Both the overlay mount and the bind fallback failed.
    #[error("failed to mount {target}: {message}")]
    Mount {
        /// Mount point that could not be covered.
        target: PathBuf,
        /// Description of the failed syscalls.
        message: String,
    },

    /// One or more marked mounts could not be detached.
    #[error("failed to detach {} mount(s): {}", .failed.len(), display_paths(.failed))]
    Unmount {
        /// Mount points whose detach failed.
        failed: Vec<PathBuf>,
    },

    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, OverlayError>;
