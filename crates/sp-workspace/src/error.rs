//! Error types for workspace operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while keeping the tree, the filesystem and the
/// manifest in lockstep.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// Tree mutation rejected.
    #[error(transparent)]
    Tree(#[from] sp_tree::TreeError),

    /// Bundle codec failure.
    #[error(transparent)]
    Bundle(#[from] sp_bundle::BundleError),

    /// Settings could not be resolved at open time.
    #[error(transparent)]
    Config(#[from] sp_config::ConfigError),

    /// A filesystem effect failed; the triggering tree mutation was rolled
    /// back.
    #[error("filesystem operation failed for {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Plain I/O outside a projected mutation (bundle read, manifest read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkspaceError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        WorkspaceError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for workspace operations.
pub type Result<T> = std::result::Result<T, WorkspaceError>;
