//! Error types for section tree operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during tree mutation.
#[derive(Error, Debug)]
pub enum TreeError {
    /// A node with the same case-insensitive path already exists.
    #[error("path already exists: {0}")]
    PathConflict(PathBuf),

    /// The candidate name hit the blacklist.
    #[error("invalid name '{name}': {offending}")]
    InvalidName { name: String, offending: String },

    /// The move or paste would place a node inside its own subtree.
    #[error("operation rejected: target is inside a moved section")]
    CycleRejected,

    /// The referenced node is not (or no longer) part of the tree.
    #[error("unknown node")]
    UnknownNode,

    /// Only folders own children.
    #[error("not a folder: {0}")]
    NotAFolder(PathBuf),

    /// The requested path does not descend from the stated parent.
    #[error("path {path} is not under {parent}")]
    OutsideParent { path: PathBuf, parent: PathBuf },
}

/// Result type alias for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;
