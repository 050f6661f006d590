//! Section tree model and structural operations for scriptpack.
//!
//! The tree mirrors the on-disk scripts directory: typed nodes (separator,
//! folder, script) with an owning children order and non-owning parent
//! back-references. Every mutating operation validates first and either
//! fully succeeds or leaves the tree unchanged; the filesystem side effects
//! live in `sp-workspace`, not here.
//!
//! # Invariants
//!
//! - Paths are unique case-insensitively across the whole tree (separators
//!   carry no filesystem entry and are exempt).
//! - A child's path is always `parent.path / child.basename`; rename and
//!   move rewrite every descendant path.
//! - The tree is acyclic: moves and pastes into a node's own subtree are
//!   rejected.

pub mod error;
pub mod names;
pub mod section;
pub mod tree;

pub use error::{Result, TreeError};
pub use names::{sanitize_name, validate_name};
pub use section::{
    determine_kind, NodeId, Section, SectionKind, FOLDER_SENTINEL, SCRIPT_EXTENSION,
    SEPARATOR_TOKEN,
};
pub use tree::{MovedPath, PastedNode, Placement, PlacementMode, SectionTree};
