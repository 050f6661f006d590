//! Section node types and path classification.

use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File extension of script sections.
pub const SCRIPT_EXTENSION: &str = "rb";

/// Sentinel basename used for separator nodes, which have no real
/// filesystem entry.
pub const SEPARATOR_TOKEN: &str = "*separator*";

/// Sentinel content marking a bundle entry as a folder rather than an
/// extensionless empty script.
pub const FOLDER_SENTINEL: &str = "# This is a folder";

/// Process-unique opaque node token.
///
/// Disambiguates nodes with structurally equal fields during bulk
/// operations; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Uuid);

impl NodeId {
    pub(crate) fn fresh() -> Self {
        NodeId(Uuid::new_v4())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.8}", self.0.simple())
    }
}

/// Closed set of section variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    /// Visual divider; no filesystem entry, no children.
    Separator,
    /// Real directory; owns an ordered child list.
    Folder,
    /// Real `.rb` file; no children.
    Script,
}

impl SectionKind {
    /// Only folders (and the root, itself a folder) own children.
    pub fn owns_children(self) -> bool {
        matches!(self, SectionKind::Folder)
    }

    /// Separators have no directory or file behind them.
    pub fn has_fs_entry(self) -> bool {
        !matches!(self, SectionKind::Separator)
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionKind::Separator => write!(f, "separator"),
            SectionKind::Folder => write!(f, "folder"),
            SectionKind::Script => write!(f, "script"),
        }
    }
}

/// Classify a path (optionally with known contents) into a section variant.
///
/// Returns `None` for entries the tree does not track (foreign extensions,
/// or extensionless entries whose contents are known and are not the folder
/// sentinel).
pub fn determine_kind(path: &Path, contents: Option<&str>) -> Option<SectionKind> {
    let name = match path.file_name() {
        Some(n) => n.to_string_lossy().into_owned(),
        None => return Some(SectionKind::Separator),
    };
    if name.trim().is_empty() || name == SEPARATOR_TOKEN {
        return Some(SectionKind::Separator);
    }
    if let Some(text) = contents {
        if text.trim() == FOLDER_SENTINEL {
            return Some(SectionKind::Folder);
        }
    }
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case(SCRIPT_EXTENSION) => Some(SectionKind::Script),
        None if contents.is_none() => Some(SectionKind::Folder),
        _ => None,
    }
}

/// One node of the section tree.
///
/// The children vector owns the order; `parent` is a non-owning
/// back-reference used only for traversal. Lifetime management always goes
/// through the owning parent's child list.
#[derive(Debug, Clone)]
pub struct Section {
    id: NodeId,
    kind: SectionKind,
    path: PathBuf,
    /// Load flag persisted to the manifest.
    pub enabled: bool,
    /// Presentation-only fold state; folders only.
    pub collapsed: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Section {
    pub(crate) fn new(kind: SectionKind, path: PathBuf) -> Self {
        Self {
            id: NodeId::fresh(),
            kind,
            path,
            enabled: true,
            collapsed: false,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> SectionKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: PathBuf) {
        self.path = path;
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Label derived from the path's final component.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn is_folder(&self) -> bool {
        self.kind == SectionKind::Folder
    }

    pub fn is_script(&self) -> bool {
        self.kind == SectionKind::Script
    }

    pub fn is_separator(&self) -> bool {
        self.kind == SectionKind::Separator
    }
}
