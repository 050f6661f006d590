//! The section tree and its structural operations.
//!
//! Storage is an arena map keyed by [`NodeId`]; each folder's `children`
//! vector owns the order while `parent` links are traversal-only. Mutating
//! operations validate up front and commit only when the whole operation
//! can succeed.

use crate::error::{Result, TreeError};
use crate::names::validate_name;
use crate::section::{NodeId, Section, SectionKind, SCRIPT_EXTENSION, SEPARATOR_TOKEN};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tree-wide policy for where drops and pastes land relative to a
/// non-folder target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlacementMode {
    /// Descend into folder targets; otherwise insert as the next sibling.
    #[default]
    Merge,
    /// Always insert as the next sibling at the target's own level.
    Move,
}

/// A resolved drop position: parent folder plus child index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub parent: NodeId,
    pub index: usize,
}

/// One relocation produced by a move: the node plus its path before and
/// after. Same-parent reorders keep `from == to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedPath {
    pub id: NodeId,
    pub from: PathBuf,
    pub to: PathBuf,
}

/// One node recreated by a paste, with the path of the original it was
/// cloned from (for content copying).
#[derive(Debug, Clone)]
pub struct PastedNode {
    pub id: NodeId,
    pub kind: SectionKind,
    pub path: PathBuf,
    pub source_path: PathBuf,
}

/// Detached snapshot of a copied subtree.
#[derive(Debug, Clone)]
struct ClipNode {
    kind: SectionKind,
    basename: String,
    source_path: PathBuf,
    enabled: bool,
    collapsed: bool,
    children: Vec<ClipNode>,
}

/// Ownership tree of sections mirroring the scripts directory.
pub struct SectionTree {
    nodes: HashMap<NodeId, Section>,
    root: NodeId,
    mode: PlacementMode,
    strict_names: bool,
    clipboard: Vec<ClipNode>,
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

impl SectionTree {
    /// Create a tree rooted at the scripts directory. The root behaves as a
    /// folder but is not itself listed or materialized.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        let root_section = Section::new(SectionKind::Folder, root_path.into());
        let root = root_section.id();
        let mut nodes = HashMap::new();
        nodes.insert(root, root_section);
        Self {
            nodes,
            root,
            mode: PlacementMode::default(),
            strict_names: false,
            clipboard: Vec::new(),
        }
    }

    /// Toggle the stricter ASCII-only name validation.
    pub fn set_strict_names(&mut self, strict: bool) {
        self.strict_names = strict;
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_path(&self) -> &Path {
        self.nodes[&self.root].path()
    }

    pub fn mode(&self) -> PlacementMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlacementMode) {
        self.mode = mode;
    }

    pub fn get(&self, id: NodeId) -> Option<&Section> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Section> {
        self.nodes.get_mut(&id)
    }

    /// Node count excluding the root.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.nodes.values()
    }

    /// Case-insensitive path lookup; separators are invisible here.
    pub fn lookup(&self, path: &Path) -> Option<NodeId> {
        let key = path_key(path);
        self.nodes
            .values()
            .find(|s| s.id() != self.root && !s.is_separator() && path_key(s.path()) == key)
            .map(|s| s.id())
    }

    /// True if `node` sits somewhere below `ancestor`.
    pub fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut cur = self.nodes.get(&node).and_then(|s| s.parent);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.nodes.get(&p).and_then(|s| s.parent);
        }
        false
    }

    /// Depth-first preorder of the whole tree, root excluded.
    pub fn flatten(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.len());
        let mut stack: Vec<NodeId> = self.nodes[&self.root]
            .children
            .iter()
            .rev()
            .copied()
            .collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(section) = self.nodes.get(&id) {
                stack.extend(section.children.iter().rev().copied());
            }
        }
        out
    }

    /// Path of `id` relative to the tree root.
    pub fn relative(&self, id: NodeId) -> Option<PathBuf> {
        let section = self.nodes.get(&id)?;
        section
            .path()
            .strip_prefix(self.root_path())
            .ok()
            .map(Path::to_path_buf)
    }

    fn attach(&mut self, parent: NodeId, mut section: Section, position: Option<usize>) -> NodeId {
        let id = section.id();
        section.parent = Some(parent);
        self.nodes.insert(id, section);
        let children = &mut self
            .nodes
            .get_mut(&parent)
            .expect("parent exists")
            .children;
        let index = position.unwrap_or(usize::MAX).min(children.len());
        children.insert(index, id);
        id
    }

    /// Create a child under `parent`, materializing intermediate folders.
    ///
    /// Creating a Folder or Script whose case-insensitive path already has a
    /// node returns the existing node instead of duplicating. `position`
    /// applies to the final node; out-of-range or omitted appends.
    pub fn create_child(
        &mut self,
        parent: NodeId,
        kind: SectionKind,
        path: &Path,
        position: Option<usize>,
    ) -> Result<NodeId> {
        let parent_section = self.nodes.get(&parent).ok_or(TreeError::UnknownNode)?;
        if !parent_section.kind().owns_children() {
            return Err(TreeError::NotAFolder(parent_section.path().to_path_buf()));
        }
        let parent_path = parent_section.path().to_path_buf();

        if kind == SectionKind::Separator {
            let section = Section::new(kind, parent_path.join(SEPARATOR_TOKEN));
            return Ok(self.attach(parent, section, position));
        }

        let rel = path
            .strip_prefix(&parent_path)
            .map_err(|_| TreeError::OutsideParent {
                path: path.to_path_buf(),
                parent: parent_path.clone(),
            })?
            .to_path_buf();
        let mut components = rel.components().peekable();
        if components.peek().is_none() {
            return Err(TreeError::OutsideParent {
                path: path.to_path_buf(),
                parent: parent_path,
            });
        }

        let mut cur_parent = parent;
        let mut cur_path = parent_path;
        while let Some(component) = components.next() {
            let name = component.as_os_str().to_string_lossy().into_owned();
            cur_path = cur_path.join(&name);
            let last = components.peek().is_none();
            let node_kind = if last { kind } else { SectionKind::Folder };

            if let Some(existing) = self.lookup(&cur_path) {
                if last {
                    debug!(path = %cur_path.display(), "create is idempotent, reusing node");
                    return Ok(existing);
                }
                cur_parent = existing;
                continue;
            }

            let checked = if node_kind == SectionKind::Script {
                name.strip_suffix(&format!(".{SCRIPT_EXTENSION}")).map_or(
                    name.as_str(),
                    |stem| stem,
                )
            } else {
                name.as_str()
            };
            validate_name(checked, self.strict_names)?;

            let section = Section::new(node_kind, cur_path.clone());
            cur_parent = self.attach(cur_parent, section, if last { position } else { None });
        }
        Ok(cur_parent)
    }

    /// Detach `id` (and its subtree) from the tree. No-op on the root or an
    /// unknown node. Returns the removed section, already detached.
    pub fn delete(&mut self, id: NodeId) -> Option<Section> {
        if id == self.root || !self.nodes.contains_key(&id) {
            return None;
        }
        if let Some(parent) = self.nodes[&id].parent {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != id);
            }
        }
        for descendant in self.subtree(id) {
            if descendant != id {
                self.nodes.remove(&descendant);
            }
        }
        let mut removed = self.nodes.remove(&id)?;
        removed.parent = None;
        debug!(node = %id, path = %removed.path().display(), "Section deleted");
        Some(removed)
    }

    /// Preorder ids of `id`'s subtree, `id` included.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            out.push(cur);
            if let Some(section) = self.nodes.get(&cur) {
                stack.extend(section.children.iter().rev().copied());
            }
        }
        out
    }

    /// Validate a rename without committing it.
    pub fn can_rename(&self, id: NodeId, new_path: &Path) -> Result<()> {
        let section = self.nodes.get(&id).ok_or(TreeError::UnknownNode)?;
        if id == self.root {
            return Err(TreeError::UnknownNode);
        }
        if section.is_separator() {
            return Ok(());
        }
        let name = new_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let checked = if section.is_script() {
            name.strip_suffix(&format!(".{SCRIPT_EXTENSION}"))
                .unwrap_or(&name)
                .to_string()
        } else {
            name
        };
        validate_name(&checked, self.strict_names)?;
        match self.lookup(new_path) {
            Some(existing) if existing != id => Err(TreeError::PathConflict(new_path.to_path_buf())),
            _ => Ok(()),
        }
    }

    /// Rename `id` to `new_path`, rewriting every descendant path.
    ///
    /// Callers run conflict validation (and the filesystem rename) first.
    pub fn rename(&mut self, id: NodeId, new_path: &Path) -> Result<()> {
        self.can_rename(id, new_path)?;
        let old_path = self.nodes[&id].path().to_path_buf();
        self.rewrite_paths(id, &old_path, new_path);
        debug!(from = %old_path.display(), to = %new_path.display(), "Section renamed");
        Ok(())
    }

    fn rewrite_paths(&mut self, id: NodeId, old_prefix: &Path, new_prefix: &Path) {
        for node in self.subtree(id) {
            let section = self.nodes.get_mut(&node).expect("subtree node exists");
            let rewritten = if node == id {
                new_prefix.to_path_buf()
            } else {
                match section.path().strip_prefix(old_prefix) {
                    Ok(rest) => new_prefix.join(rest),
                    Err(_) => continue,
                }
            };
            section.set_path(rewritten);
        }
    }

    /// Drop sources that are descendants of other sources, preserving order.
    pub fn top_level_sources(&self, ids: &[NodeId]) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        for &id in ids {
            if !self.nodes.contains_key(&id) || out.contains(&id) {
                continue;
            }
            if ids
                .iter()
                .any(|&other| other != id && self.is_descendant(id, other))
            {
                continue;
            }
            out.push(id);
        }
        out
    }

    /// Where a drop or paste onto `target` lands under the given mode. The
    /// root target always uses Merge semantics so nothing escapes the
    /// tracked directory.
    pub fn resolve_placement(&self, target: NodeId, mode: PlacementMode) -> Placement {
        if target == self.root {
            return Placement {
                parent: self.root,
                index: self.nodes[&self.root].children.len(),
            };
        }
        let section = &self.nodes[&target];
        if mode == PlacementMode::Merge && section.is_folder() {
            return Placement {
                parent: target,
                index: section.children.len(),
            };
        }
        let parent = section.parent.unwrap_or(self.root);
        let index = self.nodes[&parent]
            .children
            .iter()
            .position(|c| *c == target)
            .map(|i| i + 1)
            .unwrap_or(self.nodes[&parent].children.len());
        Placement { parent, index }
    }

    /// Validate a move and compute the resulting relocations without
    /// mutating. Fails with [`TreeError::CycleRejected`] when nothing
    /// movable remains or the target sits inside a source.
    pub fn plan_move(&self, sources: &[NodeId], target: NodeId) -> Result<Vec<MovedPath>> {
        if !self.nodes.contains_key(&target) {
            return Err(TreeError::UnknownNode);
        }
        let minimal: Vec<NodeId> = self
            .top_level_sources(sources)
            .into_iter()
            .filter(|&s| s != target)
            .collect();
        if minimal.is_empty() {
            return Err(TreeError::CycleRejected);
        }
        for &source in &minimal {
            if target == source || self.is_descendant(target, source) {
                return Err(TreeError::CycleRejected);
            }
        }

        let placement = self.resolve_placement(target, self.mode);
        let dest_path = self.nodes[&placement.parent].path().to_path_buf();

        let mut moves = Vec::with_capacity(minimal.len());
        // Destinations claimed by the moved set itself. Two sources with the
        // same basename land on the same slot, as does a source dropping onto
        // a sibling that stays put, and the path index cannot hold both.
        let mut claimed: HashSet<String> = HashSet::new();
        for &source in &minimal {
            let section = &self.nodes[&source];
            let from = section.path().to_path_buf();
            let to = if section.parent == Some(placement.parent) {
                from.clone()
            } else {
                let basename = from.file_name().map(|n| n.to_os_string()).ok_or(
                    TreeError::OutsideParent {
                        path: from.clone(),
                        parent: dest_path.clone(),
                    },
                )?;
                let to = dest_path.join(basename);
                if !section.is_separator() {
                    if let Some(existing) = self.lookup(&to) {
                        if existing != source && !minimal.contains(&existing) {
                            return Err(TreeError::PathConflict(to));
                        }
                    }
                }
                to
            };
            if !section.is_separator() && !claimed.insert(path_key(&to)) {
                return Err(TreeError::PathConflict(to));
            }
            moves.push(MovedPath {
                id: source,
                from,
                to,
            });
        }
        Ok(moves)
    }

    /// Move `sources` relative to `target` under the current placement mode.
    ///
    /// Fully succeeds or leaves the tree unchanged; the returned relocations
    /// mirror what [`Self::plan_move`] reported.
    pub fn move_sections(&mut self, sources: &[NodeId], target: NodeId) -> Result<Vec<MovedPath>> {
        let plan = self.plan_move(sources, target)?;

        // Detach every moved node first so the insertion index is stable.
        for moved in &plan {
            let parent = self.nodes[&moved.id].parent;
            if let Some(p) = parent.and_then(|p| self.nodes.get_mut(&p)) {
                p.children.retain(|c| *c != moved.id);
            }
        }

        let placement = self.resolve_placement(target, self.mode);
        for (offset, moved) in plan.iter().enumerate() {
            let children = &mut self
                .nodes
                .get_mut(&placement.parent)
                .expect("placement parent exists")
                .children;
            let index = (placement.index + offset).min(children.len());
            children.insert(index, moved.id);
            self.nodes
                .get_mut(&moved.id)
                .expect("moved node exists")
                .parent = Some(placement.parent);
            if moved.from != moved.to {
                let from = moved.from.clone();
                let to = moved.to.clone();
                self.rewrite_paths(moved.id, &from, &to);
            }
        }

        debug!(moved = plan.len(), "Sections moved");
        Ok(plan)
    }

    /// Buffer the minimal top-level set of `sources` for a later paste.
    pub fn copy(&mut self, sources: &[NodeId]) {
        self.clipboard = self
            .top_level_sources(sources)
            .into_iter()
            .map(|id| self.snapshot(id))
            .collect();
        debug!(buffered = self.clipboard.len(), "Sections copied");
    }

    fn snapshot(&self, id: NodeId) -> ClipNode {
        let section = &self.nodes[&id];
        ClipNode {
            kind: section.kind(),
            basename: section.display_name(),
            source_path: section.path().to_path_buf(),
            enabled: section.enabled,
            collapsed: section.collapsed,
            children: section
                .children
                .iter()
                .map(|&c| self.snapshot(c))
                .collect(),
        }
    }

    pub fn clipboard_len(&self) -> usize {
        self.clipboard.len()
    }

    /// Recreate the buffered subtrees at `target` with fresh ids and
    /// non-colliding names, preserving enabled/collapse flags and relative
    /// structure. Clears the clipboard.
    pub fn paste(&mut self, target: NodeId) -> Result<Vec<PastedNode>> {
        if !self.nodes.contains_key(&target) {
            return Err(TreeError::UnknownNode);
        }
        let clips = std::mem::take(&mut self.clipboard);
        if clips.is_empty() {
            return Ok(Vec::new());
        }
        let placement = self.resolve_placement(target, self.mode);

        let mut created = Vec::new();
        for (offset, clip) in clips.iter().enumerate() {
            let parent_path = self.nodes[&placement.parent].path().to_path_buf();
            let basename = self.resolve_collision(&parent_path, &clip.basename, clip.kind);
            self.paste_node(
                clip,
                placement.parent,
                &parent_path.join(basename),
                Some(placement.index + offset),
                &mut created,
            );
        }
        debug!(created = created.len(), "Sections pasted");
        Ok(created)
    }

    fn paste_node(
        &mut self,
        clip: &ClipNode,
        parent: NodeId,
        path: &Path,
        position: Option<usize>,
        created: &mut Vec<PastedNode>,
    ) {
        let path = if clip.kind == SectionKind::Separator {
            self.nodes[&parent].path().join(SEPARATOR_TOKEN)
        } else {
            path.to_path_buf()
        };
        let mut section = Section::new(clip.kind, path.clone());
        section.enabled = clip.enabled;
        section.collapsed = clip.collapsed;
        let id = self.attach(parent, section, position);
        created.push(PastedNode {
            id,
            kind: clip.kind,
            path: path.clone(),
            source_path: clip.source_path.clone(),
        });
        for child in &clip.children {
            self.paste_node(child, id, &path.join(&child.basename), None, created);
        }
    }

    /// First basename derived from `wanted` that does not collide under
    /// `dir`, inserting a ` copy`/` copy N` marker before the extension.
    fn resolve_collision(&self, dir: &Path, wanted: &str, kind: SectionKind) -> String {
        if kind == SectionKind::Separator || self.lookup(&dir.join(wanted)).is_none() {
            return wanted.to_string();
        }
        let (stem, ext) = match wanted.rsplit_once('.') {
            Some((s, e)) if kind == SectionKind::Script => (s.to_string(), format!(".{e}")),
            _ => (wanted.to_string(), String::new()),
        };
        let mut n = 1_u32;
        loop {
            let candidate = if n == 1 {
                format!("{stem} copy{ext}")
            } else {
                format!("{stem} copy {n}{ext}")
            };
            if self.lookup(&dir.join(&candidate)).is_none() {
                return candidate;
            }
            n += 1;
        }
    }

    /// Set the load flag on `id`; folders propagate the flag to the whole
    /// subtree for manifest purposes.
    pub fn set_load_state(&mut self, id: NodeId, enabled: bool) -> Result<()> {
        let section = self.nodes.get(&id).ok_or(TreeError::UnknownNode)?;
        let targets = if section.is_folder() {
            self.subtree(id)
        } else {
            vec![id]
        };
        for node in targets {
            if let Some(s) = self.nodes.get_mut(&node) {
                s.enabled = enabled;
            }
        }
        Ok(())
    }

    /// Set the presentation fold flag; folders only.
    pub fn set_collapsed(&mut self, id: NodeId, collapsed: bool) -> Result<()> {
        let section = self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode)?;
        if section.is_folder() {
            section.collapsed = collapsed;
        }
        Ok(())
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<()> {
        let section = self.nodes.get_mut(&id).ok_or(TreeError::UnknownNode)?;
        section.enabled = enabled;
        Ok(())
    }

    /// Drop every node, keeping the root. Used for full rebuilds.
    pub fn clear(&mut self) {
        let root_path = self.root_path().to_path_buf();
        let root_section = Section::new(SectionKind::Folder, root_path);
        let root = root_section.id();
        self.nodes.clear();
        self.nodes.insert(root, root_section);
        self.root = root;
        self.clipboard.clear();
    }
}
