//! The editor facade: one handle owning the tree, the settings and the
//! game-root paths, with every mutation keeping the filesystem and the
//! manifest in lockstep.

use crate::error::Result;
use crate::events::{apply_event, FsEvent};
use crate::extract::{extract_bundle, loader_params, ExtractOutcome};
use crate::manifest::{read_manifest, write_manifest, ReadOutcome};
use crate::pack::{pack_bundle, PackReport};
use crate::projector;
use sp_bundle::{decode, is_extraction_needed};
use sp_config::{resolve_settings, Settings};
use sp_tree::{
    MovedPath, NodeId, PastedNode, PlacementMode, SectionKind, SectionTree, SCRIPT_EXTENSION,
};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Counts describing the current workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusReport {
    pub scripts: usize,
    pub folders: usize,
    pub separators: usize,
    pub disabled: usize,
    /// Whether the bundle on disk still carries real script payloads.
    pub extraction_needed: bool,
}

struct EditorState {
    tree: SectionTree,
    settings: Settings,
    game_root: PathBuf,
}

impl EditorState {
    fn scripts_dir(&self) -> PathBuf {
        self.game_root.join(&self.settings.scripts_folder)
    }

    fn manifest_path(&self) -> PathBuf {
        self.scripts_dir().join(&self.settings.manifest_name)
    }

    fn bundle_path(&self) -> PathBuf {
        self.game_root.join(&self.settings.bundle_file)
    }

    fn sync_manifest(&self) -> Result<usize> {
        write_manifest(&self.tree, &self.manifest_path(), self.settings.line_ending)
    }
}

/// Shared handle over one game directory.
///
/// Callers on any thread go through the same mutex; every mutating call is
/// one atomic unit of tree change, filesystem effect and manifest rewrite.
pub struct Editor {
    state: Mutex<EditorState>,
}

impl Editor {
    /// Open a game directory: resolve settings, materialize the scripts
    /// folder, replay the manifest, absorb untracked files, and persist the
    /// merged order.
    pub fn open(game_root: &Path) -> Result<Editor> {
        let settings = resolve_settings(game_root)?;
        let scripts_dir = game_root.join(&settings.scripts_folder);
        std::fs::create_dir_all(&scripts_dir)
            .map_err(|e| crate::error::WorkspaceError::fs(&scripts_dir, e))?;

        let mut state = EditorState {
            tree: {
                let mut tree = SectionTree::new(&scripts_dir);
                tree.set_strict_names(settings.strict_names);
                tree
            },
            settings,
            game_root: game_root.to_path_buf(),
        };

        let manifest_path = state.manifest_path();
        let outcome = read_manifest(&mut state.tree, &manifest_path)?;
        let scanned = projector::scan(&mut state.tree, &scripts_dir)?;
        state.sync_manifest()?;

        info!(
            game_root = %game_root.display(),
            replayed = matches!(outcome, ReadOutcome::Loaded { .. }),
            scanned,
            sections = state.tree.len(),
            "Workspace opened"
        );
        Ok(Editor {
            state: Mutex::new(state),
        })
    }

    fn lock(&self) -> MutexGuard<'_, EditorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Unpack the game bundle into the scripts folder, then reduce the
    /// bundle to its loader so a second open does not unpack again.
    pub fn extract(&self) -> Result<ExtractOutcome> {
        let mut state = self.lock();
        let bundle = state.bundle_path();
        let loader = loader_params(&state.settings);
        let settings = state.settings.clone();
        extract_bundle(&mut state.tree, &bundle, &settings, &loader)
    }

    /// Write the full bundle from the current tree, loader first.
    pub fn pack(&self) -> Result<PackReport> {
        let state = self.lock();
        let bundle = state.bundle_path();
        pack_bundle(&state.tree, &bundle, &loader_params(&state.settings))
    }

    /// Create a section named `name` under `parent`. Scripts get the script
    /// extension appended when missing.
    pub fn create(&self, parent: NodeId, kind: SectionKind, name: &str) -> Result<NodeId> {
        let mut state = self.lock();
        let parent_path = state
            .tree
            .get(parent)
            .ok_or(sp_tree::TreeError::UnknownNode)?
            .path()
            .to_path_buf();
        let path = match kind {
            SectionKind::Separator => parent_path,
            SectionKind::Folder => parent_path.join(name),
            SectionKind::Script => parent_path.join(script_file_name(name)),
        };
        let id = projector::create_section(&mut state.tree, parent, kind, &path, None, None)?;
        state.sync_manifest()?;
        Ok(id)
    }

    /// Remove a section, its subtree, and its on-disk entries.
    pub fn delete(&self, id: NodeId) -> Result<()> {
        let mut state = self.lock();
        projector::delete_section(&mut state.tree, id)?;
        state.sync_manifest()?;
        Ok(())
    }

    /// Rename a section in place, keeping its parent.
    pub fn rename(&self, id: NodeId, new_name: &str) -> Result<()> {
        let mut state = self.lock();
        let section = state
            .tree
            .get(id)
            .ok_or(sp_tree::TreeError::UnknownNode)?;
        let dir = section
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let new_path = if section.is_script() {
            dir.join(script_file_name(new_name))
        } else {
            dir.join(new_name)
        };
        projector::rename_section(&mut state.tree, id, &new_path)?;
        state.sync_manifest()?;
        Ok(())
    }

    /// Relocate `sources` relative to `target` under the current placement
    /// mode. All renames land or none do.
    pub fn move_to(&self, sources: &[NodeId], target: NodeId) -> Result<Vec<MovedPath>> {
        let mut state = self.lock();
        let moved = projector::move_sections(&mut state.tree, sources, target)?;
        state.sync_manifest()?;
        Ok(moved)
    }

    /// Snapshot `sources` into the clipboard.
    pub fn copy(&self, sources: &[NodeId]) {
        self.lock().tree.copy(sources);
    }

    /// Materialize the clipboard relative to `target`.
    pub fn paste(&self, target: NodeId) -> Result<Vec<PastedNode>> {
        let mut state = self.lock();
        let pasted = projector::paste_sections(&mut state.tree, target)?;
        state.sync_manifest()?;
        Ok(pasted)
    }

    /// Flip the load state of a section; folders cascade to their subtree.
    pub fn set_enabled(&self, id: NodeId, enabled: bool) -> Result<()> {
        let mut state = self.lock();
        state.tree.set_load_state(id, enabled)?;
        state.sync_manifest()?;
        Ok(())
    }

    /// Record the collapsed flag. Display-only, so no manifest rewrite.
    pub fn set_collapsed(&self, id: NodeId, collapsed: bool) -> Result<()> {
        self.lock().tree.set_collapsed(id, collapsed)?;
        Ok(())
    }

    /// Switch the placement mode used by subsequent moves and pastes.
    pub fn set_mode(&self, mode: PlacementMode) {
        self.lock().tree.set_mode(mode);
    }

    /// Fold an external filesystem event into the tree. Echoes of our own
    /// writes are ignored; real changes also refresh the manifest.
    pub fn notify(&self, event: &FsEvent) -> Result<Option<NodeId>> {
        let mut state = self.lock();
        let folded = apply_event(&mut state.tree, event)?;
        if folded.is_some() {
            state.sync_manifest()?;
        }
        Ok(folded)
    }

    /// Count sections by kind and probe the bundle for pending extraction.
    pub fn status(&self) -> Result<StatusReport> {
        let state = self.lock();
        let mut report = StatusReport::default();
        for id in state.tree.flatten() {
            let Some(section) = state.tree.get(id) else {
                continue;
            };
            match section.kind() {
                SectionKind::Script => report.scripts += 1,
                SectionKind::Folder => report.folders += 1,
                SectionKind::Separator => report.separators += 1,
            }
            if !section.enabled {
                report.disabled += 1;
            }
        }
        let bundle = state.bundle_path();
        if bundle.exists() {
            report.extraction_needed = is_extraction_needed(&decode(&std::fs::read(&bundle)?)?);
        }
        Ok(report)
    }

    /// Run `f` against the tree under the lock.
    pub fn with_tree<T>(&self, f: impl FnOnce(&SectionTree) -> T) -> T {
        f(&self.lock().tree)
    }

    /// Root node of the section tree.
    pub fn root(&self) -> NodeId {
        self.lock().tree.root()
    }

    /// Settings the workspace was opened with.
    pub fn settings(&self) -> Settings {
        self.lock().settings.clone()
    }
}

fn script_file_name(name: &str) -> String {
    let suffix = format!(".{SCRIPT_EXTENSION}");
    if name.to_ascii_lowercase().ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{name}{suffix}")
    }
}
