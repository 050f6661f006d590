//! Filesystem projection of tree mutations.
//!
//! Every operation pairs a tree mutation with its filesystem effect and
//! commits the pair atomically from the caller's point of view: if the
//! filesystem side fails, the tree mutation is rolled back (or never made)
//! and the error surfaces untouched.

use crate::error::{Result, WorkspaceError};
use sp_tree::{NodeId, PastedNode, Section, SectionKind, SectionTree};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Encoding preamble written into newly created script files so the target
/// runtime reads them as UTF-8.
pub const SCRIPT_PREAMBLE: &str = "# encoding: utf-8\n";

/// Create a section and its filesystem entry.
///
/// Intermediate folders implied by `path` are created on both sides.
/// `contents` seeds script files; `None` writes the encoding preamble only.
pub fn create_section(
    tree: &mut SectionTree,
    parent: NodeId,
    kind: SectionKind,
    path: &Path,
    position: Option<usize>,
    contents: Option<&str>,
) -> Result<NodeId> {
    let preexisting = kind != SectionKind::Separator && tree.lookup(path).is_some();
    // Topmost node the create is about to add, intermediate folders
    // included. On filesystem failure, deleting it unwinds the whole chain.
    let rollback_top = if preexisting || kind == SectionKind::Separator {
        None
    } else {
        first_untracked_prefix(tree, parent, path)
    };
    let id = tree.create_child(parent, kind, path, position)?;
    if preexisting || kind == SectionKind::Separator {
        return Ok(id);
    }

    let effect = match kind {
        SectionKind::Folder => std::fs::create_dir_all(path),
        SectionKind::Script => path
            .parent()
            .map_or(Ok(()), std::fs::create_dir_all)
            .and_then(|()| {
                if path.exists() {
                    Ok(())
                } else {
                    std::fs::write(path, contents.unwrap_or(SCRIPT_PREAMBLE))
                }
            }),
        SectionKind::Separator => Ok(()),
    };

    if let Err(source) = effect {
        if let Some(top) = rollback_top.as_deref().and_then(|p| tree.lookup(p)) {
            tree.delete(top);
        }
        return Err(WorkspaceError::fs(path, source));
    }
    debug!(kind = %kind, path = %path.display(), "Section created");
    Ok(id)
}

/// First prefix of `path` below `parent` that the tree does not track yet;
/// everything from there down is new to the coming create.
fn first_untracked_prefix(tree: &SectionTree, parent: NodeId, path: &Path) -> Option<PathBuf> {
    let mut cur = tree.get(parent)?.path().to_path_buf();
    let rel = path.strip_prefix(&cur).ok()?.to_path_buf();
    for component in rel.components() {
        cur = cur.join(component);
        if tree.lookup(&cur).is_none() {
            return Some(cur);
        }
    }
    None
}

/// Delete a section, removing its file or directory (recursively) first.
///
/// An entry already missing on disk does not block the tree-side delete;
/// that is drift we are reconciling, not an error.
pub fn delete_section(tree: &mut SectionTree, id: NodeId) -> Result<Section> {
    let section = tree.get(id).ok_or(sp_tree::TreeError::UnknownNode)?;
    let path = section.path().to_path_buf();

    if section.kind().has_fs_entry() && path.exists() {
        let effect = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        if let Err(source) = effect {
            return Err(WorkspaceError::fs(path, source));
        }
    }

    let removed = tree.delete(id).ok_or(sp_tree::TreeError::UnknownNode)?;
    debug!(path = %path.display(), "Section deleted");
    Ok(removed)
}

/// Rename a section in place (same directory), renaming the filesystem
/// entry first.
pub fn rename_section(tree: &mut SectionTree, id: NodeId, new_path: &Path) -> Result<()> {
    tree.can_rename(id, new_path)?;
    let section = tree.get(id).ok_or(sp_tree::TreeError::UnknownNode)?;
    let old_path = section.path().to_path_buf();

    if section.kind().has_fs_entry() {
        std::fs::rename(&old_path, new_path).map_err(|e| WorkspaceError::fs(&old_path, e))?;
    }
    tree.rename(id, new_path)?;
    Ok(())
}

/// Move sections relative to `target` under the tree's placement mode,
/// relocating filesystem entries in lockstep.
///
/// Validation happens before any filesystem call; if a rename fails midway
/// the already-renamed entries are moved back (best effort) and the tree is
/// left unchanged.
pub fn move_sections(
    tree: &mut SectionTree,
    sources: &[NodeId],
    target: NodeId,
) -> Result<Vec<sp_tree::MovedPath>> {
    let plan = tree.plan_move(sources, target)?;

    let mut done: Vec<&sp_tree::MovedPath> = Vec::new();
    for moved in &plan {
        let relocates = moved.from != moved.to
            && tree
                .get(moved.id)
                .is_some_and(|s| s.kind().has_fs_entry());
        if !relocates {
            continue;
        }
        if let Err(source) = std::fs::rename(&moved.from, &moved.to) {
            for undone in done.into_iter().rev() {
                if let Err(e) = std::fs::rename(&undone.to, &undone.from) {
                    warn!(path = %undone.to.display(), error = %e, "Rollback rename failed");
                }
            }
            return Err(WorkspaceError::fs(&moved.from, source));
        }
        done.push(moved);
    }

    let committed = tree.move_sections(sources, target)?;
    debug!(moved = committed.len(), "Sections moved");
    Ok(committed)
}

/// Paste the clipboard at `target`, materializing files and directories for
/// every recreated node. Script contents are copied from the node each clip
/// was taken from; sources deleted since the copy fall back to the preamble.
pub fn paste_sections(
    tree: &mut SectionTree,
    target: NodeId,
) -> Result<Vec<PastedNode>> {
    let created = tree.paste(target)?;

    for node in &created {
        let effect = match node.kind {
            SectionKind::Folder => std::fs::create_dir_all(&node.path),
            SectionKind::Script => {
                let contents = std::fs::read(&node.source_path)
                    .unwrap_or_else(|_| SCRIPT_PREAMBLE.as_bytes().to_vec());
                node.path
                    .parent()
                    .map_or(Ok(()), std::fs::create_dir_all)
                    .and_then(|()| std::fs::write(&node.path, contents))
            }
            SectionKind::Separator => Ok(()),
        };
        if let Err(source) = effect {
            rollback_paste(tree, &created);
            return Err(WorkspaceError::fs(&node.path, source));
        }
    }
    debug!(created = created.len(), "Sections pasted");
    Ok(created)
}

fn rollback_paste(tree: &mut SectionTree, created: &[PastedNode]) {
    // Deleting the top-level created nodes drops their subtrees with them.
    let ids: Vec<NodeId> = created.iter().map(|n| n.id).collect();
    for node in created {
        let is_top = tree
            .get(node.id)
            .and_then(|s| s.parent())
            .map_or(true, |p| !ids.contains(&p));
        if is_top {
            if node.kind.has_fs_entry() && node.path.exists() {
                let effect = if node.path.is_dir() {
                    std::fs::remove_dir_all(&node.path)
                } else {
                    std::fs::remove_file(&node.path)
                };
                if let Err(e) = effect {
                    warn!(path = %node.path.display(), error = %e, "Rollback cleanup failed");
                }
            }
            tree.delete(node.id);
        }
    }
}

/// Reconcile the tree with the directory it mirrors.
///
/// Walks `dir` recursively in name order, creating nodes for scripts and
/// folders not already present. Idempotent; exists to absorb drift that
/// happened while the system was not running. Returns the number of nodes
/// added.
pub fn scan(tree: &mut SectionTree, dir: &Path) -> Result<usize> {
    let root = tree.root();
    let added = scan_dir(tree, root, dir)?;
    info!(dir = %dir.display(), added, "Scan complete");
    Ok(added)
}

fn scan_dir(tree: &mut SectionTree, parent: NodeId, dir: &Path) -> Result<usize> {
    let mut entries: Vec<std::fs::DirEntry> = std::fs::read_dir(dir)
        .map_err(|e| WorkspaceError::fs(dir, e))?
        .collect::<std::io::Result<_>>()
        .map_err(|e| WorkspaceError::fs(dir, e))?;
    entries.sort_by_key(|e| e.file_name());

    let mut added = 0;
    for entry in entries {
        let path = entry.path();
        let kind = if path.is_dir() {
            SectionKind::Folder
        } else {
            match sp_tree::determine_kind(&path, None) {
                Some(SectionKind::Script) => SectionKind::Script,
                _ => continue,
            }
        };

        let id = match tree.lookup(&path) {
            Some(existing) => existing,
            None => match tree.create_child(parent, kind, &path, None) {
                Ok(id) => {
                    added += 1;
                    id
                }
                // Entries dropped in from outside can carry names the bundle
                // and manifest formats cannot hold; leave them on disk and
                // keep going, like a bad manifest line.
                Err(sp_tree::TreeError::InvalidName { offending, .. }) => {
                    warn!(path = %path.display(), offending, "Entry name not representable, skipped");
                    continue;
                }
                Err(e) => return Err(e.into()),
            },
        };
        if kind == SectionKind::Folder {
            added += scan_dir(tree, id, &path)?;
        }
    }
    Ok(added)
}
