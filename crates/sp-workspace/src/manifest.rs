//! Load-order manifest sync.
//!
//! The manifest is the persisted source of truth for ordering and load
//! flags across restarts: one line per node in depth-first order, disabled
//! lines prefixed with the skip character. Writes always overwrite the
//! whole file; incremental patching is a divergence bug waiting to happen.

use crate::error::{Result, WorkspaceError};
use sp_config::LineEnding;
use sp_tree::{determine_kind, NodeId, SectionKind, SectionTree, SEPARATOR_TOKEN};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prefix marking a manifest line as disabled.
pub const SKIP_CHAR: char = '#';

/// Result of reading a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Lines were replayed into the tree.
    Loaded { created: usize, skipped: usize },
    /// The file exists but holds no entries; nothing will load at runtime.
    Empty,
    /// No manifest on disk; treated as "nothing to read".
    Absent,
}

fn manifest_line(tree: &SectionTree, id: NodeId) -> Option<String> {
    let section = tree.get(id)?;
    if section.is_separator() {
        let mut rel = tree
            .relative(id)
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        rel.push(SEPARATOR_TOKEN);
        return Some(join_components(&rel));
    }
    tree.relative(id).map(|rel| join_components(&rel))
}

fn join_components(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Write the whole tree's load order to `path`, overwriting any previous
/// content. Returns the number of lines written.
pub fn write_manifest(tree: &SectionTree, path: &Path, line_ending: LineEnding) -> Result<usize> {
    let mut out = String::new();
    let mut count = 0;
    for id in tree.flatten() {
        let Some(line) = manifest_line(tree, id) else {
            continue;
        };
        let section = tree.get(id).ok_or(sp_tree::TreeError::UnknownNode)?;
        if !section.enabled {
            out.push(SKIP_CHAR);
        }
        out.push_str(&line);
        out.push_str(line_ending.as_str());
        count += 1;
    }

    std::fs::write(path, out).map_err(|e| WorkspaceError::fs(path, e))?;
    debug!(path = %path.display(), lines = count, "Manifest written");
    Ok(count)
}

/// Replay `path` into the tree, creating nodes for each referenced entry.
///
/// Lines whose resolved path no longer exists on disk are skipped with a
/// warning; manual deletions performed while the system was inactive must
/// not poison the load. An absent file and an all-blank file are both valid
/// non-error outcomes the caller can warn about.
pub fn read_manifest(tree: &mut SectionTree, path: &Path) -> Result<ReadOutcome> {
    if !path.exists() {
        info!(path = %path.display(), "No manifest found");
        return Ok(ReadOutcome::Absent);
    }
    let text = std::fs::read_to_string(path)?;

    let mut nonblank = 0;
    let mut created = 0;
    let mut skipped = 0;
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        nonblank += 1;

        let (disabled, entry) = match line.strip_prefix(SKIP_CHAR) {
            Some(rest) => (true, rest.trim()),
            None => (false, line),
        };

        match replay_line(tree, entry, disabled) {
            Ok(true) => created += 1,
            Ok(false) => {
                warn!(line = entry, "Manifest entry missing on disk, skipped");
                skipped += 1;
            }
            Err(e) => {
                warn!(line = entry, error = %e, "Manifest entry rejected, skipped");
                skipped += 1;
            }
        }
    }

    if nonblank == 0 {
        warn!(path = %path.display(), "Manifest is empty; nothing will load");
        return Ok(ReadOutcome::Empty);
    }
    info!(path = %path.display(), created, skipped, "Manifest read");
    Ok(ReadOutcome::Loaded { created, skipped })
}

/// Returns Ok(false) when the entry's backing path no longer exists.
fn replay_line(tree: &mut SectionTree, entry: &str, disabled: bool) -> Result<bool> {
    let rel: PathBuf = entry.split('/').collect();
    let abs = tree.root_path().join(&rel);

    if rel
        .file_name()
        .map(|n| n == SEPARATOR_TOKEN)
        .unwrap_or(false)
    {
        let parent = match rel.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent_rel) => {
                let parent_abs = tree.root_path().join(parent_rel);
                if !parent_abs.is_dir() {
                    return Ok(false);
                }
                tree.create_child(tree.root(), SectionKind::Folder, &parent_abs, None)?
            }
            None => tree.root(),
        };
        let id = tree.create_child(parent, SectionKind::Separator, Path::new(""), None)?;
        tree.set_enabled(id, !disabled)?;
        return Ok(true);
    }

    let kind = if abs.is_dir() {
        SectionKind::Folder
    } else if abs.is_file() {
        match determine_kind(&abs, None) {
            Some(SectionKind::Script) => SectionKind::Script,
            _ => return Ok(false),
        }
    } else {
        return Ok(false);
    };

    let id = tree.create_child(tree.root(), kind, &abs, None)?;
    // Only this node's own flag; descendants carry their own lines.
    tree.set_enabled(id, !disabled)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SectionTree) {
        let dir = TempDir::new().unwrap();
        let tree = SectionTree::new(dir.path());
        (dir, tree)
    }

    fn make_script(dir: &TempDir, tree: &mut SectionTree, rel: &str) -> NodeId {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "ok").unwrap();
        tree.create_child(tree.root(), SectionKind::Script, &path, None)
            .unwrap()
    }

    #[test]
    fn test_write_depth_first_with_skip_prefix() {
        // Disabling prefixes the line, re-enabling removes it.
        let (dir, mut tree) = setup();
        let a = make_script(&dir, &mut tree, "a.rb");
        make_script(&dir, &mut tree, "UI/button.rb");

        let manifest = dir.path().join("load_order.txt");
        tree.set_load_state(a, false).unwrap();
        let lines = write_manifest(&tree, &manifest, LineEnding::Lf).unwrap();
        assert_eq!(lines, 3);
        assert_eq!(
            std::fs::read_to_string(&manifest).unwrap(),
            "#a.rb\nUI\nUI/button.rb\n"
        );

        tree.set_load_state(a, true).unwrap();
        write_manifest(&tree, &manifest, LineEnding::Lf).unwrap();
        assert_eq!(
            std::fs::read_to_string(&manifest).unwrap(),
            "a.rb\nUI\nUI/button.rb\n"
        );
    }

    #[test]
    fn test_crlf_line_ending() {
        let (dir, mut tree) = setup();
        make_script(&dir, &mut tree, "a.rb");
        let manifest = dir.path().join("load_order.txt");
        write_manifest(&tree, &manifest, LineEnding::CrLf).unwrap();
        assert_eq!(std::fs::read_to_string(&manifest).unwrap(), "a.rb\r\n");
    }

    #[test]
    fn test_read_reconstructs_enabled_paths() {
        let (dir, mut tree) = setup();
        let a = make_script(&dir, &mut tree, "a.rb");
        make_script(&dir, &mut tree, "UI/button.rb");
        tree.set_load_state(a, false).unwrap();
        tree.create_child(tree.root(), SectionKind::Separator, Path::new(""), None)
            .unwrap();

        let manifest = dir.path().join("load_order.txt");
        write_manifest(&tree, &manifest, LineEnding::Lf).unwrap();

        // Fresh tree: read must reproduce the same enabled path set.
        let mut replayed = SectionTree::new(dir.path());
        let outcome = read_manifest(&mut replayed, &manifest).unwrap();
        assert!(matches!(
            outcome,
            ReadOutcome::Loaded {
                created: 4,
                skipped: 0
            }
        ));

        let enabled = |t: &SectionTree| -> Vec<String> {
            let mut v: Vec<String> = t
                .flatten()
                .into_iter()
                .filter_map(|id| {
                    let s = t.get(id)?;
                    (s.enabled && !s.is_separator())
                        .then(|| t.relative(id).map(|r| join_components(&r)))?
                })
                .collect();
            v.sort();
            v
        };
        assert_eq!(enabled(&tree), enabled(&replayed));
        assert!(!replayed.flatten().iter().any(|id| {
            let s = replayed.get(*id).unwrap();
            s.display_name() == "a.rb" && s.enabled
        }));
    }

    #[test]
    fn test_read_skips_missing_entries() {
        let (dir, mut tree) = setup();
        let manifest = dir.path().join("load_order.txt");
        std::fs::write(&dir.path().join("real.rb"), "ok").unwrap();
        std::fs::write(&manifest, "real.rb\ngone.rb\n").unwrap();

        let outcome = read_manifest(&mut tree, &manifest).unwrap();
        assert!(matches!(
            outcome,
            ReadOutcome::Loaded {
                created: 1,
                skipped: 1
            }
        ));
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_read_absent_and_empty() {
        let (dir, mut tree) = setup();
        let manifest = dir.path().join("load_order.txt");
        assert_eq!(
            read_manifest(&mut tree, &manifest).unwrap(),
            ReadOutcome::Absent
        );

        std::fs::write(&manifest, "\n  \n\n").unwrap();
        assert_eq!(
            read_manifest(&mut tree, &manifest).unwrap(),
            ReadOutcome::Empty
        );
        assert!(tree.is_empty());
    }

    #[test]
    fn test_nested_separator_roundtrip() {
        let (dir, mut tree) = setup();
        make_script(&dir, &mut tree, "UI/button.rb");
        let ui = tree.lookup(&dir.path().join("UI")).unwrap();
        tree.create_child(ui, SectionKind::Separator, Path::new(""), None)
            .unwrap();

        let manifest = dir.path().join("load_order.txt");
        write_manifest(&tree, &manifest, LineEnding::Lf).unwrap();
        let text = std::fs::read_to_string(&manifest).unwrap();
        assert!(text.contains(&format!("UI/{SEPARATOR_TOKEN}")));

        let mut replayed = SectionTree::new(dir.path());
        read_manifest(&mut replayed, &manifest).unwrap();
        let ui = replayed.lookup(&dir.path().join("UI")).unwrap();
        let has_separator = replayed
            .get(ui)
            .unwrap()
            .children()
            .iter()
            .any(|c| replayed.get(*c).unwrap().is_separator());
        assert!(has_separator);
    }
}
