//! Ingestion of external filesystem change notifications.
//!
//! The watcher (an external collaborator) delivers already-deduplicated
//! create/delete events. Events for paths the tree already tracks are our
//! own projector writes echoing back and are ignored, which breaks the
//! double-insertion feedback loop.

use crate::error::Result;
use sp_tree::{determine_kind, NodeId, SectionKind, SectionTree};
use std::path::PathBuf;
use tracing::debug;

/// One out-of-band filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsEvent {
    Created(PathBuf),
    Removed(PathBuf),
}

/// Fold an external event into the tree.
///
/// Returns the affected node, or `None` when the event was an echo of our
/// own write or concerned an entry the tree does not track. The filesystem
/// is not touched; the event reports a change that already happened.
pub fn apply_event(tree: &mut SectionTree, event: &FsEvent) -> Result<Option<NodeId>> {
    match event {
        FsEvent::Created(path) => {
            if tree.lookup(path).is_some() {
                debug!(path = %path.display(), "Create event for tracked path, ignored");
                return Ok(None);
            }
            let kind = if path.is_dir() {
                SectionKind::Folder
            } else {
                match determine_kind(path, None) {
                    Some(SectionKind::Script) => SectionKind::Script,
                    _ => return Ok(None),
                }
            };
            let id = tree.create_child(tree.root(), kind, path, None)?;
            debug!(path = %path.display(), "External create folded into tree");
            Ok(Some(id))
        }
        FsEvent::Removed(path) => match tree.lookup(path) {
            Some(id) => {
                tree.delete(id);
                debug!(path = %path.display(), "External delete folded into tree");
                Ok(Some(id))
            }
            None => Ok(None),
        },
    }
}
