//! Bundle packing: linearize the tree back into the engine's bundle file.

use crate::error::{Result, WorkspaceError};
use sp_bundle::{assign_section_ids, encode, loader_entry, BundleEntry, LoaderParams};
use sp_tree::{SectionKind, SectionTree, FOLDER_SENTINEL};
use std::path::Path;
use tracing::info;

/// Summary of a pack pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackReport {
    pub entries: usize,
    pub bytes: usize,
}

/// Linearize the tree into `out_path` as a full bundle.
///
/// The loader entry comes first so it runs before anything else; every tree
/// node follows in depth-first order with a freshly generated section id.
/// The write is all-or-nothing: bytes land in a temp file renamed over the
/// destination.
pub fn pack_bundle(
    tree: &SectionTree,
    out_path: &Path,
    loader: &LoaderParams,
) -> Result<PackReport> {
    let mut entries = vec![loader_entry(loader)];
    for id in tree.flatten() {
        let section = match tree.get(id) {
            Some(s) => s,
            None => continue,
        };
        let entry = match section.kind() {
            SectionKind::Separator => BundleEntry::new(0, "", ""),
            SectionKind::Folder => BundleEntry::new(0, relative_name(tree, id), FOLDER_SENTINEL),
            SectionKind::Script => {
                let raw = std::fs::read(section.path())
                    .map_err(|e| WorkspaceError::fs(section.path(), e))?;
                // Entry names are titles; the script extension is an
                // on-disk artifact and is stripped here.
                let mut name = relative_name(tree, id);
                let suffix = format!(".{}", sp_tree::SCRIPT_EXTENSION);
                if let Some(stem) = name.strip_suffix(&suffix) {
                    name = stem.to_string();
                }
                BundleEntry::new(0, name, String::from_utf8_lossy(&raw).into_owned())
            }
        };
        entries.push(entry);
    }
    assign_section_ids(&mut entries);

    let bytes = encode(&entries)?;
    let tmp = out_path.with_extension("tmp");
    std::fs::write(&tmp, &bytes).map_err(|e| WorkspaceError::fs(&tmp, e))?;
    std::fs::rename(&tmp, out_path).map_err(|e| WorkspaceError::fs(out_path, e))?;

    info!(
        path = %out_path.display(),
        entries = entries.len(),
        bytes = bytes.len(),
        "Bundle packed"
    );
    Ok(PackReport {
        entries: entries.len(),
        bytes: bytes.len(),
    })
}

fn relative_name(tree: &SectionTree, id: sp_tree::NodeId) -> String {
    tree.relative(id)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}
