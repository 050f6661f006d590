//! Bundle extraction: pull script sections out of the engine's bundle file
//! and materialize them as an editable tree of real files.

use crate::error::Result;
use crate::manifest::write_manifest;
use crate::projector::create_section;
use sp_bundle::{decode, encode, is_extraction_needed, loader_entry, LoaderParams};
use sp_config::Settings;
use sp_tree::{sanitize_name, SectionKind, SectionTree, FOLDER_SENTINEL, SCRIPT_EXTENSION};
use std::path::Path;
use tracing::{info, warn};

/// Result of an extraction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// The bundle holds only the loader; nothing was written.
    NotNeeded,
    /// Sections were materialized and the manifest rewritten.
    Extracted { sections: usize, manifest_lines: usize },
}

/// Extract `bundle_path` into the tree's root directory.
///
/// Entries become `NNNN - name` files/folders in bundle order; the loader
/// entry is skipped. Afterwards the manifest is rewritten and the bundle
/// itself is replaced (atomically, via temp file and rename) by a fresh
/// loader-only bundle, so a second pass reports [`ExtractOutcome::NotNeeded`]
/// and performs no writes.
pub fn extract_bundle(
    tree: &mut SectionTree,
    bundle_path: &Path,
    settings: &Settings,
    loader: &LoaderParams,
) -> Result<ExtractOutcome> {
    let entries = decode(&std::fs::read(bundle_path)?)?;
    if !is_extraction_needed(&entries) {
        info!(bundle = %bundle_path.display(), "Bundle already extracted");
        return Ok(ExtractOutcome::NotNeeded);
    }

    let root = tree.root();
    let root_path = tree.root_path().to_path_buf();
    let mut sections = 0;
    for entry in entries.iter().filter(|e| !e.is_loader()) {
        let name = sanitize_name(&entry.name);
        let kind = if name.is_empty() {
            SectionKind::Separator
        } else if entry.code.trim() == FOLDER_SENTINEL {
            SectionKind::Folder
        } else {
            SectionKind::Script
        };

        let path = match kind {
            SectionKind::Separator => root_path.clone(),
            SectionKind::Folder => root_path.join(format!("{sections:04} - {name}")),
            SectionKind::Script => {
                root_path.join(format!("{sections:04} - {name}.{SCRIPT_EXTENSION}"))
            }
        };
        let path = dedup_path(tree, path);

        match create_section(tree, root, kind, &path, None, Some(&entry.code)) {
            Ok(_) => sections += 1,
            Err(e) => {
                warn!(name = %entry.name, error = %e, "Section not materialized");
                return Err(e);
            }
        }
    }

    let manifest_path = root_path.join(&settings.manifest_name);
    let manifest_lines = write_manifest(tree, &manifest_path, settings.line_ending)?;

    write_loader_bundle(bundle_path, loader)?;

    info!(
        bundle = %bundle_path.display(),
        sections,
        manifest_lines,
        "Bundle extracted"
    );
    Ok(ExtractOutcome::Extracted {
        sections,
        manifest_lines,
    })
}

/// Replace `bundle_path` with a loader-only bundle. All-or-nothing: the new
/// bytes land in a temp file that is renamed over the original.
pub fn write_loader_bundle(bundle_path: &Path, loader: &LoaderParams) -> Result<()> {
    let bytes = encode(&[loader_entry(loader)])?;
    let tmp = bundle_path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| crate::error::WorkspaceError::fs(&tmp, e))?;
    std::fs::rename(&tmp, bundle_path)
        .map_err(|e| crate::error::WorkspaceError::fs(bundle_path, e))?;
    Ok(())
}

fn dedup_path(tree: &SectionTree, path: std::path::PathBuf) -> std::path::PathBuf {
    if tree.lookup(&path).is_none() {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut n = 2_u32;
    loop {
        let candidate = dir.join(format!("{stem} ({n}){ext}"));
        if tree.lookup(&candidate).is_none() {
            return candidate;
        }
        n += 1;
    }
}

/// Default loader parameters derived from the settings.
pub fn loader_params(settings: &Settings) -> LoaderParams {
    LoaderParams {
        scripts_path: settings.scripts_folder.clone(),
        manifest_name: settings.manifest_name.clone(),
        crash_log_path: settings.crash_log.clone(),
        skip_char: crate::manifest::SKIP_CHAR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sp_bundle::BundleEntry;
    use tempfile::TempDir;

    fn write_bundle(dir: &TempDir, entries: &[BundleEntry]) -> std::path::PathBuf {
        let path = dir.path().join("Scripts.rvdata2");
        std::fs::write(&path, encode(entries).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_extract_scenario_single_script() {
        // One entry becomes "0000 - main.rb" plus one manifest line.
        let dir = TempDir::new().unwrap();
        let scripts = dir.path().join("Scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        let bundle = write_bundle(&dir, &[BundleEntry::new(1, "main", "puts 1")]);

        let mut tree = SectionTree::new(&scripts);
        let settings = Settings::default();
        let outcome =
            extract_bundle(&mut tree, &bundle, &settings, &loader_params(&settings)).unwrap();
        assert_eq!(
            outcome,
            ExtractOutcome::Extracted {
                sections: 1,
                manifest_lines: 1
            }
        );

        let file = scripts.join("0000 - main.rb");
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "puts 1");
        assert_eq!(
            std::fs::read_to_string(scripts.join("load_order.txt")).unwrap(),
            "0000 - main.rb\n"
        );
    }

    #[test]
    fn test_extract_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let scripts = dir.path().join("Scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        let bundle = write_bundle(&dir, &[BundleEntry::new(1, "main", "puts 1")]);

        let mut tree = SectionTree::new(&scripts);
        let settings = Settings::default();
        let params = loader_params(&settings);
        extract_bundle(&mut tree, &bundle, &settings, &params).unwrap();

        // The bundle is now loader-only: second pass must not write.
        let file = scripts.join("0000 - main.rb");
        std::fs::write(&file, "edited by user").unwrap();
        let outcome = extract_bundle(&mut tree, &bundle, &settings, &params).unwrap();
        assert_eq!(outcome, ExtractOutcome::NotNeeded);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "edited by user");
    }

    #[test]
    fn test_extract_classifies_folders_and_separators() {
        let dir = TempDir::new().unwrap();
        let scripts = dir.path().join("Scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        let bundle = write_bundle(
            &dir,
            &[
                BundleEntry::new(1, "Modules", FOLDER_SENTINEL),
                BundleEntry::new(2, "", ""),
                BundleEntry::new(3, "main", "puts 1"),
            ],
        );

        let mut tree = SectionTree::new(&scripts);
        let settings = Settings::default();
        extract_bundle(&mut tree, &bundle, &settings, &loader_params(&settings)).unwrap();

        assert!(scripts.join("0000 - Modules").is_dir());
        assert!(scripts.join("0002 - main.rb").is_file());
        let kinds: Vec<SectionKind> = tree
            .flatten()
            .into_iter()
            .map(|id| tree.get(id).unwrap().kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::Folder,
                SectionKind::Separator,
                SectionKind::Script
            ]
        );
    }

    #[test]
    fn test_extract_dedups_colliding_titles() {
        let dir = TempDir::new().unwrap();
        let scripts = dir.path().join("Scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        // Same title twice, but the index prefix keeps paths distinct.
        let bundle = write_bundle(
            &dir,
            &[
                BundleEntry::new(1, "main", "puts 1"),
                BundleEntry::new(2, "main", "puts 2"),
            ],
        );

        let mut tree = SectionTree::new(&scripts);
        let settings = Settings::default();
        extract_bundle(&mut tree, &bundle, &settings, &loader_params(&settings)).unwrap();
        assert!(scripts.join("0000 - main.rb").is_file());
        assert!(scripts.join("0001 - main.rb").is_file());
    }

    #[test]
    fn test_extract_corrupt_bundle_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let scripts = dir.path().join("Scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        let bundle = dir.path().join("Scripts.rvdata2");
        std::fs::write(&bundle, b"\x04\x08i\x06").unwrap();

        let mut tree = SectionTree::new(&scripts);
        let settings = Settings::default();
        let err = extract_bundle(&mut tree, &bundle, &settings, &loader_params(&settings));
        assert!(err.is_err());
        assert!(tree.is_empty());
    }
}
