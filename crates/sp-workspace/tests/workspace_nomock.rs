//! End-to-end workspace tests against real temp directories: a game bundle
//! is unpacked into a script tree, edited through the editor facade, and
//! packed back.

use sp_bundle::{decode, encode, is_extraction_needed, BundleEntry, LOADER_SECTION_ID};
use sp_tree::SectionKind;
use sp_workspace::{Editor, ExtractOutcome, FsEvent};
use std::path::PathBuf;
use tempfile::TempDir;

fn seed_game(dir: &TempDir, entries: &[BundleEntry]) -> PathBuf {
    let data_dir = dir.path().join("Data");
    std::fs::create_dir_all(&data_dir).unwrap();
    let bundle = data_dir.join("Scripts.rvdata2");
    std::fs::write(&bundle, encode(entries).unwrap()).unwrap();
    bundle
}

#[test]
fn test_extract_edit_pack_roundtrip() {
    let dir = TempDir::new().unwrap();
    let bundle = seed_game(
        &dir,
        &[
            BundleEntry::new(10, "Main", "puts 'hello'\n"),
            BundleEntry::new(11, "Scene_Map", "class Scene_Map\nend\n"),
        ],
    );

    let editor = Editor::open(dir.path()).unwrap();
    let outcome = editor.extract().unwrap();
    assert!(matches!(
        outcome,
        ExtractOutcome::Extracted { sections: 2, .. }
    ));

    let scripts = dir.path().join("Scripts");
    assert!(scripts.join("0000 - Main.rb").exists());
    assert!(scripts.join("0001 - Scene_Map.rb").exists());
    let body = std::fs::read_to_string(scripts.join("0000 - Main.rb")).unwrap();
    assert!(body.contains("puts 'hello'"));

    // The bundle on disk is now loader-only.
    assert!(!is_extraction_needed(
        &decode(&std::fs::read(&bundle).unwrap()).unwrap()
    ));
    assert!(matches!(editor.extract().unwrap(), ExtractOutcome::NotNeeded));

    // Edit: add a script, disable another.
    let root = editor.root();
    editor.create(root, SectionKind::Script, "Patch").unwrap();
    let scene = editor
        .with_tree(|tree| tree.lookup(&scripts.join("0001 - Scene_Map.rb")))
        .unwrap();
    editor.set_enabled(scene, false).unwrap();

    let report = editor.pack().unwrap();
    assert_eq!(report.entries, 4); // loader + three scripts

    let packed = decode(&std::fs::read(&bundle).unwrap()).unwrap();
    assert_eq!(packed[0].section_id, LOADER_SECTION_ID);
    let names: Vec<&str> = packed[1..].iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["0000 - Main", "0001 - Scene_Map", "Patch"]);
    assert!(packed
        .iter()
        .skip(1)
        .all(|e| e.section_id != LOADER_SECTION_ID));
}

#[test]
fn test_manifest_survives_reopen() {
    let dir = TempDir::new().unwrap();
    seed_game(&dir, &[BundleEntry::new(1, "Main", "x = 1\n")]);

    {
        let editor = Editor::open(dir.path()).unwrap();
        editor.extract().unwrap();
        let root = editor.root();
        let folder = editor.create(root, SectionKind::Folder, "Addons").unwrap();
        editor.create(folder, SectionKind::Script, "extra").unwrap();
        editor.set_enabled(folder, false).unwrap();
    }

    let editor = Editor::open(dir.path()).unwrap();
    let scripts = dir.path().join("Scripts");
    let manifest = std::fs::read_to_string(scripts.join("load_order.txt")).unwrap();
    assert!(manifest.contains("0000 - Main.rb"));
    assert!(manifest.contains("#Addons"));
    assert!(manifest.contains("#Addons/extra.rb"));

    let addons = editor
        .with_tree(|tree| tree.lookup(&scripts.join("Addons")))
        .unwrap();
    let enabled = editor.with_tree(|tree| tree.get(addons).map(|s| s.enabled));
    assert_eq!(enabled, Some(false));
}

#[test]
fn test_external_drop_in_lands_in_manifest() {
    let dir = TempDir::new().unwrap();
    let editor = Editor::open(dir.path()).unwrap();

    let scripts = dir.path().join("Scripts");
    let dropped = scripts.join("community_patch.rb");
    std::fs::write(&dropped, "# patch\n").unwrap();

    let folded = editor.notify(&FsEvent::Created(dropped.clone())).unwrap();
    assert!(folded.is_some());

    let manifest = std::fs::read_to_string(scripts.join("load_order.txt")).unwrap();
    assert!(manifest.contains("community_patch.rb"));

    std::fs::remove_file(&dropped).unwrap();
    editor.notify(&FsEvent::Removed(dropped)).unwrap();
    let manifest = std::fs::read_to_string(scripts.join("load_order.txt")).unwrap();
    assert!(!manifest.contains("community_patch.rb"));
}

#[test]
fn test_status_reflects_bundle_state() {
    let dir = TempDir::new().unwrap();
    seed_game(&dir, &[BundleEntry::new(7, "Main", "x\n")]);

    let editor = Editor::open(dir.path()).unwrap();
    assert!(editor.status().unwrap().extraction_needed);

    editor.extract().unwrap();
    let report = editor.status().unwrap();
    assert!(!report.extraction_needed);
    assert_eq!(report.scripts, 1);
}
