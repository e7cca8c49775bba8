//! Renaming and deleting entities on disk.

mod common;

use bidstree::prelude::*;
use tempfile::tempdir;

use common::build_full_dataset;

#[test]
fn subject_rename_rewrites_every_trace_of_the_old_id() {
    let dir = tempdir().unwrap();
    build_full_dataset(dir.path());
    let mut tree = Tree::load(dir.path()).unwrap();

    tree.project_mut("test1")
        .unwrap()
        .rename_subject("2", "4")
        .unwrap();

    let sub4 = dir.path().join("test1/sub-4");
    assert!(sub4.is_dir());
    assert!(!dir.path().join("test1/sub-2").exists());
    assert!(sub4.join("meg/sub-4_task-oddball_meg.con").is_file());
    assert!(sub4.join("meg/sub-4_task-oddball_meg.json").is_file());
    assert!(sub4.join("sub-4_scans.tsv").is_file());

    let manifest = TsvTable::read(&sub4.join("sub-4_scans.tsv")).unwrap();
    assert_eq!(
        manifest.cell(0, "filename"),
        Some("meg/sub-4_task-oddball_meg.con")
    );

    let participants = TsvTable::read(&dir.path().join("test1/participants.tsv")).unwrap();
    assert!(participants.find_row("participant_id", "sub-4").is_some());
    assert!(participants.find_row("participant_id", "sub-2").is_none());

    // In-memory view and a fresh mapping agree.
    let subject = tree.project("test1").unwrap().subject("4").unwrap();
    assert_eq!(subject.age(), Some("4"));
    let reloaded = Tree::load(dir.path()).unwrap();
    let subject = reloaded.project("test1").unwrap().subject("4").unwrap();
    assert_eq!(subject.session("none").unwrap().scan_count(), 1);
}

#[test]
fn renaming_the_synthetic_session_promotes_it_to_a_folder() {
    let dir = tempdir().unwrap();
    build_full_dataset(dir.path());
    let mut tree = Tree::load(dir.path()).unwrap();

    tree.project_mut("test1")
        .unwrap()
        .rename_session("2", "none", "1")
        .unwrap();

    let ses1 = dir.path().join("test1/sub-2/ses-1");
    assert!(ses1.is_dir());
    assert!(ses1.join("meg/sub-2_ses-1_task-oddball_meg.con").is_file());
    assert!(ses1.join("sub-2_ses-1_scans.tsv").is_file());
    assert!(!dir.path().join("test1/sub-2/meg").exists());
    assert!(!dir.path().join("test1/sub-2/sub-2_scans.tsv").exists());

    let manifest = TsvTable::read(&ses1.join("sub-2_ses-1_scans.tsv")).unwrap();
    assert_eq!(
        manifest.cell(0, "filename"),
        Some("meg/sub-2_ses-1_task-oddball_meg.con")
    );

    let reloaded = Tree::load(dir.path()).unwrap();
    let sub2 = reloaded.project("test1").unwrap().subject("2").unwrap();
    assert_eq!(sub2.session_ids(), vec!["1"]);
    assert!(!sub2.session("1").unwrap().has_no_folder());
}

#[test]
fn session_rename_keeps_inherited_sidecars_in_place() {
    let dir = tempdir().unwrap();
    build_full_dataset(dir.path());
    let mut tree = Tree::load(dir.path()).unwrap();

    tree.project_mut("test1")
        .unwrap()
        .rename_session("1", "2", "3")
        .unwrap();

    let ses3 = dir.path().join("test1/sub-1/ses-3");
    assert!(ses3.join("meg/sub-1_ses-3_task-words_meg.con").is_file());
    assert!(!dir.path().join("test1/sub-1/ses-2").exists());
    // The project-level sidecar did not move.
    assert!(dir.path().join("test1/task-words_meg.json").is_file());

    let reloaded = Tree::load(dir.path()).unwrap();
    let test1 = reloaded.project("test1").unwrap();
    let filter = ScanFilter::new().task("words").unwrap();
    let scan = test1.scan_ref("1", "3", &filter).unwrap();
    assert_eq!(
        scan.info_value("TaskName"),
        Some(&serde_json::Value::from("words"))
    );
}

#[test]
fn new_labels_must_be_sane() {
    let dir = tempdir().unwrap();
    build_full_dataset(dir.path());
    let mut tree = Tree::load(dir.path()).unwrap();
    let project = tree.project_mut("test1").unwrap();

    assert!(matches!(
        project.rename_subject("1", "sub-5"),
        Err(BidsError::InvalidId { .. })
    ));
    assert!(matches!(
        project.rename_subject("1", "2"),
        Err(BidsError::InvalidId { .. })
    ));
    assert!(project.rename_subject("9", "5").unwrap_err().is_not_found());
}

#[test]
fn scan_delete_spares_files_shared_with_siblings() {
    let dir = tempdir().unwrap();
    build_full_dataset(dir.path());
    let mut tree = Tree::load(dir.path()).unwrap();

    let filter = ScanFilter::new().run("2").unwrap();
    tree.project_mut("test1")
        .unwrap()
        .delete_scan("1", "1", &filter)
        .unwrap();

    let meg = dir.path().join("test1/sub-1/ses-1/meg");
    assert!(!meg.join("sub-1_ses-1_task-resting_run-2_meg.con").exists());
    assert!(!meg.join("sub-1_ses-1_task-resting_run-2_meg.json").exists());
    // Still referenced by run 1.
    assert!(meg.join("sub-1_ses-1_coordsystem.json").is_file());
    assert!(meg.join("sub-1_ses-1_markers.mrk").is_file());
    assert!(meg.join("sub-1_ses-1_task-resting_run-1_meg.con").is_file());

    let manifest =
        TsvTable::read(&dir.path().join("test1/sub-1/ses-1/sub-1_ses-1_scans.tsv")).unwrap();
    assert_eq!(manifest.len(), 1);

    let session = tree
        .project("test1")
        .unwrap()
        .subject("1")
        .unwrap()
        .session("1")
        .unwrap();
    assert_eq!(session.scan_count(), 1);
}

#[test]
fn deleting_the_last_scan_removes_the_session_itself() {
    let dir = tempdir().unwrap();
    build_full_dataset(dir.path());
    let mut tree = Tree::load(dir.path()).unwrap();
    let project = tree.project_mut("test1").unwrap();

    let filter = ScanFilter::new().run("2").unwrap();
    project.delete_scan("1", "1", &filter).unwrap();
    let filter = ScanFilter::new().run("1").unwrap();
    project.delete_scan("1", "1", &filter).unwrap();

    // The emptied session is gone entirely: folder, manifest and entry.
    assert!(!dir.path().join("test1/sub-1/ses-1").exists());
    let sub1 = tree.project("test1").unwrap().subject("1").unwrap();
    assert_eq!(sub1.session_ids(), vec!["2"]);
}

#[test]
fn session_delete_removes_the_folder_but_not_inherited_files() {
    let dir = tempdir().unwrap();
    build_full_dataset(dir.path());
    let mut tree = Tree::load(dir.path()).unwrap();

    tree.project_mut("test1")
        .unwrap()
        .delete_session("1", "2")
        .unwrap();

    assert!(!dir.path().join("test1/sub-1/ses-2").exists());
    assert!(dir.path().join("test1/task-words_meg.json").is_file());
    let sub1 = tree.project("test1").unwrap().subject("1").unwrap();
    assert_eq!(sub1.session_ids(), vec!["1"]);
}

#[test]
fn subject_delete_cascades_and_prunes_the_participants_row() {
    let dir = tempdir().unwrap();
    build_full_dataset(dir.path());
    let mut tree = Tree::load(dir.path()).unwrap();

    tree.project_mut("test1").unwrap().delete_subject("2").unwrap();

    assert!(!dir.path().join("test1/sub-2").exists());
    let participants = TsvTable::read(&dir.path().join("test1/participants.tsv")).unwrap();
    assert!(participants.find_row("participant_id", "sub-2").is_none());
    assert_eq!(participants.len(), 1);
    assert!(tree.project("test1").unwrap().subject("2").unwrap_err().is_not_found());
}

#[test]
fn project_delete_removes_the_whole_folder() {
    let dir = tempdir().unwrap();
    build_full_dataset(dir.path());
    let mut tree = Tree::load(dir.path()).unwrap();

    tree.delete_project("test2").unwrap();
    assert!(!dir.path().join("test2").exists());
    assert!(tree.project("test2").unwrap_err().is_not_found());
    assert!(tree.delete_project("test2").unwrap_err().is_not_found());
}
