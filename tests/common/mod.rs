//! On-disk fixtures shared by the integration tests.
//!
//! `build_full_dataset` lays out two projects the way a recording pipeline
//! would leave them: a two-subject project with folder sessions and a
//! folderless subject, and a second project with an associated empty-room
//! recording. `build_destination` is a minimal archive to merge into.

use std::fs;
use std::path::Path;

use serde_json::json;

pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn write_json(path: &Path, value: &serde_json::Value) {
    write_file(path, &serde_json::to_string_pretty(value).unwrap());
}

/// Source dataset: projects `test1` and `test2`.
///
/// - `test1/sub-1/ses-1`: two resting runs sharing a coordsystem file and a
///   marker file; run 1 was recorded on a KIT system.
/// - `test1/sub-1/ses-2`: a words run whose sidecar is inherited from the
///   project folder.
/// - `test1/sub-2`: a folderless subject with one oddball run.
/// - `test2/sub-3/ses-1`: a resting run referencing an empty-room scan
///   under `test2/sub-emptyroom`.
pub fn build_full_dataset(root: &Path) {
    let test1 = root.join("test1");
    write_file(&test1.join("README.txt"), "Test project one.\n");
    write_json(
        &test1.join("dataset_description.json"),
        &json!({"Name": "test1", "BIDSVersion": "1.1.1"}),
    );
    write_file(
        &test1.join("participants.tsv"),
        "participant_id\tage\tsex\tgroup\nsub-1\t2\tM\tautistic\nsub-2\t4\tF\tautistic\n",
    );
    write_json(
        &test1.join("task-words_meg.json"),
        &json!({"TaskName": "words", "PowerLineFrequency": 50}),
    );

    let ses1 = test1.join("sub-1").join("ses-1");
    write_file(
        &ses1.join("sub-1_ses-1_scans.tsv"),
        "filename\tacq_time\n\
         meg/sub-1_ses-1_task-resting_run-1_meg.con\t2018-10-26T11:32:33\n\
         meg/sub-1_ses-1_task-resting_run-2_meg.con\t2018-10-26T11:50:05\n",
    );
    let meg = ses1.join("meg");
    write_file(&meg.join("sub-1_ses-1_task-resting_run-1_meg.con"), "raw r1");
    write_json(
        &meg.join("sub-1_ses-1_task-resting_run-1_meg.json"),
        &json!({
            "Manufacturer": "KIT/Yokogawa",
            "PowerLineFrequency": 50,
            "RecordingDuration": 5,
            "TaskName": "resting",
            "MiscChannelCount": 93
        }),
    );
    write_file(
        &meg.join("sub-1_ses-1_task-resting_run-1_channels.tsv"),
        "name\ttype\nMEG 001\tmeggradaxial\n",
    );
    write_file(&meg.join("sub-1_ses-1_task-resting_run-2_meg.con"), "raw r2");
    write_json(
        &meg.join("sub-1_ses-1_task-resting_run-2_meg.json"),
        &json!({
            "Manufacturer": "Elekta",
            "PowerLineFrequency": 50,
            "TaskName": "resting"
        }),
    );
    write_json(
        &meg.join("sub-1_ses-1_coordsystem.json"),
        &json!({"MEGCoordinateSystem": "ALS"}),
    );
    write_file(&meg.join("sub-1_ses-1_markers.mrk"), "markers");

    let ses2 = test1.join("sub-1").join("ses-2");
    write_file(
        &ses2.join("sub-1_ses-2_scans.tsv"),
        "filename\tacq_time\nmeg/sub-1_ses-2_task-words_meg.con\t2018-11-02T09:00:00\n",
    );
    write_file(
        &ses2.join("meg").join("sub-1_ses-2_task-words_meg.con"),
        "raw words",
    );

    let sub2 = test1.join("sub-2");
    write_file(
        &sub2.join("sub-2_scans.tsv"),
        "filename\tacq_time\nmeg/sub-2_task-oddball_meg.con\t2018-10-26T12:00:00\n",
    );
    write_file(&sub2.join("meg").join("sub-2_task-oddball_meg.con"), "raw odd");
    write_json(
        &sub2.join("meg").join("sub-2_task-oddball_meg.json"),
        &json!({
            "Manufacturer": "Elekta",
            "PowerLineFrequency": 50,
            "TaskName": "oddball"
        }),
    );

    let test2 = root.join("test2");
    write_file(&test2.join("README.txt"), "Test project two.\n");
    write_json(
        &test2.join("dataset_description.json"),
        &json!({"Name": "test2", "BIDSVersion": "1.1.1"}),
    );
    write_file(
        &test2.join("participants.tsv"),
        "participant_id\tage\tsex\tgroup\nsub-3\t5\tF\tneurotypical\nsub-emptyroom\tn/a\tn/a\tn/a\n",
    );

    let sub3 = test2.join("sub-3").join("ses-1");
    write_file(
        &sub3.join("sub-3_ses-1_scans.tsv"),
        "filename\tacq_time\nmeg/sub-3_ses-1_task-resting_meg.con\t2018-10-26T13:00:00\n",
    );
    write_file(
        &sub3.join("meg").join("sub-3_ses-1_task-resting_meg.con"),
        "raw s3",
    );
    write_json(
        &sub3.join("meg").join("sub-3_ses-1_task-resting_meg.json"),
        &json!({
            "Manufacturer": "Elekta",
            "PowerLineFrequency": 50,
            "TaskName": "resting",
            "AssociatedEmptyRoom":
                "sub-emptyroom/ses-1/meg/sub-emptyroom_ses-1_task-noise_meg.con"
        }),
    );

    let er = test2.join("sub-emptyroom").join("ses-1");
    write_file(
        &er.join("sub-emptyroom_ses-1_scans.tsv"),
        "filename\tacq_time\nmeg/sub-emptyroom_ses-1_task-noise_meg.con\t2018-10-26T13:30:00\n",
    );
    write_file(
        &er.join("meg").join("sub-emptyroom_ses-1_task-noise_meg.con"),
        "raw er",
    );
    write_json(
        &er.join("meg").join("sub-emptyroom_ses-1_task-noise_meg.json"),
        &json!({"Manufacturer": "Elekta", "TaskName": "noise"}),
    );
}

/// Destination dataset: `test1` with only `sub-1/ses-1` run 1.
pub fn build_destination(root: &Path) {
    let test1 = root.join("test1");
    write_file(&test1.join("README.txt"), "Archive.\n");
    write_json(
        &test1.join("dataset_description.json"),
        &json!({"Name": "test1", "BIDSVersion": "1.1.1"}),
    );
    write_file(
        &test1.join("participants.tsv"),
        "participant_id\tage\tsex\tgroup\nsub-1\t2\tM\tautistic\n",
    );
    let ses1 = test1.join("sub-1").join("ses-1");
    write_file(
        &ses1.join("sub-1_ses-1_scans.tsv"),
        "filename\tacq_time\nmeg/sub-1_ses-1_task-resting_run-1_meg.con\t2018-10-26T11:32:33\n",
    );
    write_file(
        &ses1.join("meg").join("sub-1_ses-1_task-resting_run-1_meg.con"),
        "raw r1",
    );
    write_json(
        &ses1.join("meg").join("sub-1_ses-1_task-resting_run-1_meg.json"),
        &json!({
            "Manufacturer": "KIT/Yokogawa",
            "PowerLineFrequency": 50,
            "TaskName": "resting"
        }),
    );
}

/// A variant of `test1` where subject 2 records into real session folders.
pub fn build_sessioned_sub2(root: &Path) {
    let test1 = root.join("test1");
    write_file(
        &test1.join("participants.tsv"),
        "participant_id\tage\tsex\tgroup\nsub-2\t4\tF\tn/a\n",
    );
    let ses1 = test1.join("sub-2").join("ses-1");
    write_file(
        &ses1.join("sub-2_ses-1_scans.tsv"),
        "filename\tacq_time\nmeg/sub-2_ses-1_task-memory_meg.con\t2019-01-10T10:00:00\n",
    );
    write_file(
        &ses1.join("meg").join("sub-2_ses-1_task-memory_meg.con"),
        "raw mem",
    );
    write_json(
        &ses1.join("meg").join("sub-2_ses-1_task-memory_meg.json"),
        &json!({"Manufacturer": "Elekta", "TaskName": "memory"}),
    );
}
