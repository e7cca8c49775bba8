//! Shared constants: reserved filenames, raw-data extensions, sidecar suffix
//! map, manufacturer identifiers.

/// Value written to TSV cells that have no data.
pub const NOT_APPLICABLE: &str = "n/a";

/// Sentinel session id used when a subject has no `ses-*` sub-folder.
pub const NO_FOLDER_SESSION_ID: &str = "none";

/// Pseudo-subject that holds empty-room calibration recordings.
pub const EMPTYROOM_SUBJECT_ID: &str = "emptyroom";

/// Project-level reserved filenames recorded as metadata pointers rather
/// than children.
pub const PARTICIPANTS_TSV: &str = "participants.tsv";
pub const PARTICIPANTS_JSON: &str = "participants.json";
pub const DATASET_DESCRIPTION: &str = "dataset_description.json";
pub const README_TXT: &str = "README.txt";

/// Raw-data extensions recognized when a session has no scans.tsv manifest.
pub const RAW_FILETYPES: &[&str] = &[".nii", ".bdf", ".con", ".sqd"];

/// Recording-type folders excluded from raw-scan enumeration.
pub const NON_SCAN_RECORDING_TYPES: &[&str] = &["anat", "dwi"];

/// MEG manufacturer that colocates marker files with the raw data.
pub const MANUFACTURER_KIT: &str = "KIT/Yokogawa";

/// Sidecar JSON keys the engine itself understands.
pub const KEY_MANUFACTURER: &str = "Manufacturer";
pub const KEY_ASSOCIATED_EMPTYROOM: &str = "AssociatedEmptyRoom";

/// Map from recording-type folder to the filename suffix its sidecar uses.
///
/// A `meg` scan's sidecar is `*_meg.json`, a fieldmap's is `*_phasediff.json`
/// and a functional scan's is `*_bold.json`.
pub fn sidecar_suffix(recording_type: &str) -> Option<&'static str> {
    match recording_type {
        "meg" => Some("meg"),
        "fmap" => Some("phasediff"),
        "func" => Some("bold"),
        _ => None,
    }
}
