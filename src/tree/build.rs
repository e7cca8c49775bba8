//! Directory-driven construction of the hierarchy.
//!
//! Loading never writes to disk. Each level mirrors the folder convention:
//! tree root -> project folders -> `sub-*` folders -> `ses-*` folders (or the
//! subject folder itself when no session folders exist) -> scans listed by a
//! `*_scans.tsv` manifest, with a raw-file fallback when the manifest is
//! missing.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::core::constants::{
    DATASET_DESCRIPTION, KEY_MANUFACTURER, MANUFACTURER_KIT, NON_SCAN_RECORDING_TYPES,
    NO_FOLDER_SESSION_ID, PARTICIPANTS_JSON, PARTICIPANTS_TSV, RAW_FILETYPES, README_TXT,
    sidecar_suffix,
};
use crate::core::errors::{BidsError, Result};
use crate::core::filename::FilenameParams;
use crate::core::paths::{realize_path, relative_to, to_forward_slashes};
use crate::core::tsv::TsvTable;
use crate::tree::{Project, Scan, Session, Subject, Tree};

impl Tree {
    /// Map an existing BIDS folder into memory.
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let mut projects = BTreeMap::new();
        for entry in fs::read_dir(&root).map_err(|e| BidsError::io(&root, e))? {
            let entry = entry.map_err(|e| BidsError::io(&root, e))?;
            let path = entry.path();
            if path.is_dir() {
                let id = entry.file_name().to_string_lossy().into_owned();
                debug!(project = %id, "mapping project");
                let project = Project::load(&root, &id)?;
                projects.insert(id, project);
            }
        }
        Ok(Self { root, projects })
    }

    /// An empty tree rooted at `root`, created on disk if absent. Content
    /// arrives through merges.
    pub fn empty(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| BidsError::io(&root, e))?;
        Ok(Self {
            root,
            projects: BTreeMap::new(),
        })
    }
}

impl Project {
    /// Map one project folder, including all of its subjects.
    pub(crate) fn load(root: &Path, id: &str) -> Result<Self> {
        let path = root.join(id);
        let mut project = Self::shell(root, id);
        let mut subject_ids = Vec::new();

        for entry in fs::read_dir(&path).map_err(|e| BidsError::io(&path, e))? {
            let entry = entry.map_err(|e| BidsError::io(&path, e))?;
            let entry_path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry_path.is_dir() {
                if let Some(sub_id) = name.strip_prefix("sub-") {
                    subject_ids.push(sub_id.to_string());
                }
            } else {
                match name.as_str() {
                    PARTICIPANTS_TSV => project.participants_tsv = Some(entry_path),
                    PARTICIPANTS_JSON => project.participants_json = Some(entry_path),
                    DATASET_DESCRIPTION => project.description = Some(entry_path),
                    README_TXT => project.readme = Some(entry_path),
                    _ => {}
                }
            }
        }

        if subject_ids.is_empty() {
            return Err(BidsError::Mapping {
                details: format!("project {id} contains no subjects"),
            });
        }

        let participants = project
            .participants_tsv
            .as_deref()
            .map(TsvTable::read)
            .transpose()?;

        for sub_id in subject_ids {
            let subject = Subject::load(root, id, &sub_id, participants.as_ref())?;
            project.subjects.insert(sub_id, subject);
        }
        Ok(project)
    }

    /// A project with no subjects and no recorded metadata files.
    pub(crate) fn shell(root: &Path, id: &str) -> Self {
        Self {
            id: id.to_string(),
            root: root.to_path_buf(),
            subjects: BTreeMap::new(),
            participants_tsv: None,
            participants_json: None,
            description: None,
            readme: None,
        }
    }
}

impl Subject {
    pub(crate) fn load(
        root: &Path,
        project_id: &str,
        id: &str,
        participants: Option<&TsvTable>,
    ) -> Result<Self> {
        let mut subject = Self::shell(root, project_id, id);
        let path = subject.path();

        let mut session_ids = Vec::new();
        for entry in fs::read_dir(&path).map_err(|e| BidsError::io(&path, e))? {
            let entry = entry.map_err(|e| BidsError::io(&path, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir()
                && let Some(ses_id) = name.strip_prefix("ses-")
            {
                session_ids.push(ses_id.to_string());
            }
        }

        if session_ids.is_empty() {
            // Files sit directly in the subject folder: one synthetic session.
            let session = Session::load(root, project_id, id, NO_FOLDER_SESSION_ID, true)?;
            subject
                .sessions
                .insert(NO_FOLDER_SESSION_ID.to_string(), session);
        } else {
            for ses_id in session_ids {
                let session = Session::load(root, project_id, id, &ses_id, false)?;
                subject.sessions.insert(ses_id, session);
            }
        }

        if let Some(table) = participants {
            let label = subject.label();
            if let Some(row) = table.find_row("participant_id", &label) {
                subject.subject_data = table
                    .row_pairs(row)
                    .into_iter()
                    .filter(|(column, _)| *column != "participant_id")
                    .map(|(column, value)| (column.to_string(), value.map(String::from)))
                    .collect();
            }
        }
        Ok(subject)
    }

    pub(crate) fn shell(root: &Path, project_id: &str, id: &str) -> Self {
        Self {
            id: id.to_string(),
            project_id: project_id.to_string(),
            root: root.to_path_buf(),
            sessions: BTreeMap::new(),
            subject_data: Vec::new(),
        }
    }
}

impl Session {
    pub(crate) fn load(
        root: &Path,
        project_id: &str,
        subject_id: &str,
        id: &str,
        no_folder: bool,
    ) -> Result<Self> {
        let mut session = Self::shell(root, project_id, subject_id, id, no_folder);
        let path = session.path();

        for entry in fs::read_dir(&path).map_err(|e| BidsError::io(&path, e))? {
            let entry = entry.map_err(|e| BidsError::io(&path, e))?;
            if entry.path().is_file() {
                let name = entry.file_name().to_string_lossy().into_owned();
                let params = FilenameParams::parse(&name);
                if params.file() == Some("scans") && params.ext() == ".tsv" {
                    session.scans_tsv = Some(name);
                    break;
                }
            }
        }

        if let Some(manifest) = session.scans_tsv.clone() {
            let table = TsvTable::read(&path.join(&manifest))?;
            for row in 0..table.len() {
                let Some(filename) = table.cell(row, "filename") else {
                    continue;
                };
                let acq_time = table.cell(row, "acq_time").map(String::from);
                let extras: Vec<(String, Option<String>)> = table
                    .row_pairs(row)
                    .into_iter()
                    .filter(|(column, _)| *column != "filename" && *column != "acq_time")
                    .map(|(column, value)| (column.to_string(), value.map(String::from)))
                    .collect();
                let scan = load_scan(&session, filename, acq_time, extras)?;
                session.scans.push(scan);
            }
        } else {
            for relative in raw_file_fallback(&path, no_folder)? {
                let scan = load_scan(&session, &relative, None, Vec::new())?;
                session.scans.push(scan);
            }
        }

        if session.scans.is_empty() {
            return Err(BidsError::Mapping {
                details: format!(
                    "no scans found in {}/sub-{}/{}",
                    session.project_id,
                    session.subject_id,
                    session.label()
                ),
            });
        }
        Ok(session)
    }

    pub(crate) fn shell(
        root: &Path,
        project_id: &str,
        subject_id: &str,
        id: &str,
        no_folder: bool,
    ) -> Self {
        Self {
            id: id.to_string(),
            subject_id: subject_id.to_string(),
            project_id: project_id.to_string(),
            root: root.to_path_buf(),
            no_folder,
            scans_tsv: None,
            scans: Vec::new(),
        }
    }
}

/// Enumerate raw data files by extension when no manifest exists: every
/// recording-type sub-folder except the anatomical ones.
fn raw_file_fallback(session_path: &Path, no_folder: bool) -> Result<Vec<String>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(session_path).map_err(|e| BidsError::io(session_path, e))? {
        let entry = entry.map_err(|e| BidsError::io(session_path, e))?;
        let folder_path = entry.path();
        if !folder_path.is_dir() {
            continue;
        }
        let folder = entry.file_name().to_string_lossy().into_owned();
        if NON_SCAN_RECORDING_TYPES.contains(&folder.as_str()) {
            continue;
        }
        if !no_folder && folder.starts_with("ses-") {
            continue;
        }
        collect_raw_files(&folder_path, &folder, &mut found)?;
    }
    found.sort_unstable();
    Ok(found)
}

fn collect_raw_files(folder_path: &Path, prefix: &str, found: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(folder_path).map_err(|e| BidsError::io(folder_path, e))? {
        let entry = entry.map_err(|e| BidsError::io(folder_path, e))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() {
            collect_raw_files(&path, &format!("{prefix}/{name}"), found)?;
        } else if RAW_FILETYPES
            .iter()
            .any(|ext| name.ends_with(ext))
        {
            found.push(format!("{prefix}/{name}"));
        }
    }
    Ok(())
}

/// Build one scan from its manifest row: parse the filename entities, then
/// associate the sidecar and any sibling metadata files by parameter subset.
pub(crate) fn load_scan(
    session: &Session,
    relative: &str,
    acq_time: Option<String>,
    extra_cols: Vec<(String, Option<String>)>,
) -> Result<Scan> {
    let session_path = session.path();
    let raw_abs = realize_path(&session_path, relative);
    let raw_name = raw_abs
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut raw_params = FilenameParams::parse(&raw_name);
    let part = raw_params.take_part();

    let mut scan = Scan {
        raw_file: to_forward_slashes(relative),
        acq_time,
        sidecar: None,
        associated: BTreeMap::new(),
        info: serde_json::Map::new(),
        extra_cols,
        task: raw_params.get("task").map(String::from),
        acquisition: raw_params.get("acq").map(String::from),
        run: raw_params.get("run").map(String::from),
        proc: raw_params.get("proc").map(String::from),
        part,
        session_id: session.id.clone(),
        subject_id: session.subject_id.clone(),
        project_id: session.project_id.clone(),
        root: session.root.clone(),
        session_no_folder: session.no_folder,
    };

    let raw_dir = raw_abs.parent().unwrap_or(&session_path).to_path_buf();
    let recording_type = raw_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let expected_suffix = sidecar_suffix(&recording_type)
        .map(String::from)
        .unwrap_or_else(|| raw_params.file().unwrap_or(&recording_type).to_string());

    associate_siblings(
        &mut scan,
        &raw_params,
        &raw_abs,
        &raw_dir,
        &session_path,
        &expected_suffix,
    )?;

    if scan.sidecar.is_none() {
        inherit_sidecar(&mut scan, &raw_params, &session_path, &expected_suffix)?;
    }

    if let Some(sidecar_abs) = scan.sidecar_path() {
        let raw = fs::read_to_string(&sidecar_abs).map_err(|e| BidsError::io(&sidecar_abs, e))?;
        let value: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| BidsError::json(&sidecar_abs, &e))?;
        if let serde_json::Value::Object(map) = value {
            scan.info = map;
        }
    }

    if scan.info_value(KEY_MANUFACTURER).and_then(|v| v.as_str()) == Some(MANUFACTURER_KIT) {
        associate_markers(&mut scan, &raw_params, &raw_dir, &session_path)?;
    }
    Ok(scan)
}

/// Walk the raw file's folder and claim every file whose filename
/// parameters are a subset of the raw file's.
fn associate_siblings(
    scan: &mut Scan,
    raw_params: &FilenameParams,
    raw_abs: &Path,
    raw_dir: &Path,
    session_path: &Path,
    expected_suffix: &str,
) -> Result<()> {
    for entry in fs::read_dir(raw_dir).map_err(|e| BidsError::io(raw_dir, e))? {
        let entry = entry.map_err(|e| BidsError::io(raw_dir, e))?;
        let path = entry.path();
        if !path.is_file() || path == raw_abs {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let mut params = FilenameParams::parse(&name);
        let part = params.take_part();
        if !raw_params.is_superset_of(&params) {
            continue;
        }
        let relative = to_forward_slashes(&relative_to(&path, session_path).to_string_lossy());
        if params.file() == Some(expected_suffix) && params.ext() == ".json" {
            scan.sidecar = Some(relative);
            continue;
        }
        let suffix = params
            .file()
            .map(String::from)
            .unwrap_or_else(|| params.ext().trim_start_matches('.').to_string());
        match part.as_deref() {
            // part-01 of a split acquisition is the true head of the raw data.
            Some("01") => scan.raw_file = relative,
            Some(other) => {
                scan.associated.insert(format!("{suffix}_{other}"), relative);
            }
            None => {
                scan.associated.insert(suffix, relative);
            }
        }
    }
    Ok(())
}

/// Look for a sidecar in ancestor folders, nearest first, per the
/// inheritance principle. The found path keeps its `..` components so it is
/// recognizably shared.
fn inherit_sidecar(
    scan: &mut Scan,
    raw_params: &FilenameParams,
    session_path: &Path,
    expected_suffix: &str,
) -> Result<()> {
    let subject_path = session_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| session_path.to_path_buf());
    let project_path = scan.root.join(&scan.project_id);

    let mut candidates = vec![session_path.to_path_buf()];
    if !scan.session_no_folder {
        candidates.push(subject_path);
    }
    candidates.push(project_path);

    for dir in candidates {
        for entry in fs::read_dir(&dir).map_err(|e| BidsError::io(&dir, e))? {
            let entry = entry.map_err(|e| BidsError::io(&dir, e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let params = FilenameParams::parse(&name);
            if params.file() == Some(expected_suffix)
                && params.ext() == ".json"
                && (raw_params.is_superset_of(&params) || params.keys().count() == 0)
            {
                scan.sidecar = Some(to_forward_slashes(
                    &relative_to(&path, session_path).to_string_lossy(),
                ));
                return Ok(());
            }
        }
    }
    Ok(())
}

/// KIT/Yokogawa recordings keep their marker files next to the raw data.
fn associate_markers(
    scan: &mut Scan,
    raw_params: &FilenameParams,
    raw_dir: &Path,
    session_path: &Path,
) -> Result<()> {
    for entry in fs::read_dir(raw_dir).map_err(|e| BidsError::io(raw_dir, e))? {
        let entry = entry.map_err(|e| BidsError::io(raw_dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let params = FilenameParams::parse(&name);
        if params.ext() == ".mrk" && raw_params.is_superset_of(&params) {
            scan.associated.insert(
                "markers".to_string(),
                to_forward_slashes(&relative_to(&path, session_path).to_string_lossy()),
            );
        }
    }
    Ok(())
}
