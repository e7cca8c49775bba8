//! In-memory model of a BIDS folder hierarchy.
//!
//! The hierarchy is owned top-down: a [`Tree`] owns its [`Project`]s, a
//! project its [`Subject`]s, a subject its [`Session`]s and a session its
//! [`Scan`]s. There are no parent pointers; each node carries the ids of its
//! ancestors and the tree root so it can compute its own absolute path.
//!
//! - [`build`]: directory-driven construction.
//! - [`entity`]: borrowed handles and the [`EntityRef`](entity::EntityRef)
//!   sum type used by merge and query.
//! - [`description`]: `dataset_description.json` contents.

pub mod build;
pub mod description;
pub mod entity;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};

use crate::core::constants::{NO_FOLDER_SESSION_ID, PARTICIPANTS_TSV};
use crate::core::errors::{BidsError, Result};
use crate::core::paths::{realize_path, realize_paths};

/// Timestamp format used by `acq_time` cells in scans.tsv manifests.
pub const ACQ_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A root BIDS folder containing zero or more projects.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    pub(crate) root: PathBuf,
    pub(crate) projects: BTreeMap<String, Project>,
}

/// A single project folder directly under the tree root.
#[derive(Debug, Clone)]
pub struct Project {
    pub(crate) id: String,
    pub(crate) root: PathBuf,
    pub(crate) subjects: BTreeMap<String, Subject>,
    pub(crate) participants_tsv: Option<PathBuf>,
    pub(crate) participants_json: Option<PathBuf>,
    pub(crate) description: Option<PathBuf>,
    pub(crate) readme: Option<PathBuf>,
}

/// A `sub-<id>` folder.
#[derive(Debug, Clone)]
pub struct Subject {
    pub(crate) id: String,
    pub(crate) project_id: String,
    pub(crate) root: PathBuf,
    pub(crate) sessions: BTreeMap<String, Session>,
    /// Columns of this subject's participants.tsv row, minus the id column.
    pub(crate) subject_data: Vec<(String, Option<String>)>,
}

/// A `ses-<id>` folder, or the synthetic session of a subject whose files
/// sit directly in the subject folder.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) id: String,
    pub(crate) subject_id: String,
    pub(crate) project_id: String,
    pub(crate) root: PathBuf,
    pub(crate) no_folder: bool,
    /// Manifest filename relative to the session path, if one exists.
    pub(crate) scans_tsv: Option<String>,
    pub(crate) scans: Vec<Scan>,
}

/// One raw recording plus its sidecar and associated files.
///
/// All file members are stored relative to the session path with forward
/// slashes, matching the manifest convention. Inherited metadata files
/// resolved from ancestor folders keep their `..` components.
#[derive(Debug, Clone)]
pub struct Scan {
    pub(crate) raw_file: String,
    pub(crate) acq_time: Option<String>,
    pub(crate) sidecar: Option<String>,
    pub(crate) associated: BTreeMap<String, String>,
    pub(crate) info: serde_json::Map<String, serde_json::Value>,
    /// Manifest columns beyond filename and acq_time.
    pub(crate) extra_cols: Vec<(String, Option<String>)>,
    pub(crate) task: Option<String>,
    pub(crate) acquisition: Option<String>,
    pub(crate) run: Option<String>,
    pub(crate) proc: Option<String>,
    pub(crate) part: Option<String>,
    pub(crate) session_id: String,
    pub(crate) subject_id: String,
    pub(crate) project_id: String,
    pub(crate) root: PathBuf,
    pub(crate) session_no_folder: bool,
}

impl Tree {
    /// The absolute path of the tree root.
    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn project_ids(&self) -> Vec<String> {
        self.projects.keys().cloned().collect()
    }

    /// Look up a project by id.
    pub fn project(&self, id: &str) -> Result<&Project> {
        self.projects.get(id).ok_or_else(|| BidsError::NoProject {
            id: id.to_string(),
            available: self.project_ids(),
        })
    }

    pub fn project_mut(&mut self, id: &str) -> Result<&mut Project> {
        let available = self.project_ids();
        self.projects.get_mut(id).ok_or(BidsError::NoProject {
            id: id.to_string(),
            available,
        })
    }

    pub fn contains_project(&self, id: &str) -> bool {
        self.projects.contains_key(id)
    }
}

impl Project {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The absolute path of the project folder.
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.id)
    }

    /// Path of the participants manifest, whether or not it exists yet.
    pub fn participants_path(&self) -> PathBuf {
        self.participants_tsv
            .clone()
            .unwrap_or_else(|| self.path().join(PARTICIPANTS_TSV))
    }

    pub fn readme_path(&self) -> Option<&Path> {
        self.readme.as_deref()
    }

    pub fn description_path(&self) -> Option<&Path> {
        self.description.as_deref()
    }

    pub fn subjects(&self) -> impl Iterator<Item = &Subject> {
        self.subjects.values()
    }

    pub fn subject_ids(&self) -> Vec<String> {
        self.subjects.keys().cloned().collect()
    }

    /// Look up a subject by bare id (`"1"`, not `"sub-1"`).
    pub fn subject(&self, id: &str) -> Result<&Subject> {
        self.subjects.get(id).ok_or_else(|| BidsError::NoSubject {
            id: id.to_string(),
            project: self.id.clone(),
            available: self.subject_ids(),
        })
    }

    pub fn subject_mut(&mut self, id: &str) -> Result<&mut Subject> {
        let available = self.subject_ids();
        let project = self.id.clone();
        self.subjects.get_mut(id).ok_or(BidsError::NoSubject {
            id: id.to_string(),
            project,
            available,
        })
    }

    pub fn contains_subject(&self, id: &str) -> bool {
        self.subjects.contains_key(id)
    }
}

impl Subject {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// The folder name, `sub-<id>`.
    pub fn label(&self) -> String {
        format!("sub-{}", self.id)
    }

    /// The absolute path of the subject folder.
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.project_id).join(self.label())
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    /// Look up a session by bare id. A folderless subject holds its files
    /// under the synthetic session id `none`.
    pub fn session(&self, id: &str) -> Result<&Session> {
        self.sessions.get(id).ok_or_else(|| BidsError::NoSession {
            id: id.to_string(),
            subject: self.id.clone(),
            available: self.session_ids(),
        })
    }

    pub fn session_mut(&mut self, id: &str) -> Result<&mut Session> {
        let available = self.session_ids();
        let subject = self.id.clone();
        self.sessions.get_mut(id).ok_or(BidsError::NoSession {
            id: id.to_string(),
            subject,
            available,
        })
    }

    pub fn contains_session(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Participants-row value for `column` (`age`, `sex`, `group`, ...).
    pub fn data(&self, column: &str) -> Option<&str> {
        self.subject_data
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_deref())
    }

    /// All participants-row pairs, minus the id column.
    pub fn data_pairs(&self) -> &[(String, Option<String>)] {
        &self.subject_data
    }

    pub fn age(&self) -> Option<&str> {
        self.data("age")
    }

    pub fn sex(&self) -> Option<&str> {
        self.data("sex")
    }

    pub fn group(&self) -> Option<&str> {
        self.data("group")
    }
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// The folder name, `ses-<id>`.
    pub fn label(&self) -> String {
        format!("ses-{}", self.id)
    }

    /// Whether the session's files sit directly in the subject folder.
    pub fn has_no_folder(&self) -> bool {
        self.no_folder
    }

    /// The absolute path of the session: the `ses-<id>` folder, or the
    /// subject folder for a folderless session.
    pub fn path(&self) -> PathBuf {
        let subject = self
            .root
            .join(&self.project_id)
            .join(format!("sub-{}", self.subject_id));
        if self.no_folder {
            subject
        } else {
            subject.join(self.label())
        }
    }

    /// Absolute path of the scans.tsv manifest, if one exists.
    pub fn scans_tsv_path(&self) -> Option<PathBuf> {
        self.scans_tsv.as_deref().map(|f| realize_path(&self.path(), f))
    }

    pub fn scans(&self) -> impl Iterator<Item = &Scan> {
        self.scans.iter()
    }

    pub fn scan_count(&self) -> usize {
        self.scans.len()
    }

    /// The recording date shared by every dated scan of the session, or
    /// `None` when the scans span different dates.
    pub fn date(&self) -> Option<NaiveDate> {
        let mut dates = self
            .scans
            .iter()
            .filter_map(Scan::recording_datetime)
            .map(|datetime| datetime.date());
        let first = dates.next()?;
        dates.all(|date| date == first).then_some(first)
    }
}

impl Scan {
    /// The raw data file, relative to the session path.
    pub fn raw_file(&self) -> &str {
        &self.raw_file
    }

    /// The absolute path of the session folder this scan lives under.
    pub fn session_path(&self) -> PathBuf {
        let subject = self
            .root
            .join(&self.project_id)
            .join(format!("sub-{}", self.subject_id));
        if self.session_no_folder {
            subject
        } else {
            subject.join(format!("ses-{}", self.session_id))
        }
    }

    /// The absolute path of the raw data file.
    pub fn raw_file_path(&self) -> PathBuf {
        realize_path(&self.session_path(), &self.raw_file)
    }

    /// The absolute path of the sidecar JSON, if one was associated.
    pub fn sidecar_path(&self) -> Option<PathBuf> {
        self.sidecar
            .as_deref()
            .map(|rel| realize_path(&self.session_path(), rel))
    }

    /// Associated files keyed by their suffix (`channels`, `events`, ...)
    /// or `"{suffix}_{part}"` for secondary parts of a split acquisition.
    pub fn associated_files(&self) -> &BTreeMap<String, String> {
        &self.associated
    }

    /// Sidecar JSON contents (empty when no sidecar was found).
    pub fn info(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.info
    }

    /// Sidecar value for `key`, if present.
    pub fn info_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.info.get(key)
    }

    pub fn acq_time(&self) -> Option<&str> {
        self.acq_time.as_deref()
    }

    /// Parsed acquisition timestamp, `None` when absent or unparseable.
    pub fn recording_datetime(&self) -> Option<NaiveDateTime> {
        self.acq_time
            .as_deref()
            .and_then(|raw| NaiveDateTime::parse_from_str(raw, ACQ_TIME_FORMAT).ok())
    }

    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    pub fn acquisition(&self) -> Option<&str> {
        self.acquisition.as_deref()
    }

    pub fn run(&self) -> Option<&str> {
        self.run.as_deref()
    }

    pub fn proc(&self) -> Option<&str> {
        self.proc.as_deref()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Named filename entity (`task`, `acquisition`/`acq`, `run`, `proc`).
    pub fn entity(&self, key: &str) -> Option<&str> {
        match key {
            "task" => self.task(),
            "acquisition" | "acq" => self.acquisition(),
            "run" => self.run(),
            "proc" => self.proc(),
            _ => None,
        }
    }

    /// All file members relative to the session path: the raw file, the
    /// sidecar and every associated file, deduplicated.
    pub fn contained_relatives(&self) -> Vec<String> {
        let mut rels = vec![self.raw_file.clone()];
        if let Some(sidecar) = &self.sidecar {
            rels.push(sidecar.clone());
        }
        rels.extend(self.associated.values().cloned());
        rels.sort_unstable();
        rels.dedup();
        rels
    }

    /// All file members as absolute paths.
    pub fn contained_files(&self) -> Vec<PathBuf> {
        realize_paths(&self.session_path(), &self.contained_relatives())
    }

    /// Whether a file member was resolved from an ancestor folder via the
    /// inheritance principle (such files are shared and never moved).
    pub fn is_inherited(relative: &str) -> bool {
        relative.starts_with("..")
    }
}

/// Two scans are the same recording when their filename entities and their
/// position in the hierarchy agree. File paths are deliberately excluded so
/// a copy of a scan in another tree still compares equal.
impl PartialEq for Scan {
    fn eq(&self, other: &Self) -> bool {
        self.task == other.task
            && self.acquisition == other.acquisition
            && self.run == other.run
            && self.proc == other.proc
            && self.session_id == other.session_id
            && self.subject_id == other.subject_id
            && self.project_id == other.project_id
    }
}

impl Eq for Scan {}

impl std::fmt::Display for Scan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw_file)
    }
}

/// Normalize a subject or session id given either bare (`1`) or prefixed
/// (`sub-1` / `ses-1`) form.
pub fn strip_prefix(id: &str, prefix: &str) -> String {
    id.strip_prefix(prefix).unwrap_or(id).to_string()
}

impl Session {
    /// Sentinel check for the synthetic folderless session id.
    pub fn is_no_folder_id(id: &str) -> bool {
        id == NO_FOLDER_SESSION_ID
    }
}
