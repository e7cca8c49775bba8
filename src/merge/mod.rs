//! Merging entities between hierarchies.
//!
//! Every merge is expressed as adding a source entity (borrowed, with its
//! project context) to a destination anchor. Missing ancestors at the
//! destination are created as shells on disk first: folders, an empty
//! manifest, the participants row, the project README and description. The
//! actual data transfer goes through a [`FileCopier`] so callers can swap
//! copying for moving or linking.
//!
//! Preconditions are checked before any file is touched: the source entity's
//! ancestor ids must agree with the destination anchor's.

use std::fs;
use std::path::PathBuf;

use tracing::warn;

use crate::core::constants::{
    DATASET_DESCRIPTION, KEY_ASSOCIATED_EMPTYROOM, PARTICIPANTS_TSV, README_TXT,
};
use crate::core::errors::{BidsError, Result};
use crate::core::paths::realize_paths;
use crate::core::tsv::TsvTable;
use crate::tree::build::load_scan;
use crate::tree::entity::{EntityRef, ScanRef, SessionRef, SubjectRef};
use crate::tree::{Project, Scan, Session, Subject, Tree};

/// Strategy for transferring scan files between hierarchies.
///
/// `sources` and `destinations` correlate one-to-one. Implementations may
/// copy, move, hard-link or upload; the default copies.
pub trait FileCopier {
    fn transfer(&self, sources: &[PathBuf], destinations: &[PathBuf]) -> Result<()>;
}

impl<F> FileCopier for F
where
    F: Fn(&[PathBuf], &[PathBuf]) -> Result<()>,
{
    fn transfer(&self, sources: &[PathBuf], destinations: &[PathBuf]) -> Result<()> {
        self(sources, destinations)
    }
}

/// Plain filesystem copy. Destination folders are created as needed and a
/// source that already is its own destination is left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCopier;

impl FileCopier for DefaultCopier {
    fn transfer(&self, sources: &[PathBuf], destinations: &[PathBuf]) -> Result<()> {
        for (source, destination) in sources.iter().zip(destinations.iter()) {
            if source == destination {
                continue;
            }
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| BidsError::io(parent, e))?;
            }
            fs::copy(source, destination).map_err(|e| BidsError::io(source, e))?;
        }
        Ok(())
    }
}

impl Tree {
    /// Merge any entity into this tree, creating missing ancestors.
    pub fn add<C: FileCopier + ?Sized>(&mut self, source: EntityRef<'_>, copier: &C) -> Result<()> {
        add_to_tree(self, source, copier)
    }
}

/// Merge `source` into `tree`. Projects missing at the destination are
/// cloned as shells from the source entity's project context.
pub fn add_to_tree<C: FileCopier + ?Sized>(
    tree: &mut Tree,
    source: EntityRef<'_>,
    copier: &C,
) -> Result<()> {
    match source {
        EntityRef::Tree(src) => {
            for project in src.projects() {
                add_to_tree(tree, EntityRef::Project(project), copier)?;
            }
            Ok(())
        }
        EntityRef::Project(src)
        | EntityRef::Subject(SubjectRef { project: src, .. })
        | EntityRef::Session(SessionRef { project: src, .. })
        | EntityRef::Scan(ScanRef { project: src, .. }) => {
            ensure_project(tree, src, copier)?;
            let project = tree.project_mut(src.id())?;
            add_to_project(project, source, copier)
        }
    }
}

/// Merge `source` into an existing project. The source's project id must
/// match the destination's.
pub fn add_to_project<C: FileCopier + ?Sized>(
    project: &mut Project,
    source: EntityRef<'_>,
    copier: &C,
) -> Result<()> {
    match source {
        EntityRef::Tree(_) => Err(BidsError::InvalidAdd {
            target: "project",
            other: "tree",
        }),
        EntityRef::Project(src) => {
            if src.id() != project.id() {
                return Err(BidsError::IdMismatch {
                    kind: "project",
                    expected: project.id().to_string(),
                    found: src.id().to_string(),
                });
            }
            for subject in src.subjects() {
                add_to_project(
                    project,
                    EntityRef::Subject(SubjectRef {
                        project: src,
                        node: subject,
                    }),
                    copier,
                )?;
            }
            Ok(())
        }
        EntityRef::Subject(src) => {
            if src.project_id() != project.id() {
                return Err(BidsError::Association {
                    child: "subject",
                    parent: "project",
                });
            }
            ensure_subject(project, src.node)?;
            for session in src.node.sessions() {
                add_to_subject(
                    project,
                    src.node.id(),
                    EntityRef::Session(SessionRef {
                        project: src.project,
                        node: session,
                    }),
                    copier,
                )?;
            }
            Ok(())
        }
        EntityRef::Session(src) => {
            if src.project_id() != project.id() {
                return Err(BidsError::Association {
                    child: "session",
                    parent: "project",
                });
            }
            ensure_subject_from_context(project, src.project, src.subject_id())?;
            add_to_subject(project, src.subject_id(), source, copier)
        }
        EntityRef::Scan(src) => {
            if src.project_id() != project.id() {
                return Err(BidsError::Association {
                    child: "scan",
                    parent: "project",
                });
            }
            ensure_subject_from_context(project, src.project, src.subject_id())?;
            add_to_subject(project, src.subject_id(), source, copier)
        }
    }
}

/// Merge `source` into a subject of `project`.
pub fn add_to_subject<C: FileCopier + ?Sized>(
    project: &mut Project,
    subject_id: &str,
    source: EntityRef<'_>,
    copier: &C,
) -> Result<()> {
    match source {
        EntityRef::Tree(_) => Err(BidsError::InvalidAdd {
            target: "subject",
            other: "tree",
        }),
        EntityRef::Project(_) => Err(BidsError::InvalidAdd {
            target: "subject",
            other: "project",
        }),
        EntityRef::Subject(src) => {
            if src.project_id() != project.id() {
                return Err(BidsError::Association {
                    child: "subject",
                    parent: "project",
                });
            }
            if src.id() != subject_id {
                return Err(BidsError::IdMismatch {
                    kind: "subject",
                    expected: subject_id.to_string(),
                    found: src.id().to_string(),
                });
            }
            for session in src.node.sessions() {
                add_to_subject(
                    project,
                    subject_id,
                    EntityRef::Session(SessionRef {
                        project: src.project,
                        node: session,
                    }),
                    copier,
                )?;
            }
            Ok(())
        }
        EntityRef::Session(src) => {
            if src.project_id() != project.id() || src.subject_id() != subject_id {
                return Err(BidsError::Association {
                    child: "session",
                    parent: "project and subject",
                });
            }
            if skip_for_folderless(project, subject_id, src.node.id())? {
                return Ok(());
            }
            ensure_session(project, subject_id, src.node)?;
            for scan in src.node.scans() {
                add_to_session(
                    project,
                    subject_id,
                    src.node.id(),
                    EntityRef::Scan(ScanRef {
                        project: src.project,
                        node: scan,
                    }),
                    copier,
                )?;
            }
            Ok(())
        }
        EntityRef::Scan(src) => {
            if src.project_id() != project.id() || src.subject_id() != subject_id {
                return Err(BidsError::Association {
                    child: "scan",
                    parent: "project and subject",
                });
            }
            if skip_for_folderless(project, subject_id, src.session_id())? {
                return Ok(());
            }
            let src_session = src
                .project
                .subject(src.subject_id())
                .and_then(|subject| subject.session(src.session_id()))?;
            ensure_session(project, subject_id, src_session)?;
            add_to_session(project, subject_id, src.session_id(), source, copier)
        }
    }
}

/// Merge `source` into a session of `project`.
pub fn add_to_session<C: FileCopier + ?Sized>(
    project: &mut Project,
    subject_id: &str,
    session_id: &str,
    source: EntityRef<'_>,
    copier: &C,
) -> Result<()> {
    match source {
        EntityRef::Session(src) => {
            if src.project_id() != project.id() || src.subject_id() != subject_id {
                return Err(BidsError::Association {
                    child: "session",
                    parent: "project and subject",
                });
            }
            if src.id() != session_id {
                return Err(BidsError::IdMismatch {
                    kind: "session",
                    expected: session_id.to_string(),
                    found: src.id().to_string(),
                });
            }
            for scan in src.node.scans() {
                add_to_session(
                    project,
                    subject_id,
                    session_id,
                    EntityRef::Scan(ScanRef {
                        project: src.project,
                        node: scan,
                    }),
                    copier,
                )?;
            }
            Ok(())
        }
        EntityRef::Scan(src) => {
            if src.project_id() != project.id()
                || src.subject_id() != subject_id
                || src.session_id() != session_id
            {
                return Err(BidsError::Association {
                    child: "scan",
                    parent: "project, subject and session",
                });
            }
            transfer_scan(project, subject_id, session_id, src, copier)
        }
        other => Err(BidsError::InvalidAdd {
            target: "session",
            other: other.kind(),
        }),
    }
}

/// Clone a project shell at the destination tree: the folder, an empty
/// participants manifest, and copies of the README and description.
fn ensure_project<C: FileCopier + ?Sized>(
    tree: &mut Tree,
    src: &Project,
    copier: &C,
) -> Result<()> {
    if tree.contains_project(src.id()) {
        return Ok(());
    }
    let mut shell = Project::shell(&tree.root, src.id());
    let path = shell.path();
    fs::create_dir_all(&path).map_err(|e| BidsError::io(&path, e))?;

    let participants = path.join(PARTICIPANTS_TSV);
    TsvTable::with_columns(["participant_id"]).write(&participants)?;
    shell.participants_tsv = Some(participants);

    if let Some(readme) = src.readme_path() {
        let destination = path.join(README_TXT);
        copier.transfer(&[readme.to_path_buf()], std::slice::from_ref(&destination))?;
        shell.readme = Some(destination);
    }
    if let Some(description) = src.description_path() {
        let destination = path.join(DATASET_DESCRIPTION);
        copier.transfer(
            &[description.to_path_buf()],
            std::slice::from_ref(&destination),
        )?;
        shell.description = Some(destination);
    }
    tree.projects.insert(src.id().to_string(), shell);
    Ok(())
}

/// Clone a subject shell: the folder plus its participants row, with the
/// column union of both tables.
fn ensure_subject(project: &mut Project, src: &Subject) -> Result<()> {
    if project.contains_subject(src.id()) {
        return Ok(());
    }
    let mut shell = src.clone();
    shell.sessions.clear();
    shell.root = project.root.clone();
    shell.project_id = project.id().to_string();
    let path = shell.path();
    fs::create_dir_all(&path).map_err(|e| BidsError::io(&path, e))?;

    let participants_path = project.participants_path();
    let mut table = if participants_path.is_file() {
        TsvTable::read(&participants_path)?
    } else {
        TsvTable::with_columns(["participant_id"])
    };
    let mut incoming = TsvTable::with_columns(["participant_id"]);
    let label = shell.label();
    let mut cells: Vec<(&str, Option<&str>)> = vec![("participant_id", Some(label.as_str()))];
    for (column, value) in shell.data_pairs() {
        cells.push((column.as_str(), value.as_deref()));
    }
    incoming.push_row(cells);
    table.merge(&incoming, Some("participant_id"));
    table.write(&participants_path)?;
    project.participants_tsv = Some(participants_path);

    project.subjects.insert(shell.id.clone(), shell);
    Ok(())
}

/// Like [`ensure_subject`], but the subject node is looked up in the source
/// project (used when adding a bare session or scan transitively).
fn ensure_subject_from_context(
    project: &mut Project,
    source_project: &Project,
    subject_id: &str,
) -> Result<()> {
    if project.contains_subject(subject_id) {
        return Ok(());
    }
    match source_project.subject(subject_id) {
        Ok(subject) => ensure_subject(project, subject),
        Err(_) => ensure_subject(
            project,
            &Subject::shell(&source_project.root, source_project.id(), subject_id),
        ),
    }
}

/// Clone a session shell: the folder (unless folderless) and an empty scans
/// manifest.
fn ensure_session(project: &mut Project, subject_id: &str, src: &Session) -> Result<()> {
    let subject = project.subject(subject_id)?;
    if subject.contains_session(src.id()) {
        return Ok(());
    }
    let mut shell = Session::shell(
        &project.root,
        project.id(),
        subject_id,
        src.id(),
        src.has_no_folder(),
    );
    let path = shell.path();
    fs::create_dir_all(&path).map_err(|e| BidsError::io(&path, e))?;

    let manifest = src
        .scans_tsv
        .clone()
        .unwrap_or_else(|| default_manifest_name(subject_id, src.id(), src.has_no_folder()));
    TsvTable::with_columns(["filename", "acq_time"]).write(&path.join(&manifest))?;
    shell.scans_tsv = Some(manifest);

    project
        .subject_mut(subject_id)?
        .sessions
        .insert(shell.id.clone(), shell);
    Ok(())
}

fn default_manifest_name(subject_id: &str, session_id: &str, no_folder: bool) -> String {
    if no_folder {
        format!("sub-{subject_id}_scans.tsv")
    } else {
        format!("sub-{subject_id}_ses-{session_id}_scans.tsv")
    }
}

/// A destination subject that keeps its files directly in its folder can
/// only absorb the one session it already represents.
fn skip_for_folderless(project: &Project, subject_id: &str, incoming: &str) -> Result<bool> {
    let subject = match project.subject(subject_id) {
        Ok(subject) => subject,
        Err(_) => return Ok(false),
    };
    let folderless = subject.sessions.len() == 1
        && subject.sessions.values().next().is_some_and(Session::has_no_folder);
    if folderless && !subject.contains_session(incoming) {
        warn!(
            subject = subject_id,
            session = incoming,
            "subject has no session folders; not merging a differently-named session"
        );
        return Ok(true);
    }
    Ok(false)
}

/// Copy one scan's files into the destination session, record it in the
/// manifest, and re-map it from the destination folder so its sidecar and
/// associations reflect what actually landed there.
fn transfer_scan<C: FileCopier + ?Sized>(
    project: &mut Project,
    subject_id: &str,
    session_id: &str,
    src: ScanRef<'_>,
    copier: &C,
) -> Result<()> {
    {
        let session = project.subject(subject_id)?.session(session_id)?;
        if session.scans.iter().any(|scan| scan == src.node) {
            // Already present: merging is idempotent per scan.
            return Ok(());
        }
    }

    let relatives = src.node.contained_relatives();
    let sources = src.node.contained_files();
    let session_path = project.subject(subject_id)?.session(session_id)?.path();
    let destinations = realize_paths(&session_path, &relatives);
    copier.transfer(&sources, &destinations)?;

    let manifest_path = {
        let session = project.subject_mut(subject_id)?.session_mut(session_id)?;
        let manifest = session.scans_tsv.clone().unwrap_or_else(|| {
            default_manifest_name(subject_id, session_id, session.has_no_folder())
        });
        session.scans_tsv = Some(manifest.clone());
        session.path().join(manifest)
    };

    let mut table = if manifest_path.is_file() {
        TsvTable::read(&manifest_path)?
    } else {
        TsvTable::with_columns(["filename", "acq_time"])
    };
    let mut incoming = TsvTable::with_columns(["filename", "acq_time"]);
    let mut cells: Vec<(&str, Option<&str>)> = vec![
        ("filename", Some(src.node.raw_file())),
        ("acq_time", src.node.acq_time()),
    ];
    for (column, value) in &src.node.extra_cols {
        cells.push((column.as_str(), value.as_deref()));
    }
    incoming.push_row(cells);
    table.merge(&incoming, Some("filename"));
    table.write(&manifest_path)?;

    let fresh = {
        let session = project.subject(subject_id)?.session(session_id)?;
        load_scan(
            session,
            src.node.raw_file(),
            src.node.acq_time().map(String::from),
            src.node.extra_cols.clone(),
        )?
    };
    let empty_room = fresh
        .info_value(KEY_ASSOCIATED_EMPTYROOM)
        .and_then(|v| v.as_str())
        .map(String::from);
    project
        .subject_mut(subject_id)?
        .session_mut(session_id)?
        .scans
        .push(fresh);

    if let Some(reference) = empty_room {
        chase_empty_room(project, src.project, &reference, copier)?;
    }
    Ok(())
}

/// Resolve an `AssociatedEmptyRoom` reference (a project-relative raw file
/// path) in the source project and merge that scan too. A dangling
/// reference is reported but not fatal.
fn chase_empty_room<C: FileCopier + ?Sized>(
    project: &mut Project,
    source_project: &Project,
    reference: &str,
    copier: &C,
) -> Result<()> {
    let target = find_by_project_relative(source_project, reference);
    match target {
        Some(scan) => add_to_project(
            project,
            EntityRef::Scan(ScanRef {
                project: source_project,
                node: scan,
            }),
            copier,
        ),
        None => {
            warn!(
                project = source_project.id(),
                reference, "associated empty-room scan not found"
            );
            Ok(())
        }
    }
}

fn find_by_project_relative<'a>(project: &'a Project, reference: &str) -> Option<&'a Scan> {
    let wanted = project.path().join(reference);
    let wanted = crate::core::paths::normalize_syntactic(&wanted);
    project
        .subjects()
        .flat_map(Subject::sessions)
        .flat_map(Session::scans)
        .find(|scan| scan.raw_file_path() == wanted)
}
