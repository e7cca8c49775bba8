//! Renaming and deleting entities, on disk and in memory.
//!
//! Renames work top-down: the entity folder moves first, then every
//! contained filename has its id tokens substituted, then the manifests are
//! rewritten. Deletes work bottom-up: files, then manifest rows, then the
//! folders they emptied. Inherited metadata files (those reached through
//! `..`) are shared with other entities and are never moved or removed.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::core::constants::NO_FOLDER_SESSION_ID;
use crate::core::errors::{BidsError, Result};
use crate::core::paths::{fix_folderless, multi_replace, realize_path};
use crate::core::tsv::TsvTable;
use crate::tree::entity::ScanFilter;
use crate::tree::{Project, Scan, Session, Tree};

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(BidsError::InvalidId {
            details: format!("{id:?} is not a valid label (alphanumeric only)"),
        });
    }
    Ok(())
}

impl Tree {
    /// Delete a project and its entire folder.
    pub fn delete_project(&mut self, id: &str) -> Result<()> {
        let project = self.projects.remove(id).ok_or_else(|| BidsError::NoProject {
            id: id.to_string(),
            available: self.project_ids(),
        })?;
        let path = project.path();
        fs::remove_dir_all(&path).map_err(|e| BidsError::io(&path, e))?;
        Ok(())
    }
}

impl Project {
    /// Rename a subject, rewriting every contained filename, the scans
    /// manifests and the participants row.
    pub fn rename_subject(&mut self, old_id: &str, new_id: &str) -> Result<()> {
        if old_id == new_id {
            return Ok(());
        }
        validate_id(new_id)?;
        if self.contains_subject(new_id) {
            return Err(BidsError::InvalidId {
                details: format!("subject {new_id} already exists in project {}", self.id),
            });
        }
        let mut subject = self.subjects.remove(old_id).ok_or_else(|| BidsError::NoSubject {
            id: old_id.to_string(),
            project: self.id.clone(),
            available: self.subject_ids(),
        })?;

        let old_label = subject.label();
        let old_path = subject.path();
        subject.id = new_id.to_string();
        let new_label = subject.label();
        let new_path = subject.path();
        debug!(from = %old_label, to = %new_label, "renaming subject");
        fs::rename(&old_path, &new_path).map_err(|e| BidsError::io(&old_path, e))?;

        for session in subject.sessions.values_mut() {
            session.subject_id = new_id.to_string();
            for scan in &mut session.scans {
                scan.subject_id = new_id.to_string();
            }
            rewrite_session_files(session, &old_label, &new_label)?;
        }

        let participants_path = self.participants_path();
        if participants_path.is_file() {
            let mut table = TsvTable::read(&participants_path)?;
            if let Some(row) = table.find_row("participant_id", &old_label) {
                table.set_cell(row, "participant_id", Some(&new_label));
                table.write(&participants_path)?;
            }
        }

        self.subjects.insert(new_id.to_string(), subject);
        Ok(())
    }

    /// Rename a session of a subject. Renaming the synthetic folderless
    /// session promotes it to a real `ses-<id>` folder.
    pub fn rename_session(&mut self, subject_id: &str, old_id: &str, new_id: &str) -> Result<()> {
        if old_id == new_id {
            return Ok(());
        }
        validate_id(new_id)?;
        let subject = self.subject_mut(subject_id)?;
        if subject.contains_session(new_id) {
            return Err(BidsError::InvalidId {
                details: format!("session {new_id} already exists in subject {subject_id}"),
            });
        }
        let mut session = subject.sessions.remove(old_id).ok_or_else(|| BidsError::NoSession {
            id: old_id.to_string(),
            subject: subject_id.to_string(),
            available: subject.session_ids(),
        })?;

        let was_no_folder = session.no_folder;
        let old_label = session.label();
        let old_path = session.path();
        session.id = new_id.to_string();
        session.no_folder = new_id == NO_FOLDER_SESSION_ID;
        let new_label = session.label();
        let new_path = session.path();
        debug!(subject = subject_id, from = %old_label, to = %new_label, "renaming session");
        fs::create_dir_all(&new_path).map_err(|e| BidsError::io(&new_path, e))?;

        let sub_label = format!("sub-{subject_id}");
        for scan in &mut session.scans {
            scan.session_id = new_id.to_string();
            scan.session_no_folder = session.no_folder;
            for relative in rename_targets(scan) {
                let new_relative = multi_replace(
                    &fix_folderless(was_no_folder, &relative, &sub_label, &old_label),
                    &[old_label.as_str()],
                    &[new_label.as_str()],
                );
                move_file(&old_path, &relative, &new_path, &new_relative)?;
                replace_member(scan, &relative, &new_relative);
            }
        }

        if let Some(manifest) = session.scans_tsv.take() {
            let new_manifest = multi_replace(
                &fix_folderless(was_no_folder, &manifest, &sub_label, &old_label),
                &[old_label.as_str()],
                &[new_label.as_str()],
            );
            let old_manifest_path = realize_path(&old_path, &manifest);
            let mut table = TsvTable::read(&old_manifest_path)?;
            table.map_column("filename", |filename| {
                multi_replace(
                    &fix_folderless(was_no_folder, filename, &sub_label, &old_label),
                    &[old_label.as_str()],
                    &[new_label.as_str()],
                )
            });
            table.write(&realize_path(&new_path, &new_manifest))?;
            fs::remove_file(&old_manifest_path)
                .map_err(|e| BidsError::io(&old_manifest_path, e))?;
            session.scans_tsv = Some(new_manifest);
        }

        prune_empty_dirs(&old_path)?;
        if !was_no_folder && old_path.is_dir() {
            let mut contents = fs::read_dir(&old_path).map_err(|e| BidsError::io(&old_path, e))?;
            if contents.next().is_none() {
                fs::remove_dir(&old_path).map_err(|e| BidsError::io(&old_path, e))?;
            }
        }

        self.subject_mut(subject_id)?
            .sessions
            .insert(new_id.to_string(), session);
        Ok(())
    }

    /// Delete the unique scan matching `filter`. Files shared with another
    /// scan of the same session stay on disk. Deleting the last scan removes
    /// the now-empty session, its manifest and its folder as well.
    pub fn delete_scan(
        &mut self,
        subject_id: &str,
        session_id: &str,
        filter: &ScanFilter,
    ) -> Result<()> {
        let session = self.subject_mut(subject_id)?.session_mut(session_id)?;
        let mut matches = session
            .scans
            .iter()
            .enumerate()
            .filter(|(_, scan)| filter.matches(scan))
            .map(|(index, _)| index);
        let index = matches.next().ok_or_else(|| BidsError::NoScan {
            session: session_id.to_string(),
            filter: filter.to_string(),
        })?;
        if matches.next().is_some() {
            return Err(BidsError::AmbiguousScan {
                session: session_id.to_string(),
                filter: filter.to_string(),
            });
        }
        let scan = session.scans.remove(index);

        let shared: Vec<String> = session
            .scans
            .iter()
            .flat_map(Scan::contained_relatives)
            .collect();
        let session_path = session.path();
        for relative in scan.contained_relatives() {
            if Scan::is_inherited(&relative) || shared.contains(&relative) {
                continue;
            }
            let path = realize_path(&session_path, &relative);
            fs::remove_file(&path).map_err(|e| BidsError::io(&path, e))?;
        }

        if session.scans.is_empty() {
            // The last scan takes the session and its manifest with it.
            if let Some(manifest_path) = session.scans_tsv_path()
                && manifest_path.is_file()
            {
                fs::remove_file(&manifest_path).map_err(|e| BidsError::io(&manifest_path, e))?;
            }
            let keep_folder = session.has_no_folder();
            prune_empty_dirs(&session_path)?;
            if !keep_folder && session_path.is_dir() {
                fs::remove_dir(&session_path).map_err(|e| BidsError::io(&session_path, e))?;
            }
            self.subject_mut(subject_id)?.sessions.remove(session_id);
            return Ok(());
        }

        if let Some(manifest_path) = session.scans_tsv_path()
            && manifest_path.is_file()
        {
            let mut table = TsvTable::read(&manifest_path)?;
            table.remove_rows("filename", scan.raw_file());
            table.write(&manifest_path)?;
        }
        prune_empty_dirs(&session_path)?;
        Ok(())
    }

    /// Delete a session, its files and its manifest.
    pub fn delete_session(&mut self, subject_id: &str, session_id: &str) -> Result<()> {
        let subject = self.subject_mut(subject_id)?;
        let session = subject.sessions.remove(session_id).ok_or_else(|| {
            BidsError::NoSession {
                id: session_id.to_string(),
                subject: subject_id.to_string(),
                available: subject.session_ids(),
            }
        })?;

        let session_path = session.path();
        let mut removed = Vec::new();
        for scan in session.scans() {
            for relative in scan.contained_relatives() {
                if Scan::is_inherited(&relative) || removed.contains(&relative) {
                    continue;
                }
                let path = realize_path(&session_path, &relative);
                fs::remove_file(&path).map_err(|e| BidsError::io(&path, e))?;
                removed.push(relative);
            }
        }
        if let Some(manifest_path) = session.scans_tsv_path()
            && manifest_path.is_file()
        {
            fs::remove_file(&manifest_path).map_err(|e| BidsError::io(&manifest_path, e))?;
        }
        prune_empty_dirs(&session_path)?;
        if !session.has_no_folder() && session_path.is_dir() {
            fs::remove_dir(&session_path).map_err(|e| BidsError::io(&session_path, e))?;
        }
        Ok(())
    }

    /// Delete a subject, its folder and its participants row.
    pub fn delete_subject(&mut self, subject_id: &str) -> Result<()> {
        let subject = self.subjects.remove(subject_id).ok_or_else(|| BidsError::NoSubject {
            id: subject_id.to_string(),
            project: self.id.clone(),
            available: self.subject_ids(),
        })?;
        let path = subject.path();
        fs::remove_dir_all(&path).map_err(|e| BidsError::io(&path, e))?;

        let participants_path = self.participants_path();
        if participants_path.is_file() {
            let mut table = TsvTable::read(&participants_path)?;
            table.remove_rows("participant_id", &subject.label());
            table.write(&participants_path)?;
        }
        Ok(())
    }
}

/// Rewrite every file of a session after its subject was renamed. The
/// session folder itself already moved with the subject folder.
fn rewrite_session_files(session: &mut Session, old_label: &str, new_label: &str) -> Result<()> {
    let session_path = session.path();
    for scan in &mut session.scans {
        for relative in rename_targets(scan) {
            let new_relative = multi_replace(&relative, &[old_label], &[new_label]);
            if new_relative != relative {
                move_file(&session_path, &relative, &session_path, &new_relative)?;
                replace_member(scan, &relative, &new_relative);
            }
        }
    }
    if let Some(manifest) = session.scans_tsv.take() {
        let new_manifest = multi_replace(&manifest, &[old_label], &[new_label]);
        let old_manifest_path = realize_path(&session_path, &manifest);
        let mut table = TsvTable::read(&old_manifest_path)?;
        table.map_column("filename", |filename| {
            multi_replace(filename, &[old_label], &[new_label])
        });
        table.write(&realize_path(&session_path, &new_manifest))?;
        if new_manifest != manifest {
            fs::remove_file(&old_manifest_path)
                .map_err(|e| BidsError::io(&old_manifest_path, e))?;
        }
        session.scans_tsv = Some(new_manifest);
    }
    prune_empty_dirs(&session_path)?;
    Ok(())
}

/// The file members of a scan that a rename may move: everything it owns
/// outright. Inherited members stay where they are.
fn rename_targets(scan: &Scan) -> Vec<String> {
    scan.contained_relatives()
        .into_iter()
        .filter(|relative| !Scan::is_inherited(relative))
        .collect()
}

fn replace_member(scan: &mut Scan, old_relative: &str, new_relative: &str) {
    if scan.raw_file == old_relative {
        scan.raw_file = new_relative.to_string();
    }
    if scan.sidecar.as_deref() == Some(old_relative) {
        scan.sidecar = Some(new_relative.to_string());
    }
    for value in scan.associated.values_mut() {
        if value == old_relative {
            *value = new_relative.to_string();
        }
    }
}

fn move_file(old_base: &Path, old_relative: &str, new_base: &Path, new_relative: &str) -> Result<()> {
    let source = realize_path(old_base, old_relative);
    let destination = realize_path(new_base, new_relative);
    if source == destination {
        return Ok(());
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| BidsError::io(parent, e))?;
    }
    fs::rename(&source, &destination).map_err(|e| BidsError::io(&source, e))?;
    Ok(())
}

/// Remove directories that renames or deletes emptied, deepest first. The
/// root itself is kept.
fn prune_empty_dirs(root: &Path) -> Result<()> {
    if !root.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(root).map_err(|e| BidsError::io(root, e))? {
        let entry = entry.map_err(|e| BidsError::io(root, e))?;
        let path = entry.path();
        if path.is_dir() {
            prune_empty_dirs(&path)?;
            let mut contents = fs::read_dir(&path).map_err(|e| BidsError::io(&path, e))?;
            if contents.next().is_none() {
                fs::remove_dir(&path).map_err(|e| BidsError::io(&path, e))?;
            }
        }
    }
    Ok(())
}
