//! Borrowed handles over the hierarchy.
//!
//! Nodes below the project level do not know which [`Project`] they belong
//! to beyond its id, but merging and querying need the full source context
//! (participants rows, README and description files, empty-room subjects).
//! [`SubjectRef`], [`SessionRef`] and [`ScanRef`] pair a node with its
//! project; [`EntityRef`] is the closed sum of everything that can be
//! merged or queried.

use std::ops::Deref;
use std::path::PathBuf;

use regex::Regex;

use crate::core::errors::{BidsError, Result};
use crate::tree::{Project, Scan, Session, Subject, Tree};

/// A subject together with the project that owns it.
#[derive(Debug, Clone, Copy)]
pub struct SubjectRef<'a> {
    pub(crate) project: &'a Project,
    pub(crate) node: &'a Subject,
}

/// A session together with the project that owns it.
#[derive(Debug, Clone, Copy)]
pub struct SessionRef<'a> {
    pub(crate) project: &'a Project,
    pub(crate) node: &'a Session,
}

/// A scan together with the project that owns it.
#[derive(Debug, Clone, Copy)]
pub struct ScanRef<'a> {
    pub(crate) project: &'a Project,
    pub(crate) node: &'a Scan,
}

impl<'a> SubjectRef<'a> {
    pub fn project(&self) -> &'a Project {
        self.project
    }

    pub fn sessions(&self) -> impl Iterator<Item = SessionRef<'a>> + use<'a> {
        let project = self.project;
        self.node
            .sessions()
            .map(move |node| SessionRef { project, node })
    }

    pub fn scans(&self) -> impl Iterator<Item = ScanRef<'a>> + use<'a> {
        self.sessions().flat_map(|session| session.scans())
    }
}

impl<'a> SessionRef<'a> {
    pub fn project(&self) -> &'a Project {
        self.project
    }

    pub fn scans(&self) -> impl Iterator<Item = ScanRef<'a>> + use<'a> {
        let project = self.project;
        self.node
            .scans()
            .map(move |node| ScanRef { project, node })
    }
}

impl<'a> ScanRef<'a> {
    pub fn project(&self) -> &'a Project {
        self.project
    }
}

impl Deref for SubjectRef<'_> {
    type Target = Subject;
    fn deref(&self) -> &Subject {
        self.node
    }
}

impl Deref for SessionRef<'_> {
    type Target = Session;
    fn deref(&self) -> &Session {
        self.node
    }
}

impl Deref for ScanRef<'_> {
    type Target = Scan;
    fn deref(&self) -> &Scan {
        self.node
    }
}

/// Any level of the hierarchy, by reference.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Tree(&'a Tree),
    Project(&'a Project),
    Subject(SubjectRef<'a>),
    Session(SessionRef<'a>),
    Scan(ScanRef<'a>),
}

impl<'a> EntityRef<'a> {
    /// Human-readable level name, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tree(_) => "tree",
            Self::Project(_) => "project",
            Self::Subject(_) => "subject",
            Self::Session(_) => "session",
            Self::Scan(_) => "scan",
        }
    }

    /// Absolute path of the entity (the raw data file for a scan).
    pub fn path(&self) -> PathBuf {
        match self {
            Self::Tree(tree) => tree.path().to_path_buf(),
            Self::Project(project) => project.path(),
            Self::Subject(subject) => subject.path(),
            Self::Session(session) => session.path(),
            Self::Scan(scan) => scan.raw_file_path(),
        }
    }

    /// Every project reachable from this entity.
    pub fn projects(&self) -> Vec<&'a Project> {
        match self {
            Self::Tree(tree) => tree.projects().collect(),
            Self::Project(project) => vec![project],
            Self::Subject(s) => vec![s.project],
            Self::Session(s) => vec![s.project],
            Self::Scan(s) => vec![s.project],
        }
    }

    /// Every subject reachable from this entity.
    pub fn subjects(&self) -> Vec<SubjectRef<'a>> {
        match self {
            Self::Tree(tree) => tree
                .projects()
                .flat_map(|project| {
                    project
                        .subjects()
                        .map(move |node| SubjectRef { project, node })
                })
                .collect(),
            Self::Project(project) => project
                .subjects()
                .map(|node| SubjectRef { project, node })
                .collect(),
            Self::Subject(subject) => vec![*subject],
            Self::Session(_) | Self::Scan(_) => Vec::new(),
        }
    }

    /// Every session reachable from this entity.
    pub fn sessions(&self) -> Vec<SessionRef<'a>> {
        match self {
            Self::Session(session) => vec![*session],
            Self::Scan(_) => Vec::new(),
            _ => self
                .subjects()
                .iter()
                .flat_map(SubjectRef::sessions)
                .collect(),
        }
    }

    /// Every scan reachable from this entity.
    pub fn scans(&self) -> Vec<ScanRef<'a>> {
        match self {
            Self::Scan(scan) => vec![*scan],
            Self::Session(session) => session.scans().collect(),
            _ => self
                .sessions()
                .iter()
                .flat_map(SessionRef::scans)
                .collect(),
        }
    }

    /// Well-typed containment: a tree contains its projects and everything
    /// under them, a project its subjects and below, and so on. Asking
    /// whether an entity contains one of its own level or above is a type
    /// error, never `false`.
    pub fn contains(&self, other: &EntityRef<'a>) -> Result<bool> {
        let held = match (*self, *other) {
            (Self::Tree(tree), Self::Project(project)) => {
                tree.path() == project.root && tree.contains_project(&project.id)
            }
            (Self::Tree(tree), Self::Subject(_) | Self::Session(_) | Self::Scan(_)) => {
                let mut held = false;
                for project in other.projects() {
                    let as_project = EntityRef::Project(project);
                    if EntityRef::Tree(tree).contains(&as_project)?
                        && as_project.contains(other)?
                    {
                        held = true;
                    }
                }
                held
            }
            (Self::Project(project), Self::Subject(subject)) => {
                project.path() == subject.project.path() && project.contains_subject(&subject.id)
            }
            (Self::Project(project), Self::Session(session)) => {
                project.path() == session.project.path()
                    && project
                        .subjects
                        .get(&session.subject_id)
                        .is_some_and(|sub| sub.contains_session(&session.id))
            }
            (Self::Project(project), Self::Scan(scan)) => {
                project.path() == scan.project.path()
                    && project
                        .subjects
                        .get(&scan.subject_id)
                        .and_then(|sub| sub.sessions.get(&scan.session_id))
                        .is_some_and(|ses| ses.scans.iter().any(|s| s == scan.node))
            }
            (Self::Subject(subject), Self::Session(session)) => {
                subject.project.path() == session.project.path()
                    && subject.id == session.subject_id
                    && subject.contains_session(&session.id)
            }
            (Self::Subject(subject), Self::Scan(scan)) => {
                subject.project.path() == scan.project.path()
                    && subject.id == scan.subject_id
                    && subject
                        .sessions
                        .get(&scan.session_id)
                        .is_some_and(|ses| ses.scans.iter().any(|s| s == scan.node))
            }
            (Self::Session(session), Self::Scan(scan)) => {
                session.project.path() == scan.project.path()
                    && session.subject_id == scan.subject_id
                    && session.id == scan.session_id
                    && session.scans.iter().any(|s| s == scan.node)
            }
            _ => {
                return Err(BidsError::InvalidContainment {
                    outer: self.kind(),
                    inner: other.kind(),
                });
            }
        };
        Ok(held)
    }
}

impl Tree {
    pub fn as_entity(&self) -> EntityRef<'_> {
        EntityRef::Tree(self)
    }

    /// All subjects across every project.
    pub fn all_subjects(&self) -> Vec<SubjectRef<'_>> {
        self.as_entity().subjects()
    }

    /// All sessions across every project.
    pub fn all_sessions(&self) -> Vec<SessionRef<'_>> {
        self.as_entity().sessions()
    }

    /// All scans across every project.
    pub fn all_scans(&self) -> Vec<ScanRef<'_>> {
        self.as_entity().scans()
    }
}

impl Project {
    pub fn as_entity(&self) -> EntityRef<'_> {
        EntityRef::Project(self)
    }

    /// Borrowed handle for a subject, carrying this project as context.
    pub fn subject_ref(&self, id: &str) -> Result<SubjectRef<'_>> {
        Ok(SubjectRef {
            project: self,
            node: self.subject(id)?,
        })
    }

    /// Borrowed handle for a session of a subject.
    pub fn session_ref(&self, subject_id: &str, session_id: &str) -> Result<SessionRef<'_>> {
        Ok(SessionRef {
            project: self,
            node: self.subject(subject_id)?.session(session_id)?,
        })
    }

    /// Borrowed handle for a single scan matched by `filter`.
    pub fn scan_ref(
        &self,
        subject_id: &str,
        session_id: &str,
        filter: &ScanFilter,
    ) -> Result<ScanRef<'_>> {
        let session = self.subject(subject_id)?.session(session_id)?;
        Ok(ScanRef {
            project: self,
            node: session.scan(filter)?,
        })
    }
}

/// Pattern over scan filename entities. Every set field must fully match
/// for the scan to qualify.
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    file: Option<Regex>,
    task: Option<Regex>,
    acquisition: Option<Regex>,
    run: Option<Regex>,
    proc: Option<Regex>,
}

impl ScanFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match against the raw filename (substring or regex).
    pub fn file(mut self, pattern: &str) -> Result<Self> {
        self.file = Some(compile(pattern, false)?);
        Ok(self)
    }

    pub fn task(mut self, pattern: &str) -> Result<Self> {
        self.task = Some(compile(pattern, true)?);
        Ok(self)
    }

    pub fn acquisition(mut self, pattern: &str) -> Result<Self> {
        self.acquisition = Some(compile(pattern, true)?);
        Ok(self)
    }

    pub fn run(mut self, pattern: &str) -> Result<Self> {
        self.run = Some(compile(pattern, true)?);
        Ok(self)
    }

    pub fn proc(mut self, pattern: &str) -> Result<Self> {
        self.proc = Some(compile(pattern, true)?);
        Ok(self)
    }

    pub fn matches(&self, scan: &Scan) -> bool {
        let entity_matches = |pattern: &Option<Regex>, value: Option<&str>| match pattern {
            None => true,
            Some(re) => value.is_some_and(|v| re.is_match(v)),
        };
        entity_matches(&self.file, Some(scan.raw_file()))
            && entity_matches(&self.task, scan.task())
            && entity_matches(&self.acquisition, scan.acquisition())
            && entity_matches(&self.run, scan.run())
            && entity_matches(&self.proc, scan.proc())
    }
}

impl std::fmt::Display for ScanFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        for (name, pattern) in [
            ("file", &self.file),
            ("task", &self.task),
            ("acq", &self.acquisition),
            ("run", &self.run),
            ("proc", &self.proc),
        ] {
            if let Some(re) = pattern {
                parts.push(format!("{name}={}", re.as_str()));
            }
        }
        if parts.is_empty() {
            write!(f, "<any>")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

fn compile(pattern: &str, anchored: bool) -> Result<Regex> {
    let source = if anchored {
        format!("^(?:{pattern})$")
    } else {
        pattern.to_string()
    };
    Regex::new(&source).map_err(|err| BidsError::InvalidQuery {
        details: format!("bad scan filter pattern {pattern:?}: {err}"),
    })
}

impl Session {
    /// The unique scan matching `filter`.
    pub fn scan(&self, filter: &ScanFilter) -> Result<&Scan> {
        let mut matches = self.scans.iter().filter(|scan| filter.matches(scan));
        let first = matches.next().ok_or_else(|| BidsError::NoScan {
            session: self.id.clone(),
            filter: filter.to_string(),
        })?;
        if matches.next().is_some() {
            return Err(BidsError::AmbiguousScan {
                session: self.id.clone(),
                filter: filter.to_string(),
            });
        }
        Ok(first)
    }

    /// All scans matching `filter`.
    pub fn matching_scans(&self, filter: &ScanFilter) -> Vec<&Scan> {
        self.scans.iter().filter(|scan| filter.matches(scan)).collect()
    }
}
