//! Error taxonomy for the BIDS mapping, merge, and query engine.
//!
//! Every failure is surfaced as a distinct [`BidsError`] variant so callers
//! can tell "not found" from "structurally invalid" from "illegal merge"
//! without string matching.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the crate.
pub type Result<T> = std::result::Result<T, BidsError>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum BidsError {
    #[error("project {id} doesn't exist in this BIDS folder. Possible projects: {available:?}")]
    NoProject { id: String, available: Vec<String> },

    #[error("subject {id} doesn't exist in project {project}. Possible subjects: {available:?}")]
    NoSubject {
        id: String,
        project: String,
        available: Vec<String>,
    },

    #[error("session {id} doesn't exist in subject {subject}. Possible sessions: {available:?}")]
    NoSession {
        id: String,
        subject: String,
        available: Vec<String>,
    },

    #[error("no scan matching {filter} in session {session}")]
    NoScan { session: String, filter: String },

    #[error(
        "multiple scans match {filter} in session {session}; narrow the filter or ask for all matches"
    )]
    AmbiguousScan { session: String, filter: String },

    #[error("invalid id: {details}")]
    InvalidId { details: String },

    /// The on-disk layout violates a minimum-cardinality invariant.
    #[error("malformed BIDS structure: {details}")]
    Mapping { details: String },

    /// Cross-hierarchy id mismatch during a merge.
    #[error("Cannot add a {child} from a different {parent}.")]
    Association {
        child: &'static str,
        parent: &'static str,
    },

    /// Same-level id disagreement during a merge (route through the parent).
    #[error("added {kind} must have the same id (have {expected:?}, got {found:?})")]
    IdMismatch {
        kind: &'static str,
        expected: String,
        found: String,
    },

    /// An entity kind this level cannot accept at all.
    #[error("cannot add a {other} to a {target}")]
    InvalidAdd {
        target: &'static str,
        other: &'static str,
    },

    /// A containment question no level can answer (same level or upward).
    #[error("a {outer} cannot contain a {inner}")]
    InvalidContainment {
        outer: &'static str,
        inner: &'static str,
    },

    #[error("invalid query: {details}")]
    InvalidQuery { details: String },

    #[error("TSV failure at {path}: {details}")]
    Tsv { path: PathBuf, details: String },

    #[error("JSON failure at {path}: {details}")]
    Json { path: PathBuf, details: String },

    #[error("IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BidsError {
    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for sidecar/description JSON failures.
    #[must_use]
    pub fn json(path: impl AsRef<Path>, source: &serde_json::Error) -> Self {
        Self::Json {
            path: path.as_ref().to_path_buf(),
            details: source.to_string(),
        }
    }

    /// Convenience constructor for TSV failures.
    #[must_use]
    pub fn tsv(path: impl AsRef<Path>, details: impl Into<String>) -> Self {
        Self::Tsv {
            path: path.as_ref().to_path_buf(),
            details: details.into(),
        }
    }

    /// Whether this error indicates a lookup miss rather than corrupt state
    /// or API misuse.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NoProject { .. }
                | Self::NoSubject { .. }
                | Self::NoSession { .. }
                | Self::NoScan { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn association_error_message_names_both_roles() {
        let err = BidsError::Association {
            child: "scan",
            parent: "project, subject and session",
        };
        assert_eq!(
            err.to_string(),
            "Cannot add a scan from a different project, subject and session."
        );
    }

    #[test]
    fn not_found_family_is_distinguishable() {
        let err = BidsError::NoSubject {
            id: "4".to_string(),
            project: "test1".to_string(),
            available: vec!["1".to_string(), "2".to_string()],
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("Possible subjects"));

        let err = BidsError::Mapping {
            details: "no scans found".to_string(),
        };
        assert!(!err.is_not_found());
    }

    #[test]
    fn io_constructor_keeps_path() {
        let err = BidsError::io(
            "/data/bids/participants.tsv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("participants.tsv"));
    }
}
