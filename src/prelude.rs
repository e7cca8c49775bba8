//! Convenience re-exports of the types most callers need.

pub use crate::core::errors::{BidsError, Result};
pub use crate::core::filename::FilenameParams;
pub use crate::core::tsv::TsvTable;
pub use crate::merge::{DefaultCopier, FileCopier, add_to_project, add_to_session, add_to_subject, add_to_tree};
pub use crate::query::{Condition, QueryResults, QueryValue, Queryable, Scope};
pub use crate::tree::description::DatasetDescription;
pub use crate::tree::entity::{EntityRef, ScanFilter, ScanRef, SessionRef, SubjectRef};
pub use crate::tree::{Project, Scan, Session, Subject, Tree};
