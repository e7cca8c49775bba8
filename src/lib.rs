//! Hierarchical mapping, merge and query engine for BIDS folders.
//!
//! A [BIDS](https://bids.neuroimaging.io/) folder lays neuroimaging data out
//! as `<root>/<project>/sub-<id>/ses-<id>/<recording-type>/...`, described
//! by tab-separated manifests and JSON sidecars. This crate maps such a
//! folder into an owned [`Tree`](tree::Tree) of projects, subjects, sessions
//! and scans, and then lets you:
//!
//! - merge entities between trees ([`merge`]), creating missing ancestors
//!   and keeping manifests consistent;
//! - query any level by attributes, counts and recording dates ([`query`]);
//! - rename and delete entities with all contained filenames rewritten
//!   ([`edit`]);
//! - export the mapped hierarchy as XML ([`map`]).
//!
//! ```no_run
//! use bidstree::prelude::*;
//!
//! fn main() -> bidstree::Result<()> {
//!     let src = Tree::load("/data/recordings")?;
//!     let mut dst = Tree::empty("/data/archive")?;
//!     let subject = src.project("test1")?.subject_ref("1")?;
//!     dst.add(EntityRef::Subject(subject), &DefaultCopier)?;
//!
//!     let young = dst.query(Scope::Subject, "age", Condition::Lt, 5)?;
//!     println!("{} young subjects", young.len());
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod core;
pub mod edit;
pub mod map;
pub mod merge;
pub mod prelude;
pub mod query;
pub mod tree;

pub use crate::core::errors::{BidsError, Result};
