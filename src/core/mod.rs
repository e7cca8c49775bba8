//! Foundations shared by every layer of the crate.
//!
//! - [`constants`]: reserved filenames and sentinel ids.
//! - [`errors`]: the [`BidsError`](errors::BidsError) taxonomy.
//! - [`filename`]: BIDS filename parameter parsing.
//! - [`paths`]: entity path composition and rename substitution.
//! - [`tsv`]: tab-separated manifest tables.

pub mod constants;
pub mod errors;
pub mod filename;
pub mod paths;
pub mod tsv;
