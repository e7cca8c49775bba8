//! `dataset_description.json` contents.

use std::fs;

use serde::{Deserialize, Serialize};

use crate::core::errors::{BidsError, Result};
use crate::tree::Project;

/// Project-level dataset description.
///
/// Only `Name` and `BIDSVersion` are required by the convention; everything
/// else is carried through verbatim when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DatasetDescription {
    pub name: String,
    #[serde(rename = "BIDSVersion")]
    pub bids_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledgements: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub how_to_acknowledge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub references_and_links: Option<Vec<String>>,
    #[serde(rename = "DatasetDOI", skip_serializing_if = "Option::is_none")]
    pub dataset_doi: Option<String>,
}

impl Project {
    /// Parsed dataset description, `None` when the project has none.
    pub fn dataset_description(&self) -> Result<Option<DatasetDescription>> {
        let Some(path) = self.description_path() else {
            return Ok(None);
        };
        let raw = fs::read_to_string(path).map_err(|e| BidsError::io(path, e))?;
        let description =
            serde_json::from_str(&raw).map_err(|e| BidsError::json(path, &e))?;
        Ok(Some(description))
    }
}
