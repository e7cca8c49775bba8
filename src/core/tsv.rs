//! Tab-separated manifest tables (`participants.tsv`, `*_scans.tsv`).
//!
//! Cells holding the literal `n/a` are surfaced as `None`; the sentinel is
//! reinstated on write so the on-disk form stays BIDS-conformant.

use std::path::Path;

use crate::core::constants::NOT_APPLICABLE;
use crate::core::errors::{BidsError, Result};

/// An in-memory TSV table with a header row and optional cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TsvTable {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl TsvTable {
    /// Empty table with the given header.
    pub fn with_columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Read a table from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .flexible(true)
            .from_path(path)
            .map_err(|err| BidsError::tsv(path, err.to_string()))?;

        let columns = reader
            .headers()
            .map_err(|err| BidsError::tsv(path, err.to_string()))?
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| BidsError::tsv(path, err.to_string()))?;
            let mut row: Vec<Option<String>> = record
                .iter()
                .map(|cell| {
                    if cell == NOT_APPLICABLE || cell.is_empty() {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect();
            row.resize(columns.len(), None);
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    /// Write the table to disk, rendering absent cells as `n/a`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_path(path)
            .map_err(|err| BidsError::tsv(path, err.to_string()))?;

        writer
            .write_record(&self.columns)
            .map_err(|err| BidsError::tsv(path, err.to_string()))?;
        for row in &self.rows {
            let record: Vec<&str> = row
                .iter()
                .map(|cell| cell.as_deref().unwrap_or(NOT_APPLICABLE))
                .collect();
            writer
                .write_record(&record)
                .map_err(|err| BidsError::tsv(path, err.to_string()))?;
        }
        writer
            .flush()
            .map_err(|err| BidsError::tsv(path, err.to_string()))?;
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<String>>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Cell at `(row, column)`, flattening both a missing column and an
    /// absent value to `None`.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// First row whose `column` cell equals `value`.
    pub fn find_row(&self, column: &str, value: &str) -> Option<usize> {
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .position(|row| row.get(idx).and_then(Option::as_deref) == Some(value))
    }

    /// Append a row given as `(column, value)` pairs. Unknown columns are
    /// added to the header; unmentioned columns are filled with `None`.
    pub fn push_row<'a>(&mut self, cells: impl IntoIterator<Item = (&'a str, Option<&'a str>)>) {
        let mut row = vec![None; self.columns.len()];
        for (column, value) in cells {
            let idx = self.column_index(column).unwrap_or_else(|| {
                self.columns.push(column.to_string());
                for existing in &mut self.rows {
                    existing.push(None);
                }
                row.push(None);
                self.columns.len() - 1
            });
            row[idx] = value.map(ToString::to_string);
        }
        self.rows.push(row);
    }

    /// Overwrite a single cell, growing the header if needed.
    pub fn set_cell(&mut self, row: usize, column: &str, value: Option<&str>) {
        let idx = self.column_index(column).unwrap_or_else(|| {
            self.columns.push(column.to_string());
            for existing in &mut self.rows {
                existing.push(None);
            }
            self.columns.len() - 1
        });
        if let Some(cells) = self.rows.get_mut(row) {
            cells[idx] = value.map(ToString::to_string);
        }
    }

    /// Drop every row whose `column` cell equals `value`.
    pub fn remove_rows(&mut self, column: &str, value: &str) {
        if let Some(idx) = self.column_index(column) {
            self.rows
                .retain(|row| row.get(idx).and_then(Option::as_deref) != Some(value));
        }
    }

    /// Rewrite every cell of `column` with `f`.
    pub fn map_column(&mut self, column: &str, mut f: impl FnMut(&str) -> String) {
        if let Some(idx) = self.column_index(column) {
            for row in &mut self.rows {
                if let Some(Some(cell)) = row.get_mut(idx) {
                    *cell = f(cell);
                }
            }
        }
    }

    /// Merge `other` into `self` with a column union.
    ///
    /// When `key` names a column, incoming rows replace existing rows with
    /// the same key value (last write wins); otherwise rows are appended.
    pub fn merge(&mut self, other: &Self, key: Option<&str>) {
        for column in &other.columns {
            if self.column_index(column).is_none() {
                self.columns.push(column.clone());
                for row in &mut self.rows {
                    row.push(None);
                }
            }
        }
        for incoming in &other.rows {
            let cells: Vec<(&str, Option<&str>)> = other
                .columns
                .iter()
                .zip(incoming.iter())
                .map(|(column, cell)| (column.as_str(), cell.as_deref()))
                .collect();
            if let Some(key) = key
                && let Some(value) = other
                    .column_index(key)
                    .and_then(|idx| incoming.get(idx))
                    .and_then(Option::as_deref)
                && let Some(existing) = self.find_row(key, value)
            {
                for (column, cell) in &cells {
                    self.set_cell(existing, column, *cell);
                }
                continue;
            }
            self.rows.push({
                let mut row = vec![None; self.columns.len()];
                for (column, cell) in cells {
                    if let Some(idx) = self.column_index(column) {
                        row[idx] = cell.map(ToString::to_string);
                    }
                }
                row
            });
        }
    }

    /// Row rendered as `(column, value)` pairs.
    pub fn row_pairs(&self, row: usize) -> Vec<(&str, Option<&str>)> {
        self.rows.get(row).map_or_else(Vec::new, |cells| {
            self.columns
                .iter()
                .zip(cells.iter())
                .map(|(column, cell)| (column.as_str(), cell.as_deref()))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn participants() -> TsvTable {
        let mut table = TsvTable::with_columns(["participant_id", "age", "sex"]);
        table.push_row([
            ("participant_id", Some("sub-1")),
            ("age", Some("2")),
            ("sex", Some("M")),
        ]);
        table.push_row([("participant_id", Some("sub-2")), ("age", Some("4"))]);
        table
    }

    #[test]
    fn round_trips_na_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("participants.tsv");
        participants().write(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("sub-2\t4\tn/a"));

        let reread = TsvTable::read(&path).unwrap();
        assert_eq!(reread, participants());
        assert_eq!(reread.cell(1, "sex"), None);
    }

    #[test]
    fn find_and_remove_rows_by_key() {
        let mut table = participants();
        assert_eq!(table.find_row("participant_id", "sub-2"), Some(1));
        table.remove_rows("participant_id", "sub-1");
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, "participant_id"), Some("sub-2"));
    }

    #[test]
    fn push_row_grows_header_on_new_column() {
        let mut table = participants();
        table.push_row([
            ("participant_id", Some("sub-3")),
            ("group", Some("control")),
        ]);
        assert_eq!(table.columns().last().map(String::as_str), Some("group"));
        assert_eq!(table.cell(0, "group"), None);
        assert_eq!(table.cell(2, "group"), Some("control"));
        assert_eq!(table.cell(2, "age"), None);
    }

    #[test]
    fn merge_takes_column_union_and_replaces_on_key() {
        let mut dst = TsvTable::with_columns(["filename", "acq_time"]);
        dst.push_row([
            ("filename", Some("meg/a_meg.con")),
            ("acq_time", Some("2018-10-26T11:32:33")),
        ]);

        let mut src = TsvTable::with_columns(["filename", "acq_time", "operator"]);
        src.push_row([
            ("filename", Some("meg/a_meg.con")),
            ("acq_time", Some("2018-10-26T12:00:00")),
            ("operator", Some("MB")),
        ]);
        src.push_row([("filename", Some("meg/b_meg.con"))]);

        dst.merge(&src, Some("filename"));
        assert_eq!(dst.len(), 2);
        assert_eq!(dst.cell(0, "acq_time"), Some("2018-10-26T12:00:00"));
        assert_eq!(dst.cell(0, "operator"), Some("MB"));
        assert_eq!(dst.cell(1, "filename"), Some("meg/b_meg.con"));
    }

    #[test]
    fn merge_without_key_appends() {
        let mut dst = participants();
        let src = participants();
        dst.merge(&src, None);
        assert_eq!(dst.len(), 4);
    }

    #[test]
    fn map_column_rewrites_present_cells_only() {
        let mut table = participants();
        table.map_column("participant_id", |v| v.replace("sub-2", "sub-4"));
        assert_eq!(table.cell(1, "participant_id"), Some("sub-4"));
        table.map_column("sex", |v| v.to_lowercase());
        assert_eq!(table.cell(1, "sex"), None);
    }
}
