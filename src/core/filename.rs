//! BIDS filename parameter parser.
//!
//! A BIDS filename encodes key/value pairs as `_`-delimited `key-value`
//! segments, plus a bare suffix segment naming the file kind (`meg`,
//! `channels`, `headshape`, ...). `sub-1_ses-2_task-rest_run-1_meg.con`
//! parses to `{sub: 1, ses: 2, task: rest, run: 1}` with suffix `meg` and
//! extension `.con`.

use std::fmt;

/// Parsed filename parameters.
///
/// The `file` suffix and `ext`ension are reserved and excluded from the
/// subset relationship used to associate metadata files with raw scans.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilenameParams {
    pairs: Vec<(String, String)>,
    file: Option<String>,
    ext: String,
}

impl FilenameParams {
    /// Decompose a filename into parameters.
    ///
    /// Segment order does not affect the resulting mapping; a later duplicate
    /// key overwrites an earlier one.
    pub fn parse(fname: &str) -> Self {
        let (stem, ext) = split_extension(fname);
        let mut params = Self {
            pairs: Vec::new(),
            file: None,
            ext: ext.to_string(),
        };
        for segment in stem.split('_') {
            if let Some((key, value)) = segment.split_once('-') {
                params.set(key, value);
            } else {
                params.file = Some(segment.to_string());
            }
        }
        params
    }

    /// Value for `key`, excluding the reserved `file`/`ext` entries.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The bare suffix segment (`meg`, `channels`, `scans`, ...), if any.
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// The file extension including its leading dot (empty if none).
    pub fn ext(&self) -> &str {
        &self.ext
    }

    /// Non-reserved keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(k, _)| k.as_str())
    }

    /// Remove and return the `part` key used by split/multi-part
    /// acquisitions. It must not participate in the subset test.
    pub fn take_part(&mut self) -> Option<String> {
        let idx = self.pairs.iter().position(|(k, _)| k == "part")?;
        Some(self.pairs.remove(idx).1)
    }

    /// Subset relationship: `self` ⊇ `other` on the non-reserved keys.
    ///
    /// True iff every key of `other` appears in `self` with an identical
    /// value. Two parameter sets with no overlapping keys at all are
    /// *not* subsets of each other in either direction: an empty `other`
    /// key set only qualifies when `self` is empty too.
    pub fn is_superset_of(&self, other: &Self) -> bool {
        if other.pairs.len() > self.pairs.len() {
            return false;
        }
        if other.pairs.is_empty() && !self.pairs.is_empty() {
            return false;
        }
        other
            .pairs
            .iter()
            .all(|(key, value)| self.get(key) == Some(value.as_str()))
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.pairs.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_string();
        } else {
            self.pairs.push((key.to_string(), value.to_string()));
        }
    }
}

impl fmt::Display for FilenameParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.pairs {
            if !first {
                write!(f, "_")?;
            }
            write!(f, "{key}-{value}")?;
            first = false;
        }
        if let Some(file) = &self.file {
            if !first {
                write!(f, "_")?;
            }
            write!(f, "{file}")?;
        }
        write!(f, "{}", self.ext)
    }
}

/// Split a filename into stem and extension (last dot, if any, and not a
/// leading dot).
fn split_extension(fname: &str) -> (&str, &str) {
    match fname.rfind('.') {
        Some(idx) if idx > 0 => fname.split_at(idx),
        _ => (fname, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_suffix_and_extension() {
        let params = FilenameParams::parse("sub-1_ses-2_task-rest_run-1_meg.con");
        assert_eq!(params.get("sub"), Some("1"));
        assert_eq!(params.get("ses"), Some("2"));
        assert_eq!(params.get("task"), Some("rest"));
        assert_eq!(params.get("run"), Some("1"));
        assert_eq!(params.file(), Some("meg"));
        assert_eq!(params.ext(), ".con");
    }

    #[test]
    fn segment_order_is_irrelevant() {
        let a = FilenameParams::parse("sub-1_task-rest_meg.json");
        let b = FilenameParams::parse("task-rest_sub-1_meg.json");
        assert!(a.is_superset_of(&b));
        assert!(b.is_superset_of(&a));
    }

    #[test]
    fn round_trips_key_set_through_display() {
        let original = "sub-1_ses-2_task-rest_run-1_meg.con";
        let reparsed = FilenameParams::parse(&FilenameParams::parse(original).to_string());
        let expected = FilenameParams::parse(original);
        assert_eq!(reparsed, expected);
    }

    #[test]
    fn sidecar_is_subset_of_raw_file() {
        let raw = FilenameParams::parse("sub-1_ses-1_task-resting_run-1_meg.con");
        let sidecar = FilenameParams::parse("sub-1_ses-1_task-resting_run-1_meg.json");
        let coordsystem = FilenameParams::parse("sub-1_ses-1_coordsystem.json");
        assert!(raw.is_superset_of(&sidecar));
        assert!(raw.is_superset_of(&coordsystem));
        assert!(!coordsystem.is_superset_of(&raw));
    }

    #[test]
    fn disjoint_key_sets_are_not_subsets_either_way() {
        let a = FilenameParams::parse("run-1_acq-test_meg.json");
        let b = FilenameParams::parse("sub-1_ses-2_headshape.elp");
        assert!(!a.is_superset_of(&b));
        assert!(!b.is_superset_of(&a));
    }

    #[test]
    fn reserved_keys_are_ignored_by_the_subset_test() {
        // Same entity keys, different suffix and extension: still a subset.
        let raw = FilenameParams::parse("sub-1_task-rest_meg.con");
        let channels = FilenameParams::parse("sub-1_task-rest_channels.tsv");
        assert!(raw.is_superset_of(&channels));
    }

    #[test]
    fn take_part_removes_the_key() {
        let mut params = FilenameParams::parse("sub-1_task-rest_part-02_meg.fif");
        assert_eq!(params.take_part().as_deref(), Some("02"));
        assert_eq!(params.get("part"), None);
        assert_eq!(params.take_part(), None);
    }

    #[test]
    fn value_with_hyphen_is_kept_whole() {
        let params = FilenameParams::parse("acq-multi-echo_meg.json");
        assert_eq!(params.get("acq"), Some("multi-echo"));
    }
}
