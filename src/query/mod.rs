//! Declarative queries over the hierarchy.
//!
//! A query names a result scope (which level of entity to return), an
//! attribute key, a comparison and a value. Scan-level attributes are tested
//! existentially: a subject matches `task = resting` when any of its scans
//! does. The `!!=` comparison is the complement of `=` over the whole result
//! scope: subjects none of whose scans are `task-resting`, rather than
//! subjects with any non-resting scan.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};

use crate::core::errors::{BidsError, Result};
use crate::tree::entity::{EntityRef, ScanRef, SessionRef, SubjectRef};
use crate::tree::{ACQ_TIME_FORMAT, Project, Scan, Tree};

/// Which level of entity a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Project,
    Subject,
    Session,
    Scan,
}

impl FromStr for Scope {
    type Err = BidsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "project" | "projects" => Ok(Self::Project),
            "subject" | "subjects" => Ok(Self::Subject),
            "session" | "sessions" => Ok(Self::Session),
            "scan" | "scans" => Ok(Self::Scan),
            other => Err(BidsError::InvalidQuery {
                details: format!("unknown query scope {other:?}"),
            }),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Project => "project",
            Self::Subject => "subject",
            Self::Session => "session",
            Self::Scan => "scan",
        })
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
    Ne,
    /// "Not any": complement of [`Condition::Eq`] over the result scope.
    NotAny,
}

impl FromStr for Condition {
    type Err = BidsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "<" => Ok(Self::Lt),
            "<=" | "=<" => Ok(Self::Le),
            "=" | "==" => Ok(Self::Eq),
            ">=" | "=>" => Ok(Self::Ge),
            ">" => Ok(Self::Gt),
            "!=" => Ok(Self::Ne),
            "!!=" => Ok(Self::NotAny),
            other => Err(BidsError::InvalidQuery {
                details: format!("unknown comparison {other:?}"),
            }),
        }
    }
}

/// A query operand.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for QueryValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for QueryValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for QueryValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl QueryValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Str(_) | Self::Bool(_) => None,
        }
    }

    fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// Entities matched by a query, in scope order. Chainable: a further query
/// runs against each contained entity and concatenates the results.
#[derive(Debug, Clone, Default)]
pub struct QueryResults<'a> {
    items: Vec<EntityRef<'a>>,
}

impl<'a> QueryResults<'a> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityRef<'a>> {
        self.items.iter()
    }

    pub fn into_vec(self) -> Vec<EntityRef<'a>> {
        self.items
    }

    pub fn get(&self, index: usize) -> Option<&EntityRef<'a>> {
        self.items.get(index)
    }
}

impl<'a> IntoIterator for QueryResults<'a> {
    type Item = EntityRef<'a>;
    type IntoIter = std::vec::IntoIter<EntityRef<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Anything a query can be anchored on.
pub trait Queryable {
    fn as_query_target(&self) -> Vec<EntityRef<'_>>;

    /// Run one query step against this anchor.
    fn query(
        &self,
        scope: Scope,
        key: &str,
        condition: Condition,
        value: impl Into<QueryValue>,
    ) -> Result<QueryResults<'_>> {
        let value = value.into();
        let mut items = Vec::new();
        for target in self.as_query_target() {
            items.extend(run_query(target, scope, key, condition, &value)?);
        }
        Ok(QueryResults { items })
    }
}

impl Queryable for Tree {
    fn as_query_target(&self) -> Vec<EntityRef<'_>> {
        vec![EntityRef::Tree(self)]
    }
}

impl Queryable for Project {
    fn as_query_target(&self) -> Vec<EntityRef<'_>> {
        vec![EntityRef::Project(self)]
    }
}

impl Queryable for SubjectRef<'_> {
    fn as_query_target(&self) -> Vec<EntityRef<'_>> {
        vec![EntityRef::Subject(*self)]
    }
}

impl Queryable for SessionRef<'_> {
    fn as_query_target(&self) -> Vec<EntityRef<'_>> {
        vec![EntityRef::Session(*self)]
    }
}

impl Queryable for ScanRef<'_> {
    fn as_query_target(&self) -> Vec<EntityRef<'_>> {
        vec![EntityRef::Scan(*self)]
    }
}

impl Queryable for QueryResults<'_> {
    fn as_query_target(&self) -> Vec<EntityRef<'_>> {
        self.items.clone()
    }
}

/// Run one query against one anchor.
pub fn run_query<'a>(
    target: EntityRef<'a>,
    scope: Scope,
    key: &str,
    condition: Condition,
    value: &QueryValue,
) -> Result<Vec<EntityRef<'a>>> {
    validate_scope(&target, scope)?;
    if condition == Condition::NotAny && matches!(key, "subjects" | "sessions" | "scans") {
        return Err(BidsError::InvalidQuery {
            details: format!("cannot apply !!= to a {key} count"),
        });
    }
    let candidates = collect(&target, scope);

    // At scan scope there is no collection to take a complement over; the
    // universal negation collapses to the plain one.
    let condition = if condition == Condition::NotAny && scope == Scope::Scan {
        Condition::Ne
    } else {
        condition
    };

    if condition == Condition::NotAny {
        let flags = match_flags(&candidates, scope, key, Condition::Eq, value)?;
        return Ok(candidates
            .into_iter()
            .zip(flags)
            .filter_map(|(candidate, matched)| (!matched).then_some(candidate))
            .collect());
    }

    let flags = match_flags(&candidates, scope, key, condition, value)?;
    Ok(candidates
        .into_iter()
        .zip(flags)
        .filter_map(|(candidate, matched)| matched.then_some(candidate))
        .collect())
}

fn validate_scope(target: &EntityRef<'_>, scope: Scope) -> Result<()> {
    let allowed = match target {
        EntityRef::Tree(_) | EntityRef::Project(_) => true,
        EntityRef::Subject(_) => scope != Scope::Project,
        EntityRef::Session(_) => matches!(scope, Scope::Session | Scope::Scan),
        EntityRef::Scan(_) => scope == Scope::Scan,
    };
    if allowed {
        Ok(())
    } else {
        Err(BidsError::InvalidQuery {
            details: format!("cannot query {scope}s from a {}", target.kind()),
        })
    }
}

fn collect<'a>(target: &EntityRef<'a>, scope: Scope) -> Vec<EntityRef<'a>> {
    match scope {
        Scope::Project => target.projects().into_iter().map(EntityRef::Project).collect(),
        Scope::Subject => target.subjects().into_iter().map(EntityRef::Subject).collect(),
        Scope::Session => target.sessions().into_iter().map(EntityRef::Session).collect(),
        Scope::Scan => target.scans().into_iter().map(EntityRef::Scan).collect(),
    }
}

/// Per-candidate match decisions for a non-`!!=` comparison.
fn match_flags(
    candidates: &[EntityRef<'_>],
    scope: Scope,
    key: &str,
    condition: Condition,
    value: &QueryValue,
) -> Result<Vec<bool>> {
    match key {
        "subjects" | "sessions" | "scans" => {
            count_flags(candidates, scope, key, condition, value)
        }
        "task" | "acquisition" | "acq" | "run" | "proc" => {
            if !matches!(condition, Condition::Eq | Condition::Ne) {
                return Err(BidsError::InvalidQuery {
                    details: format!("filename entity {key:?} only supports =, != and !!="),
                });
            }
            let Some(wanted) = value.as_str() else {
                return Err(BidsError::InvalidQuery {
                    details: format!("filename entity {key:?} takes a string value"),
                });
            };
            Ok(candidates
                .iter()
                .map(|candidate| {
                    candidate.scans().iter().any(|scan| match condition {
                        Condition::Eq => scan.entity(key) == Some(wanted),
                        // A scan without the entity at all still differs.
                        _ => scan.entity(key) != Some(wanted),
                    })
                })
                .collect())
        }
        "rec_date" => date_flags(candidates, condition, value),
        _ => data_flags(candidates, scope, key, condition, value),
    }
}

#[allow(clippy::cast_precision_loss)]
fn count_flags(
    candidates: &[EntityRef<'_>],
    scope: Scope,
    key: &str,
    condition: Condition,
    value: &QueryValue,
) -> Result<Vec<bool>> {
    let allowed = matches!(
        (key, scope),
        ("subjects", Scope::Project)
            | ("sessions", Scope::Project | Scope::Subject)
            | ("scans", Scope::Project | Scope::Subject | Scope::Session)
    );
    if !allowed {
        return Err(BidsError::InvalidQuery {
            details: format!("cannot count {key} within a {scope}"),
        });
    }
    let Some(wanted) = value.as_f64() else {
        return Err(BidsError::InvalidQuery {
            details: format!("counting {key} requires a numeric value"),
        });
    };
    Ok(candidates
        .iter()
        .map(|candidate| {
            let count = match key {
                "subjects" => candidate.subjects().len(),
                "sessions" => candidate.sessions().len(),
                _ => candidate.scans().len(),
            };
            numeric_matches(count as f64, condition, wanted)
        })
        .collect())
}

fn date_flags(
    candidates: &[EntityRef<'_>],
    condition: Condition,
    value: &QueryValue,
) -> Result<Vec<bool>> {
    let Some(raw) = value.as_str() else {
        return Err(BidsError::InvalidQuery {
            details: "rec_date takes a string value".to_string(),
        });
    };
    enum Wanted {
        Date(NaiveDate),
        DateTime(NaiveDateTime),
    }
    let wanted = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_or_else(
        |_| {
            NaiveDateTime::parse_from_str(raw, ACQ_TIME_FORMAT)
                .map(Wanted::DateTime)
                .map_err(|_| BidsError::InvalidQuery {
                    details: format!("unparseable rec_date value {raw:?}"),
                })
        },
        |date| Ok(Wanted::Date(date)),
    )?;

    Ok(candidates
        .iter()
        .map(|candidate| {
            // Scans without a parseable acquisition time are skipped.
            candidate
                .scans()
                .iter()
                .filter_map(|scan| scan.recording_datetime())
                .any(|datetime| {
                    let ordering = match &wanted {
                        Wanted::Date(date) => datetime.date().cmp(date),
                        Wanted::DateTime(w) => datetime.cmp(w),
                    };
                    ordering_matches(ordering, condition)
                })
        })
        .collect())
}

/// Data keys: participants-row columns for subjects (preferred when any
/// subject matches there), falling back to sidecar metadata on the scans.
fn data_flags(
    candidates: &[EntityRef<'_>],
    scope: Scope,
    key: &str,
    condition: Condition,
    value: &QueryValue,
) -> Result<Vec<bool>> {
    if scope == Scope::Subject {
        let from_rows: Vec<bool> = candidates
            .iter()
            .map(|candidate| match candidate {
                EntityRef::Subject(subject) => subject
                    .data(key)
                    .is_some_and(|actual| str_matches(actual, condition, value)),
                _ => false,
            })
            .collect();
        if from_rows.iter().any(|&matched| matched) {
            return Ok(from_rows);
        }
    }
    Ok(candidates
        .iter()
        .map(|candidate| {
            candidate.scans().iter().any(|scan| info_matches(scan, key, condition, value))
        })
        .collect())
}

fn info_matches(scan: &Scan, key: &str, condition: Condition, value: &QueryValue) -> bool {
    scan.info_value(key).is_some_and(|actual| match actual {
        serde_json::Value::String(s) => str_matches(s, condition, value),
        serde_json::Value::Number(n) => n
            .as_f64()
            .zip(value.as_f64())
            .is_some_and(|(actual, wanted)| numeric_matches(actual, condition, wanted)),
        serde_json::Value::Bool(b) => match (condition, value) {
            (Condition::Eq, QueryValue::Bool(wanted)) => b == wanted,
            (Condition::Ne, QueryValue::Bool(wanted)) => b != wanted,
            _ => false,
        },
        _ => false,
    })
}

/// Compare a stored string against the query value. A numeric query value
/// compares numerically when the stored string parses as a number; a type
/// mismatch never matches.
fn str_matches(actual: &str, condition: Condition, value: &QueryValue) -> bool {
    match value {
        QueryValue::Str(wanted) => ordering_matches(actual.cmp(wanted.as_str()), condition),
        QueryValue::Int(_) | QueryValue::Float(_) => actual
            .trim()
            .parse::<f64>()
            .ok()
            .zip(value.as_f64())
            .is_some_and(|(actual, wanted)| numeric_matches(actual, condition, wanted)),
        QueryValue::Bool(wanted) => match condition {
            Condition::Eq => actual.parse::<bool>() == Ok(*wanted),
            Condition::Ne => actual.parse::<bool>().is_ok_and(|b| b != *wanted),
            _ => false,
        },
    }
}

fn numeric_matches(actual: f64, condition: Condition, wanted: f64) -> bool {
    actual
        .partial_cmp(&wanted)
        .is_some_and(|ordering| ordering_matches(ordering, condition))
}

fn ordering_matches(ordering: Ordering, condition: Condition) -> bool {
    match condition {
        Condition::Lt => ordering == Ordering::Less,
        Condition::Le => ordering != Ordering::Greater,
        Condition::Eq => ordering == Ordering::Equal,
        Condition::Ge => ordering != Ordering::Less,
        Condition::Gt => ordering == Ordering::Greater,
        Condition::Ne | Condition::NotAny => ordering != Ordering::Equal,
    }
}
