//! # Merge Engine
//!
//! Decides, record by record, whether an incoming record duplicates one already in the
//! collection, and produces the merged collection.
//!
//! ## Identity Rules
//!
//! Evaluated in order for each incoming record:
//!
//! 1. **Id**: both records carry the same non-empty `id` → duplicate. Identity beats content.
//! 2. **Per-kind fuzzy rule**:
//!    - Characters: `firstName` and `lastName` both equal, case-insensitive, trimmed.
//!    - Plots: `title` equal AND enough comparable fields among
//!      [`PLOT_COMPARABLE_FIELDS`] deep-equal.
//!    - World elements: `name` and `category` equal AND enough comparable fields among
//!      [`WORLD_ELEMENT_COMPARABLE_FIELDS`] deep-equal.
//!    - Tags, custom field types: `name` equal, case-insensitive.
//!    - Scalar collections (titles, series, books, roles): the exact value.
//! 3. Anything else is never a duplicate, so unknown shapes are kept.
//!
//! A *comparable* field is one present (and not null) on both sides. "Enough" means the
//! share of comparable fields that match reaches [`MergeOptions::similarity_threshold`]
//! (0.8 by default). Zero comparable fields is never a duplicate.
//!
//! ## Ordering
//!
//! Incoming records are judged against the existing collection only. The merged collection
//! is the existing records in their order, followed by the accepted incoming records in
//! their incoming order. The one exception is the id rule: an id already accepted earlier in
//! the same batch is skipped, so a batch cannot add the same id twice. Two incoming records
//! that merely share a name are both kept.

use crate::model::{field_str, record_id, CollectionKind, Record};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

pub const PLOT_COMPARABLE_FIELDS: [&str; 5] =
    ["description", "series", "notes", "tags", "plotPoints"];

pub const WORLD_ELEMENT_COMPARABLE_FIELDS: [&str; 4] = ["description", "notes", "tags", "series"];

/// Absorbs float rounding so that 4 of 5 fields meets a 0.8 threshold.
const THRESHOLD_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Incoming collections replace the current ones wholesale.
    Replace,
    /// Non-duplicate incoming records are appended.
    Merge,
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::Replace => f.write_str("replace"),
            ImportMode::Merge => f.write_str("merge"),
        }
    }
}

impl FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "replace" | "new" => Ok(ImportMode::Replace),
            "merge" => Ok(ImportMode::Merge),
            _ => Err(format!("Unknown import mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeOptions {
    pub similarity_threshold: f64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
        }
    }
}

impl MergeOptions {
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub merged: Vec<Record>,
    pub added: usize,
    pub skipped: usize,
    /// Incoming id → id of the record it duplicated, where the two differ.
    pub id_remap: BTreeMap<String, String>,
}

/// Merges `incoming` into `existing` according to the identity rules for `kind`.
pub fn merge_collection(
    kind: CollectionKind,
    existing: &[Record],
    incoming: &[Record],
    options: &MergeOptions,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    let mut accepted: Vec<Record> = Vec::new();
    let mut accepted_ids: HashSet<String> = HashSet::new();

    for record in incoming {
        let duplicate_of = existing
            .iter()
            .find(|current| is_duplicate(kind, current, record, options));

        if let Some(current) = duplicate_of {
            if let (Some(from), Some(to)) = (record_id(record), record_id(current)) {
                if from != to {
                    outcome.id_remap.insert(from, to);
                }
            }
            outcome.skipped += 1;
            continue;
        }

        let id = record_id(record);
        if id.as_ref().is_some_and(|id| accepted_ids.contains(id)) {
            outcome.skipped += 1;
            continue;
        }
        accepted_ids.extend(id);
        accepted.push(record.clone());
        outcome.added += 1;
    }

    outcome.merged = existing.iter().cloned().chain(accepted).collect();
    outcome
}

/// Replace mode: the incoming collection becomes the collection.
pub fn replace_collection(incoming: &[Record]) -> MergeOutcome {
    MergeOutcome {
        merged: incoming.to_vec(),
        added: incoming.len(),
        ..Default::default()
    }
}

pub fn is_duplicate(
    kind: CollectionKind,
    existing: &Record,
    incoming: &Record,
    options: &MergeOptions,
) -> bool {
    if let (Some(a), Some(b)) = (record_id(existing), record_id(incoming)) {
        if a == b {
            return true;
        }
    }

    if kind.is_scalar() {
        return existing == incoming;
    }

    match kind {
        CollectionKind::Characters => same_character(existing, incoming),
        CollectionKind::Plots => {
            let same_title = matches!(
                (field_str(existing, "title"), field_str(incoming, "title")),
                (Some(a), Some(b)) if !a.is_empty() && a == b
            );
            same_title
                && meets_threshold(existing, incoming, &PLOT_COMPARABLE_FIELDS, options)
        }
        CollectionKind::WorldElements => {
            let same_name = matches!(
                (field_str(existing, "name"), field_str(incoming, "name")),
                (Some(a), Some(b)) if !a.is_empty() && a == b
            );
            same_name
                && field_str(existing, "category") == field_str(incoming, "category")
                && meets_threshold(
                    existing,
                    incoming,
                    &WORLD_ELEMENT_COMPARABLE_FIELDS,
                    options,
                )
        }
        CollectionKind::Tags | CollectionKind::CustomFieldTypes => {
            match (folded(existing, "name"), folded(incoming, "name")) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Share of comparable fields that are deep-equal, or `None` when no field is comparable.
pub fn field_similarity(a: &Record, b: &Record, fields: &[&str]) -> Option<f64> {
    let mut comparable = 0usize;
    let mut matching = 0usize;
    for field in fields {
        match (present(a, field), present(b, field)) {
            (Some(x), Some(y)) => {
                comparable += 1;
                if x == y {
                    matching += 1;
                }
            }
            _ => continue,
        }
    }
    if comparable == 0 {
        None
    } else {
        Some(matching as f64 / comparable as f64)
    }
}

/// Rewrites tag references in `records` through `remap`. Returns the number of records changed.
pub fn remap_tag_references(records: &mut [Record], remap: &BTreeMap<String, String>) -> usize {
    if remap.is_empty() {
        return 0;
    }
    records
        .iter_mut()
        .map(|record| {
            crate::tags::rewrite_tag_references(record, |id| {
                Some(remap.get(id).cloned().unwrap_or_else(|| id.to_string()))
            })
        })
        .filter(|changed| *changed > 0)
        .count()
}

fn meets_threshold(a: &Record, b: &Record, fields: &[&str], options: &MergeOptions) -> bool {
    field_similarity(a, b, fields)
        .is_some_and(|ratio| ratio + THRESHOLD_EPSILON >= options.similarity_threshold)
}

fn same_character(a: &Record, b: &Record) -> bool {
    let first_a = folded(a, "firstName").unwrap_or_default();
    let last_a = folded(a, "lastName").unwrap_or_default();
    let first_b = folded(b, "firstName").unwrap_or_default();
    let last_b = folded(b, "lastName").unwrap_or_default();

    // Two nameless characters are not the same character.
    if first_a.is_empty() && last_a.is_empty() {
        return false;
    }
    first_a == first_b && last_a == last_b
}

fn folded(record: &Record, field: &str) -> Option<String> {
    field_str(record, field).map(|s| s.trim().to_lowercase())
}

fn present<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    record.get(field).filter(|v| !v.is_null())
}
