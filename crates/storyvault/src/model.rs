//! # Data Model
//!
//! A [`Database`] is a named aggregate of ten ordered collections. Records are kept as open
//! JSON values: the writer-facing application attaches arbitrary fields to characters, plots
//! and the like, and this library only ever looks at the handful of fields its identity rules
//! need (`id`, `name`, `title`, ...). Everything else is carried through untouched.
//!
//! Four of the collections (`titles`, `seriesList`, `books`, `roles`) are *scalar*: their
//! entries are plain strings rather than objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The document format version written by this build. Imports must share its major component.
pub const FORMAT_VERSION: &str = "2.0.0";

/// The well-known database the current pointer falls back to.
pub const DEFAULT_DATABASE: &str = "Default";

/// A single entry in a collection.
pub type Record = Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollectionKind {
    Characters,
    Titles,
    SeriesList,
    Books,
    Roles,
    CustomFieldTypes,
    Relationships,
    Tags,
    Plots,
    WorldElements,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 10] = [
        CollectionKind::Characters,
        CollectionKind::Titles,
        CollectionKind::SeriesList,
        CollectionKind::Books,
        CollectionKind::Roles,
        CollectionKind::CustomFieldTypes,
        CollectionKind::Relationships,
        CollectionKind::Tags,
        CollectionKind::Plots,
        CollectionKind::WorldElements,
    ];

    /// The key used both in database documents and as the generic tier key.
    pub fn key(self) -> &'static str {
        match self {
            CollectionKind::Characters => "characters",
            CollectionKind::Titles => "titles",
            CollectionKind::SeriesList => "seriesList",
            CollectionKind::Books => "books",
            CollectionKind::Roles => "roles",
            CollectionKind::CustomFieldTypes => "customFieldTypes",
            CollectionKind::Relationships => "relationships",
            CollectionKind::Tags => "tags",
            CollectionKind::Plots => "plots",
            CollectionKind::WorldElements => "worldElements",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    /// Scalar collections hold plain strings instead of objects.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            CollectionKind::Titles
                | CollectionKind::SeriesList
                | CollectionKind::Books
                | CollectionKind::Roles
        )
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CollectionKind {
    type Err = String;

    /// Accepts document keys (`worldElements`) as well as the singular, dash or
    /// underscore spellings a person types (`world-element`, `character`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(kind) = Self::from_key(s) {
            return Ok(kind);
        }
        let folded: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| {
                let key = kind.key().to_lowercase();
                key == folded || key.strip_suffix('s') == Some(folded.as_str())
            })
            .or(match folded.as_str() {
                "series" => Some(CollectionKind::SeriesList),
                _ => None,
            })
            .ok_or_else(|| format!("Unknown collection: {}", s))
    }
}

/// The ten ordered collections of a database. Absent collections deserialize as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Collections {
    pub characters: Vec<Record>,
    pub titles: Vec<Record>,
    pub series_list: Vec<Record>,
    pub books: Vec<Record>,
    pub roles: Vec<Record>,
    pub custom_field_types: Vec<Record>,
    pub relationships: Vec<Record>,
    pub tags: Vec<Record>,
    pub plots: Vec<Record>,
    pub world_elements: Vec<Record>,
}

impl Collections {
    pub fn get(&self, kind: CollectionKind) -> &[Record] {
        match kind {
            CollectionKind::Characters => &self.characters,
            CollectionKind::Titles => &self.titles,
            CollectionKind::SeriesList => &self.series_list,
            CollectionKind::Books => &self.books,
            CollectionKind::Roles => &self.roles,
            CollectionKind::CustomFieldTypes => &self.custom_field_types,
            CollectionKind::Relationships => &self.relationships,
            CollectionKind::Tags => &self.tags,
            CollectionKind::Plots => &self.plots,
            CollectionKind::WorldElements => &self.world_elements,
        }
    }

    pub fn get_mut(&mut self, kind: CollectionKind) -> &mut Vec<Record> {
        match kind {
            CollectionKind::Characters => &mut self.characters,
            CollectionKind::Titles => &mut self.titles,
            CollectionKind::SeriesList => &mut self.series_list,
            CollectionKind::Books => &mut self.books,
            CollectionKind::Roles => &mut self.roles,
            CollectionKind::CustomFieldTypes => &mut self.custom_field_types,
            CollectionKind::Relationships => &mut self.relationships,
            CollectionKind::Tags => &mut self.tags,
            CollectionKind::Plots => &mut self.plots,
            CollectionKind::WorldElements => &mut self.world_elements,
        }
    }

    pub fn set(&mut self, kind: CollectionKind, records: Vec<Record>) {
        *self.get_mut(kind) = records;
    }

    pub fn is_empty(&self) -> bool {
        CollectionKind::ALL
            .iter()
            .all(|kind| self.get(*kind).is_empty())
    }

    pub fn total(&self) -> usize {
        CollectionKind::ALL
            .iter()
            .map(|kind| self.get(*kind).len())
            .sum()
    }

    pub fn counts(&self) -> BTreeMap<String, usize> {
        CollectionKind::ALL
            .iter()
            .map(|kind| (kind.key().to_string(), self.get(*kind).len()))
            .collect()
    }
}

/// A named story database: the working set the command layer owns.
#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    pub name: String,
    pub version: String,
    pub modified_at: Option<DateTime<Utc>>,
    pub exported_at: Option<DateTime<Utc>>,
    pub collections: Collections,
}

impl Database {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: FORMAT_VERSION.to_string(),
            modified_at: None,
            exported_at: None,
            collections: Collections::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    pub fn touch(&mut self) {
        self.modified_at = Some(Utc::now());
    }

    pub fn summary(&self) -> DatabaseSummary {
        DatabaseSummary {
            name: self.name.clone(),
            version: self.version.clone(),
            modified_at: self.modified_at,
            counts: self.collections.counts(),
        }
    }
}

/// A light view of a database for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSummary {
    pub name: String,
    pub version: String,
    pub modified_at: Option<DateTime<Utc>>,
    pub counts: BTreeMap<String, usize>,
}

impl DatabaseSummary {
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Returns the record's `id` if it carries a non-empty one. Numeric ids are accepted.
pub fn record_id(record: &Record) -> Option<String> {
    id_value(record.get("id")?)
}

fn id_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Returns a string field, if present.
pub fn field_str<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record.get(field).and_then(Value::as_str)
}

/// Ensures an object record has an `id` (and a `createdAt` stamp), returning the id.
///
/// Existing ids are never replaced.
pub fn ensure_record_id(record: &mut Map<String, Value>) -> String {
    if let Some(id) = record.get("id").and_then(id_value) {
        return id;
    }
    let id = Uuid::new_v4().to_string();
    record.insert("id".to_string(), Value::String(id.clone()));
    record
        .entry("createdAt".to_string())
        .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
    id
}
