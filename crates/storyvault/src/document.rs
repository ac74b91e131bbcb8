//! # Database Documents
//!
//! The on-disk and import/export format: a UTF-8 JSON object with one array per collection
//! plus a little metadata.
//!
//! ```json
//! {
//!   "characters": [], "titles": [], "seriesList": [], "books": [], "roles": [],
//!   "customFieldTypes": [], "relationships": [], "tags": [], "plots": [], "worldElements": [],
//!   "databaseName": "My Novel",
//!   "version": "2.0.0",
//!   "exportDate": "2024-05-01T10:00:00.000Z"
//! }
//! ```
//!
//! The timestamp key depends on why the document was written: `exportDate`, `backupDate`
//! or `saveDate` (see [`StampKind`]).
//!
//! ## Validation
//!
//! Documents are validated once, in [`DatabaseDocument::from_value`]:
//! - the root must be an object;
//! - `characters`, `titles` and `version` must be present;
//! - every collection that is present must be an array (`null` counts as absent);
//! - absent collections become empty.
//!
//! Version compatibility is a separate step ([`DatabaseDocument::check_version`]) so that a
//! caller can report "wrong format" and "wrong version" differently.

use crate::error::{Result, StoryError};
use crate::model::{CollectionKind, Collections, Database, FORMAT_VERSION};
use crate::tags::normalize_tag_record;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::path::Path;

pub const REQUIRED_KEYS: [&str; 3] = ["characters", "titles", "version"];

const NAME_KEY: &str = "databaseName";
const VERSION_KEY: &str = "version";

/// Why a document was written; selects its timestamp key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StampKind {
    Export,
    Backup,
    Save,
}

impl StampKind {
    pub const ALL: [StampKind; 3] = [StampKind::Export, StampKind::Backup, StampKind::Save];

    pub fn key(self) -> &'static str {
        match self {
            StampKind::Export => "exportDate",
            StampKind::Backup => "backupDate",
            StampKind::Save => "saveDate",
        }
    }
}

/// A validated incoming document.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseDocument {
    pub name: Option<String>,
    pub version: String,
    pub stamp: Option<(StampKind, DateTime<Utc>)>,
    pub collections: Collections,
}

impl DatabaseDocument {
    /// Parses file content. Invalid JSON is reported as a corrupt file.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|source| StoryError::CorruptFile {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(StoryError::InvalidFormat(
                "expected a JSON object at the top level".to_string(),
            ));
        };

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !map.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(StoryError::InvalidFormat(format!(
                "missing required key(s): {}",
                missing.join(", ")
            )));
        }

        let version = match map.get(VERSION_KEY) {
            Some(Value::String(v)) => v.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(StoryError::InvalidFormat(
                    "`version` must be a string".to_string(),
                ))
            }
        };

        let mut collections = Collections::default();
        for kind in CollectionKind::ALL {
            match map.remove(kind.key()) {
                None | Some(Value::Null) => {}
                Some(Value::Array(mut records)) => {
                    if kind == CollectionKind::Tags {
                        records.iter_mut().for_each(normalize_tag_record);
                    }
                    collections.set(kind, records);
                }
                Some(_) => {
                    return Err(StoryError::InvalidFormat(format!(
                        "`{}` must be an array",
                        kind.key()
                    )))
                }
            }
        }

        let name = map
            .get(NAME_KEY)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let stamp = StampKind::ALL.into_iter().find_map(|kind| {
            map.get(kind.key())
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|at| (kind, at.with_timezone(&Utc)))
        });

        Ok(Self {
            name,
            version,
            stamp,
            collections,
        })
    }

    /// The leading numeric component must equal the application's.
    pub fn check_version(&self) -> Result<()> {
        let expected = current_major();
        match major_version(&self.version) {
            Some(found) if found == expected => Ok(()),
            _ => Err(StoryError::VersionIncompatible {
                found: self.version.clone(),
                expected,
            }),
        }
    }

    /// Builds a database from the document. The document's own name wins over `fallback`.
    pub fn into_database(self, fallback: &str) -> Database {
        let name = self.name.unwrap_or_else(|| fallback.to_string());
        let mut db = Database::empty(name);
        db.collections = self.collections;
        match self.stamp {
            Some((StampKind::Export, at)) => db.exported_at = Some(at),
            Some((_, at)) => db.modified_at = Some(at),
            None => {}
        }
        db
    }
}

/// Leading numeric component of a version string (`"2.1.0"` → 2, `"v3"` → 3).
pub fn major_version(version: &str) -> Option<u64> {
    let trimmed = version.trim().trim_start_matches(['v', 'V']);
    let major = trimmed.split('.').next()?.trim();
    major.parse().ok()
}

fn current_major() -> u64 {
    major_version(FORMAT_VERSION).unwrap_or(0)
}

/// Serializes a database into the document format, stamped now.
pub fn to_document(db: &Database, stamp: StampKind) -> Result<Value> {
    to_document_at(db, stamp, Utc::now())
}

pub fn to_document_at(db: &Database, stamp: StampKind, at: DateTime<Utc>) -> Result<Value> {
    let mut map = match serde_json::to_value(&db.collections)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.insert(NAME_KEY.to_string(), Value::String(db.name.clone()));
    map.insert(VERSION_KEY.to_string(), Value::String(db.version.clone()));
    map.insert(
        stamp.key().to_string(),
        Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    Ok(Value::Object(map))
}

/// Pretty-printed document text.
pub fn render_document(db: &Database, stamp: StampKind) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_document(db, stamp)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_minimal_document_is_valid() {
        let doc = DatabaseDocument::from_value(json!({
            "characters": [{"id": "1"}], "titles": [], "version": "2.0.0"
        }))
        .unwrap();
        assert_eq!(doc.collections.characters.len(), 1);
        assert!(doc.collections.plots.is_empty());
        assert_eq!(doc.name, None);
        doc.check_version().unwrap();
    }

    #[test]
    fn test_non_object_is_invalid_format() {
        for value in [json!([]), json!("x"), json!(null), json!(3)] {
            let err = DatabaseDocument::from_value(value).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        }
    }

    #[test]
    fn test_missing_required_keys_are_listed() {
        let err = DatabaseDocument::from_value(json!({"titles": []})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
        let message = err.to_string();
        assert!(message.contains("characters"));
        assert!(message.contains("version"));
        assert!(!message.contains("titles"));
    }

    #[test]
    fn test_collection_must_be_array() {
        let err = DatabaseDocument::from_value(json!({
            "characters": [], "titles": [], "version": "2.0.0", "plots": {"a": 1}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("plots"));
    }

    #[test]
    fn test_null_collection_is_empty() {
        let doc = DatabaseDocument::from_value(json!({
            "characters": null, "titles": [], "version": "2.0.0"
        }))
        .unwrap();
        assert!(doc.collections.characters.is_empty());
    }

    #[test]
    fn test_tag_names_are_normalized_on_ingest() {
        let doc = DatabaseDocument::from_value(json!({
            "characters": [], "titles": [], "version": "2.0.0",
            "tags": [{"id": "t", "name": "mAIN cast"}]
        }))
        .unwrap();
        assert_eq!(doc.collections.tags[0]["name"], "Main cast");
    }

    #[test]
    fn test_version_compatibility() {
        let doc = |v: &str| DatabaseDocument::from_value(json!({
            "characters": [], "titles": [], "version": v
        }))
        .unwrap();
        assert!(doc("2.0.0").check_version().is_ok());
        assert!(doc("2.9.1").check_version().is_ok());
        assert!(doc("v2").check_version().is_ok());

        let err = doc("1.0.0").check_version().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VersionIncompatible);
        assert_eq!(doc("garbage").check_version().unwrap_err().kind(), ErrorKind::VersionIncompatible);
    }

    #[test]
    fn test_major_version() {
        assert_eq!(major_version("2.0.0"), Some(2));
        assert_eq!(major_version(" 10.1 "), Some(10));
        assert_eq!(major_version("V3"), Some(3));
        assert_eq!(major_version(""), None);
        assert_eq!(major_version("x.1"), None);
    }

    #[test]
    fn test_parse_reports_corrupt_file() {
        let err = DatabaseDocument::parse("{nope", Path::new("/tmp/a.json")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptFile);
        assert!(err.to_string().contains("/tmp/a.json"));
    }

    #[test]
    fn test_to_document_round_trips() {
        let mut db = Database::empty("My Novel");
        db.collections.characters.push(json!({"id": "1", "firstName": "Ana"}));
        db.collections.series_list.push(json!("Saga"));
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        let value = to_document_at(&db, StampKind::Export, at).unwrap();
        assert_eq!(value["databaseName"], "My Novel");
        assert_eq!(value["exportDate"], "2024-05-01T10:00:00.000Z");
        assert!(value.get("seriesList").is_some());

        let doc = DatabaseDocument::from_value(value).unwrap();
        assert_eq!(doc.stamp, Some((StampKind::Export, at)));
        let back = doc.into_database("Fallback");
        assert_eq!(back.name, "My Novel");
        assert_eq!(back.collections, db.collections);
        assert_eq!(back.exported_at, Some(at));
    }

    #[test]
    fn test_into_database_uses_fallback_name() {
        let doc = DatabaseDocument::from_value(json!({
            "characters": [], "titles": [], "version": "2.0.0", "databaseName": "  "
        }))
        .unwrap();
        assert_eq!(doc.into_database("Imported").name, "Imported");
    }
}
