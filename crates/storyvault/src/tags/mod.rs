//! Tag support for storyvault.
//!
//! Tags categorize story entities. Each database keeps its own tag registry in the `tags`
//! collection, and entity records reference tags through a `tags` array of tag **ids**.
//! Names are display-only: renaming a tag never touches the records that use it.
//!
//! ## Tag Naming Rules
//!
//! See [`validation`] for the full rules. Names are normalized on the way in (first letter
//! upper, rest lower) and must be unique case-insensitively within a database.

pub mod validation;

use crate::error::Result;
use crate::model::{record_id, CollectionKind, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use validation::{normalize_tag_name, validate_tag_name, TagValidationError};

pub const DEFAULT_TAG_COLOR: &str = "#808080";

/// Field on entity records that holds tag ids.
pub const TAG_REFERENCE_FIELD: &str = "tags";

/// Collections whose records may carry tag references.
pub const TAGGABLE: [CollectionKind; 3] = [
    CollectionKind::Characters,
    CollectionKind::Plots,
    CollectionKind::WorldElements,
];

/// A tag in a database's registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    #[serde(default = "default_color")]
    pub color: String,
    pub created_at: DateTime<Utc>,
}

fn default_color() -> String {
    DEFAULT_TAG_COLOR.to_string()
}

impl Tag {
    /// Creates a tag with a fresh id.
    ///
    /// Note: the name is normalized but not validated. Use [`validate_tag_name`] first.
    pub fn new(name: &str, color: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: normalize_tag_name(name),
            color: color.map(str::to_string).unwrap_or_else(default_color),
            created_at: Utc::now(),
        }
    }

    pub fn to_record(&self) -> Result<Record> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Position of the tag whose name matches case-insensitively.
pub fn find_by_name(tags: &[Record], name: &str) -> Option<usize> {
    let wanted = name.trim().to_lowercase();
    tags.iter().position(|tag| {
        tag.get("name")
            .and_then(Value::as_str)
            .is_some_and(|n| n.trim().to_lowercase() == wanted)
    })
}

pub fn find_by_id(tags: &[Record], id: &str) -> Option<usize> {
    tags.iter()
        .position(|tag| record_id(tag).as_deref() == Some(id))
}

/// Finds a tag by id first, then by name.
pub fn find(tags: &[Record], id_or_name: &str) -> Option<usize> {
    find_by_id(tags, id_or_name).or_else(|| find_by_name(tags, id_or_name))
}

/// Normalizes the `name` of an incoming tag record in place.
pub fn normalize_tag_record(record: &mut Record) {
    if let Some(Value::String(name)) = record.get_mut("name") {
        *name = normalize_tag_name(name);
    }
}

/// The tag ids referenced by an entity record.
pub fn tag_references(record: &Record) -> Vec<String> {
    record
        .get(TAG_REFERENCE_FIELD)
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Rewrites or drops tag references on an entity record.
///
/// `map` returns the replacement id, or `None` to drop the reference. Returns how many
/// references changed. Duplicates produced by the rewrite are collapsed.
pub fn rewrite_tag_references(
    record: &mut Record,
    mut map: impl FnMut(&str) -> Option<String>,
) -> usize {
    let Some(Value::Array(ids)) = record.get_mut(TAG_REFERENCE_FIELD) else {
        return 0;
    };
    let mut changed = 0;
    let mut rewritten: Vec<Value> = Vec::with_capacity(ids.len());
    for value in ids.iter() {
        let Some(id) = value.as_str() else {
            rewritten.push(value.clone());
            continue;
        };
        match map(id) {
            Some(new_id) => {
                if new_id != id {
                    changed += 1;
                }
                let new_value = Value::String(new_id);
                if !rewritten.contains(&new_value) {
                    rewritten.push(new_value);
                }
            }
            None => changed += 1,
        }
    }
    *ids = rewritten;
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tag_new_normalizes_name() {
        let tag = Tag::new("  vILLAIN", None);
        assert_eq!(tag.name, "Villain");
        assert_eq!(tag.color, DEFAULT_TAG_COLOR);
        assert!(!tag.id.is_empty());
    }

    #[test]
    fn test_tag_record_uses_camel_case() {
        let tag = Tag::new("hero", Some("#ff0000"));
        let record = tag.to_record().unwrap();
        assert!(record.is_object());
        assert_eq!(record["id"], tag.id.as_str());
        assert_eq!(record["name"], "Hero");
        assert!(record.get("createdAt").is_some());
        assert_eq!(record["color"], "#ff0000");
        let back: Tag = serde_json::from_value(record).unwrap();
        assert_eq!(back, tag);
    }

    #[test]
    fn test_tag_deserializes_without_color() {
        let tag: Tag = serde_json::from_value(json!({
            "id": "t1", "name": "Hero", "createdAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(tag.color, DEFAULT_TAG_COLOR);
    }

    #[test]
    fn test_find_by_name_is_case_insensitive() {
        let tags = vec![json!({"id": "a", "name": "Hero"}), json!({"id": "b", "name": "Villain"})];
        assert_eq!(find_by_name(&tags, "villain"), Some(1));
        assert_eq!(find_by_name(&tags, " HERO "), Some(0));
        assert_eq!(find_by_name(&tags, "Sidekick"), None);
        assert_eq!(find(&tags, "b"), Some(1));
    }

    #[test]
    fn test_rewrite_tag_references_maps_and_drops() {
        let mut record = json!({"name": "Ana", "tags": ["old", "keep", "gone"]});
        let changed = rewrite_tag_references(&mut record, |id| match id {
            "old" => Some("new".to_string()),
            "gone" => None,
            other => Some(other.to_string()),
        });
        assert_eq!(changed, 2);
        assert_eq!(record["tags"], json!(["new", "keep"]));
    }

    #[test]
    fn test_rewrite_collapses_duplicates() {
        let mut record = json!({"tags": ["a", "b"]});
        rewrite_tag_references(&mut record, |_| Some("a".to_string()));
        assert_eq!(record["tags"], json!(["a"]));
    }

    #[test]
    fn test_records_without_tags_are_untouched() {
        let mut record = json!({"name": "Ana"});
        assert_eq!(rewrite_tag_references(&mut record, |_| None), 0);
        assert_eq!(tag_references(&record), Vec::<String>::new());
    }
}
