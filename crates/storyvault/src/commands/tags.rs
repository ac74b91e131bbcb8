//! Tag registry commands.
//!
//! Tags live in the active database's `tags` collection. Entities point at them by id, so a
//! rename only touches the tag record, while a delete also strips the id from every
//! taggable record in the same commit.

use crate::commands::{persist, CmdMessage, CmdResult, FileMirror, Vault};
use crate::error::{Result, StoryError};
use crate::model::{record_id, CollectionKind, Database, Record};
use crate::store::kv::KeyValueBackend;
use crate::tags::{self, validate_tag_name, Tag, DEFAULT_TAG_COLOR, TAGGABLE};
use serde_json::{Map, Value};
use tracing::info;

pub fn list<K: KeyValueBackend>(vault: &Vault<K>) -> Result<CmdResult> {
    let db = vault.require_active()?;
    let mut tags = db.collections.tags;
    tags.sort_by_key(|tag| {
        tag.get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase()
    });
    Ok(CmdResult {
        records: tags,
        ..CmdResult::default()
    })
}

pub async fn create<K: KeyValueBackend>(
    vault: &mut Vault<K>,
    name: &str,
    color: Option<&str>,
) -> Result<CmdResult> {
    let mut db = vault.require_active()?;
    let name = checked_name(&db.collections.tags, name, None)?;
    let tag = Tag::new(&name, color).to_record()?;
    db.collections.tags.push(tag.clone());
    db.touch();
    persist(vault, db, FileMirror::Write).await?;
    info!(tag = %name, "created tag");

    let mut result = CmdResult {
        record: Some(tag),
        ..CmdResult::default()
    };
    result.add_message(CmdMessage::success(format!("Created tag '{}'", name)));
    Ok(result)
}

pub async fn rename<K: KeyValueBackend>(
    vault: &mut Vault<K>,
    id_or_name: &str,
    new_name: &str,
) -> Result<CmdResult> {
    let mut db = vault.require_active()?;
    let index = locate(&db, id_or_name)?;
    let id = record_id(&db.collections.tags[index]);
    let name = checked_name(&db.collections.tags, new_name, id.as_deref())?;

    let tag = &mut db.collections.tags[index];
    let old = tag
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    tag["name"] = Value::String(name.clone());
    let tag = tag.clone();
    db.touch();
    persist(vault, db, FileMirror::Write).await?;
    info!(from = %old, to = %name, "renamed tag");

    let mut result = CmdResult {
        record: Some(tag),
        ..CmdResult::default()
    };
    result.add_message(CmdMessage::success(format!(
        "Renamed tag '{}' to '{}'",
        old, name
    )));
    Ok(result)
}

/// Deletes a tag and every reference to it.
pub async fn delete<K: KeyValueBackend>(
    vault: &mut Vault<K>,
    id_or_name: &str,
) -> Result<CmdResult> {
    let mut db = vault.require_active()?;
    let index = locate(&db, id_or_name)?;
    let tag = db.collections.tags.remove(index);
    let references = match record_id(&tag) {
        Some(id) => drop_references(&mut db, &id),
        None => 0,
    };
    db.touch();
    persist(vault, db, FileMirror::Write).await?;

    let name = tag
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(id_or_name)
        .to_string();
    info!(tag = %name, references, "deleted tag");
    let mut result = CmdResult {
        record: Some(tag),
        ..CmdResult::default()
    };
    result.add_message(CmdMessage::success(format!("Deleted tag '{}'", name)));
    if references > 0 {
        result.add_message(CmdMessage::info(format!(
            "Removed it from {} record(s)",
            references
        )));
    }
    Ok(result)
}

/// Validates an incoming tag object and fills in its id, color and creation time.
///
/// `tags` is the registry the tag will join; a tag with the same id is allowed to keep its
/// name.
pub(crate) fn prepare_tag(tags: &[Record], mut record: Map<String, Value>) -> Result<Record> {
    let raw = record
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let id = crate::model::ensure_record_id(&mut record);
    let name = checked_name(tags, &raw, Some(&id))?;
    record.insert("name".to_string(), Value::String(name));
    record
        .entry("color".to_string())
        .or_insert_with(|| Value::String(DEFAULT_TAG_COLOR.to_string()));
    Ok(Value::Object(record))
}

/// Removes tag `id` from every taggable record. Returns the number of records changed.
pub(crate) fn drop_references(db: &mut Database, id: &str) -> usize {
    let mut changed = 0;
    for kind in TAGGABLE {
        for record in db.collections.get_mut(kind).iter_mut() {
            let dropped = tags::rewrite_tag_references(record, |tag_id| {
                (tag_id != id).then(|| tag_id.to_string())
            });
            if dropped > 0 {
                changed += 1;
            }
        }
    }
    changed
}

fn locate(db: &Database, id_or_name: &str) -> Result<usize> {
    tags::find(&db.collections.tags, id_or_name).ok_or_else(|| StoryError::RecordNotFound {
        collection: CollectionKind::Tags.key().to_string(),
        id: id_or_name.to_string(),
    })
}

/// Validates `name` and checks it is free among `tags`, ignoring the tag with id `own_id`.
fn checked_name(tags: &[Record], name: &str, own_id: Option<&str>) -> Result<String> {
    let name = validate_tag_name(name)
        .map_err(|err| StoryError::Api(format!("Invalid tag name: {}", err)))?;
    if let Some(existing) = tags::find_by_name(tags, &name) {
        if own_id.is_none() || record_id(&tags[existing]).as_deref() != own_id {
            return Err(StoryError::Api(format!("Tag '{}' already exists", name)));
        }
    }
    Ok(name)
}
