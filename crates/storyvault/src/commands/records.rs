use crate::commands::{persist, tags, CmdMessage, CmdResult, FileMirror, Vault};
use crate::error::{Result, StoryError};
use crate::model::{ensure_record_id, record_id, CollectionKind, Record};
use crate::store::kv::KeyValueBackend;
use serde_json::Value;
use tracing::info;

/// Adds a record to the active database, or replaces the record with the same id.
///
/// Scalar collections take plain strings and ignore values already present. Object records
/// without an id get a fresh uuid and a `createdAt` stamp. Tags are validated and must keep
/// their names unique.
pub async fn upsert<K: KeyValueBackend>(
    vault: &mut Vault<K>,
    kind: CollectionKind,
    record: Record,
) -> Result<CmdResult> {
    let mut db = vault.require_active()?;
    let mut result = CmdResult::default();

    if kind.is_scalar() {
        let value = match record {
            Value::String(s) if !s.trim().is_empty() => Value::String(s.trim().to_string()),
            _ => {
                return Err(StoryError::Api(format!(
                    "{} entries must be non-empty strings",
                    kind
                )))
            }
        };
        if db.collections.get(kind).contains(&value) {
            result.add_message(CmdMessage::info(format!("Already in {}", kind)));
            result.record = Some(value);
            return Ok(result);
        }
        db.collections.get_mut(kind).push(value.clone());
        result.record = Some(value);
    } else {
        let Value::Object(map) = record else {
            return Err(StoryError::Api(format!("{} entries must be objects", kind)));
        };
        let record = if kind == CollectionKind::Tags {
            tags::prepare_tag(&db.collections.tags, map)?
        } else {
            let mut map = map;
            ensure_record_id(&mut map);
            Value::Object(map)
        };
        let id = record_id(&record);
        let records = db.collections.get_mut(kind);
        match records.iter().position(|r| id.is_some() && record_id(r) == id) {
            Some(index) => records[index] = record.clone(),
            None => records.push(record.clone()),
        }
        result.record = Some(record);
    }

    db.touch();
    persist(vault, db, FileMirror::Write).await?;
    info!(collection = %kind, "upserted record");
    result.add_message(CmdMessage::success(format!("Saved record in {}", kind)));
    Ok(result)
}

/// Removes a record by id, or a scalar entry by value. Removing a tag also removes it from
/// every record that references it.
pub async fn remove<K: KeyValueBackend>(
    vault: &mut Vault<K>,
    kind: CollectionKind,
    id: &str,
) -> Result<CmdResult> {
    let mut db = vault.require_active()?;
    let records = db.collections.get_mut(kind);
    let index = if kind.is_scalar() {
        records.iter().position(|r| r.as_str() == Some(id))
    } else {
        records.iter().position(|r| record_id(r).as_deref() == Some(id))
    };
    let Some(index) = index else {
        return Err(StoryError::RecordNotFound {
            collection: kind.key().to_string(),
            id: id.to_string(),
        });
    };
    let removed = records.remove(index);

    let references = if kind == CollectionKind::Tags {
        tags::drop_references(&mut db, id)
    } else {
        0
    };
    db.touch();
    persist(vault, db, FileMirror::Write).await?;
    info!(collection = %kind, %id, references, "removed record");

    let mut result = CmdResult {
        record: Some(removed),
        ..CmdResult::default()
    };
    result.add_message(CmdMessage::success(format!("Removed {} from {}", id, kind)));
    Ok(result)
}
