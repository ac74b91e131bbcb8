//! # Tier Store
//!
//! Every collection is mirrored into two key namespaces of a [`KeyValueBackend`]:
//!
//! - **Generic tier**: the bare collection key (`characters`). Older readers only know this
//!   one, so it always reflects the last database written.
//! - **Named tier**: `{database}_{collection}` (`My Novel_characters`). Authoritative
//!   whenever it holds data.
//!
//! ## Read Policy
//!
//! [`resolve_tiers`] is the whole policy: the named value wins unless it is absent or an
//! empty array, in which case the generic value is used. An empty named tier therefore never
//! shadows real legacy data.
//!
//! The generic tier is shared by every database, so it is only consulted for the database
//! that last wrote it (tracked under `genericTierOwner`), or when no owner was ever recorded
//! (data from before named tiers existed).
//!
//! ## Write Policy
//!
//! Writes go to both tiers synchronously through [`TierStore::apply`]. If the backend
//! rejects any write, every key already written in that batch is restored to its previous
//! value and the error is returned: callers never see success with the tiers out of step.
//!
//! ## Bookkeeping Keys
//!
//! | Key | Value |
//! |-----|-------|
//! | `currentDatabase` | JSON string, the active database |
//! | `databaseList` | JSON array of registered names |
//! | `genericTierOwner` | JSON string, last database mirrored to the generic tier |
//! | `{database}_meta` | `{ version, modifiedAt, exportedAt }` |

use super::kv::KeyValueBackend;
use crate::error::Result;
use crate::model::{CollectionKind, Database, Record};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub const CURRENT_DATABASE_KEY: &str = "currentDatabase";
pub const DATABASE_LIST_KEY: &str = "databaseList";
pub const GENERIC_OWNER_KEY: &str = "genericTierOwner";
const META_SUFFIX: &str = "meta";

pub fn named_key(database: &str, kind: CollectionKind) -> String {
    format!("{}_{}", database, kind.key())
}

pub fn generic_key(kind: CollectionKind) -> &'static str {
    kind.key()
}

fn meta_key(database: &str) -> String {
    format!("{}_{}", database, META_SUFFIX)
}

/// Named tier wins when it holds records; otherwise the generic tier; otherwise empty.
pub fn resolve_tiers(named: Option<Vec<Record>>, generic: Option<Vec<Record>>) -> Vec<Record> {
    match named {
        Some(records) if !records.is_empty() => records,
        _ => generic.unwrap_or_default(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseMeta {
    version: String,
    modified_at: Option<DateTime<Utc>>,
    exported_at: Option<DateTime<Utc>>,
}

/// One pending key change. `None` removes the key.
pub type TierWrite = (String, Option<String>);

/// Previous values of a set of keys, restorable with [`TierStore::restore`].
#[derive(Debug, Clone, PartialEq)]
pub struct TierSnapshot {
    entries: Vec<TierWrite>,
}

pub struct TierStore<K: KeyValueBackend> {
    backend: K,
}

impl<K: KeyValueBackend> TierStore<K> {
    pub fn new(backend: K) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &K {
        &self.backend
    }

    /// Records for one collection, applying the tier read policy.
    pub fn get(&self, database: &str, kind: CollectionKind) -> Result<Vec<Record>> {
        let named = self.read_records(&named_key(database, kind))?;
        let generic = if self.generic_tier_belongs_to(database)? {
            self.read_records(generic_key(kind))?
        } else {
            None
        };
        Ok(resolve_tiers(named, generic))
    }

    /// Writes one collection to both tiers.
    pub fn put(&self, database: &str, kind: CollectionKind, records: &[Record]) -> Result<()> {
        let value = serde_json::to_string(records)?;
        self.apply(vec![
            (named_key(database, kind), Some(value.clone())),
            (generic_key(kind).to_string(), Some(value)),
            (GENERIC_OWNER_KEY.to_string(), Some(json_string(database)?)),
        ])
    }

    /// Reads every collection plus metadata. Missing data reads as empty.
    pub fn read_database(&self, name: &str) -> Result<Database> {
        let mut db = Database::empty(name);
        for kind in CollectionKind::ALL {
            db.collections.set(kind, self.get(name, kind)?);
        }
        if let Some(meta) = self.read_json::<DatabaseMeta>(&meta_key(name))? {
            db.version = meta.version;
            db.modified_at = meta.modified_at;
            db.exported_at = meta.exported_at;
        }
        Ok(db)
    }

    /// Writes all ten collections to both tiers, the metadata and the registry, all or nothing.
    pub fn write_database(&self, db: &Database) -> Result<()> {
        let mut writes = Vec::with_capacity(CollectionKind::ALL.len() * 2 + 3);
        for kind in CollectionKind::ALL {
            let value = serde_json::to_string(db.collections.get(kind))?;
            writes.push((named_key(&db.name, kind), Some(value.clone())));
            writes.push((generic_key(kind).to_string(), Some(value)));
        }
        writes.push((GENERIC_OWNER_KEY.to_string(), Some(json_string(&db.name)?)));

        let meta = DatabaseMeta {
            version: db.version.clone(),
            modified_at: db.modified_at,
            exported_at: db.exported_at,
        };
        writes.push((meta_key(&db.name), Some(serde_json::to_string(&meta)?)));

        let mut names = self.database_names()?;
        if !names.contains(&db.name) {
            names.push(db.name.clone());
            writes.push((
                DATABASE_LIST_KEY.to_string(),
                Some(serde_json::to_string(&names)?),
            ));
        }

        debug!(database = %db.name, records = db.collections.total(), "writing tiers");
        self.apply(writes)
    }

    /// Removes the named tier, the metadata and the registry entry. The generic tier is
    /// cleared too when this database owns it.
    pub fn remove_database(&self, name: &str) -> Result<()> {
        let mut writes: Vec<TierWrite> = CollectionKind::ALL
            .iter()
            .map(|kind| (named_key(name, *kind), None))
            .collect();
        writes.push((meta_key(name), None));

        if self.generic_owner()?.as_deref() == Some(name) {
            writes.extend(
                CollectionKind::ALL
                    .iter()
                    .map(|kind| (generic_key(*kind).to_string(), None)),
            );
            writes.push((GENERIC_OWNER_KEY.to_string(), None));
        }

        let names: Vec<String> = self
            .database_names()?
            .into_iter()
            .filter(|n| n != name)
            .collect();
        writes.push((
            DATABASE_LIST_KEY.to_string(),
            Some(serde_json::to_string(&names)?),
        ));

        debug!(database = %name, "removing tiers");
        self.apply(writes)
    }

    /// True when any named-tier key for the database holds records.
    pub fn has_named_data(&self, name: &str) -> Result<bool> {
        for kind in CollectionKind::ALL {
            if self
                .read_records(&named_key(name, kind))?
                .is_some_and(|r| !r.is_empty())
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn current(&self) -> Result<Option<String>> {
        self.read_json::<String>(CURRENT_DATABASE_KEY)
    }

    pub fn set_current(&self, name: &str) -> Result<()> {
        self.apply(vec![(
            CURRENT_DATABASE_KEY.to_string(),
            Some(json_string(name)?),
        )])
    }

    /// Registered database names, in registration order.
    pub fn database_names(&self) -> Result<Vec<String>> {
        Ok(self
            .read_json::<Vec<String>>(DATABASE_LIST_KEY)?
            .unwrap_or_default())
    }

    pub fn is_registered(&self, name: &str) -> Result<bool> {
        Ok(self.database_names()?.iter().any(|n| n == name))
    }

    pub fn generic_owner(&self) -> Result<Option<String>> {
        self.read_json::<String>(GENERIC_OWNER_KEY)
    }

    /// Captures every key [`write_database`](Self::write_database) or
    /// [`remove_database`](Self::remove_database) could touch for `name`.
    pub fn snapshot(&self, name: &str) -> Result<TierSnapshot> {
        let mut keys: Vec<String> = Vec::new();
        for kind in CollectionKind::ALL {
            keys.push(named_key(name, kind));
            keys.push(generic_key(kind).to_string());
        }
        keys.push(meta_key(name));
        keys.push(GENERIC_OWNER_KEY.to_string());
        keys.push(DATABASE_LIST_KEY.to_string());
        keys.push(CURRENT_DATABASE_KEY.to_string());

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let previous = self.backend.get(&key)?;
            entries.push((key, previous));
        }
        Ok(TierSnapshot { entries })
    }

    pub fn restore(&self, snapshot: TierSnapshot) -> Result<()> {
        self.apply(snapshot.entries)
    }

    /// Applies a batch of key changes. On the first failure, keys already changed are put
    /// back and the failure is returned.
    pub fn apply(&self, writes: Vec<TierWrite>) -> Result<()> {
        let mut undo: Vec<TierWrite> = Vec::with_capacity(writes.len());
        for (key, value) in writes {
            let previous = self.backend.get(&key)?;
            let outcome = match &value {
                Some(v) => self.backend.set(&key, v),
                None => self.backend.remove(&key),
            };
            if let Err(err) = outcome {
                warn!(%key, error = %err, "tier write rejected, rolling back");
                self.rollback(undo);
                return Err(err.into());
            }
            undo.push((key, previous));
        }
        Ok(())
    }

    fn rollback(&self, undo: Vec<TierWrite>) {
        for (key, previous) in undo.into_iter().rev() {
            let outcome = match &previous {
                Some(v) => self.backend.set(&key, v),
                None => self.backend.remove(&key),
            };
            if let Err(err) = outcome {
                warn!(%key, error = %err, "could not restore key during rollback");
            }
        }
    }

    fn generic_tier_belongs_to(&self, database: &str) -> Result<bool> {
        Ok(match self.generic_owner()? {
            Some(owner) => owner == database,
            None => true,
        })
    }

    /// Corrupt or non-array values are logged and treated as absent.
    fn read_records(&self, key: &str) -> Result<Option<Vec<Record>>> {
        match self.read_json::<Value>(key)? {
            Some(Value::Array(records)) => Ok(Some(records)),
            Some(Value::Null) | None => Ok(None),
            Some(_) => {
                warn!(%key, "tier value is not an array, ignoring");
                Ok(None)
            }
        }
    }

    fn read_json<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!(%key, error = %err, "corrupt tier value, ignoring");
                Ok(None)
            }
        }
    }
}

fn json_string(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, StoryError};
    use crate::store::kv::MemKv;
    use serde_json::json;

    fn store() -> TierStore<MemKv> {
        TierStore::new(MemKv::new())
    }

    fn db_with_character(name: &str, id: &str) -> Database {
        let mut db = Database::empty(name);
        db.collections
            .characters
            .push(json!({"id": id, "firstName": "Ana"}));
        db
    }

    #[test]
    fn test_resolve_tiers_policy() {
        let a = vec![json!("a")];
        let b = vec![json!("b")];
        assert_eq!(resolve_tiers(Some(a.clone()), Some(b.clone())), a);
        assert_eq!(resolve_tiers(Some(vec![]), Some(b.clone())), b);
        assert_eq!(resolve_tiers(None, Some(b.clone())), b);
        assert_eq!(resolve_tiers(None, None), Vec::<Record>::new());
        assert_eq!(resolve_tiers(Some(vec![]), None), Vec::<Record>::new());
    }

    #[test]
    fn test_put_writes_both_tiers() {
        let tiers = store();
        let records = vec![json!({"id": "1"})];
        tiers
            .put("Novel", CollectionKind::Characters, &records)
            .unwrap();
        let kv = tiers.backend();
        assert_eq!(
            kv.get("Novel_characters").unwrap().as_deref(),
            Some(r#"[{"id":"1"}]"#)
        );
        assert_eq!(
            kv.get("characters").unwrap().as_deref(),
            Some(r#"[{"id":"1"}]"#)
        );
        assert_eq!(
            tiers.get("Novel", CollectionKind::Characters).unwrap(),
            records
        );
    }

    #[test]
    fn test_empty_named_tier_falls_back_to_legacy_generic() {
        let tiers = store();
        // Legacy data: generic only, no owner recorded.
        tiers
            .backend()
            .set("plots", r#"[{"title":"Old"}]"#)
            .unwrap();
        tiers.backend().set("Novel_plots", "[]").unwrap();
        assert_eq!(
            tiers.get("Novel", CollectionKind::Plots).unwrap(),
            vec![json!({"title": "Old"})]
        );
    }

    #[test]
    fn test_generic_tier_does_not_leak_between_databases() {
        let tiers = store();
        tiers.write_database(&db_with_character("A", "1")).unwrap();
        let b = tiers.read_database("B").unwrap();
        assert!(b.is_empty());
        let a = tiers.read_database("A").unwrap();
        assert_eq!(a.collections.characters.len(), 1);
    }

    #[test]
    fn test_write_database_registers_and_round_trips() {
        let tiers = store();
        let mut db = db_with_character("Novel", "1");
        db.collections.titles.push(json!("The Long Road"));
        db.touch();
        tiers.write_database(&db).unwrap();
        assert_eq!(tiers.database_names().unwrap(), vec!["Novel"]);

        let loaded = tiers.read_database("Novel").unwrap();
        assert_eq!(loaded, db);

        // Writing again does not duplicate the registry entry.
        tiers.write_database(&db).unwrap();
        assert_eq!(tiers.database_names().unwrap(), vec!["Novel"]);
    }

    #[test]
    fn test_failed_write_rolls_back_every_key() {
        let tiers = store();
        tiers.write_database(&db_with_character("Novel", "1")).unwrap();
        let before = tiers.backend().keys().unwrap();
        let before_values: Vec<_> = before
            .iter()
            .map(|k| tiers.backend().get(k).unwrap())
            .collect();

        tiers.backend().set_failing_key(Some("Novel_meta"));
        let err = tiers
            .write_database(&db_with_character("Novel", "2"))
            .unwrap_err();
        assert!(matches!(err, StoryError::Kv(_)));

        tiers.backend().set_failing_key(None);
        let after_values: Vec<_> = before
            .iter()
            .map(|k| tiers.backend().get(k).unwrap())
            .collect();
        assert_eq!(before_values, after_values);
        assert_eq!(tiers.backend().keys().unwrap(), before);
    }

    #[test]
    fn test_quota_failure_reports_quota_exceeded() {
        let tiers = TierStore::new(MemKv::new().with_quota(64));
        let mut db = Database::empty("Novel");
        db.collections
            .characters
            .push(json!({"notes": "x".repeat(200)}));
        let err = tiers.write_database(&db).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QuotaExceeded);
        assert!(tiers.backend().is_empty());
    }

    #[test]
    fn test_remove_database_clears_owned_generic_tier() {
        let tiers = store();
        tiers.write_database(&db_with_character("A", "1")).unwrap();
        tiers.write_database(&db_with_character("B", "2")).unwrap();

        tiers.remove_database("A").unwrap();
        assert_eq!(tiers.database_names().unwrap(), vec!["B"]);
        assert!(!tiers.has_named_data("A").unwrap());
        // B owns the generic tier, so it survives.
        assert!(tiers.backend().get("characters").unwrap().is_some());

        tiers.remove_database("B").unwrap();
        assert!(tiers.backend().get("characters").unwrap().is_none());
        assert!(tiers.generic_owner().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_values_read_as_absent() {
        let tiers = store();
        tiers.backend().set("Novel_characters", "{not json").unwrap();
        tiers.backend().set(CURRENT_DATABASE_KEY, "[[").unwrap();
        assert!(tiers
            .get("Novel", CollectionKind::Characters)
            .unwrap()
            .is_empty());
        assert_eq!(tiers.current().unwrap(), None);
    }

    #[test]
    fn test_snapshot_restore() {
        let tiers = store();
        tiers.write_database(&db_with_character("Novel", "1")).unwrap();
        let snapshot = tiers.snapshot("Novel").unwrap();
        tiers.write_database(&db_with_character("Novel", "2")).unwrap();
        tiers.set_current("Novel").unwrap();

        tiers.restore(snapshot).unwrap();
        let db = tiers.read_database("Novel").unwrap();
        assert_eq!(db.collections.characters[0]["id"], "1");
        assert_eq!(tiers.current().unwrap(), None);
    }

    #[test]
    fn test_current_pointer() {
        let tiers = store();
        assert_eq!(tiers.current().unwrap(), None);
        tiers.set_current("My Novel").unwrap();
        assert_eq!(tiers.current().unwrap().as_deref(), Some("My Novel"));
    }
}
