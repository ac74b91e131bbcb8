//! Importing documents.
//!
//! Both modes validate the whole document (shape, then version) before anything changes,
//! build the complete new database in memory, and hand it to [`persist`]. An import is
//! therefore all or nothing across the ten collections.
//!
//! - **Replace** ([`replace`]): the document becomes a database of its own, named after its
//!   `databaseName` (or a generated name), and becomes current.
//! - **Merge** ([`merge`]): the document's records are merged into the current database by
//!   the [`crate::merge`] rules. Tags merge first so that incoming records pointing at an
//!   incoming duplicate tag are rewritten to the existing tag's id.

use crate::commands::{
    persist, CmdMessage, CmdResult, CollectionReport, FileMirror, ImportReport, Vault,
};
use crate::document::DatabaseDocument;
use crate::error::Result;
use crate::merge::{merge_collection, remap_tag_references, replace_collection, ImportMode};
use crate::model::CollectionKind;
use crate::paths::sanitize_name;
use crate::store::kv::KeyValueBackend;
use crate::tags::TAGGABLE;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

pub async fn replace<K: KeyValueBackend>(vault: &mut Vault<K>, doc: Value) -> Result<CmdResult> {
    let doc = DatabaseDocument::from_value(doc)?;
    import_document(vault, doc, ImportMode::Replace).await
}

pub async fn merge<K: KeyValueBackend>(vault: &mut Vault<K>, doc: Value) -> Result<CmdResult> {
    let doc = DatabaseDocument::from_value(doc)?;
    import_document(vault, doc, ImportMode::Merge).await
}

/// Reads a document file and imports it.
pub async fn from_file<K: KeyValueBackend>(
    vault: &mut Vault<K>,
    path: &Path,
    mode: ImportMode,
) -> Result<CmdResult> {
    let text = vault.files.read_file(path).await?;
    let doc = DatabaseDocument::parse(&text, path)?;
    let mut result = import_document(vault, doc, mode).await?;
    result.path = Some(path.to_path_buf());
    Ok(result)
}

async fn import_document<K: KeyValueBackend>(
    vault: &mut Vault<K>,
    doc: DatabaseDocument,
    mode: ImportMode,
) -> Result<CmdResult> {
    doc.check_version()?;

    let (db, report) = match mode {
        ImportMode::Replace => {
            let name = sanitize_name(doc.name.as_deref().unwrap_or_default());
            let mut db = doc.into_database(&name);
            db.name = name;
            db.touch();

            let collections = CollectionKind::ALL
                .iter()
                .map(|kind| {
                    let outcome = replace_collection(db.collections.get(*kind));
                    (
                        kind.key().to_string(),
                        CollectionReport {
                            added: outcome.added,
                            skipped: 0,
                        },
                    )
                })
                .collect();
            let report = build_report(mode, &db.name, collections, 0);
            (db, report)
        }
        ImportMode::Merge => {
            let mut db = vault.merge_target()?;
            let mut incoming = doc.collections;
            let options = vault.settings.merge;
            let mut collections = BTreeMap::new();

            let tags = merge_collection(
                CollectionKind::Tags,
                db.collections.get(CollectionKind::Tags),
                incoming.get(CollectionKind::Tags),
                &options,
            );
            let mut remapped = 0;
            for kind in TAGGABLE {
                remapped += remap_tag_references(incoming.get_mut(kind), &tags.id_remap);
            }
            collections.insert(
                CollectionKind::Tags.key().to_string(),
                CollectionReport {
                    added: tags.added,
                    skipped: tags.skipped,
                },
            );
            db.collections.set(CollectionKind::Tags, tags.merged);

            for kind in CollectionKind::ALL {
                if kind == CollectionKind::Tags {
                    continue;
                }
                let outcome =
                    merge_collection(kind, db.collections.get(kind), incoming.get(kind), &options);
                collections.insert(
                    kind.key().to_string(),
                    CollectionReport {
                        added: outcome.added,
                        skipped: outcome.skipped,
                    },
                );
                db.collections.set(kind, outcome.merged);
            }
            db.touch();

            let report = build_report(mode, &db.name, collections, remapped);
            (db, report)
        }
    };

    persist(vault, db, FileMirror::Write).await?;
    info!(
        database = %report.database,
        %mode,
        added = report.added,
        skipped = report.skipped,
        "imported document"
    );

    let mut result = CmdResult::default();
    if let Some(db) = vault.active() {
        result = result.with_database(db);
    }
    let message = match mode {
        ImportMode::Replace => format!(
            "Imported {} record(s) as database '{}'",
            report.added, report.database
        ),
        ImportMode::Merge => format!(
            "Merged into '{}': {} added, {} skipped as duplicates",
            report.database, report.added, report.skipped
        ),
    };
    result.add_message(CmdMessage::success(message));
    if report.tag_references_remapped > 0 {
        result.add_message(CmdMessage::info(format!(
            "Pointed {} record(s) at existing tags",
            report.tag_references_remapped
        )));
    }
    result.import = Some(report);
    Ok(result)
}

fn build_report(
    mode: ImportMode,
    database: &str,
    collections: BTreeMap<String, CollectionReport>,
    tag_references_remapped: usize,
) -> ImportReport {
    ImportReport {
        mode,
        database: database.to_string(),
        added: collections.values().map(|c| c.added).sum(),
        skipped: collections.values().map(|c| c.skipped).sum(),
        collections,
        tag_references_remapped,
    }
}
