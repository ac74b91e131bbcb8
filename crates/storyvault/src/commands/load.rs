//! Loading databases.
//!
//! [`run`] reads the tiers first. When every collection comes back empty and a database file
//! exists, the file is ingested with replace semantics: this is the path taken after the
//! key-value store was cleared but the file on disk survived. The fallback is silent.
//!
//! [`from_file`] loads an explicit file (or a bare name, resolved against the database
//! directory). A file that cannot be read is an I/O failure, a file that is not JSON is a
//! corrupt file; either way nothing is loaded.

use crate::commands::{database_name, persist, CmdMessage, CmdResult, FileMirror, Vault};
use crate::document::DatabaseDocument;
use crate::error::{Result, StoryError};
use crate::paths::sanitize_name;
use crate::store::kv::KeyValueBackend;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tracing::{debug, info};

pub async fn run<K: KeyValueBackend>(vault: &mut Vault<K>, name: &str) -> Result<CmdResult> {
    let name = database_name(name)?;
    let db = vault.tiers.read_database(&name)?;

    if db.is_empty() {
        if let Some(path) = vault.database_file(&name) {
            if vault.files.exists(&path).await {
                debug!(database = %name, path = %path.display(), "tiers empty, loading from file");
                return ingest_file(vault, &path, Some(&name), FileMirror::Skip).await;
            }
        }
        if !vault.tiers.is_registered(&name)? {
            return Err(StoryError::DatabaseNotFound(name));
        }
    }

    vault.tiers.set_current(&name)?;
    info!(database = %name, records = db.collections.total(), "loaded database");
    let mut result = CmdResult::default().with_database(&db);
    result.add_message(CmdMessage::success(format!("Loaded database '{}'", name)));
    vault.active = Some(db);
    Ok(result)
}

/// Loads from a file path, or from `<database dir>/<name>.json` when given a bare name.
pub async fn from_file<K: KeyValueBackend>(
    vault: &mut Vault<K>,
    path_or_name: &str,
) -> Result<CmdResult> {
    let path = resolve_source(vault, path_or_name)?;
    ingest_file(vault, &path, None, FileMirror::Write).await
}

fn resolve_source<K: KeyValueBackend>(vault: &Vault<K>, path_or_name: &str) -> Result<PathBuf> {
    let looks_like_path = path_or_name.contains('/')
        || path_or_name.contains(MAIN_SEPARATOR)
        || path_or_name.to_lowercase().ends_with(".json");
    if looks_like_path {
        Ok(PathBuf::from(path_or_name))
    } else {
        vault.paths.database_file(&database_name(path_or_name)?)
    }
}

/// Reads, validates and ingests a document file with replace semantics.
///
/// `name` forces the database name; otherwise the document's own name is used, falling back
/// to the file stem.
pub(crate) async fn ingest_file<K: KeyValueBackend>(
    vault: &mut Vault<K>,
    path: &Path,
    name: Option<&str>,
    mirror: FileMirror,
) -> Result<CmdResult> {
    let text = vault.files.read_file(path).await?;
    let doc = DatabaseDocument::parse(&text, path)?;
    doc.check_version()?;

    let fallback = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut db = doc.into_database(&fallback);
    db.name = match name {
        Some(name) => name.to_string(),
        None => sanitize_name(&db.name),
    };
    if db.modified_at.is_none() {
        db.touch();
    }

    persist(vault, db, mirror).await?;
    let db = vault.require_active()?;
    info!(database = %db.name, path = %path.display(), "loaded database from file");

    let mut result = CmdResult::default()
        .with_database(&db)
        .with_path(path.to_path_buf());
    result.add_message(CmdMessage::success(format!(
        "Loaded database '{}' from {}",
        db.name,
        path.display()
    )));
    Ok(result)
}
