//! # Command Layer
//!
//! This module contains the **core business logic** of storyvault. Each lifecycle operation
//! lives in its own submodule as an async function over a [`Vault`].
//!
//! ## Role and Responsibilities
//!
//! Commands:
//! - Own the working set (the active [`Database`]) and decide when it changes
//! - Compose the tier store, the file store and the merge engine
//! - Return structured [`CmdResult`]s with summaries, reports and messages
//! - Are completely UI-agnostic
//!
//! ## What Commands Do NOT Do
//!
//! - **Printing**: no stdout/stderr, only `tracing` events
//! - **Argument parsing**: that's the CLI layer's job
//! - **Error presentation**: return `Result`, the API layer turns it into an outcome
//!
//! ## Commit Discipline
//!
//! The working set is only replaced after everything it is persisted to has accepted the
//! new state. [`persist`] snapshots the tier keys it is about to touch, writes the tiers,
//! optionally mirrors the database file, and restores the snapshot if any step fails.
//!
//! ## Command Modules
//!
//! - [`create`]: New empty database
//! - [`load`]: Load by name from the tiers, falling back to the database file
//! - [`switch`]: Move the current-database pointer
//! - [`import`]: Replace or merge from a document or file
//! - [`export`]: Write the active database to a document
//! - [`save`]: Persist the working set
//! - [`delete`]: Remove a database from the tiers and disk
//! - [`backup`]: Timestamped copies and pruning
//! - [`list`]: Known databases
//! - [`records`]: Add, replace and remove single records
//! - [`tags`]: Tag registry
//! - [`doctor`]: Consistency checks

use crate::document::{render_document, StampKind};
use crate::error::{Result, StoryError};
use crate::merge::{ImportMode, MergeOptions};
use crate::model::{Database, DatabaseSummary, Record, DEFAULT_DATABASE};
use crate::paths::{sanitize_name, LocationKind, PathResolver};
use crate::store::files::ResilientFileStore;
use crate::store::kv::KeyValueBackend;
use crate::store::tiers::TierStore;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;

pub mod backup;
pub mod create;
pub mod delete;
pub mod doctor;
pub mod export;
pub mod import;
pub mod list;
pub mod load;
pub mod records;
pub mod save;
pub mod switch;
pub mod tags;

#[derive(Debug, Clone, PartialEq)]
pub struct VaultSettings {
    /// Mirror saves and imports to `<database dir>/<name>.json`.
    pub save_to_file: bool,
    /// Backups kept per database; `0` keeps all.
    pub max_backups: usize,
    pub merge: MergeOptions,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            save_to_file: true,
            max_backups: 10,
            merge: MergeOptions::default(),
        }
    }
}

/// Everything the commands operate on.
pub struct Vault<K: KeyValueBackend> {
    pub(crate) tiers: TierStore<K>,
    pub(crate) files: ResilientFileStore,
    pub(crate) paths: PathResolver,
    pub(crate) settings: VaultSettings,
    pub(crate) active: Option<Database>,
}

impl<K: KeyValueBackend> Vault<K> {
    pub fn new(
        backend: K,
        files: ResilientFileStore,
        paths: PathResolver,
        settings: VaultSettings,
    ) -> Self {
        Self {
            tiers: TierStore::new(backend),
            files,
            paths,
            settings,
            active: None,
        }
    }

    pub fn tiers(&self) -> &TierStore<K> {
        &self.tiers
    }

    pub fn files(&self) -> &ResilientFileStore {
        &self.files
    }

    pub fn paths(&self) -> &PathResolver {
        &self.paths
    }

    pub fn paths_mut(&mut self) -> &mut PathResolver {
        &mut self.paths
    }

    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    /// The working set, if a database is active.
    pub fn active(&self) -> Option<&Database> {
        self.active.as_ref()
    }

    /// Activates the database the current pointer names, when it is known.
    ///
    /// Used when a client starts up; an unknown or missing pointer leaves the vault
    /// uninitialized.
    pub fn open_current(&mut self) -> Result<Option<&Database>> {
        let Some(name) = self.tiers.current()? else {
            return Ok(None);
        };
        if self.tiers.is_registered(&name)? || self.tiers.has_named_data(&name)? {
            debug!(database = %name, "opening current database");
            self.active = Some(self.tiers.read_database(&name)?);
        }
        Ok(self.active.as_ref())
    }

    /// A clone of the working set, or an error when nothing is open.
    pub(crate) fn require_active(&self) -> Result<Database> {
        self.active.clone().ok_or_else(|| {
            StoryError::Api("No database is open. Create or load one first.".to_string())
        })
    }

    /// The database a merge applies to: the working set, else whatever the current pointer
    /// (or the default database) holds in the tiers.
    pub(crate) fn merge_target(&self) -> Result<Database> {
        if let Some(db) = &self.active {
            return Ok(db.clone());
        }
        let name = self
            .tiers
            .current()?
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        self.tiers.read_database(&name)
    }

    pub(crate) fn database_file(&self, name: &str) -> Option<PathBuf> {
        self.paths.resolve(LocationKind::Database)?;
        self.paths.database_file(name).ok()
    }
}

/// Sanitizes the name of a database to look up. A blank lookup is rejected.
pub(crate) fn database_name(name: &str) -> Result<String> {
    if name.trim().is_empty() {
        return Err(StoryError::Api("Database name cannot be empty".to_string()));
    }
    Ok(sanitize_name(name))
}

/// Whether [`persist`] mirrors the database file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileMirror {
    /// Tiers only, for operations that must not touch the filesystem.
    Skip,
    /// Also write `<database dir>/<name>.json` when `save_to_file` is on.
    Write,
}

/// Persists `db`, points `currentDatabase` at it and makes it the working set. On any
/// failure, the tiers are restored and the working set is untouched.
///
/// Returns the database file written, if any.
pub(crate) async fn persist<K: KeyValueBackend>(
    vault: &mut Vault<K>,
    db: Database,
    mirror: FileMirror,
) -> Result<Option<PathBuf>> {
    let snapshot = vault.tiers.snapshot(&db.name)?;
    vault.tiers.write_database(&db)?;

    if let Err(err) = vault.tiers.set_current(&db.name) {
        vault.tiers.restore(snapshot)?;
        return Err(err);
    }

    let mut written = None;
    if mirror == FileMirror::Write && vault.settings.save_to_file {
        if let Some(path) = vault.database_file(&db.name) {
            let outcome = match render_document(&db, StampKind::Save) {
                Ok(text) => vault
                    .files
                    .write_file(&path, &text)
                    .await
                    .map_err(StoryError::from),
                Err(err) => Err(err),
            };
            if let Err(err) = outcome {
                vault.tiers.restore(snapshot)?;
                return Err(err);
            }
            written = Some(path);
        }
    }

    debug!(database = %db.name, file = ?written, "persisted");
    vault.active = Some(db);
    Ok(written)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

/// Added/skipped tallies for one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectionReport {
    pub added: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub mode: ImportMode,
    pub database: String,
    pub added: usize,
    pub skipped: usize,
    pub collections: BTreeMap<String, CollectionReport>,
    /// Records whose tag references were rewritten to existing tags.
    pub tag_references_remapped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseListing {
    pub name: String,
    pub current: bool,
    /// Registered in the key-value tiers.
    pub in_tiers: bool,
    pub file: Option<PathBuf>,
    pub records: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorReport {
    /// Tag references to tags that no longer exist, removed.
    pub dangling_tag_references: usize,
    /// Tags sharing a name case-insensitively with an earlier tag.
    pub duplicate_tag_names: Vec<String>,
    /// Object records without an `id`, per collection.
    pub records_without_id: BTreeMap<String, usize>,
    pub ids_assigned: usize,
}

impl DoctorReport {
    pub fn is_clean(&self) -> bool {
        self.dangling_tag_references == 0
            && self.duplicate_tag_names.is_empty()
            && self.records_without_id.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CmdResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub databases: Vec<DatabaseListing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<ImportReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<Record>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<Record>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor: Option<DoctorReport>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_database(mut self, db: &Database) -> Self {
        self.database = Some(db.summary());
        self
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }
}
