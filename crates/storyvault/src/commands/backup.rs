//! Timestamped backups of the working set.
//!
//! Backups live in the backup directory as `<name>_backup_<timestamp>.json` and carry a
//! `backupDate` stamp. The timestamp sorts lexically, so the file name alone orders backups
//! oldest first. After each backup, the oldest files beyond `max_backups` are pruned; `0`
//! keeps everything.

use crate::commands::{CmdMessage, CmdResult, Vault};
use crate::document::{to_document_at, StampKind};
use crate::error::Result;
use crate::paths::{backup_prefix, LocationKind};
use crate::store::files::ListOptions;
use crate::store::kv::KeyValueBackend;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{info, warn};

pub async fn run<K: KeyValueBackend>(vault: &mut Vault<K>) -> Result<CmdResult> {
    run_at(vault, Utc::now()).await
}

pub(crate) async fn run_at<K: KeyValueBackend>(
    vault: &mut Vault<K>,
    at: DateTime<Utc>,
) -> Result<CmdResult> {
    let db = vault.require_active()?;
    let path = vault.paths.backup_file(&db.name, at)?;
    let text = serde_json::to_string_pretty(&to_document_at(&db, StampKind::Backup, at)?)?;
    vault.files.write_file(&path, &text).await?;
    info!(database = %db.name, path = %path.display(), "wrote backup");

    let mut result = CmdResult::default()
        .with_database(&db)
        .with_path(path.clone());
    result.add_message(CmdMessage::success(format!(
        "Backed up '{}' to {}",
        db.name,
        path.display()
    )));

    let max = vault.settings.max_backups;
    if max > 0 {
        let existing = backups_of(vault, &db.name).await?;
        let excess = existing.len().saturating_sub(max);
        for old in existing.into_iter().take(excess) {
            match vault.files.delete_file(&old).await {
                Ok(()) => result.paths.push(old),
                Err(err) => {
                    warn!(path = %old.display(), error = %err, "could not prune backup");
                    result.add_message(CmdMessage::warning(format!(
                        "Could not prune {}",
                        old.display()
                    )));
                }
            }
        }
        if !result.paths.is_empty() {
            result.add_message(CmdMessage::info(format!(
                "Pruned {} old backup(s)",
                result.paths.len()
            )));
        }
    }

    Ok(result)
}

/// Backups of `name` (or of the active database), oldest first.
pub async fn list<K: KeyValueBackend>(vault: &Vault<K>, name: Option<&str>) -> Result<CmdResult> {
    let name = match name {
        Some(name) => name.to_string(),
        None => vault.require_active()?.name,
    };
    let mut result = CmdResult {
        paths: backups_of(vault, &name).await?,
        ..CmdResult::default()
    };
    if result.paths.is_empty() {
        result.add_message(CmdMessage::info(format!("No backups of '{}'", name)));
    }
    Ok(result)
}

async fn backups_of<K: KeyValueBackend>(vault: &Vault<K>, name: &str) -> Result<Vec<PathBuf>> {
    let dir = vault.paths.require(LocationKind::Backup)?;
    let prefix = backup_prefix(name);
    let files = vault
        .files
        .list_files(&dir, &ListOptions::default().with_extensions(["json"]))
        .await?;
    let mut backups: Vec<PathBuf> = files
        .into_iter()
        .filter(|path| {
            path.file_name()
                .map(|n| n.to_string_lossy().starts_with(&prefix))
                .unwrap_or(false)
        })
        .collect();
    backups.sort_by_key(|path| path.file_name().map(|n| n.to_os_string()));
    Ok(backups)
}
