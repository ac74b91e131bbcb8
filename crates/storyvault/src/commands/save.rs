use crate::commands::{persist, CmdMessage, CmdResult, FileMirror, Vault};
use crate::error::Result;
use crate::store::kv::KeyValueBackend;
use tracing::info;

/// Persists the working set to the tiers and, when enabled, the database file.
pub async fn run<K: KeyValueBackend>(vault: &mut Vault<K>) -> Result<CmdResult> {
    let mut db = vault.require_active()?;
    db.touch();
    let written = persist(vault, db, FileMirror::Write).await?;

    let mut result = CmdResult::default();
    if let Some(db) = vault.active() {
        info!(database = %db.name, file = ?written, "saved database");
        result = result.with_database(db);
        let message = match &written {
            Some(path) => format!("Saved '{}' to {}", db.name, path.display()),
            None => format!("Saved '{}'", db.name),
        };
        result.add_message(CmdMessage::success(message));
    }
    result.path = written;
    Ok(result)
}
