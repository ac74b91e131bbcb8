use crate::commands::{persist, CmdMessage, CmdResult, FileMirror, Vault};
use crate::error::{Result, StoryError};
use crate::model::Database;
use crate::paths::sanitize_name;
use crate::store::kv::KeyValueBackend;
use tracing::info;

/// Creates an empty database and makes it current. Never touches the filesystem.
///
/// A name that sanitizes to nothing gets a generated `Database_<timestamp>` name.
pub async fn run<K: KeyValueBackend>(vault: &mut Vault<K>, name: &str) -> Result<CmdResult> {
    let name = sanitize_name(name);
    if vault.tiers.is_registered(&name)? || vault.tiers.has_named_data(&name)? {
        return Err(StoryError::Api(format!(
            "Database '{}' already exists",
            name
        )));
    }

    let mut db = Database::empty(&name);
    db.touch();
    persist(vault, db, FileMirror::Skip).await?;
    info!(database = %name, "created database");

    let mut result = CmdResult::default();
    if let Some(db) = vault.active() {
        result = result.with_database(db);
    }
    result.add_message(CmdMessage::success(format!("Created database '{}'", name)));
    Ok(result)
}
