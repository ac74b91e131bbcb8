use crate::commands::{database_name, CmdMessage, CmdResult, Vault};
use crate::error::{Result, StoryError};
use crate::store::kv::KeyValueBackend;
use tracing::info;

/// Points `currentDatabase` at `name` and reads it into the working set.
///
/// The target's stored data is not modified.
pub async fn run<K: KeyValueBackend>(vault: &mut Vault<K>, name: &str) -> Result<CmdResult> {
    let name = database_name(name)?;

    let known = vault.tiers.is_registered(&name)? || vault.tiers.has_named_data(&name)?;
    if !known {
        let on_disk = match vault.database_file(&name) {
            Some(path) => vault.files.exists(&path).await,
            None => false,
        };
        if !on_disk {
            return Err(StoryError::DatabaseNotFound(name));
        }
    }

    let db = vault.tiers.read_database(&name)?;
    vault.tiers.set_current(&name)?;
    info!(database = %name, "switched current database");

    let mut result = CmdResult::default().with_database(&db);
    result.add_message(CmdMessage::success(format!("Switched to '{}'", name)));
    vault.active = Some(db);
    Ok(result)
}
