use crate::commands::{database_name, CmdMessage, CmdResult, Vault};
use crate::error::{Result, StoryError};
use crate::model::DEFAULT_DATABASE;
use crate::store::kv::KeyValueBackend;
use tracing::{info, warn};

/// Removes a database from the tiers, the registry and disk.
///
/// The tiers are authoritative: once they are cleared the delete has happened, and a database
/// file that cannot be removed is reported as a warning. Deleting the current database moves
/// the pointer to the default database.
pub async fn run<K: KeyValueBackend>(vault: &mut Vault<K>, name: &str) -> Result<CmdResult> {
    let name = database_name(name)?;
    let file = vault.database_file(&name);
    let on_disk = match &file {
        Some(path) => vault.files.exists(path).await,
        None => false,
    };
    if !on_disk && !vault.tiers.is_registered(&name)? && !vault.tiers.has_named_data(&name)? {
        return Err(StoryError::DatabaseNotFound(name));
    }

    vault.tiers.remove_database(&name)?;
    let mut result = CmdResult::default();

    if let (true, Some(path)) = (on_disk, &file) {
        match vault.files.delete_file(path).await {
            Ok(()) => result.path = Some(path.clone()),
            Err(err) => {
                warn!(database = %name, error = %err, "database file was not removed");
                result.add_message(CmdMessage::warning(format!(
                    "Could not remove {}: {}",
                    path.display(),
                    err
                )));
            }
        }
    }

    if vault.tiers.current()?.as_deref() == Some(name.as_str()) {
        vault.tiers.set_current(DEFAULT_DATABASE)?;
    }
    if vault.active.as_ref().is_some_and(|db| db.name == name) {
        vault.active = None;
    }

    info!(database = %name, "deleted database");
    result.add_message(CmdMessage::success(format!("Deleted database '{}'", name)));
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{create, save, MessageLevel};
    use crate::error::ErrorKind;
    use crate::test_utils::{mem_vault, TestEnv};

    #[tokio::test]
    async fn test_delete_removes_tiers_registry_and_file() {
        let mut env = TestEnv::new();
        create::run(&mut env.vault, "Novel").await.unwrap();
        save::run(&mut env.vault).await.unwrap();
        let file = env.database_dir().join("Novel.json");
        assert!(file.exists());

        let result = run(&mut env.vault, "Novel").await.unwrap();
        assert_eq!(result.path.unwrap(), file);
        assert!(!file.exists());
        assert!(!env.vault.tiers().is_registered("Novel").unwrap());
        assert!(!env.vault.tiers().has_named_data("Novel").unwrap());
        assert_eq!(
            env.vault.tiers().current().unwrap().as_deref(),
            Some(DEFAULT_DATABASE)
        );
        assert!(env.vault.active().is_none());
    }

    #[tokio::test]
    async fn test_delete_succeeds_with_warning_when_file_cannot_be_removed() {
        let mut env = TestEnv::new();
        create::run(&mut env.vault, "Novel").await.unwrap();
        // A directory in place of the database file makes removal fail.
        let blocker = env.database_dir().join("Novel.json");
        std::fs::create_dir_all(blocker.join("nested")).unwrap();

        let result = run(&mut env.vault, "Novel").await.unwrap();
        assert!(result.path.is_none());
        let warnings: Vec<_> = result
            .messages
            .iter()
            .filter(|msg| matches!(msg.level, MessageLevel::Warning))
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].content.contains("Novel.json"));
        assert!(result
            .messages
            .iter()
            .any(|msg| matches!(msg.level, MessageLevel::Success)));

        assert!(blocker.is_dir());
        assert!(!env.vault.tiers().is_registered("Novel").unwrap());
        assert!(!env.vault.tiers().has_named_data("Novel").unwrap());
        assert!(env.vault.tiers().database_names().unwrap().is_empty());
        assert!(env.vault.active().is_none());
    }

    #[tokio::test]
    async fn test_delete_other_database_keeps_working_set() {
        let mut vault = mem_vault();
        create::run(&mut vault, "Draft").await.unwrap();
        create::run(&mut vault, "Novel").await.unwrap();

        run(&mut vault, "Draft").await.unwrap();
        assert_eq!(vault.active().unwrap().name, "Novel");
        assert_eq!(vault.tiers().current().unwrap().as_deref(), Some("Novel"));
        assert_eq!(vault.tiers().database_names().unwrap(), vec!["Novel"]);
    }

    #[tokio::test]
    async fn test_delete_unknown_database() {
        let mut vault = mem_vault();
        let err = run(&mut vault, "Ghost").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_file_only_database() {
        let mut env = TestEnv::new();
        std::fs::create_dir_all(env.database_dir()).unwrap();
        let file = env.database_dir().join("Orphan.json");
        std::fs::write(&file, "{}").unwrap();

        run(&mut env.vault, "Orphan").await.unwrap();
        assert!(!file.exists());
    }
}
