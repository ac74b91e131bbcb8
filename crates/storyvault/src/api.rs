//! # API Facade
//!
//! The API layer is a **thin facade** over the command layer. It is the single entry point
//! for every storyvault operation, whatever client drives it.
//!
//! ## Role and Responsibilities
//!
//! The API facade:
//! - **Dispatches** to the appropriate command function
//! - **Normalizes inputs** (collection names, import modes)
//! - **Returns structured types** (`Result<CmdResult>`)
//!
//! ## What the API Does NOT Do
//!
//! - **Business logic**: that belongs in `commands/*.rs`
//! - **Printing**: no stdout, stderr or formatting
//!
//! ## Outcomes
//!
//! Clients that cannot carry a Rust error across their boundary (a JSON consumer, a UI
//! bridge) convert results with [`Outcome::from`]: a success flag, a stable
//! [`ErrorKind`] on failure, a human message and the command result.
//!
//! ## Generic Over KeyValueBackend
//!
//! `StoryApi<K: KeyValueBackend>` is generic over the key-value store:
//! - Production: `StoryApi<FsKv>`
//! - Testing: `StoryApi<MemKv>`

use crate::commands::{self, CmdResult, Vault};
use crate::error::{ErrorKind, Result, StoryError};
use crate::merge::ImportMode;
use crate::model::{CollectionKind, Database, Record};
use crate::paths::PathResolver;
use crate::store::kv::KeyValueBackend;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

/// The main API facade for storyvault operations.
pub struct StoryApi<K: KeyValueBackend> {
    vault: Vault<K>,
}

impl<K: KeyValueBackend> StoryApi<K> {
    pub fn new(vault: Vault<K>) -> Self {
        Self { vault }
    }

    /// The working set, if a database is open.
    pub fn database(&self) -> Option<&Database> {
        self.vault.active()
    }

    pub fn vault(&self) -> &Vault<K> {
        &self.vault
    }

    pub fn paths(&self) -> &PathResolver {
        self.vault.paths()
    }

    pub fn paths_mut(&mut self) -> &mut PathResolver {
        self.vault.paths_mut()
    }

    /// Re-opens whatever database the current pointer names.
    pub fn open_current(&mut self) -> Result<Option<&Database>> {
        self.vault.open_current()
    }

    pub async fn create(&mut self, name: &str) -> Result<CmdResult> {
        commands::create::run(&mut self.vault, name).await
    }

    pub async fn load(&mut self, name: &str) -> Result<CmdResult> {
        commands::load::run(&mut self.vault, name).await
    }

    pub async fn load_from_file(&mut self, path_or_name: &str) -> Result<CmdResult> {
        commands::load::from_file(&mut self.vault, path_or_name).await
    }

    pub async fn switch_to(&mut self, name: &str) -> Result<CmdResult> {
        commands::switch::run(&mut self.vault, name).await
    }

    pub async fn import_replace(&mut self, doc: Value) -> Result<CmdResult> {
        commands::import::replace(&mut self.vault, doc).await
    }

    pub async fn import_merge(&mut self, doc: Value) -> Result<CmdResult> {
        commands::import::merge(&mut self.vault, doc).await
    }

    pub async fn import_file(&mut self, path: &Path, mode: ImportMode) -> Result<CmdResult> {
        commands::import::from_file(&mut self.vault, path, mode).await
    }

    pub async fn export_to(&mut self, destination: Option<&Path>) -> Result<CmdResult> {
        commands::export::run(&mut self.vault, destination).await
    }

    pub async fn delete(&mut self, name: &str) -> Result<CmdResult> {
        commands::delete::run(&mut self.vault, name).await
    }

    pub async fn save(&mut self) -> Result<CmdResult> {
        commands::save::run(&mut self.vault).await
    }

    pub async fn backup(&mut self) -> Result<CmdResult> {
        commands::backup::run(&mut self.vault).await
    }

    pub async fn list_backups(&self, name: Option<&str>) -> Result<CmdResult> {
        commands::backup::list(&self.vault, name).await
    }

    pub async fn list_databases(&self) -> Result<CmdResult> {
        commands::list::run(&self.vault).await
    }

    /// `collection` accepts document keys and the spellings people type (`character`,
    /// `world-elements`).
    pub async fn upsert_record(&mut self, collection: &str, record: Record) -> Result<CmdResult> {
        let kind = parse_collection(collection)?;
        commands::records::upsert(&mut self.vault, kind, record).await
    }

    pub async fn remove_record(&mut self, collection: &str, id: &str) -> Result<CmdResult> {
        let kind = parse_collection(collection)?;
        commands::records::remove(&mut self.vault, kind, id).await
    }

    pub fn list_tags(&self) -> Result<CmdResult> {
        commands::tags::list(&self.vault)
    }

    pub async fn create_tag(&mut self, name: &str, color: Option<&str>) -> Result<CmdResult> {
        commands::tags::create(&mut self.vault, name, color).await
    }

    pub async fn rename_tag(&mut self, id_or_name: &str, new_name: &str) -> Result<CmdResult> {
        commands::tags::rename(&mut self.vault, id_or_name, new_name).await
    }

    pub async fn delete_tag(&mut self, id_or_name: &str) -> Result<CmdResult> {
        commands::tags::delete(&mut self.vault, id_or_name).await
    }

    pub async fn doctor(&mut self, assign_ids: bool) -> Result<CmdResult> {
        commands::doctor::run(&mut self.vault, assign_ids).await
    }
}

fn parse_collection(name: &str) -> Result<CollectionKind> {
    name.parse().map_err(StoryError::Api)
}

/// A command result flattened for clients outside Rust.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CmdResult>,
}

impl From<Result<CmdResult>> for Outcome {
    fn from(result: Result<CmdResult>) -> Self {
        match result {
            Ok(result) => Self {
                success: true,
                error_kind: None,
                message: result.messages.last().map(|m| m.content.clone()),
                result: Some(result),
            },
            Err(err) => Self {
                success: false,
                error_kind: Some(err.kind()),
                message: Some(err.to_string()),
                result: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{document, mem_vault};
    use serde_json::json;

    fn api() -> StoryApi<crate::store::kv::MemKv> {
        StoryApi::new(mem_vault())
    }

    #[tokio::test]
    async fn test_lifecycle_through_api() {
        let mut api = api();
        api.create("Novel").await.unwrap();
        api.import_merge(document(json!([{"id": "1"}])))
            .await
            .unwrap();
        api.upsert_record("world-element", json!({"name": "Keep"}))
            .await
            .unwrap();
        api.save().await.unwrap();

        let db = api.database().unwrap();
        assert_eq!(db.collections.characters.len(), 1);
        assert_eq!(db.collections.world_elements.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_collection_is_invalid_input() {
        let mut api = api();
        api.create("Novel").await.unwrap();
        let err = api.upsert_record("spaceships", json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_outcome_from_failure() {
        let mut api = api();
        let outcome = Outcome::from(api.load("Ghost").await);
        assert!(!outcome.success);
        assert_eq!(outcome.error_kind, Some(ErrorKind::NotFound));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["errorKind"], "notFound");
        assert!(json.get("result").is_none());
    }

    #[tokio::test]
    async fn test_outcome_from_success() {
        let mut api = api();
        let outcome = Outcome::from(api.create("Novel").await);
        assert!(outcome.success);
        assert_eq!(outcome.message.as_deref(), Some("Created database 'Novel'"));
        assert_eq!(outcome.result.unwrap().database.unwrap().name, "Novel");
    }
}
