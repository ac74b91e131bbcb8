use crate::commands::{Vault, VaultSettings};
use crate::paths::{LocationKind, PathResolver};
use crate::store::files::{ResilientFileStore, RetryPolicy};
use crate::store::kv::MemKv;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// A file store that retries with a 1ms pause instead of 500ms.
pub fn fast_files() -> ResilientFileStore {
    ResilientFileStore::new(RetryPolicy::default().with_delay(Duration::from_millis(1)))
}

/// A vault with no locations configured: nothing touches the filesystem.
pub fn mem_vault() -> Vault<MemKv> {
    Vault::new(
        MemKv::new(),
        fast_files(),
        PathResolver::new(),
        VaultSettings::default(),
    )
}

/// The smallest document that passes validation.
pub fn document(characters: Value) -> Value {
    json!({
        "characters": characters,
        "titles": [],
        "version": crate::model::FORMAT_VERSION,
    })
}

pub struct TestEnv {
    // We keep _temp_dir to ensure the directory is not dropped until the test is done
    pub _temp_dir: TempDir,
    pub vault: Vault<MemKv>,
    pub root: PathBuf,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    /// A vault whose database, backup and documents directories live in a temp dir.
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let paths = PathResolver::new()
            .with_override(LocationKind::Database, root.join("databases"))
            .with_override(LocationKind::Backup, root.join("backups"))
            .with_override(LocationKind::Documents, root.join("documents"));
        let vault = Vault::new(MemKv::new(), fast_files(), paths, VaultSettings::default());
        Self {
            _temp_dir: temp_dir,
            vault,
            root,
        }
    }

    pub fn database_dir(&self) -> PathBuf {
        self.root.join("databases")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join("backups")
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.join("documents")
    }
}
