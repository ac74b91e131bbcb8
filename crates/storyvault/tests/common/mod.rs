#![allow(dead_code)]

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use storyvault::api::StoryApi;
use storyvault::commands::{Vault, VaultSettings};
use storyvault::model::FORMAT_VERSION;
use storyvault::paths::{LocationKind, PathResolver};
use storyvault::store::{FsKv, KeyValueBackend, MemKv, ResilientFileStore, RetryPolicy};
use tempfile::TempDir;

/// Retry attempts seen by a file store: `(attempt, will_retry)`.
pub type Attempts = Arc<Mutex<Vec<(u32, bool)>>>;

pub fn quick_policy() -> RetryPolicy {
    RetryPolicy::default().with_delay(Duration::from_millis(1))
}

pub fn recording_files() -> (ResilientFileStore, Attempts) {
    let attempts: Attempts = Arc::default();
    let sink = attempts.clone();
    let files = ResilientFileStore::new(quick_policy()).with_observer(move |event| {
        sink.lock()
            .unwrap()
            .push((event.attempt, event.will_retry));
    });
    (files, attempts)
}

pub fn resolver_under(root: &Path) -> PathResolver {
    PathResolver::new()
        .with_override(LocationKind::Database, root.join("databases"))
        .with_override(LocationKind::Backup, root.join("backups"))
        .with_override(LocationKind::Documents, root.join("documents"))
}

pub struct Workspace {
    pub dir: TempDir,
    pub attempts: Attempts,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            attempts: Arc::default(),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn database_dir(&self) -> PathBuf {
        self.root().join("databases")
    }

    /// An API over an in-memory key-value store with files under the temp dir.
    pub fn mem_api(&mut self) -> StoryApi<MemKv> {
        let (files, attempts) = recording_files();
        self.attempts = attempts;
        StoryApi::new(Vault::new(
            MemKv::new(),
            files,
            resolver_under(&self.root()),
            VaultSettings::default(),
        ))
    }

    /// An API whose key-value tiers are files too; calling it twice reopens the same store.
    pub fn fs_api(&mut self) -> StoryApi<FsKv> {
        let (files, attempts) = recording_files();
        self.attempts = attempts;
        let mut api = StoryApi::new(Vault::new(
            FsKv::new(self.root().join("store")),
            files,
            resolver_under(&self.root()),
            VaultSettings::default(),
        ));
        api.open_current().unwrap();
        api
    }
}

/// Every key and value in a backend, for before/after comparisons.
pub fn dump<K: KeyValueBackend>(backend: &K) -> Vec<(String, Option<String>)> {
    backend
        .keys()
        .unwrap()
        .into_iter()
        .map(|key| {
            let value = backend.get(&key).unwrap();
            (key, value)
        })
        .collect()
}

pub fn ana_document() -> Value {
    json!({
        "characters": [{"id": "1", "firstName": "Ana", "lastName": "Li"}],
        "titles": [],
        "version": "2.0.0",
    })
}

pub fn full_document(name: &str) -> Value {
    json!({
        "databaseName": name,
        "version": FORMAT_VERSION,
        "exportDate": "2024-03-09T14:05:07.000Z",
        "characters": [
            {"id": "c1", "firstName": "Ana", "lastName": "Li", "tags": ["t1"]},
            {"id": "c2", "firstName": "Bo", "lastName": "Sen"}
        ],
        "titles": ["The Long Road"],
        "seriesList": ["Roads"],
        "books": ["Book One"],
        "roles": ["Mentor"],
        "customFieldTypes": [{"id": "f1", "name": "Age"}],
        "relationships": [{"id": "r1", "from": "c1", "to": "c2", "kind": "sibling"}],
        "tags": [{"id": "t1", "name": "hero", "color": "#ff0000"}],
        "plots": [{"id": "p1", "title": "Heist", "notes": "night", "tags": ["t1"]}],
        "worldElements": [{"id": "w1", "name": "Keep", "category": "Place"}]
    })
}
