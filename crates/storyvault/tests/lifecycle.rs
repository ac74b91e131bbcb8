mod common;

use common::{ana_document, dump, full_document, Workspace};
use serde_json::json;
use storyvault::api::Outcome;
use storyvault::error::ErrorKind;
use storyvault::merge::{merge_collection, MergeOptions};
use storyvault::model::{CollectionKind, DEFAULT_DATABASE};
use storyvault::paths::sanitize_name;
use storyvault::store::{ResilientFileStore, RetryPolicy};

#[tokio::test]
async fn merge_into_empty_default_database() {
    let mut ws = Workspace::new();
    let mut api = ws.mem_api();

    let result = api.import_merge(ana_document()).await.unwrap();
    let report = result.import.unwrap();
    assert_eq!((report.added, report.skipped), (1, 0));

    let db = api.database().unwrap();
    assert_eq!(db.name, DEFAULT_DATABASE);
    assert_eq!(db.collections.characters.len(), 1);
    assert_eq!(db.collections.characters[0]["id"], "1");
}

#[tokio::test]
async fn merging_the_same_document_twice_skips_it() {
    let mut ws = Workspace::new();
    let mut api = ws.mem_api();
    api.import_merge(ana_document()).await.unwrap();

    let report = api.import_merge(ana_document()).await.unwrap().import.unwrap();
    assert_eq!((report.added, report.skipped), (0, 1));
    assert_eq!(api.database().unwrap().collections.characters.len(), 1);
}

#[tokio::test]
async fn incompatible_version_is_rejected_without_mutation() {
    let mut ws = Workspace::new();
    let mut api = ws.mem_api();
    api.create("Novel").await.unwrap();
    api.import_merge(ana_document()).await.unwrap();
    let before = dump(api.vault().tiers().backend());
    let working_before = api.database().cloned();

    let mut old = ana_document();
    old["version"] = json!("1.0.0");
    let outcome = Outcome::from(api.import_merge(old.clone()).await);
    assert!(!outcome.success);
    assert_eq!(outcome.error_kind, Some(ErrorKind::VersionIncompatible));
    let outcome = Outcome::from(api.import_replace(old).await);
    assert_eq!(outcome.error_kind, Some(ErrorKind::VersionIncompatible));

    assert_eq!(dump(api.vault().tiers().backend()), before);
    assert_eq!(api.database().cloned(), working_before);
}

#[tokio::test]
async fn unwritable_database_directory_fails_after_four_attempts() {
    let mut ws = Workspace::new();
    let mut api = ws.mem_api();
    api.create("Novel").await.unwrap();
    api.upsert_record("characters", json!({"id": "1", "firstName": "Ana"}))
        .await
        .unwrap();
    // Replace the database directory the upsert created with a plain file.
    std::fs::remove_dir_all(ws.database_dir()).unwrap();
    std::fs::write(ws.database_dir(), "not a directory").unwrap();

    let working_before = api.database().cloned();
    let tiers_before = dump(api.vault().tiers().backend());

    let outcome = Outcome::from(api.save().await);
    assert!(!outcome.success);
    assert_eq!(outcome.error_kind, Some(ErrorKind::IoFailure));
    assert_eq!(
        *ws.attempts.lock().unwrap(),
        vec![(1, true), (2, true), (3, true), (4, false)]
    );
    assert_eq!(api.database().cloned(), working_before);
    assert_eq!(dump(api.vault().tiers().backend()), tiers_before);
}

#[tokio::test]
async fn replace_then_load_round_trips() {
    let mut ws = Workspace::new();
    let mut api = ws.mem_api();
    let doc = full_document("Saga");

    api.import_replace(doc.clone()).await.unwrap();
    api.create("Scratch").await.unwrap();
    api.load("Saga").await.unwrap();

    let db = api.database().unwrap();
    assert_eq!(db.name, "Saga");
    for kind in CollectionKind::ALL {
        let mut expected = doc[kind.key()].as_array().unwrap().clone();
        if kind == CollectionKind::Tags {
            expected[0]["name"] = json!("Hero");
        }
        assert_eq!(db.collections.get(kind), expected.as_slice(), "{}", kind);
    }
}

#[tokio::test]
async fn merge_by_id_never_grows_collections() {
    let mut ws = Workspace::new();
    let mut api = ws.mem_api();
    api.import_merge(full_document("Saga")).await.unwrap();
    let counts = api.database().unwrap().collections.counts();

    let report = api
        .import_merge(full_document("Saga"))
        .await
        .unwrap()
        .import
        .unwrap();
    assert_eq!(report.added, 0);
    assert_eq!(api.database().unwrap().collections.counts(), counts);
}

#[test]
fn same_name_different_id_characters_are_duplicates() {
    let a = json!({"id": "a", "firstName": "Mara", "lastName": "Quill"});
    let b = json!({"id": "b", "firstName": "MARA", "lastName": "quill"});
    let out = merge_collection(
        CollectionKind::Characters,
        &[a],
        &[b],
        &MergeOptions::default(),
    );
    assert_eq!((out.skipped, out.added), (1, 0));
}

#[test]
fn blank_names_get_generated_names() {
    for blank in ["", "   "] {
        let name = sanitize_name(blank);
        assert!(name.starts_with("Database_"), "{}", name);
        assert!(name.len() > "Database_".len());
        assert!(!name.contains(':'));
    }
}

#[tokio::test]
async fn ensure_directory_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("a").join("b");
    let files = ResilientFileStore::new(RetryPolicy::default());

    files.ensure_directory(&target).await.unwrap();
    files.ensure_directory(&target).await.unwrap();
    assert!(target.is_dir());
}

#[tokio::test]
async fn switch_moves_pointer_only() {
    let mut ws = Workspace::new();
    let mut api = ws.mem_api();
    api.import_replace(full_document("Saga")).await.unwrap();
    api.create("Draft").await.unwrap();
    let before = dump(api.vault().tiers().backend());

    api.switch_to("Saga").await.unwrap();
    assert_eq!(api.database().unwrap().name, "Saga");
    assert_eq!(api.database().unwrap().collections.plots.len(), 1);

    let after = dump(api.vault().tiers().backend());
    let changed: Vec<_> = after
        .iter()
        .filter(|entry| !before.contains(entry))
        .map(|(key, _)| key.as_str())
        .collect();
    assert_eq!(changed, vec!["currentDatabase"]);
}

#[tokio::test]
async fn delete_returns_to_uninitialized() {
    let mut ws = Workspace::new();
    let mut api = ws.mem_api();
    api.create("Novel").await.unwrap();
    api.save().await.unwrap();
    assert!(ws.database_dir().join("Novel.json").exists());

    api.delete("Novel").await.unwrap();
    assert!(api.database().is_none());
    assert!(!ws.database_dir().join("Novel.json").exists());
    let outcome = Outcome::from(api.save().await);
    assert_eq!(outcome.error_kind, Some(ErrorKind::InvalidInput));
    let outcome = Outcome::from(api.load("Novel").await);
    assert_eq!(outcome.error_kind, Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn export_then_import_file_elsewhere() {
    let mut ws = Workspace::new();
    let mut api = ws.mem_api();
    api.import_replace(full_document("Saga")).await.unwrap();
    let exported = api.export_to(None).await.unwrap().path.unwrap();

    let mut other_ws = Workspace::new();
    let mut other = other_ws.mem_api();
    other
        .import_file(&exported, "replace".parse().unwrap())
        .await
        .unwrap();
    let db = other.database().unwrap();
    assert_eq!(db.name, "Saga");
    assert_eq!(
        db.collections.counts(),
        api.database().unwrap().collections.counts()
    );
}
