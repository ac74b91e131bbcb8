mod common;

use common::{full_document, Workspace};
use serde_json::json;
use storyvault::error::ErrorKind;
use storyvault::merge::ImportMode;
use storyvault::model::CollectionKind;
use storyvault::store::KeyValueBackend;

#[tokio::test]
async fn reopening_restores_current_database() {
    let mut ws = Workspace::new();
    {
        let mut api = ws.fs_api();
        api.import_replace(full_document("Saga")).await.unwrap();
        api.upsert_record("character", json!({"id": "c3", "firstName": "Cy"}))
            .await
            .unwrap();
    }

    let api = ws.fs_api();
    let db = api.database().unwrap();
    assert_eq!(db.name, "Saga");
    assert_eq!(db.collections.characters.len(), 3);
    assert!(db.modified_at.is_some());
}

#[tokio::test]
async fn cleared_tiers_fall_back_to_database_file() {
    let mut ws = Workspace::new();
    {
        let mut api = ws.fs_api();
        api.import_replace(full_document("Saga")).await.unwrap();
        assert!(ws.database_dir().join("Saga.json").exists());
    }
    std::fs::remove_dir_all(ws.root().join("store")).unwrap();

    let mut api = ws.fs_api();
    assert!(api.database().is_none());
    api.load("Saga").await.unwrap();
    assert_eq!(api.database().unwrap().collections.plots.len(), 1);
    // The tiers were rebuilt from the file.
    assert!(api
        .vault()
        .tiers()
        .backend()
        .get("Saga_plots")
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn generic_tier_follows_the_last_written_database() {
    let mut ws = Workspace::new();
    let mut api = ws.fs_api();
    api.import_replace(full_document("Saga")).await.unwrap();
    api.create("Draft").await.unwrap();

    let tiers = api.vault().tiers();
    assert_eq!(tiers.generic_owner().unwrap().as_deref(), Some("Draft"));
    assert!(tiers.get("Draft", CollectionKind::Plots).unwrap().is_empty());
    assert_eq!(tiers.get("Saga", CollectionKind::Plots).unwrap().len(), 1);
}

#[tokio::test]
async fn corrupt_file_is_reported_and_nothing_loads() {
    let mut ws = Workspace::new();
    let path = ws.root().join("broken.json");
    std::fs::write(&path, "{\"characters\": [").unwrap();

    let mut api = ws.fs_api();
    let err = api
        .import_file(&path, ImportMode::Replace)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptFile);
    let err = api
        .load_from_file(path.to_str().unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptFile);
    assert!(api.database().is_none());
    assert!(api.vault().tiers().database_names().unwrap().is_empty());
}

#[tokio::test]
async fn list_databases_sees_tiers_and_files() {
    let mut ws = Workspace::new();
    let mut api = ws.fs_api();
    api.import_replace(full_document("Saga")).await.unwrap();
    api.create("Draft").await.unwrap();

    let listed = api.list_databases().await.unwrap().databases;
    let names: Vec<_> = listed.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["Draft", "Saga"]);
    assert!(listed[0].current && listed[0].file.is_none());
    assert!(!listed[1].current && listed[1].file.is_some());
}

#[tokio::test]
async fn backups_rotate() {
    let mut ws = Workspace::new();
    let mut api = ws.fs_api();
    api.import_replace(full_document("Saga")).await.unwrap();

    let first = api.backup().await.unwrap().path.unwrap();
    assert!(first.starts_with(ws.root().join("backups")));
    let listed = api.list_backups(None).await.unwrap().paths;
    assert_eq!(listed, vec![first]);
}

#[tokio::test]
async fn tags_cascade_through_the_api() {
    let mut ws = Workspace::new();
    let mut api = ws.fs_api();
    api.import_replace(full_document("Saga")).await.unwrap();

    api.rename_tag("hero", "Protagonist").await.unwrap();
    let names: Vec<_> = api
        .list_tags()
        .unwrap()
        .records
        .iter()
        .map(|t| t["name"].clone())
        .collect();
    assert_eq!(names, vec![json!("Protagonist")]);

    api.delete_tag("t1").await.unwrap();
    let db = api.database().unwrap();
    assert_eq!(db.collections.characters[0]["tags"], json!([]));
    assert_eq!(db.collections.plots[0]["tags"], json!([]));

    let report = api.doctor(false).await.unwrap().doctor.unwrap();
    assert!(report.is_clean());
}
