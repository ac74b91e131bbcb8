//! # Wiring a Client
//!
//! [`initialize`] turns a data directory into a ready [`StoryApi`]:
//!
//! 1. **Data directory**: the explicit override if given, else `STORYVAULT_DATA`, else the
//!    OS-appropriate data directory (via the `directories` crate).
//! 2. **Configuration**: `storyvault.toml` from the global data directory, merged with the one
//!    in the explicit directory when there is one (the explicit one wins).
//! 3. **Locations**: resolved from the configuration. When neither the configuration nor the
//!    legacy `data_path` names a location, the database, backup and documents directories
//!    default to `databases/`, `backups/` and `documents/` under the data directory.
//! 4. **Key-value store**: an [`FsKv`] under `<data dir>/store`.
//! 5. **Working set**: whatever database the current pointer names is opened.
//!
//! ## Data Layout
//!
//! ```text
//! <data dir>/
//!   storyvault.toml
//!   store/          # key-value tiers, one file per key
//!   databases/      # <name>.json mirrors
//!   backups/        # <name>_backup_<timestamp>.json
//!   documents/      # default export destination
//! ```

use crate::api::StoryApi;
use crate::commands::{Vault, VaultSettings};
use crate::config::StoryConfig;
use crate::error::{Result, StoryError};
use crate::paths::{LocationKind, PathResolver};
use crate::store::files::ResilientFileStore;
use crate::store::kv::FsKv;
use clapfig::{Clapfig, SearchMode, SearchPath};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DATA_ENV_VAR: &str = "STORYVAULT_DATA";
pub const CONFIG_FILE_NAME: &str = "storyvault.toml";
const STORE_DIR: &str = "store";

/// Locations given a default under the data directory when nothing configures them.
const DEFAULT_LOCATIONS: [(LocationKind, &str); 3] = [
    (LocationKind::Database, "databases"),
    (LocationKind::Backup, "backups"),
    (LocationKind::Documents, "documents"),
];

pub struct StoryContext {
    pub api: StoryApi<FsKv>,
    pub config: StoryConfig,
    pub data_dir: PathBuf,
    /// Directories `storyvault.toml` is read from, lowest priority first.
    pub config_dirs: Vec<PathBuf>,
}

/// The global data directory: `STORYVAULT_DATA`, else the OS data directory.
pub fn global_data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(DATA_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    ProjectDirs::from("com", "storyvault", "storyvault")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| StoryError::Config("Could not determine a data directory".to_string()))
}

/// Loads `storyvault.toml` from `dirs`, later directories overriding earlier ones.
pub fn load_config(dirs: &[PathBuf]) -> Result<StoryConfig> {
    Clapfig::builder()
        .app_name("storyvault")
        .file_name(CONFIG_FILE_NAME)
        .search_paths(dirs.iter().cloned().map(SearchPath::Path).collect())
        .search_mode(SearchMode::Merge)
        .no_env()
        .strict(false)
        .load()
        .map_err(|e| StoryError::Config(e.to_string()))
}

pub fn initialize(data_override: Option<PathBuf>) -> Result<StoryContext> {
    let global_dir = global_data_dir()?;
    let (data_dir, config_dirs) = match data_override {
        Some(dir) if dir != global_dir => (dir.clone(), vec![global_dir, dir]),
        _ => (global_dir.clone(), vec![global_dir]),
    };

    let config = load_config(&config_dirs)?;
    let paths = default_locations(PathResolver::from_config(&config), &data_dir);
    debug!(
        data_dir = %data_dir.display(),
        database_dir = ?paths.resolve(LocationKind::Database),
        "initializing"
    );

    let settings = VaultSettings {
        save_to_file: config.save_to_file,
        max_backups: config.max_backups,
        merge: config.merge_options(),
    };
    let files = ResilientFileStore::new(config.retry_policy());
    let backend = FsKv::new(data_dir.join(STORE_DIR));
    let mut api = StoryApi::new(Vault::new(backend, files, paths, settings));
    api.open_current()?;

    Ok(StoryContext {
        api,
        config,
        data_dir,
        config_dirs,
    })
}

/// Fills in locations nothing else resolves with directories under `data_dir`.
fn default_locations(mut paths: PathResolver, data_dir: &Path) -> PathResolver {
    for (kind, sub) in DEFAULT_LOCATIONS {
        if paths.resolve(kind).is_none() {
            paths.set_override(kind, data_dir.join(sub));
        }
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_locations_fill_gaps_only() {
        let config = StoryConfig {
            backup_directory: Some("/mnt/backups".to_string()),
            ..StoryConfig::default()
        };
        let paths = default_locations(PathResolver::from_config(&config), Path::new("/data"));
        assert_eq!(
            paths.resolve(LocationKind::Backup),
            Some(PathBuf::from("/mnt/backups"))
        );
        assert_eq!(
            paths.resolve(LocationKind::Database),
            Some(PathBuf::from("/data/databases"))
        );
        assert_eq!(
            paths.resolve(LocationKind::Documents),
            Some(PathBuf::from("/data/documents"))
        );
        assert_eq!(paths.resolve(LocationKind::Temp), None);
    }

    #[test]
    fn test_legacy_root_wins_over_defaults() {
        let config = StoryConfig {
            data_path: Some("/legacy".to_string()),
            ..StoryConfig::default()
        };
        let paths = default_locations(PathResolver::from_config(&config), Path::new("/data"));
        assert_eq!(
            paths.resolve(LocationKind::Database),
            Some(PathBuf::from("/legacy"))
        );
        assert_eq!(
            paths.resolve(LocationKind::Backup),
            Some(PathBuf::from("/legacy/backups"))
        );
    }

    #[test]
    fn test_load_config_merges_directories() {
        let global = tempfile::tempdir().unwrap();
        let local = tempfile::tempdir().unwrap();
        std::fs::write(
            global.path().join(CONFIG_FILE_NAME),
            "max_backups = 3\nsave_to_file = false\n",
        )
        .unwrap();
        std::fs::write(local.path().join(CONFIG_FILE_NAME), "max_backups = 7\n").unwrap();

        let config =
            load_config(&[global.path().to_path_buf(), local.path().to_path_buf()]).unwrap();
        assert_eq!(config.max_backups, 7);
        assert!(!config.save_to_file);
        assert_eq!(config.file_retries, 3);
    }

    #[tokio::test]
    async fn test_initialize_round_trip() {
        let global = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        std::env::set_var(DATA_ENV_VAR, global.path());

        let mut ctx = initialize(Some(data.path().to_path_buf())).unwrap();
        assert!(ctx.api.database().is_none());
        ctx.api.create("Novel").await.unwrap();
        ctx.api.save().await.unwrap();
        assert!(data.path().join("databases").join("Novel.json").exists());

        // A fresh context reopens the current database.
        let ctx = initialize(Some(data.path().to_path_buf())).unwrap();
        assert_eq!(ctx.api.database().unwrap().name, "Novel");
    }
}
