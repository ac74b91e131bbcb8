//! # Configuration
//!
//! Storyvault configuration is managed by [`clapfig`], which handles layered loading
//! from TOML files and programmatic overrides.
//!
//! ## Storage Hierarchy
//!
//! Configuration is resolved in priority order:
//! 1. **Explicit directory**: `storyvault.toml` inside the `--data` directory, if given.
//! 2. **Global Config**: OS-appropriate data directory (via `directories` crate).
//! 3. **Compiled Defaults**: Built-in fallbacks via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `database_directory` | unset | Where `<name>.json` database files live |
//! | `backup_directory` | unset | Where timestamped backups are written |
//! | `documents_directory` | unset | Default destination for exports |
//! | `temp_directory` | unset | Scratch space |
//! | `images_directory` | unset | Attached images |
//! | `data_path` | unset | Legacy single root; the other locations hang off it |
//! | `file_retries` | `3` | Extra attempts for a failing file operation |
//! | `retry_delay_ms` | `500` | Fixed pause between attempts |
//! | `operation_timeout_ms` | unset | Wall-clock bound for one file operation, retries included |
//! | `save_to_file` | `true` | Mirror every save to the database file |
//! | `max_backups` | `10` | Backups kept per database (`0` keeps all) |
//! | `similarity_threshold` | `0.8` | Share of comparable fields that must match for a fuzzy duplicate |

use crate::merge::MergeOptions;
use crate::paths::LocationKind;
use crate::store::files::RetryPolicy;
use confique::Config;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for storyvault, stored in `storyvault.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoryConfig {
    pub database_directory: Option<String>,
    pub backup_directory: Option<String>,
    pub documents_directory: Option<String>,
    pub temp_directory: Option<String>,
    pub images_directory: Option<String>,

    /// Single data root used by older installs.
    pub data_path: Option<String>,

    /// Number of retries after the first failed attempt.
    #[config(default = 3)]
    pub file_retries: u32,

    #[config(default = 500)]
    pub retry_delay_ms: u64,

    pub operation_timeout_ms: Option<u64>,

    #[config(default = true)]
    pub save_to_file: bool,

    #[config(default = 10)]
    pub max_backups: usize,

    #[config(default = 0.8)]
    pub similarity_threshold: f64,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            database_directory: None,
            backup_directory: None,
            documents_directory: None,
            temp_directory: None,
            images_directory: None,
            data_path: None,
            file_retries: 3,
            retry_delay_ms: 500,
            operation_timeout_ms: None,
            save_to_file: true,
            max_backups: 10,
            similarity_threshold: 0.8,
        }
    }
}

impl StoryConfig {
    /// The `*_directory` value for a location, if one is set.
    pub fn configured_location(&self, kind: LocationKind) -> Option<&str> {
        let value = match kind {
            LocationKind::Database => &self.database_directory,
            LocationKind::Backup => &self.backup_directory,
            LocationKind::Documents => &self.documents_directory,
            LocationKind::Temp => &self.temp_directory,
            LocationKind::Images => &self.images_directory,
        };
        value.as_deref()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let policy = RetryPolicy::default()
            .with_retries(self.file_retries)
            .with_delay(Duration::from_millis(self.retry_delay_ms));
        match self.operation_timeout_ms {
            Some(ms) => policy.with_max_elapsed(Duration::from_millis(ms)),
            None => policy,
        }
    }

    /// Merge tunables. Out-of-range thresholds are clamped into `0.0..=1.0`.
    pub fn merge_options(&self) -> MergeOptions {
        let threshold = if self.similarity_threshold.is_nan() {
            MergeOptions::default().similarity_threshold
        } else {
            self.similarity_threshold.clamp(0.0, 1.0)
        };
        MergeOptions::default().with_similarity_threshold(threshold)
    }

    /// Key/value pairs for display, in file order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        fn opt<T: ToString>(v: &Option<T>) -> String {
            v.as_ref().map(ToString::to_string).unwrap_or_default()
        }
        vec![
            ("database_directory", opt(&self.database_directory)),
            ("backup_directory", opt(&self.backup_directory)),
            ("documents_directory", opt(&self.documents_directory)),
            ("temp_directory", opt(&self.temp_directory)),
            ("images_directory", opt(&self.images_directory)),
            ("data_path", opt(&self.data_path)),
            ("file_retries", self.file_retries.to_string()),
            ("retry_delay_ms", self.retry_delay_ms.to_string()),
            ("operation_timeout_ms", opt(&self.operation_timeout_ms)),
            ("save_to_file", self.save_to_file.to_string()),
            ("max_backups", self.max_backups.to_string()),
            ("similarity_threshold", self.similarity_threshold.to_string()),
        ]
    }
}
