//! # Locations and Names
//!
//! Storyvault resolves a small set of named locations (where database files live, where
//! backups go, ...) and turns user-supplied database names into safe file names.
//!
//! ## Resolution Order
//!
//! [`PathResolver::resolve`] checks, in order:
//! 1. **Runtime override**: a path the client supplied for this run.
//! 2. **Configured value**: the matching `*_directory` key in `storyvault.toml`.
//! 3. **Legacy key**: older installs kept a single `data_path`; the database directory is
//!    that path itself and the other locations are subdirectories of it.
//! 4. **Nothing**: `None`. Callers decide whether a missing location is fatal (export) or
//!    simply means "skip" (mirroring a save to disk).
//!
//! ## Name Sanitizing
//!
//! Database names end up in file names, so [`sanitize_name`] strips path separators and
//! characters reserved on common filesystems. A name that sanitizes to nothing becomes a
//! generated `Database_<timestamp>` name rather than an empty file name.

use crate::config::StoryConfig;
use crate::error::{Result, StoryError};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;
use std::fmt;
use std::path::{PathBuf, MAIN_SEPARATOR};

const RESERVED_NAME_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocationKind {
    Database,
    Backup,
    Documents,
    Temp,
    Images,
}

impl LocationKind {
    pub const ALL: [LocationKind; 5] = [
        LocationKind::Database,
        LocationKind::Backup,
        LocationKind::Documents,
        LocationKind::Temp,
        LocationKind::Images,
    ];

    /// Subdirectory of the legacy `data_path` used for this location.
    fn legacy_subdir(self) -> Option<&'static str> {
        match self {
            LocationKind::Database => None,
            LocationKind::Backup => Some("backups"),
            LocationKind::Documents => Some("documents"),
            LocationKind::Temp => Some("temp"),
            LocationKind::Images => Some("images"),
        }
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LocationKind::Database => "database",
            LocationKind::Backup => "backup",
            LocationKind::Documents => "documents",
            LocationKind::Temp => "temp",
            LocationKind::Images => "images",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PathResolver {
    overrides: HashMap<LocationKind, String>,
    configured: HashMap<LocationKind, String>,
    legacy_root: Option<String>,
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &StoryConfig) -> Self {
        let mut resolver = Self::new();
        for kind in LocationKind::ALL {
            if let Some(value) = config.configured_location(kind) {
                if !value.trim().is_empty() {
                    resolver.configured.insert(kind, value.to_string());
                }
            }
        }
        resolver.legacy_root = config
            .data_path
            .as_ref()
            .filter(|p| !p.trim().is_empty())
            .cloned();
        resolver
    }

    pub fn with_override(mut self, kind: LocationKind, path: impl Into<PathBuf>) -> Self {
        self.set_override(kind, path);
        self
    }

    pub fn set_override(&mut self, kind: LocationKind, path: impl Into<PathBuf>) {
        let path: PathBuf = path.into();
        self.overrides
            .insert(kind, path.to_string_lossy().into_owned());
    }

    pub fn resolve(&self, kind: LocationKind) -> Option<PathBuf> {
        if let Some(path) = self.overrides.get(&kind) {
            return Some(PathBuf::from(normalize(path)));
        }
        if let Some(path) = self.configured.get(&kind) {
            return Some(PathBuf::from(normalize(path)));
        }
        let root = PathBuf::from(normalize(self.legacy_root.as_ref()?));
        Some(match kind.legacy_subdir() {
            Some(sub) => root.join(sub),
            None => root,
        })
    }

    /// Like [`resolve`](Self::resolve), for callers that cannot proceed without the location.
    pub fn require(&self, kind: LocationKind) -> Result<PathBuf> {
        self.resolve(kind).ok_or(StoryError::LocationUnset(kind))
    }

    /// `<database dir>/<sanitized name>.json`
    pub fn database_file(&self, name: &str) -> Result<PathBuf> {
        let dir = self.require(LocationKind::Database)?;
        Ok(dir.join(format!("{}.json", sanitize_name(name))))
    }

    /// `<backup dir>/<sanitized name>_backup_<stamp>.json`
    pub fn backup_file(&self, name: &str, at: DateTime<Utc>) -> Result<PathBuf> {
        let dir = self.require(LocationKind::Backup)?;
        Ok(dir.join(format!(
            "{}{}.json",
            backup_prefix(name),
            file_stamp(at)
        )))
    }
}

/// File name prefix shared by every backup of a database.
pub fn backup_prefix(name: &str) -> String {
    format!("{}_backup_", sanitize_name(name))
}

/// Rewrites forward slashes to the platform separator. Idempotent.
pub fn normalize(path: &str) -> String {
    if MAIN_SEPARATOR == '/' {
        path.to_string()
    } else {
        path.replace('/', &MAIN_SEPARATOR.to_string())
    }
}

/// Strips separators and reserved characters; empty results get a generated name.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !RESERVED_NAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        generated_name(Utc::now())
    } else {
        trimmed.to_string()
    }
}

/// `Database_<ISO-8601 timestamp without colons>`
pub fn generated_name(at: DateTime<Utc>) -> String {
    format!("Database_{}", file_stamp(at))
}

/// An ISO-8601 timestamp that is safe inside a file name.
pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace(':', "")
}
