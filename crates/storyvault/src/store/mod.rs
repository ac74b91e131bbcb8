//! # Storage Layer
//!
//! Two independent stores sit under the command layer:
//!
//! - [`tiers::TierStore`]: mirrors the working set into the generic and named key-value
//!   tiers of a [`kv::KeyValueBackend`]. Synchronous, all-or-nothing per batch.
//! - [`files::ResilientFileStore`]: async filesystem access with bounded retry, used for
//!   database files, exports and backups.
//!
//! ## Storage Layout
//!
//! ```text
//! <data dir>/
//! ├── storyvault.toml             # Configuration
//! ├── store/                      # FsKv: one file per tier key
//! │   ├── currentDatabase.json
//! │   ├── databaseList.json
//! │   ├── characters.json         # generic tier
//! │   └── My%20Novel_characters.json  # named tier
//! ├── databases/<name>.json       # database files
//! ├── backups/<name>_backup_<stamp>.json
//! └── documents/                  # default export destination
//! ```

pub mod files;
pub mod kv;
pub mod tiers;

pub use files::{
    CancelToken, FileError, FileOp, FileStat, ListOptions, ResilientFileStore, RetryEvent,
    RetryObserver, RetryPolicy, WriteOptions,
};
pub use kv::{FsKv, KeyValueBackend, KvError, MemKv};
pub use tiers::{resolve_tiers, TierSnapshot, TierStore};
