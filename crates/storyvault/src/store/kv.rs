//! Key-value backends.
//!
//! A [`KeyValueBackend`] is the persistence primitive the tier store writes through: string
//! keys, string values, synchronous. The UI layer owns the real one; this crate ships two:
//!
//! - [`MemKv`]: in memory, with an optional byte quota and write-failure simulation.
//! - [`FsKv`]: one file per key in a directory, written atomically.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum KvError {
    #[error("Storage quota exceeded writing '{key}' ({needed} bytes needed, {available} available)")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    #[error("Key-value I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("Write to '{key}' rejected: {reason}")]
    Rejected { key: String, reason: String },
}

pub type KvResult<T> = std::result::Result<T, KvError>;

/// Abstract interface for the raw key-value primitive.
///
/// All methods take `&self`; implementations use interior mutability the way a UI-side
/// storage object would.
pub trait KeyValueBackend {
    /// Returns `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> KvResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> KvResult<()>;

    /// Removing an absent key is not an error.
    fn remove(&self, key: &str) -> KvResult<()>;

    /// All keys, sorted.
    fn keys(&self) -> KvResult<Vec<String>>;
}

/// In-memory backend for tests.
///
/// Uses `RefCell` since a vault has a single owner; no locking needed.
#[derive(Default)]
pub struct MemKv {
    entries: RefCell<BTreeMap<String, String>>,
    quota: Cell<Option<usize>>,
    simulate_write_error: Cell<bool>,
    failing_key: RefCell<Option<String>>,
}

impl MemKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits total stored bytes (keys plus values).
    pub fn with_quota(self, bytes: usize) -> Self {
        self.set_quota(Some(bytes));
        self
    }

    pub fn set_quota(&self, bytes: Option<usize>) {
        self.quota.set(bytes);
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.set(simulate);
    }

    /// Fail only writes to `key` (and removals of it).
    pub fn set_failing_key(&self, key: Option<&str>) {
        *self.failing_key.borrow_mut() = key.map(str::to_string);
    }

    pub fn used_bytes(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn check_writable(&self, key: &str) -> KvResult<()> {
        if self.simulate_write_error.get() {
            return Err(KvError::Rejected {
                key: key.to_string(),
                reason: "simulated write error".to_string(),
            });
        }
        if self.failing_key.borrow().as_deref() == Some(key) {
            return Err(KvError::Rejected {
                key: key.to_string(),
                reason: "simulated failure for this key".to_string(),
            });
        }
        Ok(())
    }
}

impl KeyValueBackend for MemKv {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.check_writable(key)?;
        if let Some(quota) = self.quota.get() {
            let current = self
                .entries
                .borrow()
                .get(key)
                .map(|old| key.len() + old.len())
                .unwrap_or(0);
            let needed = key.len() + value.len();
            let available = quota.saturating_sub(self.used_bytes() - current);
            if needed > available {
                return Err(KvError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available,
                });
            }
        }
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        self.check_writable(key)?;
        self.entries.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> KvResult<Vec<String>> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}

const VALUE_EXT: &str = "json";

/// Directory-backed store: each key is a `<encoded key>.json` file.
///
/// Keys are percent-encoded so that any database name maps to a safe, reversible file name.
pub struct FsKv {
    root: PathBuf,
}

impl FsKv {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", encode_key(key), VALUE_EXT))
    }

    fn io_err(key: &str) -> impl FnOnce(io::Error) -> KvError + '_ {
        move |source| KvError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl KeyValueBackend for FsKv {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        match fs::read_to_string(self.key_path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_err(key)(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        fs::create_dir_all(&self.root).map_err(Self::io_err(key))?;
        let target = self.key_path(key);

        // Atomic write
        let tmp = self.root.join(format!(".kv-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, value).map_err(Self::io_err(key))?;
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(Self::io_err(key)(e));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        match fs::remove_file(self.key_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(key)(e)),
        }
    }

    fn keys(&self) -> KvResult<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_err("*")(e)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(Self::io_err("*"))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if let Some(encoded) = name.strip_suffix(&format!(".{}", VALUE_EXT)) {
                if let Some(key) = decode_key(encoded) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn is_plain_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Percent-encodes every byte outside `[A-Za-z0-9_-]`.
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        if is_plain_key_char(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    out
}

/// Inverse of [`encode_key`]. Returns `None` for malformed input.
pub fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = encoded.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
