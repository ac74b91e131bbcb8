//! # Resilient File Store
//!
//! Async file operations with bounded retry. The host filesystem may be momentarily locked
//! (another process mid-write, a network drive hiccup); each operation is retried a fixed
//! number of times with a fixed pause, then fails with the last underlying error.
//!
//! ## Retry Contract
//!
//! - Read, write and ensure-directory make up to `retries + 1` attempts.
//! - A read of a missing file fails immediately: retrying cannot make it appear.
//! - Delete is idempotent and single-shot: a missing file is success.
//! - Between attempts the [`CancelToken`] is checked, and the optional
//!   `max_elapsed` bound is enforced.
//! - Every failed attempt is reported to the [`RetryObserver`] (if any) and logged.
//!
//! ## Atomic Writes
//!
//! Writes go to a hidden temp file beside the target and are renamed into place, so a
//! reader never observes a half-written file. Two concurrent writers to one path resolve
//! last-writer-wins.

use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Read,
    Write,
    EnsureDir,
    Delete,
    List,
    Stat,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FileOp::Read => "read",
            FileOp::Write => "write",
            FileOp::EnsureDir => "ensure directory",
            FileOp::Delete => "delete",
            FileOp::List => "list",
            FileOp::Stat => "stat",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug)]
pub enum FileError {
    #[error("Could not {op} {} after {attempts} attempt(s): {source}", .path.display())]
    Exhausted {
        op: FileOp,
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("Cancelled {op} {} after {attempts} attempt(s)", .path.display())]
    Cancelled {
        op: FileOp,
        path: PathBuf,
        attempts: u32,
    },

    #[error("Timed out trying to {op} {} after {attempts} attempt(s): {source}", .path.display())]
    TimedOut {
        op: FileOp,
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },
}

impl FileError {
    pub fn op(&self) -> FileOp {
        match self {
            FileError::Exhausted { op, .. }
            | FileError::Cancelled { op, .. }
            | FileError::TimedOut { op, .. } => *op,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            FileError::Exhausted { attempts, .. }
            | FileError::Cancelled { attempts, .. }
            | FileError::TimedOut { attempts, .. } => *attempts,
        }
    }

    /// The last underlying I/O error, if an attempt was made.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            FileError::Exhausted { source, .. } | FileError::TimedOut { source, .. } => {
                Some(source)
            }
            FileError::Cancelled { .. } => None,
        }
    }

    /// True when the file simply does not exist.
    pub fn is_not_found(&self) -> bool {
        self.io_error()
            .is_some_and(|e| e.kind() == io::ErrorKind::NotFound)
    }
}

/// Fixed-delay retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub delay: Duration,
    /// Wall-clock bound across all attempts of one operation.
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(500),
            max_elapsed: None,
        }
    }
}

impl RetryPolicy {
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_max_elapsed(mut self, max: Duration) -> Self {
        self.max_elapsed = Some(max);
        self
    }

    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// Cooperative cancellation, checked between attempts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One failed attempt, as reported to a [`RetryObserver`].
#[derive(Debug)]
pub struct RetryEvent<'a> {
    pub op: FileOp,
    pub path: &'a Path,
    /// 1-based.
    pub attempt: u32,
    pub max_attempts: u32,
    pub error: &'a io::Error,
    pub will_retry: bool,
}

pub type RetryObserver = Arc<dyn Fn(&RetryEvent<'_>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Create missing parent directories first.
    pub create_dir: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self { create_dir: true }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub recursive: bool,
    /// Extensions to keep, with or without the leading dot. Empty keeps everything.
    pub extensions: Vec<String>,
}

impl ListOptions {
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    pub is_dir: bool,
}

#[derive(Clone, Default)]
pub struct ResilientFileStore {
    policy: RetryPolicy,
    cancel: CancelToken,
    observer: Option<RetryObserver>,
}

impl fmt::Debug for ResilientFileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientFileStore")
            .field("policy", &self.policy)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl ResilientFileStore {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            ..Default::default()
        }
    }

    pub fn with_observer(
        mut self,
        observer: impl Fn(&RetryEvent<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub async fn read_file(&self, path: &Path) -> Result<String, FileError> {
        self.retry(FileOp::Read, path, is_not_found, || fs::read_to_string(path))
            .await
    }

    /// Writes with default [`WriteOptions`] (parent directories are created).
    pub async fn write_file(&self, path: &Path, content: &str) -> Result<(), FileError> {
        self.write_file_with(path, content, WriteOptions::default())
            .await
    }

    pub async fn write_file_with(
        &self,
        path: &Path,
        content: &str,
        options: WriteOptions,
    ) -> Result<(), FileError> {
        if options.create_dir {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                self.ensure_directory(parent).await?;
            }
        }
        self.retry(FileOp::Write, path, never, || atomic_write(path, content))
            .await
    }

    /// Succeeds without touching anything when the directory already exists.
    pub async fn ensure_directory(&self, path: &Path) -> Result<(), FileError> {
        self.retry(FileOp::EnsureDir, path, never, || async move {
            match fs::metadata(path).await {
                Ok(meta) if meta.is_dir() => Ok(()),
                _ => fs::create_dir_all(path).await,
            }
        })
        .await
    }

    /// Deleting a missing file is success.
    pub async fn delete_file(&self, path: &Path) -> Result<(), FileError> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => {
                warn!(path = %path.display(), error = %source, "delete failed");
                Err(FileError::Exhausted {
                    op: FileOp::Delete,
                    path: path.to_path_buf(),
                    attempts: 1,
                    source,
                })
            }
        }
    }

    /// Files under `path`, sorted. A missing directory lists as empty. Hidden files are skipped.
    pub async fn list_files(
        &self,
        path: &Path,
        options: &ListOptions,
    ) -> Result<Vec<PathBuf>, FileError> {
        self.retry(FileOp::List, path, never, || collect_files(path, options))
            .await
    }

    /// `None` when nothing exists at `path`.
    pub async fn stat(&self, path: &Path) -> Result<Option<FileStat>, FileError> {
        match fs::metadata(path).await {
            Ok(meta) => Ok(Some(FileStat {
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
                is_dir: meta.is_dir(),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(FileError::Exhausted {
                op: FileOp::Stat,
                path: path.to_path_buf(),
                attempts: 1,
                source,
            }),
        }
    }

    pub async fn exists(&self, path: &Path) -> bool {
        matches!(self.stat(path).await, Ok(Some(_)))
    }

    async fn retry<T, F, Fut>(
        &self,
        op: FileOp,
        path: &Path,
        fail_fast: fn(&io::Error) -> bool,
        mut attempt_fn: F,
    ) -> Result<T, FileError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = io::Result<T>>,
    {
        let started = Instant::now();
        let max_attempts = self.policy.attempts();
        let mut attempt = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(FileError::Cancelled {
                    op,
                    path: path.to_path_buf(),
                    attempts: attempt,
                });
            }
            attempt += 1;

            let error = match attempt_fn().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(%op, path = %path.display(), attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let will_retry = attempt < max_attempts && !fail_fast(&error);
            if let Some(observer) = &self.observer {
                observer(&RetryEvent {
                    op,
                    path,
                    attempt,
                    max_attempts,
                    error: &error,
                    will_retry,
                });
            }

            if !will_retry {
                if !fail_fast(&error) {
                    warn!(%op, path = %path.display(), attempts = attempt, %error, "giving up");
                }
                return Err(FileError::Exhausted {
                    op,
                    path: path.to_path_buf(),
                    attempts: attempt,
                    source: error,
                });
            }

            warn!(%op, path = %path.display(), attempt, max_attempts, %error, "attempt failed, retrying");

            if let Some(max) = self.policy.max_elapsed {
                if started.elapsed() + self.policy.delay > max {
                    return Err(FileError::TimedOut {
                        op,
                        path: path.to_path_buf(),
                        attempts: attempt,
                        source: error,
                    });
                }
            }

            tokio::time::sleep(self.policy.delay).await;
        }
    }
}

fn is_not_found(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::NotFound
}

fn never(_: &io::Error) -> bool {
    false
}

async fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    fs::write(&tmp, content).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

async fn collect_files(root: &Path, options: &ListOptions) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound && dir == root => {
                return Ok(Vec::new())
            }
            Err(e) => return Err(e),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with('.') {
                continue;
            }
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                if options.recursive {
                    pending.push(path);
                }
            } else if options.accepts(&path) {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}
