// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory file locks with a bounded-wait acquire loop.
//!
//! Locks are taken on dedicated sibling files (`.lock.read`, `.lock.write`),
//! never on the data file itself, so an atomic rename of the data file is
//! never blocked by a reader. Writers additionally publish a
//! `.lock.write.info` file naming their pid and operation, which a
//! contending acquirer reports back in [`StorageError::LockContended`].

use crate::error::{LockInfo, StorageError};
use chrono::Utc;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Lock flavor. Shared locks coexist with each other; exclusive locks
/// exclude everything on the same lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    /// Name of the sibling lock file for this mode.
    pub fn file_name(&self) -> &'static str {
        match self {
            LockMode::Shared => ".lock.read",
            LockMode::Exclusive => ".lock.write",
        }
    }
}

/// Acquire-loop tuning. The defaults implement the 50 ms / 5 s contract;
/// operators under heavy contention may need different numbers.
#[derive(Debug, Clone)]
pub struct LockOptions {
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            max_wait: Duration::from_secs(5),
        }
    }
}

/// A held advisory lock. Released on drop; the write-info file is removed
/// with it.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    lock_path: PathBuf,
    info_path: Option<PathBuf>,
}

impl FileLock {
    /// Acquire a lock on `lock_path`, polling until `options.max_wait`
    /// elapses or `cancel` fires.
    ///
    /// `operation` tags the write-info file so a contending process can
    /// report who is holding the lock and why.
    pub async fn acquire(
        lock_path: &Path,
        mode: LockMode,
        operation: &str,
        options: &LockOptions,
        cancel: &CancellationToken,
    ) -> Result<Self, StorageError> {
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let deadline = Instant::now() + options.max_wait;
        loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(lock_path)
                .map_err(|e| StorageError::io(lock_path, e))?;

            let attempt = match mode {
                LockMode::Shared => fs2::FileExt::try_lock_shared(&file),
                LockMode::Exclusive => fs2::FileExt::try_lock_exclusive(&file),
            };

            match attempt {
                Ok(()) => {
                    let info_path = match mode {
                        LockMode::Exclusive => Some(publish_info(lock_path, operation)),
                        LockMode::Shared => None,
                    };
                    return Ok(Self {
                        file,
                        lock_path: lock_path.to_path_buf(),
                        info_path,
                    });
                }
                Err(e) if is_contention(&e) => {
                    if Instant::now() >= deadline {
                        return Err(StorageError::LockContended {
                            path: lock_path.to_path_buf(),
                            holder: read_info(lock_path),
                        });
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(StorageError::Cancelled),
                        _ = tokio::time::sleep(options.poll_interval) => {}
                    }
                }
                Err(e) => return Err(StorageError::io(lock_path, e)),
            }
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(info_path) = &self.info_path {
            let _ = fs::remove_file(info_path);
        }
        let _ = FileExt::unlock(&self.file);
    }
}

fn is_contention(err: &io::Error) -> bool {
    err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
        || err.kind() == io::ErrorKind::WouldBlock
}

fn info_path_for(lock_path: &Path) -> PathBuf {
    let mut name = lock_path.as_os_str().to_os_string();
    name.push(".info");
    PathBuf::from(name)
}

/// Write the `.lock.write.info` file. Best effort: the lock itself is what
/// protects the data; the info file only improves contention diagnostics.
fn publish_info(lock_path: &Path, operation: &str) -> PathBuf {
    let info_path = info_path_for(lock_path);
    let info = LockInfo {
        pid: std::process::id(),
        operation: operation.to_string(),
        acquired_at: Utc::now(),
    };
    match serde_json::to_vec_pretty(&info) {
        Ok(bytes) => {
            if let Err(e) = fs::write(&info_path, bytes) {
                tracing::warn!(path = %info_path.display(), error = %e, "failed to publish lock info");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize lock info");
        }
    }
    info_path
}

fn read_info(lock_path: &Path) -> Option<LockInfo> {
    let bytes = fs::read(info_path_for(lock_path)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
