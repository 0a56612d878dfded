// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace semaphore: the holder list guarding workspace removal.
//!
//! The file lives at `<workspace>/.amux/sem.json` with a companion
//! `sem.lock` taken exclusively for every read-modify-write. Rewrites go
//! through temp-file + rename, so readers without the lock still never see
//! a torn list.
//!
//! Staleness policy is not decided here: `acquire` and `retain` accept a
//! `keep` predicate supplied by the reconciler, so the store stays below
//! the layer that can resolve session ids.

use crate::error::StorageError;
use crate::lock::{FileLock, LockMode, LockOptions};
use crate::state::write_json_atomic;
use amux_core::{Clock, Holder, SystemClock};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub const SEMAPHORE_VERSION: &str = "1.0";

/// On-disk shape of the semaphore file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemaphoreFile {
    pub version: String,
    pub holders: Vec<Holder>,
}

impl Default for SemaphoreFile {
    fn default() -> Self {
        Self {
            version: SEMAPHORE_VERSION.to_string(),
            holders: Vec::new(),
        }
    }
}

/// Store for workspace semaphore files.
#[derive(Debug, Clone)]
pub struct SemaphoreStore<C: Clock = SystemClock> {
    options: LockOptions,
    clock: C,
}

impl SemaphoreStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for SemaphoreStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> SemaphoreStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            options: LockOptions::default(),
            clock,
        }
    }

    pub fn with_options(mut self, options: LockOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a holder, first evicting entries the `keep` predicate rejects
    /// (the reconciler's pre-acquire pass). Re-acquiring an id already in
    /// the list replaces that entry, keeping ids unique per workspace.
    pub async fn acquire(
        &self,
        workspace_path: &Path,
        mut holder: Holder,
        keep: &(dyn Fn(&Holder) -> bool + Sync),
        cancel: &CancellationToken,
    ) -> Result<(), StorageError> {
        if holder.timestamp == chrono::DateTime::<chrono::Utc>::MIN_UTC {
            holder.timestamp = self.clock.now();
        }
        self.update(workspace_path, cancel, "semaphore-acquire", |file| {
            file.holders.retain(|h| h.id != holder.id && keep(h));
            file.holders.push(holder.clone());
        })
        .await
    }

    /// Remove the holder with the given id. No-op if absent.
    pub async fn release(
        &self,
        workspace_path: &Path,
        holder_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), StorageError> {
        self.update(workspace_path, cancel, "semaphore-release", |file| {
            file.holders.retain(|h| h.id != holder_id);
        })
        .await
    }

    /// Rewrite the list keeping only holders the predicate accepts;
    /// returns the surviving holders. This is the reconciler's write path.
    pub async fn retain(
        &self,
        workspace_path: &Path,
        keep: &(dyn Fn(&Holder) -> bool + Sync),
        cancel: &CancellationToken,
    ) -> Result<Vec<Holder>, StorageError> {
        let mut survivors = Vec::new();
        self.update(workspace_path, cancel, "semaphore-reconcile", |file| {
            file.holders.retain(keep);
            survivors = file.holders.clone();
        })
        .await?;
        Ok(survivors)
    }

    /// Current holder list. Missing file reads as empty.
    pub async fn holders(
        &self,
        workspace_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<Holder>, StorageError> {
        if !file_path(workspace_path).exists() {
            return Ok(Vec::new());
        }
        let _lock = FileLock::acquire(
            &lock_path(workspace_path),
            LockMode::Exclusive,
            "semaphore-read",
            &self.options,
            cancel,
        )
        .await?;
        Ok(read(workspace_path)?.holders)
    }

    async fn update(
        &self,
        workspace_path: &Path,
        cancel: &CancellationToken,
        operation: &str,
        mutate: impl FnOnce(&mut SemaphoreFile),
    ) -> Result<(), StorageError> {
        let _lock = FileLock::acquire(
            &lock_path(workspace_path),
            LockMode::Exclusive,
            operation,
            &self.options,
            cancel,
        )
        .await?;

        let mut file = read(workspace_path)?;
        mutate(&mut file);
        write_json_atomic(&file_path(workspace_path), &file)
    }
}

/// Location of the semaphore file for a workspace.
pub fn file_path(workspace_path: &Path) -> PathBuf {
    amux_core::workspace::semaphore_path(workspace_path)
}

fn lock_path(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".amux").join("sem.lock")
}

/// Delete the semaphore file, as the last step of workspace removal.
pub fn delete(workspace_path: &Path) -> Result<(), StorageError> {
    let path = file_path(workspace_path);
    match fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

fn read(workspace_path: &Path) -> Result<SemaphoreFile, StorageError> {
    let path = file_path(workspace_path);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(SemaphoreFile::default());
        }
        Err(e) => return Err(StorageError::io(path, e)),
    };
    serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt { path, source })
}

#[cfg(test)]
#[path = "semaphore_tests.rs"]
mod tests;
