// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session durable state.
//!
//! One directory per session under the store root, holding `state.json`,
//! the session's lock files, and backend scratch files (e.g. the tmux
//! exit-status side-channel). A missing `state.json` is not an error: the
//! absence of the file IS the initial `created` state.

use crate::error::StorageError;
use crate::lock::{FileLock, LockMode, LockOptions};
use amux_core::{SessionId, SessionState, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// The session state file contents.
///
/// Written pretty-printed so operators can inspect it directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStateSnapshot {
    pub state: SessionState,
    pub updated_at: DateTime<Utc>,
    /// Pid of the process that wrote this snapshot.
    pub updated_by: u32,
    pub session_id: SessionId,
    pub workspace_id: WorkspaceId,
    /// FNV-1a fingerprint of the last sampled screen tail.
    #[serde(default)]
    pub last_output_hash: u32,
    #[serde(default)]
    pub last_output_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_status_check: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Set exactly when `state` is terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    /// Backend handle (tmux session name) while non-terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Pid of the supervising process, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionStateSnapshot {
    /// The snapshot an absent state file stands for: freshly created,
    /// nothing recorded yet.
    pub fn synthetic(session_id: SessionId, workspace_id: WorkspaceId) -> Self {
        Self {
            state: SessionState::Created,
            updated_at: DateTime::<Utc>::MIN_UTC,
            updated_by: 0,
            session_id,
            workspace_id,
            last_output_hash: 0,
            last_output_time: None,
            last_status_check: None,
            started_at: None,
            stopped_at: None,
            handle: None,
            pid: None,
            exit_code: None,
            error: None,
        }
    }
}

/// Store of per-session state directories.
#[derive(Debug, Clone)]
pub struct StateStore {
    root: PathBuf,
    options: LockOptions,
}

impl StateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: LockOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LockOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding everything for one session.
    pub fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub fn state_path(&self, id: &SessionId) -> PathBuf {
        self.session_dir(id).join("state.json")
    }

    /// Path the multiplexed backend's exit-status side-channel writes to.
    pub fn exit_status_path(&self, id: &SessionId) -> PathBuf {
        self.session_dir(id).join("exit_status")
    }

    /// Take the session's lock in the given mode, bounded-wait.
    pub async fn lock(
        &self,
        id: &SessionId,
        mode: LockMode,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<FileLock, StorageError> {
        let lock_path = self.session_dir(id).join(mode.file_name());
        FileLock::acquire(&lock_path, mode, operation, &self.options, cancel).await
    }

    /// Load the current snapshot. Missing file yields the synthetic
    /// `created` snapshot; unparseable JSON is fatal for the session.
    ///
    /// `workspace_id` seeds the synthetic snapshot: a session is bound to
    /// its workspace from the moment it is created, before any state file
    /// exists, and status reads in that window must still report the
    /// association. Callers have it at hand from the session metadata.
    pub fn load(
        &self,
        id: &SessionId,
        workspace_id: &WorkspaceId,
    ) -> Result<SessionStateSnapshot, StorageError> {
        let path = self.state_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionStateSnapshot::synthetic(
                    id.clone(),
                    workspace_id.clone(),
                ));
            }
            Err(e) => return Err(StorageError::io(path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|source| StorageError::Corrupt { path, source })
    }

    /// Atomically replace the state file.
    pub fn save(
        &self,
        id: &SessionId,
        snapshot: &SessionStateSnapshot,
    ) -> Result<(), StorageError> {
        let path = self.state_path(id);
        write_json_atomic(&path, snapshot)
    }

    /// Read the exit-status side-channel file, if the inner shell has
    /// written it. A file that is present but not an integer is reported
    /// as a parse failure so the monitor can surface it.
    pub fn read_exit_status(&self, id: &SessionId) -> Option<Result<i32, String>> {
        let path = self.exit_status_path(id);
        let content = fs::read_to_string(&path).ok()?;
        let trimmed = content.trim();
        Some(
            trimmed
                .parse::<i32>()
                .map_err(|e| format!("unparseable exit status {trimmed:?}: {e}")),
        )
    }

    /// All session ids with a state directory on disk.
    pub fn list_ids(&self) -> Result<Vec<SessionId>, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.root, e)),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&self.root, e))?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(SessionId::new(name));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Delete a session's state directory. Used by `remove` on terminal
    /// sessions; keeping the directory around for inspection is the
    /// caller's choice.
    pub fn delete(&self, id: &SessionId) -> Result<(), StorageError> {
        let dir = self.session_dir(id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(dir, e)),
        }
    }
}

/// Serialize to pretty JSON and replace `path` via temp-file + rename.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
    }
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| StorageError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;

    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, &bytes).map_err(|e| StorageError::io(&tmp_path, e))?;
    let file = fs::File::open(&tmp_path).map_err(|e| StorageError::io(&tmp_path, e))?;
    file.sync_all().map_err(|e| StorageError::io(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
