// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identity and launch configuration.
//!
//! Written once at create time to `session.json` beside the state file.
//! Not on the hot path: transitions and activity updates never touch it.

use crate::error::StorageError;
use crate::state::{write_json_atomic, StateStore};
use amux_core::{AgentId, BackendKind, SessionId, Workspace, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// The session metadata file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub session_id: SessionId,
    /// Short numeric index for humans (`amux session status 3`).
    pub index: u32,
    pub workspace_id: WorkspaceId,
    pub workspace_path: PathBuf,
    pub workspace_branch: String,
    pub agent_id: AgentId,
    pub backend: BackendKind,
    pub command: String,
    #[serde(default)]
    pub env: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_name: Option<String>,
    #[serde(default)]
    pub detached: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionMeta {
    /// Rebuild the workspace value this session is bound to.
    pub fn workspace(&self) -> Workspace {
        Workspace::new(
            self.workspace_id.clone(),
            self.workspace_path.clone(),
            self.workspace_branch.clone(),
        )
    }
}

impl StateStore {
    pub fn meta_path(&self, id: &SessionId) -> PathBuf {
        self.session_dir(id).join("session.json")
    }

    pub fn save_meta(&self, meta: &SessionMeta) -> Result<(), StorageError> {
        write_json_atomic(&self.meta_path(&meta.session_id), meta)
    }

    /// `None` when the session has no metadata file (i.e. does not exist).
    pub fn load_meta(&self, id: &SessionId) -> Result<Option<SessionMeta>, StorageError> {
        let path = self.meta_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Corrupt { path, source })
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
