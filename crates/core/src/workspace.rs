// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace identifier and metadata.
//!
//! A workspace is a git worktree checkout in its own directory. The engine
//! only cares about its id, path, branch, and whether the path still exists;
//! worktree creation and removal are the registry caller's concern.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

crate::id::string_id! {
    /// Unique identifier for a workspace.
    WorkspaceId
}

/// Metadata for one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    /// Absolute path of the worktree checkout.
    pub path: PathBuf,
    /// Branch checked out in this worktree.
    pub branch: String,
}

impl Workspace {
    pub fn new(id: impl Into<WorkspaceId>, path: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            branch: branch.into(),
        }
    }

    /// Whether the worktree directory is still present on disk.
    ///
    /// A session whose workspace stops existing becomes orphaned.
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Directory under the workspace where amux keeps its semaphore file.
    pub fn state_subdir(&self) -> PathBuf {
        self.path.join(".amux")
    }
}

/// Well-known location of the semaphore file relative to a workspace root.
pub fn semaphore_path(workspace_path: &Path) -> PathBuf {
    workspace_path.join(".amux").join("sem.json")
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
