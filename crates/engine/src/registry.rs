// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace registry: metadata plus the removal gate.
//!
//! Worktree creation and removal are git operations that live outside the
//! engine; the registry only needs a [`WorktreeOps`] seam to call through
//! when a removal is approved. What the registry owns is the decision:
//! non-forced removal is refused while the reconciled holder list is
//! non-empty, forced removal stops the workspace's sessions first.

use crate::error::EngineError;
use crate::manager::SessionManager;
use crate::reconciler::Reconciler;
use amux_core::{Clock, Holder, MintIds, SessionId, SystemClock, Workspace, WorkspaceId};
use amux_storage::StorageError;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The git/filesystem operations the registry delegates.
pub trait WorktreeOps: Send + Sync {
    fn remove(&self, workspace: &Workspace) -> std::io::Result<()>;
}

/// Plain-filesystem implementation: deletes the checkout directory. The
/// CLI swaps in a git-worktree-aware implementation.
#[derive(Default)]
pub struct FsWorktreeOps;

impl WorktreeOps for FsWorktreeOps {
    fn remove(&self, workspace: &Workspace) -> std::io::Result<()> {
        match std::fs::remove_dir_all(&workspace.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// What a (possibly forced) removal did.
#[derive(Debug, Default)]
pub struct RemoveReport {
    pub stopped_sessions: Vec<SessionId>,
    /// Per-session stop failures during a forced removal. Removal
    /// proceeds regardless; these are for operator display.
    pub stop_errors: Vec<(SessionId, String)>,
}

pub struct WorkspaceRegistry<C: Clock = SystemClock> {
    workspaces: Mutex<BTreeMap<WorkspaceId, Workspace>>,
    reconciler: Reconciler<C>,
    worktree: Arc<dyn WorktreeOps>,
}

impl<C: Clock> WorkspaceRegistry<C> {
    pub fn new(reconciler: Reconciler<C>, worktree: Arc<dyn WorktreeOps>) -> Self {
        Self {
            workspaces: Mutex::new(BTreeMap::new()),
            reconciler,
            worktree,
        }
    }

    /// Track a workspace. Registration is idempotent on the id.
    pub fn add(&self, workspace: Workspace) {
        self.workspaces
            .lock()
            .insert(workspace.id.clone(), workspace);
    }

    pub fn get(&self, id: &WorkspaceId) -> Option<Workspace> {
        self.workspaces.lock().get(id).cloned()
    }

    pub fn list(&self) -> Vec<Workspace> {
        self.workspaces.lock().values().cloned().collect()
    }

    /// Reconcile, then report whether any holders remain.
    pub async fn in_use(
        &self,
        id: &WorkspaceId,
        cancel: &CancellationToken,
    ) -> Result<(bool, Vec<Holder>), EngineError> {
        let workspace = self
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("workspace {}", id)))?;
        let holders = self.reconciler.reconcile(&workspace.path, cancel).await?;
        Ok((!holders.is_empty(), holders))
    }

    /// Remove a workspace, gated on the semaphore.
    ///
    /// Without `force`, refuses with [`EngineError::WorkspaceInUse`] while
    /// the reconciled holder list is non-empty. With `force`, stops every
    /// session bound to the workspace first, collecting per-session errors
    /// into the report, then proceeds regardless.
    pub async fn remove_with_check<I: MintIds>(
        &self,
        manager: &SessionManager<C, I>,
        id: &WorkspaceId,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<RemoveReport, EngineError> {
        let workspace = self
            .get(id)
            .ok_or_else(|| EngineError::NotFound(format!("workspace {}", id)))?;

        let mut report = RemoveReport::default();

        if !force {
            let holders = self.reconciler.reconcile(&workspace.path, cancel).await?;
            if !holders.is_empty() {
                return Err(EngineError::WorkspaceInUse {
                    holders: holders.iter().map(Holder::describe).collect(),
                });
            }
        } else {
            for meta in manager.list_by_workspace(id)? {
                let session_id = meta.session_id.clone();
                let outcome = match manager.resolve(session_id.as_str(), cancel).await {
                    Ok(session) => session.stop(cancel).await,
                    Err(e) => Err(e),
                };
                match outcome {
                    Ok(()) => report.stopped_sessions.push(session_id),
                    Err(e) => {
                        tracing::warn!(
                            session_id = %session_id,
                            error = %e,
                            "stop during forced workspace removal failed"
                        );
                        report.stop_errors.push((session_id, e.to_string()));
                    }
                }
            }
        }

        self.worktree
            .remove(&workspace)
            .map_err(|e| EngineError::Storage(StorageError::Io {
                path: workspace.path.clone(),
                source: e,
            }))?;
        amux_storage::semaphore::delete(&workspace.path)?;
        self.workspaces.lock().remove(id);

        tracing::info!(workspace_id = %id, force, "workspace removed");
        Ok(report)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
