// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semaphore reconciliation: eviction of stale holders.
//!
//! A holder is stale when its referent no longer justifies its presence:
//! the referenced session is gone or terminal, an interactive CLI's lease
//! has run out, or the holder kind is something this version does not
//! recognize. Reconciliation runs inline before every acquire and on
//! demand before workspace removal; together with the release-on-terminal
//! handler it guarantees eventual convergence even when a change-handler
//! failed.

use crate::error::EngineError;
use amux_core::{Clock, Holder, HolderKind, SessionId, SystemClock, Workspace, WorkspaceId};
use amux_storage::{SemaphoreStore, StateStore};
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub struct Reconciler<C: Clock = SystemClock> {
    store: StateStore,
    semaphores: SemaphoreStore<C>,
    clock: C,
}

impl<C: Clock> Reconciler<C> {
    pub fn new(store: StateStore, semaphores: SemaphoreStore<C>, clock: C) -> Self {
        Self {
            store,
            semaphores,
            clock,
        }
    }

    /// Staleness rules, evaluated against current on-disk session state.
    ///
    /// Errors reading a session's state keep the holder: blocking a
    /// removal is recoverable, evicting a live holder is not.
    pub fn is_stale(&self, holder: &Holder) -> bool {
        match holder.kind {
            HolderKind::Session => match &holder.session_id {
                Some(session_id) => !self.session_live(session_id),
                None => true,
            },
            HolderKind::InteractiveCli => holder.lease_expired(self.clock.now()),
            HolderKind::Unknown => true,
        }
    }

    fn session_live(&self, session_id: &SessionId) -> bool {
        match self.store.load_meta(session_id) {
            Ok(None) => false,
            Ok(Some(meta)) => match self.store.load(session_id, &meta.workspace_id) {
                Ok(snapshot) => !snapshot.state.is_terminal(),
                Err(e) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %e,
                        "cannot read session state during reconciliation, keeping holder"
                    );
                    true
                }
            },
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    error = %e,
                    "cannot read session metadata during reconciliation, keeping holder"
                );
                true
            }
        }
    }

    /// Rewrite the workspace's holder list immediately, returning the
    /// survivors.
    pub async fn reconcile(
        &self,
        workspace_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<Holder>, EngineError> {
        let survivors = self
            .semaphores
            .retain(workspace_path, &|h| !self.is_stale(h), cancel)
            .await?;
        Ok(survivors)
    }

    /// Reconcile many workspaces, reporting per-workspace errors instead
    /// of stopping at the first.
    pub async fn reconcile_all(
        &self,
        workspaces: &[Workspace],
        cancel: &CancellationToken,
    ) -> Vec<(WorkspaceId, EngineError)> {
        let mut errors = Vec::new();
        for workspace in workspaces {
            if let Err(e) = self.reconcile(&workspace.path, cancel).await {
                tracing::warn!(workspace_id = %workspace.id, error = %e, "reconcile failed");
                errors.push((workspace.id.clone(), e));
            }
        }
        errors
    }
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod tests;
