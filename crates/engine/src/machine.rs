// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session state machine.
//!
//! Every mutation follows the same protocol: take the session's exclusive
//! file lock, load the snapshot (or the synthetic `created` one), validate
//! against the legal-transition table, run the registered change-handlers,
//! stamp and save, release. Handlers run inside the lock, in registration
//! order, and a handler failure is logged but never blocks the transition;
//! the reconciler converges any side effects a failed handler left behind.

use crate::error::EngineError;
use amux_core::{Clock, SessionId, SessionState, SystemClock, Workspace};
use amux_storage::{LockMode, SessionStateSnapshot, StateStore};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a change-handler sees about a committing transition.
#[derive(Debug, Clone)]
pub struct TransitionCtx {
    pub session_id: SessionId,
    pub workspace: Workspace,
    pub from: SessionState,
    pub to: SessionState,
}

/// Side-effect hook invoked on every transition, inside the write lock.
///
/// Handlers must be idempotent: a crash between handler invocation and the
/// snapshot save replays the transition (and the handlers) on the next
/// attempt. They must not re-enter the same session's machine.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn on_transition(&self, ctx: &TransitionCtx) -> Result<(), EngineError>;
}

/// The state machine for one session.
pub struct StateMachine<C: Clock = SystemClock> {
    store: StateStore,
    session_id: SessionId,
    workspace: Workspace,
    handlers: Vec<Arc<dyn ChangeHandler>>,
    clock: C,
}

impl<C: Clock> StateMachine<C> {
    pub fn new(store: StateStore, session_id: SessionId, workspace: Workspace, clock: C) -> Self {
        Self {
            store,
            session_id,
            workspace,
            handlers: Vec::new(),
            clock,
        }
    }

    /// Append a change-handler. Invocation order is registration order.
    pub fn register_handler(&mut self, handler: Arc<dyn ChangeHandler>) {
        self.handlers.push(handler);
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Read the current snapshot under a shared lock.
    pub async fn snapshot(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SessionStateSnapshot, EngineError> {
        let _lock = self
            .store
            .lock(&self.session_id, LockMode::Shared, "status", cancel)
            .await?;
        Ok(self.store.load(&self.session_id, &self.workspace.id)?)
    }

    /// Commit a transition to `to`, applying `mutate` to the snapshot
    /// before the save. Rejects anything outside the legal-transition
    /// table with [`EngineError::InvalidTransition`].
    pub async fn transition(
        &self,
        to: SessionState,
        cancel: &CancellationToken,
        mutate: impl FnOnce(&mut SessionStateSnapshot) + Send,
    ) -> Result<SessionStateSnapshot, EngineError> {
        let operation = format!("transition-to-{}", to);
        let _lock = self
            .store
            .lock(&self.session_id, LockMode::Exclusive, &operation, cancel)
            .await?;

        let mut snapshot = self.store.load(&self.session_id, &self.workspace.id)?;
        let from = snapshot.state;
        if !from.can_transition_to(to) {
            return Err(EngineError::InvalidTransition { from, to });
        }

        let ctx = TransitionCtx {
            session_id: self.session_id.clone(),
            workspace: self.workspace.clone(),
            from,
            to,
        };
        for handler in &self.handlers {
            if let Err(e) = handler.on_transition(&ctx).await {
                tracing::warn!(
                    session_id = %self.session_id,
                    from = %from,
                    to = %to,
                    error = %e,
                    "change-handler failed; transition commits anyway"
                );
            }
        }

        let now = self.clock.now();
        snapshot.state = to;
        snapshot.updated_at = now;
        snapshot.updated_by = std::process::id();
        snapshot.session_id = self.session_id.clone();
        snapshot.workspace_id = self.workspace.id.clone();
        if to.is_terminal() {
            snapshot.stopped_at = Some(now);
        }
        mutate(&mut snapshot);

        self.store.save(&self.session_id, &snapshot)?;
        tracing::info!(session_id = %self.session_id, %from, %to, "session transition");
        Ok(snapshot)
    }

    /// Record an activity sample without changing state. A no-op on
    /// terminal sessions.
    pub async fn record_activity(
        &self,
        output_hash: Option<u32>,
        cancel: &CancellationToken,
    ) -> Result<SessionStateSnapshot, EngineError> {
        let _lock = self
            .store
            .lock(&self.session_id, LockMode::Exclusive, "activity-update", cancel)
            .await?;

        let mut snapshot = self.store.load(&self.session_id, &self.workspace.id)?;
        if snapshot.state.is_terminal() {
            return Ok(snapshot);
        }

        let now = self.clock.now();
        snapshot.last_status_check = Some(now);
        if let Some(hash) = output_hash {
            if hash != snapshot.last_output_hash {
                snapshot.last_output_hash = hash;
                snapshot.last_output_time = Some(now);
            }
        }
        snapshot.updated_at = now;
        snapshot.updated_by = std::process::id();

        self.store.save(&self.session_id, &snapshot)?;
        Ok(snapshot)
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
