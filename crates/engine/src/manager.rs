// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager: the factory and directory for sessions.
//!
//! Explicit-value construction throughout: the manager owns a state store,
//! a semaphore store, the backend table, and the agent profiles it was
//! built with. A process may host several managers as long as their state
//! directories do not overlap.

use crate::error::EngineError;
use crate::machine::{ChangeHandler, StateMachine, TransitionCtx};
use crate::monitor::ActivityMonitor;
use crate::reconciler::Reconciler;
use crate::session::Session;
use amux_adapters::{merged_env, BackendError, ProcessBackend};
use amux_core::{
    AgentId, AgentTable, BackendKind, Clock, Holder, MintIds, RandomIds, SessionId, SessionState,
    SystemClock, Workspace, WorkspaceId,
};
use amux_storage::{SemaphoreStore, SessionMeta, StateStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Inputs for creating a session.
#[derive(Debug, Clone)]
pub struct CreateSpec {
    pub workspace: Workspace,
    pub agent: AgentId,
    pub backend: BackendKind,
    /// Command override; defaults to the agent profile's command.
    pub command: Option<String>,
    pub env: Vec<(String, String)>,
    pub initial_prompt: Option<String>,
    pub window_name: Option<String>,
    pub detached: bool,
}

pub struct SessionManager<C: Clock = SystemClock, I: MintIds = RandomIds> {
    store: StateStore,
    semaphores: SemaphoreStore<C>,
    backends: HashMap<BackendKind, Arc<dyn ProcessBackend>>,
    agents: AgentTable,
    monitor: Arc<ActivityMonitor>,
    clock: C,
    ids: I,
}

impl<C: Clock, I: MintIds> SessionManager<C, I> {
    pub fn new(
        store: StateStore,
        semaphores: SemaphoreStore<C>,
        agents: AgentTable,
        clock: C,
        ids: I,
    ) -> Self {
        let monitor = Arc::new(ActivityMonitor::new(store.clone()));
        Self {
            store,
            semaphores,
            backends: HashMap::new(),
            agents,
            monitor,
            clock,
            ids,
        }
    }

    /// Register a backend under its own kind. Creating or resolving a
    /// session whose kind has no registered backend fails with
    /// `BackendUnavailable`.
    pub fn register_backend(&mut self, backend: Arc<dyn ProcessBackend>) {
        self.backends.insert(backend.kind(), backend);
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn reconciler(&self) -> Reconciler<C> {
        Reconciler::new(
            self.store.clone(),
            self.semaphores.clone(),
            self.clock.clone(),
        )
    }

    fn backend_for(&self, kind: BackendKind) -> Result<Arc<dyn ProcessBackend>, EngineError> {
        self.backends.get(&kind).cloned().ok_or_else(|| {
            EngineError::Backend(BackendError::Unavailable(format!(
                "no {} backend registered",
                kind
            )))
        })
    }

    /// Create a session bound to a workspace. Nothing is launched yet;
    /// `start()` on the returned facade does that.
    pub async fn create(&self, spec: CreateSpec) -> Result<Session<C>, EngineError> {
        if !spec.workspace.exists() {
            return Err(EngineError::NotFound(format!(
                "workspace directory {} does not exist",
                spec.workspace.path.display()
            )));
        }
        let backend = self.backend_for(spec.backend)?;

        let agent_def = self.agents.get(&spec.agent);
        let command = spec
            .command
            .or(agent_def.command)
            .ok_or_else(|| {
                EngineError::Conflict(format!(
                    "agent {} has no command configured and none was given",
                    spec.agent
                ))
            })?;

        let session_id = self.ids.mint();
        let env = merged_env(
            &agent_def.env,
            &spec.env,
            &spec.workspace,
            &session_id,
            &spec.agent,
        );

        let meta = SessionMeta {
            session_id: session_id.clone(),
            index: self.next_index()?,
            workspace_id: spec.workspace.id.clone(),
            workspace_path: spec.workspace.path.clone(),
            workspace_branch: spec.workspace.branch.clone(),
            agent_id: spec.agent,
            backend: spec.backend,
            command,
            env,
            initial_prompt: spec.initial_prompt,
            shell: agent_def.shell,
            window_name: spec.window_name,
            detached: spec.detached,
            created_at: self.clock.now(),
        };
        self.store.save_meta(&meta)?;
        tracing::info!(session_id = %session_id, workspace_id = %meta.workspace_id, "session created");

        Ok(self.assemble(meta, backend, false))
    }

    fn assemble(
        &self,
        meta: SessionMeta,
        backend: Arc<dyn ProcessBackend>,
        orphaned: bool,
    ) -> Session<C> {
        let workspace = meta.workspace();
        let mut machine = StateMachine::new(
            self.store.clone(),
            meta.session_id.clone(),
            workspace,
            self.clock.clone(),
        );
        machine.register_handler(Arc::new(SemaphoreHandler {
            semaphores: self.semaphores.clone(),
            reconciler: self.reconciler(),
            description: format!("agent {} in workspace {}", meta.agent_id, meta.workspace_id),
        }));
        Session::new(meta, machine, backend, Arc::clone(&self.monitor), orphaned)
    }

    /// Look up a session by id, unambiguous id prefix, or short index.
    ///
    /// A session whose workspace directory has disappeared is promoted to
    /// `orphaned` on disk and returned as an orphan facade.
    pub async fn resolve(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<Session<C>, EngineError> {
        let meta = self.find_meta(query)?;
        let backend = self.backend_for(meta.backend)?;

        if meta.workspace().exists() {
            return Ok(self.assemble(meta, backend, false));
        }

        // Workspace is gone: promote a live session to orphaned before
        // handing out the pinned facade.
        let snapshot = self.store.load(&meta.session_id, &meta.workspace_id)?;
        if !snapshot.state.is_terminal() {
            let session = self.assemble(meta.clone(), Arc::clone(&backend), false);
            match session
                .machine()
                .transition(SessionState::Orphaned, cancel, |s| {
                    s.error = Some("workspace directory missing".to_string());
                })
                .await
            {
                Ok(_) => {}
                Err(EngineError::InvalidTransition { .. }) => {}
                Err(e) => return Err(e),
            }
            tracing::warn!(session_id = %meta.session_id, "session orphaned: workspace missing");
        }
        Ok(self.assemble(meta, backend, true))
    }

    fn find_meta(&self, query: &str) -> Result<SessionMeta, EngineError> {
        // Exact id first: cheapest and never ambiguous.
        if let Some(meta) = self.store.load_meta(&SessionId::new(query))? {
            return Ok(meta);
        }

        let all = self.list()?;

        if let Ok(index) = query.parse::<u32>() {
            if let Some(meta) = all.iter().find(|m| m.index == index) {
                return Ok(meta.clone());
            }
        }

        let mut matches = all.iter().filter(|m| m.session_id.has_prefix(query));
        match (matches.next(), matches.next()) {
            (Some(meta), None) => Ok(meta.clone()),
            (Some(_), Some(_)) => Err(EngineError::Conflict(format!(
                "session id prefix {:?} is ambiguous",
                query
            ))),
            (None, _) => Err(EngineError::NotFound(format!("session {:?}", query))),
        }
    }

    /// All sessions, ordered by short index.
    pub fn list(&self) -> Result<Vec<SessionMeta>, EngineError> {
        let mut metas = Vec::new();
        for id in self.store.list_ids()? {
            match self.store.load_meta(&id) {
                Ok(Some(meta)) => metas.push(meta),
                // State dirs without metadata (half-created) are skipped.
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "unreadable session metadata");
                }
            }
        }
        metas.sort_by_key(|m| m.index);
        Ok(metas)
    }

    pub fn list_by_workspace(
        &self,
        workspace_id: &WorkspaceId,
    ) -> Result<Vec<SessionMeta>, EngineError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|m| &m.workspace_id == workspace_id)
            .collect())
    }

    /// Remove a session's on-disk record. Only legal once terminal.
    pub async fn remove(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        let meta = self.find_meta(query)?;
        let _lock = self
            .store
            .lock(
                &meta.session_id,
                amux_storage::LockMode::Exclusive,
                "remove",
                cancel,
            )
            .await?;
        let snapshot = self.store.load(&meta.session_id, &meta.workspace_id)?;
        if !snapshot.state.is_terminal() {
            return Err(EngineError::Conflict("session still running".to_string()));
        }
        self.store.delete(&meta.session_id)?;
        tracing::info!(session_id = %meta.session_id, "session removed");
        Ok(())
    }

    fn next_index(&self) -> Result<u32, EngineError> {
        let max = self.list()?.iter().map(|m| m.index).max().unwrap_or(0);
        Ok(max + 1)
    }
}

/// The change-handler wiring session transitions to the workspace
/// semaphore: acquire on `created -> starting`, release on any transition
/// into a terminal state.
///
/// Idempotent under replay: the holder id is the session id, so a repeated
/// acquire replaces rather than duplicates, and release of an absent id is
/// a no-op.
struct SemaphoreHandler<C: Clock> {
    semaphores: SemaphoreStore<C>,
    reconciler: Reconciler<C>,
    description: String,
}

#[async_trait]
impl<C: Clock> ChangeHandler for SemaphoreHandler<C> {
    async fn on_transition(&self, ctx: &TransitionCtx) -> Result<(), EngineError> {
        // Handlers run inside the session's write lock; semaphore lock
        // waits are bounded on their own.
        let cancel = CancellationToken::new();

        if ctx.from == SessionState::Created && ctx.to == SessionState::Starting {
            let holder = Holder::for_session(
                ctx.session_id.clone(),
                ctx.workspace.id.clone(),
                self.description.clone(),
            );
            self.semaphores
                .acquire(
                    &ctx.workspace.path,
                    holder,
                    &|h| !self.reconciler.is_stale(h),
                    &cancel,
                )
                .await?;
        } else if ctx.to.is_terminal() && ctx.workspace.path.is_dir() {
            self.semaphores
                .release(&ctx.workspace.path, ctx.session_id.as_str(), &cancel)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
