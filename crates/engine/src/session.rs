// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The session facade handed out by the manager.
//!
//! Wraps the state machine, backend, and monitor behind the operations a
//! caller actually performs: start, stop, status, input, attach. An
//! orphaned facade (workspace directory gone) pins `status()` at the
//! persisted `orphaned` state and refuses every operation that would need
//! the workspace.

use crate::error::EngineError;
use crate::machine::StateMachine;
use crate::monitor::ActivityMonitor;
use amux_adapters::{ProcessBackend, SpawnSpec};
use amux_core::{Clock, SessionId, SessionState, SystemClock, Workspace};
use amux_storage::{SessionMeta, SessionStateSnapshot};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Session<C: Clock = SystemClock> {
    meta: SessionMeta,
    machine: StateMachine<C>,
    backend: Arc<dyn ProcessBackend>,
    monitor: Arc<ActivityMonitor>,
    orphaned: bool,
}

impl<C: Clock> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("meta", &self.meta)
            .field("orphaned", &self.orphaned)
            .finish_non_exhaustive()
    }
}

impl<C: Clock> Session<C> {
    pub(crate) fn new(
        meta: SessionMeta,
        machine: StateMachine<C>,
        backend: Arc<dyn ProcessBackend>,
        monitor: Arc<ActivityMonitor>,
        orphaned: bool,
    ) -> Self {
        Self {
            meta,
            machine,
            backend,
            monitor,
            orphaned,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.meta.session_id
    }

    pub fn index(&self) -> u32 {
        self.meta.index
    }

    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    pub fn workspace(&self) -> Workspace {
        self.meta.workspace()
    }

    pub fn is_orphaned(&self) -> bool {
        self.orphaned
    }

    fn orphan_guard(&self, operation: &str) -> Result<(), EngineError> {
        if self.orphaned {
            return Err(EngineError::Conflict(format!(
                "cannot {} session {}: workspace directory {} is gone",
                operation,
                self.meta.session_id,
                self.meta.workspace_path.display()
            )));
        }
        Ok(())
    }

    /// Current status. Probes the backend through the monitor unless this
    /// session is orphaned, in which case the persisted snapshot is
    /// returned untouched.
    pub async fn status(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SessionStateSnapshot, EngineError> {
        if self.orphaned {
            return self.machine.snapshot(cancel).await;
        }
        self.monitor
            .update_status(&self.machine, self.backend.as_ref(), false, cancel)
            .await
    }

    /// Status with the probe cache bypassed.
    pub async fn status_fresh(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SessionStateSnapshot, EngineError> {
        if self.orphaned {
            return self.machine.snapshot(cancel).await;
        }
        self.monitor
            .update_status(&self.machine, self.backend.as_ref(), true, cancel)
            .await
    }

    /// Launch the session's process: `created -> starting -> running`.
    ///
    /// The semaphore change-handler acquires the workspace holder on the
    /// first transition; a spawn failure lands the session in `failed`
    /// (which releases the holder again).
    pub async fn start(&self, cancel: &CancellationToken) -> Result<(), EngineError> {
        self.orphan_guard("start")?;

        let workspace = self.workspace();
        if !workspace.exists() {
            self.machine
                .transition(SessionState::Orphaned, cancel, |s| {
                    s.error = Some("workspace directory missing".to_string());
                })
                .await?;
            return Err(EngineError::Conflict(format!(
                "workspace directory {} is gone",
                workspace.path.display()
            )));
        }

        self.machine
            .transition(SessionState::Starting, cancel, |_| {})
            .await?;

        let spec = SpawnSpec {
            session_id: self.meta.session_id.clone(),
            workspace_id: self.meta.workspace_id.clone(),
            agent_id: self.meta.agent_id.clone(),
            command: self.meta.command.clone(),
            cwd: self.meta.workspace_path.clone(),
            env: self.meta.env.clone(),
            initial_prompt: self.meta.initial_prompt.clone(),
            shell: self.meta.shell.clone(),
            window_name: self.meta.window_name.clone(),
            detached: self.meta.detached,
        };

        match self.backend.spawn(&spec).await {
            Ok(spawned) => {
                let handle = spawned.handle;
                let pid = spawned.pid;
                let clock_now = |s: &mut SessionStateSnapshot| {
                    s.handle = Some(handle);
                    s.pid = pid;
                    s.started_at = Some(s.updated_at);
                };
                self.machine
                    .transition(SessionState::Running, cancel, clock_now)
                    .await?;
                Ok(())
            }
            Err(spawn_error) => {
                let message = spawn_error.to_string();
                if let Err(e) = self
                    .machine
                    .transition(SessionState::Failed, cancel, |s| {
                        s.error = Some(message);
                    })
                    .await
                {
                    tracing::warn!(
                        session_id = %self.meta.session_id,
                        error = %e,
                        "could not record launch failure"
                    );
                }
                Err(EngineError::Backend(spawn_error))
            }
        }
    }

    /// Stop a running session: `running -> stopping -> stopped` when the
    /// process goes down gracefully, `-> failed` when the backend had to
    /// escalate past the grace period.
    pub async fn stop(&self, cancel: &CancellationToken) -> Result<(), EngineError> {
        self.orphan_guard("stop")?;

        let snapshot = self.machine.snapshot(cancel).await?;
        if snapshot.state != SessionState::Running {
            return Err(EngineError::Conflict(format!(
                "session {} is {}, not running",
                self.meta.session_id, snapshot.state
            )));
        }
        let Some(handle) = snapshot.handle.clone() else {
            return Err(EngineError::Conflict(format!(
                "session {} has no backend handle",
                self.meta.session_id
            )));
        };

        self.machine
            .transition(SessionState::Stopping, cancel, |_| {})
            .await?;

        let forced = self.backend.signal(&handle, true).await?;
        if let Err(e) = self.backend.kill(&handle).await {
            tracing::warn!(
                session_id = %self.meta.session_id,
                handle,
                error = %e,
                "backend cleanup after stop failed"
            );
        }
        self.monitor.invalidate(&self.meta.session_id);

        if forced {
            self.machine
                .transition(SessionState::Failed, cancel, |s| {
                    s.error = Some("killed after grace period elapsed".to_string());
                })
                .await?;
        } else {
            self.machine
                .transition(SessionState::Stopped, cancel, |s| {
                    s.error = Some("stopped by request".to_string());
                })
                .await?;
        }
        Ok(())
    }

    /// Type text (plus Enter) into the session.
    pub async fn send_input(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<(), EngineError> {
        self.orphan_guard("send input to")?;
        let handle = self.live_handle(cancel).await?;
        Ok(self.backend.inject_input(&handle, text).await?)
    }

    /// Capture the tail of the session's screen.
    pub async fn screen(
        &self,
        max_lines: u32,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        self.orphan_guard("read the screen of")?;
        let handle = self.live_handle(cancel).await?;
        Ok(self.backend.read_screen(&handle, max_lines).await?)
    }

    /// Human instructions for attaching a terminal.
    pub async fn attach_instructions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<String, EngineError> {
        self.orphan_guard("attach to")?;
        let handle = self.live_handle(cancel).await?;
        Ok(self.backend.attach_instructions(&handle))
    }

    async fn live_handle(&self, cancel: &CancellationToken) -> Result<String, EngineError> {
        let snapshot = self.machine.snapshot(cancel).await?;
        if snapshot.state.is_terminal() {
            return Err(EngineError::Conflict(format!(
                "session {} is {}",
                self.meta.session_id, snapshot.state
            )));
        }
        snapshot.handle.ok_or_else(|| {
            EngineError::Conflict(format!(
                "session {} has not been started",
                self.meta.session_id
            ))
        })
    }

    pub(crate) fn machine(&self) -> &StateMachine<C> {
        &self.machine
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
