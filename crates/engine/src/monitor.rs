// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Activity monitor: cooperative liveness probing on status queries.
//!
//! No background loop. Every `status` call funnels through
//! [`ActivityMonitor::update_status`], which probes the backend when the
//! per-session cache has gone stale and commits any terminal transition it
//! discovers. Concurrent calls from multiple processes are safe: the
//! underlying transition and activity writes all take the session's
//! exclusive lock.

use crate::error::EngineError;
use crate::machine::StateMachine;
use amux_adapters::{BackendError, Liveness, ProcessBackend};
use amux_core::{fingerprint32, Clock, SessionId, SessionState};
use amux_storage::StateStore;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// How long a probe result suppresses further probes.
pub const STATUS_CACHE_TTL: Duration = Duration::from_secs(1);

/// How many trailing screen lines feed the output fingerprint.
pub const SCREEN_SAMPLE_LINES: u32 = 20;

pub struct ActivityMonitor {
    store: StateStore,
    cache_ttl: Duration,
    last_probe: Arc<Mutex<HashMap<SessionId, Instant>>>,
}

impl ActivityMonitor {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            cache_ttl: STATUS_CACHE_TTL,
            last_probe: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Override the cache TTL (tests).
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    fn probe_is_fresh(&self, session_id: &SessionId) -> bool {
        self.last_probe
            .lock()
            .get(session_id)
            .map(|at| at.elapsed() < self.cache_ttl)
            .unwrap_or(false)
    }

    fn mark_probed(&self, session_id: &SessionId) {
        self.last_probe
            .lock()
            .insert(session_id.clone(), Instant::now());
    }

    /// Drop the cache entry so the next status query probes again.
    pub fn invalidate(&self, session_id: &SessionId) {
        self.last_probe.lock().remove(session_id);
    }

    /// Refresh a session's status, probing the backend if the cache is
    /// stale, and return the current snapshot.
    pub async fn update_status<C: Clock>(
        &self,
        machine: &StateMachine<C>,
        backend: &dyn ProcessBackend,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> Result<amux_storage::SessionStateSnapshot, EngineError> {
        let session_id = machine.session_id().clone();
        let snapshot = machine.snapshot(cancel).await?;

        // Only sessions with a launched process are probeable; terminal
        // ones never change again.
        if snapshot.state.is_terminal()
            || !matches!(snapshot.state, SessionState::Starting | SessionState::Running)
        {
            return Ok(snapshot);
        }
        if !force_refresh && self.probe_is_fresh(&session_id) {
            return Ok(snapshot);
        }

        let Some(handle) = snapshot.handle.clone() else {
            return Ok(snapshot);
        };

        let exit_status_path = self.store.exit_status_path(&session_id);
        let liveness = backend.alive(&handle, &exit_status_path).await?;

        let result = match liveness {
            Liveness::HandleGone => {
                self.finish(machine, SessionState::Failed, None, Some("backend handle no longer exists".to_string()), cancel)
                    .await?
            }
            Liveness::ShellDead { exit_code } => {
                self.finish(machine, SessionState::Failed, exit_code, Some("shell process exited".to_string()), cancel)
                    .await?
            }
            Liveness::Dead { exit_code: Some(0) } => {
                self.finish(machine, SessionState::Completed, Some(0), None, cancel)
                    .await?
            }
            Liveness::Dead { exit_code: Some(code) } => {
                self.finish(
                    machine,
                    SessionState::Failed,
                    Some(code),
                    Some(format!("process exited with code {}", code)),
                    cancel,
                )
                .await?
            }
            Liveness::Dead { exit_code: None } => {
                let detail = match self.store.read_exit_status(&session_id) {
                    Some(Err(parse_error)) => parse_error,
                    _ => "process exited with unknown status".to_string(),
                };
                self.finish(machine, SessionState::Failed, None, Some(detail), cancel)
                    .await?
            }
            Liveness::Alive => {
                let hash = self.sample_screen(backend, &handle).await;
                machine.record_activity(hash, cancel).await?
            }
        };

        self.mark_probed(&session_id);
        Ok(result)
    }

    /// Fingerprint the screen tail. Purely informational; backends without
    /// a screen simply contribute no sample.
    async fn sample_screen(&self, backend: &dyn ProcessBackend, handle: &str) -> Option<u32> {
        match backend.read_screen(handle, SCREEN_SAMPLE_LINES).await {
            Ok(screen) if !screen.is_empty() => Some(fingerprint32(screen.as_bytes())),
            Ok(_) => None,
            Err(BackendError::Unsupported(..)) => None,
            Err(e) => {
                tracing::warn!(handle, error = %e, "screen sample failed");
                None
            }
        }
    }

    /// Commit a monitor-detected terminal transition. A concurrent
    /// transition that got there first is not an error: reload and return
    /// what won.
    async fn finish<C: Clock>(
        &self,
        machine: &StateMachine<C>,
        to: SessionState,
        exit_code: Option<i32>,
        error: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<amux_storage::SessionStateSnapshot, EngineError> {
        let result = machine
            .transition(to, cancel, move |snapshot| {
                snapshot.exit_code = exit_code;
                if error.is_some() {
                    snapshot.error = error;
                }
            })
            .await;
        match result {
            Ok(snapshot) => Ok(snapshot),
            Err(EngineError::InvalidTransition { .. }) => Ok(machine.snapshot(cancel).await?),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
