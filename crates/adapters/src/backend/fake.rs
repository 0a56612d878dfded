// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake backend for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{BackendError, Liveness, ProcessBackend, SpawnHandle, SpawnSpec};
use amux_core::BackendKind;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Spawn { command: String, cwd: String },
    Signal { handle: String, graceful: bool },
    Kill { handle: String },
    Alive { handle: String },
    ReadScreen { handle: String, max_lines: u32 },
    InjectInput { handle: String, text: String },
}

/// Scripted state for one fake session
#[derive(Debug, Clone)]
pub struct FakeProcess {
    pub spec_command: String,
    pub env: Vec<(String, String)>,
    pub liveness: Liveness,
    pub screen: String,
    /// When set, the next graceful signal reports escalation.
    pub resists_term: bool,
}

struct FakeState {
    processes: HashMap<String, FakeProcess>,
    calls: Vec<BackendCall>,
    next_id: u64,
    fail_spawn: Option<String>,
}

/// Fake process backend for tests: records every call and lets tests
/// script liveness, exit codes, and screen contents.
#[derive(Clone)]
pub struct FakeBackend {
    kind: BackendKind,
    inner: Arc<Mutex<FakeState>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            kind: BackendKind::Tmux,
            inner: Arc::new(Mutex::new(FakeState {
                processes: HashMap::new(),
                calls: Vec::new(),
                next_id: 0,
                fail_spawn: None,
            })),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_kind(kind: BackendKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.lock().calls.clone()
    }

    pub fn get(&self, handle: &str) -> Option<FakeProcess> {
        self.inner.lock().processes.get(handle).cloned()
    }

    /// Make the next spawn fail with the given message.
    pub fn fail_next_spawn(&self, message: impl Into<String>) {
        self.inner.lock().fail_spawn = Some(message.into());
    }

    /// Script the liveness a probe will report.
    pub fn set_liveness(&self, handle: &str, liveness: Liveness) {
        if let Some(process) = self.inner.lock().processes.get_mut(handle) {
            process.liveness = liveness;
        }
    }

    /// Mark the process exited with a code.
    pub fn set_exited(&self, handle: &str, exit_code: i32) {
        self.set_liveness(
            handle,
            Liveness::Dead {
                exit_code: Some(exit_code),
            },
        );
    }

    pub fn set_screen(&self, handle: &str, screen: impl Into<String>) {
        if let Some(process) = self.inner.lock().processes.get_mut(handle) {
            process.screen = screen.into();
        }
    }

    pub fn set_resists_term(&self, handle: &str, resists: bool) {
        if let Some(process) = self.inner.lock().processes.get_mut(handle) {
            process.resists_term = resists;
        }
    }

    /// Add a pre-existing process by handle (for liveness checks against
    /// handles this backend never spawned).
    pub fn add_process(&self, handle: &str, liveness: Liveness) {
        self.inner.lock().processes.insert(
            handle.to_string(),
            FakeProcess {
                spec_command: String::new(),
                env: Vec::new(),
                liveness,
                screen: String::new(),
                resists_term: false,
            },
        );
    }
}

#[async_trait]
impl ProcessBackend for FakeBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn spawn(&self, spec: &SpawnSpec) -> Result<SpawnHandle, BackendError> {
        let mut inner = self.inner.lock();

        inner.calls.push(BackendCall::Spawn {
            command: spec.command.clone(),
            cwd: spec.cwd.display().to_string(),
        });

        if let Some(message) = inner.fail_spawn.take() {
            return Err(BackendError::LaunchFailed(message));
        }

        inner.next_id += 1;
        let handle = format!("fake-{}", inner.next_id);
        let pid = 10_000 + inner.next_id as u32;

        inner.processes.insert(
            handle.clone(),
            FakeProcess {
                spec_command: spec.command.clone(),
                env: spec.env.clone(),
                liveness: Liveness::Alive,
                screen: String::new(),
                resists_term: false,
            },
        );

        Ok(SpawnHandle {
            handle,
            pid: Some(pid),
        })
    }

    async fn signal(&self, handle: &str, graceful: bool) -> Result<bool, BackendError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BackendCall::Signal {
            handle: handle.to_string(),
            graceful,
        });

        let Some(process) = inner.processes.get_mut(handle) else {
            return Err(BackendError::NotFound(handle.to_string()));
        };

        let forced = !graceful || process.resists_term;
        process.liveness = Liveness::Dead {
            exit_code: Some(if forced { 137 } else { 0 }),
        };
        Ok(forced)
    }

    async fn kill(&self, handle: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BackendCall::Kill {
            handle: handle.to_string(),
        });

        if let Some(process) = inner.processes.get_mut(handle) {
            process.liveness = Liveness::HandleGone;
        }
        Ok(())
    }

    async fn alive(
        &self,
        handle: &str,
        _exit_status_path: &Path,
    ) -> Result<Liveness, BackendError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BackendCall::Alive {
            handle: handle.to_string(),
        });

        match inner.processes.get(handle) {
            Some(process) => Ok(process.liveness),
            None => Ok(Liveness::HandleGone),
        }
    }

    async fn read_screen(&self, handle: &str, max_lines: u32) -> Result<String, BackendError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BackendCall::ReadScreen {
            handle: handle.to_string(),
            max_lines,
        });

        match inner.processes.get(handle) {
            Some(process) => {
                let lines: Vec<&str> = process.screen.lines().collect();
                let start = lines.len().saturating_sub(max_lines as usize);
                Ok(lines[start..].join("\n"))
            }
            None => Err(BackendError::NotFound(handle.to_string())),
        }
    }

    async fn inject_input(&self, handle: &str, text: &str) -> Result<(), BackendError> {
        let mut inner = self.inner.lock();
        inner.calls.push(BackendCall::InjectInput {
            handle: handle.to_string(),
            text: text.to_string(),
        });

        if !inner.processes.contains_key(handle) {
            return Err(BackendError::NotFound(handle.to_string()));
        }
        Ok(())
    }

    fn attach_instructions(&self, handle: &str) -> String {
        format!("fake attach {}", handle)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
