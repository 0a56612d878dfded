// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process backend capability set.

pub mod local;
pub mod tmux;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod fake;

use amux_core::{AgentId, BackendKind, SessionId, WorkspaceId};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from backend operations
#[derive(Debug, Error)]
pub enum BackendError {
    /// The external program the backend needs (tmux) is missing or not
    /// executable.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("launch failed: {0}")]
    LaunchFailed(String),
    #[error("handle not found: {0}")]
    NotFound(String),
    #[error("backend command failed: {0}")]
    CommandFailed(String),
    /// The operation is not part of this backend's capabilities (e.g.
    /// input injection on the local backend). A user-visible error, never
    /// a crash.
    #[error("{0} is not supported by the {1} backend")]
    Unsupported(&'static str, BackendKind),
}

/// Everything a backend needs to launch a session's process.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub session_id: SessionId,
    pub workspace_id: WorkspaceId,
    pub agent_id: AgentId,
    /// Shell command line to run.
    pub command: String,
    /// Working directory: the workspace path.
    pub cwd: PathBuf,
    /// Fully merged environment (agent defaults, caller vars, AMUX_* ids).
    pub env: Vec<(String, String)>,
    /// Text injected after the command has been sent and had a moment to
    /// settle. Ignored by backends without input injection.
    pub initial_prompt: Option<String>,
    /// Shell override for the inner process.
    pub shell: Option<String>,
    /// Window-name override (tmux only).
    pub window_name: Option<String>,
    /// When set, the process survives supervisor teardown and its stdio is
    /// discarded so it can never block on a full pipe.
    pub detached: bool,
}

/// What `spawn` hands back: the backend handle plus the supervising pid
/// when the backend knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnHandle {
    pub handle: String,
    pub pid: Option<u32>,
}

/// Result of a liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Handle exists and the inner process is running.
    Alive,
    /// The backend handle itself no longer exists.
    HandleGone,
    /// The shell hosting the command died (a dead tmux pane). Distinct
    /// from the inner command exiting normally.
    ShellDead { exit_code: Option<i32> },
    /// Handle exists but the inner process exited. The exit code is
    /// reported when the backend could recover it.
    Dead { exit_code: Option<i32> },
}

/// The capability set every session backend implements.
///
/// Callers must not assume more than this: `read_screen` and
/// `inject_input` may return [`BackendError::Unsupported`].
#[async_trait]
pub trait ProcessBackend: Send + Sync + 'static {
    fn kind(&self) -> BackendKind;

    /// Launch the process described by `spec` and return its handle.
    async fn spawn(&self, spec: &SpawnSpec) -> Result<SpawnHandle, BackendError>;

    /// Request shutdown. `graceful` asks the backend to let the process
    /// exit on its own terms first; the return value is `true` when the
    /// backend had to escalate to a forced kill.
    async fn signal(&self, handle: &str, graceful: bool) -> Result<bool, BackendError>;

    /// Destroy the process and its handle unconditionally.
    async fn kill(&self, handle: &str) -> Result<(), BackendError>;

    /// Probe the process. `exit_status_path` is the session's side-channel
    /// file; the tmux backend writes and reads it to recover exit codes
    /// when the inner command has exited underneath a still-living shell.
    async fn alive(&self, handle: &str, exit_status_path: &Path)
        -> Result<Liveness, BackendError>;

    /// Capture the last `max_lines` lines of the session's screen.
    async fn read_screen(&self, handle: &str, max_lines: u32) -> Result<String, BackendError>;

    /// Type `text` (plus Enter) into the session.
    async fn inject_input(&self, handle: &str, text: &str) -> Result<(), BackendError>;

    /// Human instructions for attaching a terminal to the session.
    fn attach_instructions(&self, handle: &str) -> String;
}
