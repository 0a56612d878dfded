// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identifier, lifecycle states, and the legal-transition table.
//!
//! A session is one supervised process attempt bound to a workspace. Its
//! state lives in a per-session file on disk; every mutation goes through
//! the engine's state machine, which consults [`SessionState::can_transition_to`]
//! before committing.

use serde::{Deserialize, Serialize};
use std::fmt;

crate::id::string_id! {
    /// Unique identifier for a session.
    ///
    /// Opaque to consumers; in practice a UUID allocated by the manager.
    /// Stable across process restarts: the id is the name of the session's
    /// state directory.
    SessionId
}

/// How a session's process is launched and observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Process runs inside a tmux session; screen capture and input
    /// injection are available.
    #[default]
    Tmux,
    /// Process runs as a direct child in its own process group; no screen,
    /// no input injection.
    Local,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Tmux => write!(f, "tmux"),
            BackendKind::Local => write!(f, "local"),
        }
    }
}

/// Lifecycle state of a session.
///
/// `Stopped`, `Completed`, `Failed`, and `Orphaned` are terminal: once a
/// session reaches one of them no further transition is legal.
///
/// Older state files may contain `"working"` or `"idle"`; both deserialize
/// as `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Session record exists but nothing has been launched yet.
    /// The absence of a state file also reads as this state.
    #[default]
    Created,
    /// `start()` accepted; the backend is launching the process.
    Starting,
    /// Backend reports the process alive.
    #[serde(alias = "working", alias = "idle")]
    Running,
    /// `stop()` accepted; graceful shutdown in progress.
    Stopping,
    /// Graceful shutdown confirmed.
    Stopped,
    /// Process exited with code 0.
    Completed,
    /// Process exited non-zero, vanished, or had to be killed.
    Failed,
    /// The session's workspace directory disappeared.
    Orphaned,
}

impl SessionState {
    /// Whether this state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Stopped
                | SessionState::Completed
                | SessionState::Failed
                | SessionState::Orphaned
        )
    }

    /// The legal-transition table.
    ///
    /// Self-transitions are not legal; terminal states admit nothing.
    pub fn can_transition_to(&self, to: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, to),
            (Created, Starting)
                | (Created, Failed)
                | (Created, Orphaned)
                | (Starting, Running)
                | (Starting, Failed)
                | (Starting, Orphaned)
                | (Running, Stopping)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Orphaned)
                | (Stopping, Stopped)
                | (Stopping, Failed)
        )
    }

    /// Canonical on-disk spelling of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Starting => "starting",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
            SessionState::Orphaned => "orphaned",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
