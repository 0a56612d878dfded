// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error taxonomy.

use amux_adapters::BackendError;
use amux_core::SessionState;
use amux_storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the session engine and workspace registry.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    /// The state machine rejected a transition.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },

    /// Non-forced removal refused; carries one human-readable line per
    /// holder for display.
    #[error("workspace in use by: {}", holders.join("; "))]
    WorkspaceInUse { holders: Vec<String> },

    /// Operation illegal in the session's current state (removing a
    /// running session, starting an orphan, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("state store: {0}")]
    Storage(#[from] StorageError),

    #[error("backend: {0}")]
    Backend(#[from] BackendError),
}

impl EngineError {
    /// Whether this error is the lock-contention/timeout family that a
    /// caller may meaningfully retry.
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            EngineError::Storage(StorageError::LockContended { .. })
                | EngineError::Storage(StorageError::Cancelled)
        )
    }
}
