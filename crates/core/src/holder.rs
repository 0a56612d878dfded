// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace semaphore holder records.
//!
//! A holder is one live reference to a workspace: either a session bound to
//! it, or an interactive CLI currently operating on it. Holders live in the
//! workspace's semaphore file and block non-forced removal while present.

use crate::{SessionId, WorkspaceId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wall-clock lease for interactive-cli holders. Session holders never
/// expire by time; their validity tracks the referenced session.
pub const INTERACTIVE_CLI_LEASE: Duration = Duration::minutes(5);

/// What kind of referent a holder represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HolderKind {
    /// A session bound to the workspace; valid while the session exists
    /// and is non-terminal.
    Session,
    /// An interactive CLI invocation; valid for [`INTERACTIVE_CLI_LEASE`].
    InteractiveCli,
    /// Anything written by a newer or older version we don't recognize.
    /// Always treated as stale by reconciliation.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for HolderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HolderKind::Session => write!(f, "session"),
            HolderKind::InteractiveCli => write!(f, "interactive-cli"),
            HolderKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// One entry in a workspace's semaphore file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    /// Unique per acquire within one workspace's list.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: HolderKind,
    /// Referenced session, for `HolderKind::Session` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub workspace_id: WorkspaceId,
    /// When the holder was acquired.
    pub timestamp: DateTime<Utc>,
    /// Free-form, shown to operators when removal is refused.
    pub description: String,
}

impl Holder {
    /// Build a session holder. The holder id is the session id, which makes
    /// acquire and release idempotent across handler replays.
    pub fn for_session(
        session_id: impl Into<SessionId>,
        workspace_id: impl Into<WorkspaceId>,
        description: impl Into<String>,
    ) -> Self {
        let session_id = session_id.into();
        Self {
            id: session_id.to_string(),
            kind: HolderKind::Session,
            session_id: Some(session_id),
            workspace_id: workspace_id.into(),
            timestamp: DateTime::<Utc>::MIN_UTC,
            description: description.into(),
        }
    }

    /// Build an interactive-cli holder with a fresh unique id.
    pub fn for_interactive_cli(
        holder_id: impl Into<String>,
        workspace_id: impl Into<WorkspaceId>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: holder_id.into(),
            kind: HolderKind::InteractiveCli,
            session_id: None,
            workspace_id: workspace_id.into(),
            timestamp: DateTime::<Utc>::MIN_UTC,
            description: description.into(),
        }
    }

    /// Whether a time-based lease applies and has run out.
    ///
    /// Only interactive-cli holders carry a lease.
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.kind == HolderKind::InteractiveCli && now - self.timestamp > INTERACTIVE_CLI_LEASE
    }

    /// Human-readable one-liner for `WorkspaceInUse` reports.
    pub fn describe(&self) -> String {
        match (&self.kind, &self.session_id) {
            (HolderKind::Session, Some(sid)) => {
                format!("session {} ({})", sid, self.description)
            }
            _ => format!("{} {} ({})", self.kind, self.id, self.description),
        }
    }
}

#[cfg(test)]
#[path = "holder_tests.rs"]
mod tests;
