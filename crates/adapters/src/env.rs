// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session environment assembly.
//!
//! Merge order is fixed: agent profile defaults first, caller-supplied
//! variables second, AMUX identification variables last. Later entries win
//! on key collisions, so callers can override agent defaults but nothing
//! can shadow the identification of the session itself.

use amux_core::{AgentId, SessionId, Workspace};
use std::collections::BTreeMap;

/// Build the full environment for a session's process.
pub fn merged_env(
    agent_env: &BTreeMap<String, String>,
    caller_env: &[(String, String)],
    workspace: &Workspace,
    session_id: &SessionId,
    agent_id: &AgentId,
) -> Vec<(String, String)> {
    let mut merged: BTreeMap<String, String> = agent_env.clone();
    for (key, value) in caller_env {
        merged.insert(key.clone(), value.clone());
    }

    merged.insert("AMUX_WORKSPACE_ID".to_string(), workspace.id.to_string());
    merged.insert(
        "AMUX_WORKSPACE_PATH".to_string(),
        workspace.path.display().to_string(),
    );
    merged.insert("AMUX_SESSION_ID".to_string(), session_id.to_string());
    merged.insert("AMUX_AGENT_ID".to_string(), agent_id.to_string());

    merged.into_iter().collect()
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
