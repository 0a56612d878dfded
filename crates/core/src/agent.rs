// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent definitions.
//!
//! An agent names a launch profile: the command template a session runs,
//! the default environment it gets, and an optional shell override. Agents
//! are declared in the user's config file:
//!
//! ```toml
//! [agents.claude]
//! command = "claude"
//! shell = "/bin/bash"
//!
//! [agents.claude.env]
//! CLAUDE_DANGEROUS_SKIP_PERMISSIONS = "1"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

crate::id::string_id! {
    /// Name of an agent profile (e.g. `claude`, `codex`, `shell`).
    AgentId
}

/// Launch defaults for one agent profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDef {
    /// Command to run. Sessions may override this per invocation.
    #[serde(default)]
    pub command: Option<String>,
    /// Environment exported to the session before caller-supplied vars.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Shell the multiplexed backend starts the command under.
    #[serde(default)]
    pub shell: Option<String>,
}

/// Errors from parsing an agent table.
#[derive(Debug, Error)]
pub enum AgentConfigError {
    #[error("invalid agent config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// All configured agent profiles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTable {
    #[serde(default)]
    agents: HashMap<String, AgentDef>,
}

impl AgentTable {
    /// Parse from config file contents.
    pub fn from_toml_str(input: &str) -> Result<Self, AgentConfigError> {
        Ok(toml::from_str(input)?)
    }

    /// Look up an agent profile by id.
    ///
    /// Unknown agents resolve to an empty default profile: a session can
    /// always be launched with an explicit command even when no profile
    /// is configured for its agent.
    pub fn get(&self, id: &AgentId) -> AgentDef {
        self.agents.get(id.as_str()).cloned().unwrap_or_default()
    }

    /// Insert or replace a profile (used by tests and programmatic setup).
    pub fn insert(&mut self, id: impl Into<String>, def: AgentDef) {
        self.agents.insert(id.into(), def);
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
