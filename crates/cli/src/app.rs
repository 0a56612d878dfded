// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI wiring: state directory resolution, config loading, and the
//! assembled engine values.
//!
//! Everything the engine needs is constructed here and nowhere else; the
//! command handlers receive an [`App`] and never touch paths or config
//! themselves.

use amux_adapters::{LocalBackend, TmuxBackend};
use amux_core::{AgentTable, RandomIds, SystemClock, Workspace, WorkspaceId};
use amux_engine::{FsWorktreeOps, Reconciler, SessionManager, WorkspaceRegistry};
use amux_storage::{SemaphoreStore, StateStore};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

pub struct App {
    pub manager: SessionManager<SystemClock, RandomIds>,
    pub registry: WorkspaceRegistry<SystemClock>,
    pub state_dir: PathBuf,
    workspaces_path: PathBuf,
}

impl App {
    pub fn load(state_dir_override: Option<PathBuf>) -> Result<Self> {
        let state_dir = match state_dir_override {
            Some(dir) => dir,
            None => default_state_dir()?,
        };
        std::fs::create_dir_all(&state_dir)
            .with_context(|| format!("creating state directory {}", state_dir.display()))?;

        let agents = load_agents()?;
        let store = StateStore::new(state_dir.join("sessions"));
        let semaphores = SemaphoreStore::new();

        let mut manager =
            SessionManager::new(store.clone(), semaphores.clone(), agents, SystemClock, RandomIds);
        manager.register_backend(Arc::new(TmuxBackend::new()));
        manager.register_backend(Arc::new(LocalBackend::new()));

        let reconciler = Reconciler::new(store, semaphores, SystemClock);
        let registry = WorkspaceRegistry::new(reconciler, Arc::new(FsWorktreeOps));

        let workspaces_path = state_dir.join("workspaces.json");
        for workspace in load_workspaces(&workspaces_path)? {
            registry.add(workspace);
        }

        Ok(Self {
            manager,
            registry,
            state_dir,
            workspaces_path,
        })
    }

    /// Persist the registry's workspace list.
    pub fn save_workspaces(&self) -> Result<()> {
        let workspaces = self.registry.list();
        let bytes = serde_json::to_vec_pretty(&workspaces)?;
        std::fs::write(&self.workspaces_path, bytes)
            .with_context(|| format!("writing {}", self.workspaces_path.display()))?;
        Ok(())
    }

    /// Resolve a workspace by exact id or unambiguous prefix.
    pub fn find_workspace(&self, query: &str) -> Result<Workspace> {
        let all = self.registry.list();
        if let Some(exact) = all.iter().find(|w| w.id == WorkspaceId::new(query)) {
            return Ok(exact.clone());
        }
        let mut matches = all.iter().filter(|w| w.id.has_prefix(query));
        match (matches.next(), matches.next()) {
            (Some(workspace), None) => Ok(workspace.clone()),
            (Some(_), Some(_)) => anyhow::bail!("workspace id prefix {query:?} is ambiguous"),
            (None, _) => anyhow::bail!("no workspace matching {query:?}"),
        }
    }
}

fn default_state_dir() -> Result<PathBuf> {
    // AMUX_STATE_DIR takes priority (used by tests for isolation)
    if let Ok(dir) = std::env::var("AMUX_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }

    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("amux"));
    }

    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".local/state/amux"))
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("AMUX_CONFIG") {
        return Some(PathBuf::from(path));
    }
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join("amux/config.toml"));
    }
    std::env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config/amux/config.toml"))
}

fn load_agents() -> Result<AgentTable> {
    let Some(path) = config_path() else {
        return Ok(AgentTable::default());
    };
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(AgentTable::default()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    AgentTable::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn load_workspaces(path: &PathBuf) -> Result<Vec<Workspace>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    serde_json::from_slice(&bytes).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
