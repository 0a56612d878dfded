// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::manager::{CreateSpec, SessionManager};
use amux_adapters::FakeBackend;
use amux_core::{
    AgentDef, AgentId, AgentTable, BackendKind, CountingIds, FakeClock, Workspace, WorkspaceId,
};
use amux_storage::{SemaphoreStore, StateStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub(crate) struct TestRig {
    pub dir: tempfile::TempDir,
    pub manager: SessionManager<FakeClock, CountingIds>,
    pub backend: FakeBackend,
    pub clock: FakeClock,
    pub cancel: CancellationToken,
}

pub(crate) fn rig() -> TestRig {
    let dir = tempfile::tempdir().expect("tempdir");
    let clock = FakeClock::default();
    let store = StateStore::new(dir.path().join("state"));
    let semaphores = SemaphoreStore::with_clock(clock.clone());

    let mut agents = AgentTable::default();
    agents.insert(
        "claude",
        AgentDef {
            command: Some("claude".to_string()),
            env: [("MODEL".to_string(), "default".to_string())].into(),
            shell: None,
        },
    );

    let backend = FakeBackend::new();
    let mut manager = SessionManager::new(
        store,
        semaphores,
        agents,
        clock.clone(),
        CountingIds::new("sess"),
    );
    manager.register_backend(Arc::new(backend.clone()));

    TestRig {
        dir,
        manager,
        backend,
        clock,
        cancel: CancellationToken::new(),
    }
}

impl TestRig {
    /// Create a workspace directory on disk and return its metadata.
    pub fn workspace(&self, id: &str) -> Workspace {
        let path = self.dir.path().join("workspaces").join(id);
        std::fs::create_dir_all(&path).expect("workspace dir");
        Workspace::new(WorkspaceId::new(id), path, format!("amux/{id}"))
    }

    pub fn create_spec(&self, workspace: &Workspace) -> CreateSpec {
        CreateSpec {
            workspace: workspace.clone(),
            agent: AgentId::new("claude"),
            backend: BackendKind::Tmux,
            command: None,
            env: Vec::new(),
            initial_prompt: None,
            window_name: None,
            detached: true,
        }
    }
}
