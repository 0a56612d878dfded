//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Returns the path to the amux binary.
///
/// Resolves relative to the test binary itself when CARGO_MANIFEST_DIR is
/// stale (e.g. compiled by a removed worktree into a shared target
/// directory).
fn amux_binary() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let standard = manifest_dir.join("target/debug/amux");
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>, so its
    // grandparent is target/debug/ where amux is built.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join("amux");
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// One isolated scenario: its own state dir and a workspace directory.
pub struct Scratch {
    pub dir: tempfile::TempDir,
}

impl Scratch {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    /// Create a workspace directory on disk (the "worktree checkout").
    pub fn workspace_dir(&self, id: &str) -> PathBuf {
        let path = self.dir.path().join("worktrees").join(id);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    /// Run amux with this scenario's state dir.
    pub fn amux(&self, args: &[&str]) -> Output {
        Command::new(amux_binary())
            .env("AMUX_STATE_DIR", self.state_dir())
            .env_remove("AMUX_CONFIG")
            .args(args)
            .output()
            .expect("amux binary should run")
    }

    /// Run amux and require success, returning stdout.
    pub fn amux_ok(&self, args: &[&str]) -> String {
        let output = self.amux(args);
        assert!(
            output.status.success(),
            "amux {:?} failed\nstdout: {}\nstderr: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    /// Run amux and require failure, returning stderr.
    pub fn amux_err(&self, args: &[&str]) -> String {
        let output = self.amux(args);
        assert!(
            !output.status.success(),
            "amux {:?} unexpectedly succeeded\nstdout: {}",
            args,
            String::from_utf8_lossy(&output.stdout),
        );
        String::from_utf8_lossy(&output.stderr).to_string()
    }

    /// Register a workspace and return its checkout path.
    pub fn add_workspace(&self, id: &str) -> PathBuf {
        let path = self.workspace_dir(id);
        self.amux_ok(&["ws", "add", id, path.to_str().unwrap(), "--branch", "main"]);
        path
    }

    /// Poll `session status <id>` until it reports a terminal state.
    pub fn wait_terminal(&self, session: &str, max_ms: u64) -> String {
        let started = std::time::Instant::now();
        loop {
            let output = self.amux(&["session", "status", session, "--fresh"]);
            let stdout = String::from_utf8_lossy(&output.stdout).to_string();
            for terminal in ["stopped", "completed", "failed", "orphaned"] {
                if stdout.contains(&format!("state: {terminal}")) {
                    return stdout;
                }
            }
            assert!(
                started.elapsed().as_millis() < max_ms as u128,
                "session {session} never reached a terminal state; last status:\n{stdout}"
            );
            std::thread::sleep(std::time::Duration::from_millis(100));
        }
    }
}
