// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux process backend.
//!
//! The handle is the tmux session name, generated from the workspace id,
//! agent id, and spawn epoch so two spawns can never collide. The command
//! is injected as literal keystrokes rather than passed to `new-session`,
//! which leaves an interactive shell behind when the command exits and
//! makes the pane usable for follow-up input.

use super::{BackendError, Liveness, ProcessBackend, SpawnHandle, SpawnSpec};
use crate::subprocess::{run_with_timeout, EXIT_STATUS_SETTLE, PROMPT_SETTLE, TMUX_TIMEOUT};
use amux_core::BackendKind;
use async_trait::async_trait;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::process::Command;

/// Tmux-based session backend
#[derive(Clone, Default)]
pub struct TmuxBackend;

impl TmuxBackend {
    pub fn new() -> Self {
        Self
    }

    /// Collision-free session name: workspace, agent, and spawn epoch.
    fn session_name(spec: &SpawnSpec) -> String {
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        format!(
            "amux-{}-{}-{}",
            spec.workspace_id.abbrev(8),
            spec.agent_id,
            epoch
        )
    }

    async fn tmux(&self, args: &[&str], description: &str) -> Result<std::process::Output, BackendError> {
        let mut cmd = Command::new("tmux");
        cmd.args(args);
        run_with_timeout(cmd, TMUX_TIMEOUT, description)
            .await
            .map_err(BackendError::CommandFailed)
    }

    async fn send_literal(&self, handle: &str, text: &str) -> Result<(), BackendError> {
        // -l = literal mode (no key name interpretation)
        // -- = end of options (handles text starting with -)
        let output = self
            .tmux(&["send-keys", "-t", handle, "-l", "--", text], "tmux send-keys")
            .await?;
        if !output.status.success() {
            return Err(BackendError::NotFound(handle.to_string()));
        }
        Ok(())
    }

    async fn send_enter(&self, handle: &str) -> Result<(), BackendError> {
        let output = self
            .tmux(&["send-keys", "-t", handle, "Enter"], "tmux send-keys")
            .await?;
        if !output.status.success() {
            return Err(BackendError::NotFound(handle.to_string()));
        }
        Ok(())
    }

    async fn has_session(&self, handle: &str) -> Result<bool, BackendError> {
        let output = self
            .tmux(&["has-session", "-t", handle], "tmux has-session")
            .await?;
        Ok(output.status.success())
    }

    /// `#{pane_dead}` for the session's pane, or None when the query fails.
    async fn pane_dead(&self, handle: &str) -> Result<Option<bool>, BackendError> {
        let output = self
            .tmux(
                &["display-message", "-t", handle, "-p", "#{pane_dead}"],
                "tmux display-message",
            )
            .await?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(
            String::from_utf8_lossy(&output.stdout).trim() == "1",
        ))
    }

    /// Exit code of a dead pane via `#{pane_dead_status}`, when tmux has it.
    async fn pane_dead_status(&self, handle: &str) -> Result<Option<i32>, BackendError> {
        let output = self
            .tmux(
                &["display-message", "-t", handle, "-p", "#{pane_dead_status}"],
                "tmux display-message",
            )
            .await?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().parse().ok())
    }

    async fn pane_pid(&self, handle: &str) -> Result<Option<u32>, BackendError> {
        let output = self
            .tmux(
                &["list-panes", "-t", handle, "-F", "#{pane_pid}"],
                "tmux list-panes",
            )
            .await?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().parse().ok())
    }

    /// Whether the pane's shell still has child processes. When it has
    /// none, the inner command has exited and only the shell remains.
    async fn has_descendants(&self, pid: u32) -> Result<bool, BackendError> {
        let mut cmd = Command::new("pgrep");
        cmd.args(["-P", &pid.to_string()]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "pgrep")
            .await
            .map_err(BackendError::CommandFailed)?;
        Ok(output.status.success())
    }

    /// Ask the inner shell to write `$?` into the side-channel file, give
    /// it a moment, and read the result back.
    async fn capture_exit_status(
        &self,
        handle: &str,
        exit_status_path: &Path,
    ) -> Result<Option<i32>, BackendError> {
        let command = format!("echo $? > {}", exit_status_path.display());
        self.send_literal(handle, &command).await?;
        self.send_enter(handle).await?;
        tokio::time::sleep(EXIT_STATUS_SETTLE).await;

        match std::fs::read_to_string(exit_status_path) {
            Ok(content) => match content.trim().parse::<i32>() {
                Ok(code) => Ok(Some(code)),
                Err(e) => {
                    tracing::warn!(
                        handle,
                        content = content.trim(),
                        error = %e,
                        "unparseable exit status from side-channel"
                    );
                    Ok(None)
                }
            },
            Err(e) => {
                tracing::warn!(handle, error = %e, "exit status side-channel never appeared");
                Ok(None)
            }
        }
    }

    /// Post-create setup: size the window, type the command, then the
    /// initial prompt after a settle period. tmux buffers the keystrokes,
    /// so the prompt is not lost even if the inner shell is still booting.
    async fn inject_startup(&self, handle: &str, spec: &SpawnSpec) -> Result<(), BackendError> {
        // Match the pane to the invoking terminal so full-screen agents
        // render correctly from the first frame.
        if let (Ok(cols), Ok(rows)) = (std::env::var("COLUMNS"), std::env::var("LINES")) {
            let _ = self
                .tmux(
                    &["resize-window", "-t", handle, "-x", &cols, "-y", &rows],
                    "tmux resize-window",
                )
                .await;
        }

        self.send_literal(handle, &spec.command).await?;
        self.send_enter(handle).await?;

        if let Some(prompt) = &spec.initial_prompt {
            tokio::time::sleep(PROMPT_SETTLE).await;
            self.send_literal(handle, prompt).await?;
            self.send_enter(handle).await?;
        }
        Ok(())
    }

    async fn check_available(&self) -> Result<(), BackendError> {
        let mut cmd = Command::new("tmux");
        cmd.arg("-V");
        match run_with_timeout(cmd, TMUX_TIMEOUT, "tmux -V").await {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(BackendError::Unavailable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )),
            Err(e) => Err(BackendError::Unavailable(e)),
        }
    }
}

#[async_trait]
impl ProcessBackend for TmuxBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Tmux
    }

    async fn spawn(&self, spec: &SpawnSpec) -> Result<SpawnHandle, BackendError> {
        // Precondition: cwd must exist
        if !spec.cwd.exists() {
            return Err(BackendError::LaunchFailed(format!(
                "working directory does not exist: {}",
                spec.cwd.display()
            )));
        }
        self.check_available().await?;

        let handle = Self::session_name(spec);

        // A leftover session with the same name means a previous epoch
        // collision or crashed spawn; replace it.
        if self.has_session(&handle).await.unwrap_or(false) {
            tracing::warn!(handle, "session already exists, killing first");
            let _ = self.tmux(&["kill-session", "-t", &handle], "tmux kill-session").await;
        }

        let mut cmd = Command::new("tmux");
        cmd.arg("new-session")
            .arg("-d")
            .arg("-s")
            .arg(&handle)
            .arg("-c")
            .arg(&spec.cwd);

        for (key, value) in &spec.env {
            cmd.arg("-e").arg(format!("{}={}", key, value));
        }

        if let Some(window) = &spec.window_name {
            cmd.arg("-n").arg(window);
        }

        // Start the configured shell (or the account default) rather than
        // the command itself; the command goes in as keystrokes below.
        if let Some(shell) = &spec.shell {
            cmd.arg(shell);
        }

        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux new-session")
            .await
            .map_err(BackendError::LaunchFailed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(handle, stderr = %stderr, "tmux spawn failed");
            return Err(BackendError::LaunchFailed(stderr.to_string()));
        }

        if let Err(e) = self.inject_startup(&handle, spec).await {
            // The session exists but never got its command; tear it down.
            // Cleanup failures are logged, the launch error is what the
            // caller sees.
            let _ = self.kill(&handle).await;
            return Err(e);
        }

        let pid = self.pane_pid(&handle).await.unwrap_or(None);
        Ok(SpawnHandle { handle, pid })
    }

    async fn signal(&self, _handle: &str, _graceful: bool) -> Result<bool, BackendError> {
        // Graceful stop is a no-op for tmux: the session keeps running
        // until `kill` destroys it.
        Ok(false)
    }

    async fn kill(&self, handle: &str) -> Result<(), BackendError> {
        let output = self
            .tmux(&["kill-session", "-t", handle], "tmux kill-session")
            .await?;
        if !output.status.success() {
            // Session might already be dead, which is fine
        }
        Ok(())
    }

    async fn alive(
        &self,
        handle: &str,
        exit_status_path: &Path,
    ) -> Result<Liveness, BackendError> {
        if !self.has_session(handle).await? {
            return Ok(Liveness::HandleGone);
        }

        if self.pane_dead(handle).await? == Some(true) {
            let exit_code = self.pane_dead_status(handle).await?;
            return Ok(Liveness::ShellDead { exit_code });
        }

        // Shell alive with no children: the inner command has exited and
        // the exit code is only recoverable through the side-channel.
        if let Some(pid) = self.pane_pid(handle).await? {
            if !self.has_descendants(pid).await? {
                let exit_code = self.capture_exit_status(handle, exit_status_path).await?;
                return Ok(Liveness::Dead { exit_code });
            }
        }

        Ok(Liveness::Alive)
    }

    async fn read_screen(&self, handle: &str, max_lines: u32) -> Result<String, BackendError> {
        let start = format!("-{}", max_lines);
        let output = self
            .tmux(
                &["capture-pane", "-t", handle, "-p", "-S", &start],
                "tmux capture-pane",
            )
            .await?;
        if !output.status.success() {
            return Err(BackendError::NotFound(handle.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn inject_input(&self, handle: &str, text: &str) -> Result<(), BackendError> {
        self.send_literal(handle, text).await?;
        self.send_enter(handle).await
    }

    fn attach_instructions(&self, handle: &str) -> String {
        format!("tmux attach-session -t {}", handle)
    }
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
