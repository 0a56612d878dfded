// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local process backend.
//!
//! Runs the command as a direct child in its own process group so that a
//! graceful stop can signal the whole tree, not just the leader. There is
//! no screen and no input injection; liveness comes straight from the
//! child's wait status.
//!
//! The handle is `local:<pid>`. After a supervisor restart the child (if
//! spawned detached) is no longer in this backend's table; probes then
//! fall back to a signal-0 existence check, which can report the process
//! gone but not its exit code.

use super::{BackendError, Liveness, ProcessBackend, SpawnHandle, SpawnSpec};
use amux_core::BackendKind;
use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};

/// Grace period between SIGTERM and SIGKILL on a graceful stop.
pub const STOP_GRACE: Duration = Duration::from_secs(5);

const STOP_POLL: Duration = Duration::from_millis(100);

struct LocalChild {
    child: Child,
    pgid: Pid,
    /// `None` while running; `Some(code)` once reaped (code itself may be
    /// unknown if the wait status carried neither code nor signal).
    exited: Option<Option<i32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildStatus {
    Running,
    Exited(Option<i32>),
}

/// Direct-child session backend.
#[derive(Clone)]
pub struct LocalBackend {
    children: Arc<Mutex<HashMap<String, LocalChild>>>,
    grace: Duration,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self {
            children: Arc::new(Mutex::new(HashMap::new())),
            grace: STOP_GRACE,
        }
    }

    /// Override the stop grace period (tests).
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    fn handle_for(pid: u32) -> String {
        format!("local:{}", pid)
    }

    fn pid_from_handle(handle: &str) -> Result<Pid, BackendError> {
        handle
            .strip_prefix("local:")
            .and_then(|raw| raw.parse::<i32>().ok())
            .map(Pid::from_raw)
            .ok_or_else(|| BackendError::NotFound(handle.to_string()))
    }

    /// Non-blocking reap; records the exit code the first time the child
    /// is seen exited. `None` when the handle is not in our table.
    fn probe_child(&self, handle: &str) -> Option<ChildStatus> {
        let mut children = self.children.lock();
        let entry = children.get_mut(handle)?;
        if let Some(code) = entry.exited {
            return Some(ChildStatus::Exited(code));
        }
        match entry.child.try_wait() {
            Ok(Some(status)) => {
                let code = wait_status_code(&status);
                entry.exited = Some(code);
                Some(ChildStatus::Exited(code))
            }
            Ok(None) => Some(ChildStatus::Running),
            Err(e) => {
                tracing::warn!(handle, error = %e, "try_wait failed");
                Some(ChildStatus::Running)
            }
        }
    }

    /// Whether the process behind the handle is gone, covering both our
    /// own children and survivors of a previous supervisor.
    fn is_down(&self, handle: &str) -> bool {
        match self.probe_child(handle) {
            Some(ChildStatus::Exited(_)) => true,
            Some(ChildStatus::Running) => false,
            None => match Self::pid_from_handle(handle) {
                Ok(pid) => matches!(
                    nix::sys::signal::kill(pid, None),
                    Err(nix::errno::Errno::ESRCH)
                ),
                Err(_) => true,
            },
        }
    }

    fn signal_group(&self, handle: &str, signal: Signal) -> Result<(), BackendError> {
        let pgid = {
            let children = self.children.lock();
            match children.get(handle) {
                Some(entry) => entry.pgid,
                // Child of a previous supervisor: the spawn put it in its
                // own group, so the group id is the pid.
                None => Self::pid_from_handle(handle)?,
            }
        };
        match killpg(pgid, signal) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(BackendError::CommandFailed(format!(
                "killpg({}, {}) failed: {}",
                pgid, signal, e
            ))),
        }
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn wait_status_code(status: &std::process::ExitStatus) -> Option<i32> {
    match status.code() {
        Some(code) => Some(code),
        None => {
            // Killed by signal; report 128+signum the way shells do.
            use std::os::unix::process::ExitStatusExt;
            status.signal().map(|sig| 128 + sig)
        }
    }
}

#[async_trait]
impl ProcessBackend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn spawn(&self, spec: &SpawnSpec) -> Result<SpawnHandle, BackendError> {
        if !spec.cwd.exists() {
            return Err(BackendError::LaunchFailed(format!(
                "working directory does not exist: {}",
                spec.cwd.display()
            )));
        }

        let shell = spec.shell.as_deref().unwrap_or("/bin/sh");
        let mut cmd = Command::new(shell);
        cmd.arg("-c")
            .arg(&spec.command)
            .current_dir(&spec.cwd)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .process_group(0);

        if spec.detached {
            // Discarded stdio so a detached child can never block on a
            // full pipe once the supervisor is gone.
            cmd.stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(false);
        } else {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .kill_on_drop(true);
        }

        let child = cmd
            .spawn()
            .map_err(|e| BackendError::LaunchFailed(e.to_string()))?;

        let Some(pid) = child.id() else {
            return Err(BackendError::LaunchFailed(
                "child exited before a pid could be observed".to_string(),
            ));
        };

        let handle = Self::handle_for(pid);
        self.children.lock().insert(
            handle.clone(),
            LocalChild {
                child,
                // process_group(0) makes the child the leader of a fresh
                // group whose id is its own pid.
                pgid: Pid::from_raw(pid as i32),
                exited: None,
            },
        );

        tracing::debug!(handle, command = %spec.command, "spawned local child");
        Ok(SpawnHandle {
            handle,
            pid: Some(pid),
        })
    }

    async fn signal(&self, handle: &str, graceful: bool) -> Result<bool, BackendError> {
        if !graceful {
            self.signal_group(handle, Signal::SIGKILL)?;
            return Ok(true);
        }

        self.signal_group(handle, Signal::SIGTERM)?;

        let deadline = tokio::time::Instant::now() + self.grace;
        while tokio::time::Instant::now() < deadline {
            if self.is_down(handle) {
                return Ok(false);
            }
            tokio::time::sleep(STOP_POLL).await;
        }

        tracing::warn!(handle, grace = ?self.grace, "grace period elapsed, escalating to SIGKILL");
        self.signal_group(handle, Signal::SIGKILL)?;
        Ok(true)
    }

    async fn kill(&self, handle: &str) -> Result<(), BackendError> {
        self.signal_group(handle, Signal::SIGKILL)
    }

    async fn alive(
        &self,
        handle: &str,
        _exit_status_path: &Path,
    ) -> Result<Liveness, BackendError> {
        match self.probe_child(handle) {
            Some(ChildStatus::Exited(exit_code)) => Ok(Liveness::Dead { exit_code }),
            Some(ChildStatus::Running) => Ok(Liveness::Alive),
            None => {
                // Not ours: existence check only.
                let pid = Self::pid_from_handle(handle)?;
                match nix::sys::signal::kill(pid, None) {
                    Ok(()) => Ok(Liveness::Alive),
                    Err(nix::errno::Errno::ESRCH) => Ok(Liveness::HandleGone),
                    Err(e) => Err(BackendError::CommandFailed(format!(
                        "kill({}, 0) failed: {}",
                        pid, e
                    ))),
                }
            }
        }
    }

    async fn read_screen(&self, _handle: &str, _max_lines: u32) -> Result<String, BackendError> {
        // No terminal to capture.
        Ok(String::new())
    }

    async fn inject_input(&self, _handle: &str, _text: &str) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("input injection", self.kind()))
    }

    fn attach_instructions(&self, handle: &str) -> String {
        format!("{} runs as a direct child process; attach is not supported", handle)
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
