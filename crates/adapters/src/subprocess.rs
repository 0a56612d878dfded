// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for tmux control commands.
pub const TMUX_TIMEOUT: Duration = Duration::from_secs(10);

/// Settle period between injecting the command and injecting the initial
/// prompt. tmux buffers keystrokes, so the prompt survives even when the
/// inner shell is not ready yet; the pause only keeps the two sends in
/// order on slow machines.
pub const PROMPT_SETTLE: Duration = Duration::from_millis(100);

/// How long the exit-status side-channel gets to appear on disk after the
/// `echo $?` injection.
pub const EXIT_STATUS_SETTLE: Duration = Duration::from_millis(200);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
