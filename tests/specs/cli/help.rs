//! CLI surface specs.

use crate::prelude::Scratch;

#[test]
fn help_lists_the_command_groups() {
    let scratch = Scratch::new();
    let output = scratch.amux(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("session"));
    assert!(stdout.contains("ws"));
}

#[test]
fn session_help_lists_lifecycle_commands() {
    let scratch = Scratch::new();
    let output = scratch.amux(&["session", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["run", "status", "stop", "list", "attach", "remove"] {
        assert!(stdout.contains(command), "missing {command} in:\n{stdout}");
    }
}

#[test]
fn unknown_subcommand_fails() {
    let scratch = Scratch::new();
    let output = scratch.amux(&["frobnicate"]);
    assert!(!output.status.success());
}

#[test]
fn unknown_session_is_reported_as_not_found() {
    let scratch = Scratch::new();
    let stderr = scratch.amux_err(&["session", "status", "no-such-session"]);
    assert!(stderr.contains("not found"), "stderr was: {stderr}");
}

#[test]
fn unknown_workspace_is_reported() {
    let scratch = Scratch::new();
    let stderr = scratch.amux_err(&["session", "run", "--ws", "missing", "--", "true"]);
    assert!(stderr.contains("no workspace"), "stderr was: {stderr}");
}
