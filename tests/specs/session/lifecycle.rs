//! Session lifecycle specs against the local backend.

use crate::prelude::Scratch;

#[test]
fn successful_command_completes_with_exit_zero() {
    let scratch = Scratch::new();
    scratch.add_workspace("ws-ok");

    let stdout = scratch.amux_ok(&[
        "session", "run", "--ws", "ws-ok", "--backend", "local", "--wait", "--", "true",
    ]);

    assert!(stdout.contains("state: completed"), "stdout was: {stdout}");
    assert!(stdout.contains("exit code: 0"), "stdout was: {stdout}");

    // The workspace holder was released on completion.
    let list = scratch.amux_ok(&["ws", "list"]);
    assert!(list.contains("free"), "ws list was: {list}");
}

#[test]
fn failing_command_fails_with_its_exit_code() {
    let scratch = Scratch::new();
    scratch.add_workspace("ws-fail");

    let output = scratch.amux(&[
        "session", "run", "--ws", "ws-fail", "--backend", "local", "--wait", "--", "exit 7",
    ]);

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("state: failed"), "stdout was: {stdout}");
    assert!(stdout.contains("exit code: 7"), "stdout was: {stdout}");
    assert!(stdout.contains("7"), "stdout was: {stdout}");
}

#[test]
fn stopped_at_follows_started_at() {
    let scratch = Scratch::new();
    scratch.add_workspace("ws-times");

    let stdout = scratch.amux_ok(&[
        "session", "run", "--ws", "ws-times", "--backend", "local", "--wait", "--", "true",
    ]);

    let started = stdout
        .lines()
        .find_map(|l| l.strip_prefix("started: "))
        .expect("started line");
    let stopped = stdout
        .lines()
        .find_map(|l| l.strip_prefix("stopped: "))
        .expect("stopped line");
    // RFC 3339 timestamps compare correctly as strings.
    assert!(stopped >= started, "stopped {stopped} < started {started}");
}

#[test]
fn status_resolves_by_short_index() {
    let scratch = Scratch::new();
    scratch.add_workspace("ws-index");
    scratch.amux_ok(&[
        "session", "run", "--ws", "ws-index", "--backend", "local", "--wait", "--", "true",
    ]);

    let stdout = scratch.amux_ok(&["session", "status", "1"]);
    assert!(stdout.contains("state: completed"), "stdout was: {stdout}");
}

#[test]
fn list_shows_the_session() {
    let scratch = Scratch::new();
    scratch.add_workspace("ws-list");
    scratch.amux_ok(&[
        "session", "run", "--ws", "ws-list", "--backend", "local", "--wait", "--", "true",
    ]);

    let stdout = scratch.amux_ok(&["session", "list"]);
    assert!(stdout.contains("completed"), "stdout was: {stdout}");
    assert!(stdout.contains("ws-list"), "stdout was: {stdout}");
}

#[test]
fn remove_refuses_running_sessions_then_accepts_terminal_ones() {
    let scratch = Scratch::new();
    scratch.add_workspace("ws-rm");

    scratch.amux_ok(&[
        "session", "run", "--ws", "ws-rm", "--backend", "local", "--", "sleep 2",
    ]);

    let stderr = scratch.amux_err(&["session", "remove", "1"]);
    assert!(stderr.contains("still running"), "stderr was: {stderr}");

    scratch.wait_terminal("1", 10_000);
    scratch.amux_ok(&["session", "remove", "1"]);

    let stderr = scratch.amux_err(&["session", "status", "1"]);
    assert!(stderr.contains("not found"), "stderr was: {stderr}");
}

#[test]
fn input_injection_is_unsupported_on_the_local_backend() {
    let scratch = Scratch::new();
    scratch.add_workspace("ws-input");
    scratch.amux_ok(&[
        "session", "run", "--ws", "ws-input", "--backend", "local", "--", "sleep 5",
    ]);

    let stderr = scratch.amux_err(&["session", "send", "1", "hello"]);
    assert!(stderr.contains("not supported"), "stderr was: {stderr}");

    scratch.amux_ok(&["session", "stop", "1"]);
}
