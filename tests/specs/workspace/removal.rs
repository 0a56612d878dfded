//! Workspace removal gating specs.

use crate::prelude::Scratch;

#[test]
fn running_session_blocks_removal_until_stopped() {
    let scratch = Scratch::new();
    let ws_path = scratch.add_workspace("ws-busy");

    scratch.amux_ok(&[
        "session", "run", "--ws", "ws-busy", "--backend", "local", "--", "sleep 30",
    ]);

    let stderr = scratch.amux_err(&["ws", "remove", "ws-busy"]);
    assert!(stderr.contains("in use"), "stderr was: {stderr}");
    assert!(ws_path.is_dir(), "refused removal must not delete the worktree");

    scratch.amux_ok(&["session", "stop", "1"]);
    scratch.amux_ok(&["ws", "remove", "ws-busy"]);
    assert!(!ws_path.exists());
}

#[test]
fn removal_error_names_the_holding_session() {
    let scratch = Scratch::new();
    scratch.add_workspace("ws-named");

    let run_output = scratch.amux_ok(&[
        "session", "run", "--ws", "ws-named", "--backend", "local", "--", "sleep 30",
    ]);
    // "session <id> started (index 1)"
    let session_id = run_output
        .split_whitespace()
        .nth(1)
        .expect("session id in run output")
        .to_string();

    let stderr = scratch.amux_err(&["ws", "remove", "ws-named"]);
    assert!(
        stderr.contains(&session_id),
        "stderr should name {session_id}, was: {stderr}"
    );

    scratch.amux_ok(&["session", "stop", "1"]);
}

#[test]
fn forced_removal_stops_sessions_first() {
    let scratch = Scratch::new();
    let ws_path = scratch.add_workspace("ws-force");

    scratch.amux_ok(&[
        "session", "run", "--ws", "ws-force", "--backend", "local", "--", "sleep 30",
    ]);

    let stdout = scratch.amux_ok(&["ws", "remove", "ws-force", "--force"]);
    assert!(stdout.contains("stopped session"), "stdout was: {stdout}");
    assert!(stdout.contains("removed"), "stdout was: {stdout}");
    assert!(!ws_path.exists());

    // The session record survives removal and is terminal.
    let status = scratch.wait_terminal("1", 2_000);
    assert!(
        status.contains("state: stopped") || status.contains("state: orphaned"),
        "status was: {status}"
    );
}

#[test]
fn stale_interactive_holder_is_evicted_on_removal() {
    let scratch = Scratch::new();
    let ws_path = scratch.add_workspace("ws-stale");

    // A leftover interactive-cli holder from long ago; its five-minute
    // lease is far past.
    let sem_dir = ws_path.join(".amux");
    std::fs::create_dir_all(&sem_dir).unwrap();
    std::fs::write(
        sem_dir.join("sem.json"),
        serde_json::json!({
            "version": "1.0",
            "holders": [{
                "id": "cli-ancient",
                "type": "interactive-cli",
                "workspace_id": "ws-stale",
                "timestamp": "2020-01-01T00:00:00Z",
                "description": "crashed amux invocation"
            }]
        })
        .to_string(),
    )
    .unwrap();

    scratch.amux_ok(&["ws", "remove", "ws-stale"]);
    assert!(!ws_path.exists());
}

#[test]
fn completed_sessions_do_not_block_removal() {
    let scratch = Scratch::new();
    let ws_path = scratch.add_workspace("ws-done");

    scratch.amux_ok(&[
        "session", "run", "--ws", "ws-done", "--backend", "local", "--wait", "--", "true",
    ]);

    scratch.amux_ok(&["ws", "remove", "ws-done"]);
    assert!(!ws_path.exists());
}

#[test]
fn ws_list_reflects_usage() {
    let scratch = Scratch::new();
    scratch.add_workspace("ws-usage");

    let free = scratch.amux_ok(&["ws", "list"]);
    assert!(free.contains("free"), "ws list was: {free}");

    scratch.amux_ok(&[
        "session", "run", "--ws", "ws-usage", "--backend", "local", "--", "sleep 30",
    ]);
    let busy = scratch.amux_ok(&["ws", "list"]);
    assert!(busy.contains("in use"), "ws list was: {busy}");

    scratch.amux_ok(&["session", "stop", "1"]);
    let free_again = scratch.amux_ok(&["ws", "list"]);
    assert!(free_again.contains("free"), "ws list was: {free_again}");
}

#[test]
fn adding_a_workspace_requires_an_existing_directory() {
    let scratch = Scratch::new();
    let missing = scratch.dir.path().join("never-created");
    let stderr = scratch.amux_err(&[
        "ws",
        "add",
        "ws-missing",
        missing.to_str().unwrap(),
    ]);
    assert!(stderr.contains("cannot resolve"), "stderr was: {stderr}");
}
