// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn store() -> (tempfile::TempDir, StateStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("sessions"));
    (dir, store)
}

fn snapshot(id: &SessionId) -> SessionStateSnapshot {
    SessionStateSnapshot {
        state: SessionState::Running,
        updated_at: Utc::now(),
        updated_by: std::process::id(),
        session_id: id.clone(),
        workspace_id: WorkspaceId::new("ws-1"),
        last_output_hash: 0xdeadbeef,
        last_output_time: Some(Utc::now()),
        last_status_check: Some(Utc::now()),
        started_at: Some(Utc::now()),
        stopped_at: None,
        handle: Some("amux-ws-1-claude-123".to_string()),
        pid: Some(4242),
        exit_code: None,
        error: None,
    }
}

#[test]
fn missing_file_loads_as_synthetic_created() {
    let (_dir, store) = store();
    let id = SessionId::new("sess-1");
    let loaded = store.load(&id, &WorkspaceId::new("ws-1")).unwrap();
    assert_eq!(loaded.state, SessionState::Created);
    assert_eq!(loaded.session_id, id);
    // The workspace binding exists from creation, before any state file.
    assert_eq!(loaded.workspace_id, WorkspaceId::new("ws-1"));
    assert_eq!(loaded.stopped_at, None);
    assert_eq!(loaded.last_output_hash, 0);
}

#[test]
fn save_then_load_round_trips() {
    let (_dir, store) = store();
    let id = SessionId::new("sess-1");
    let snap = snapshot(&id);
    store.save(&id, &snap).unwrap();
    assert_eq!(store.load(&id, &snap.workspace_id).unwrap(), snap);
}

#[test]
fn save_is_pretty_printed_with_snake_case_state() {
    let (_dir, store) = store();
    let id = SessionId::new("sess-1");
    store.save(&id, &snapshot(&id)).unwrap();

    let text = std::fs::read_to_string(store.state_path(&id)).unwrap();
    assert!(text.contains("\n  \"state\": \"running\""));
    assert!(text.contains("\"session_id\": \"sess-1\""));
}

#[test]
fn save_leaves_no_temp_file_behind() {
    let (_dir, store) = store();
    let id = SessionId::new("sess-1");
    store.save(&id, &snapshot(&id)).unwrap();
    assert!(!store.state_path(&id).with_extension("tmp").exists());
}

#[test]
fn corrupt_json_is_fatal() {
    let (_dir, store) = store();
    let id = SessionId::new("sess-1");
    std::fs::create_dir_all(store.session_dir(&id)).unwrap();
    std::fs::write(store.state_path(&id), b"{ not json").unwrap();

    let err = store.load(&id, &WorkspaceId::new("ws-1")).unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { .. }));
}

#[test]
fn legacy_working_state_loads_as_running() {
    let (_dir, store) = store();
    let id = SessionId::new("sess-1");
    let mut snap = snapshot(&id);
    snap.state = SessionState::Running;
    store.save(&id, &snap).unwrap();

    let text = std::fs::read_to_string(store.state_path(&id))
        .unwrap()
        .replace("\"running\"", "\"working\"");
    std::fs::write(store.state_path(&id), text).unwrap();

    assert_eq!(
        store.load(&id, &WorkspaceId::new("ws-1")).unwrap().state,
        SessionState::Running
    );
}

#[test]
fn exit_status_side_channel_parses_integers() {
    let (_dir, store) = store();
    let id = SessionId::new("sess-1");
    assert!(store.read_exit_status(&id).is_none());

    std::fs::create_dir_all(store.session_dir(&id)).unwrap();
    std::fs::write(store.exit_status_path(&id), b"7\n").unwrap();
    assert_eq!(store.read_exit_status(&id), Some(Ok(7)));

    std::fs::write(store.exit_status_path(&id), b"garbage").unwrap();
    match store.read_exit_status(&id) {
        Some(Err(msg)) => assert!(msg.contains("garbage")),
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn list_ids_returns_sorted_session_dirs() {
    let (_dir, store) = store();
    for name in ["b-sess", "a-sess"] {
        let id = SessionId::new(name);
        store.save(&id, &snapshot(&id)).unwrap();
    }
    let ids = store.list_ids().unwrap();
    assert_eq!(ids, vec![SessionId::new("a-sess"), SessionId::new("b-sess")]);
}

#[test]
fn list_ids_on_missing_root_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("never-created"));
    assert!(store.list_ids().unwrap().is_empty());
}

#[test]
fn delete_removes_the_session_dir_and_is_idempotent() {
    let (_dir, store) = store();
    let id = SessionId::new("sess-1");
    store.save(&id, &snapshot(&id)).unwrap();
    store.delete(&id).unwrap();
    assert!(!store.session_dir(&id).exists());
    store.delete(&id).unwrap();
}

#[tokio::test]
async fn concurrent_reader_sees_old_or_new_content_never_torn() {
    let (_dir, store) = store();
    let id = SessionId::new("sess-1");
    store.save(&id, &snapshot(&id)).unwrap();

    // Writer task flips the hash repeatedly via atomic saves while the
    // reader keeps loading; every load must parse and carry one of the
    // two known hashes.
    let writer_store = store.clone();
    let writer_id = id.clone();
    let writer = tokio::task::spawn_blocking(move || {
        for i in 0..50u32 {
            let mut s = writer_store
                .load(&writer_id, &WorkspaceId::new("ws-1"))
                .unwrap();
            s.last_output_hash = if i % 2 == 0 { 0x1111_1111 } else { 0x2222_2222 };
            writer_store.save(&writer_id, &s).unwrap();
        }
    });

    for _ in 0..50 {
        let loaded = store.load(&id, &WorkspaceId::new("ws-1")).unwrap();
        assert!(
            [0xdead_beef, 0x1111_1111, 0x2222_2222].contains(&loaded.last_output_hash),
            "unexpected hash {:#x}",
            loaded.last_output_hash
        );
    }
    writer.await.unwrap();
}
