// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::rig;

#[tokio::test]
async fn create_allocates_sequential_indexes() {
    let rig = rig();
    let ws = rig.workspace("ws-1");

    let first = rig.manager.create(rig.create_spec(&ws)).await.unwrap();
    let second = rig.manager.create(rig.create_spec(&ws)).await.unwrap();

    assert_eq!(first.index(), 1);
    assert_eq!(second.index(), 2);
    assert_ne!(first.id(), second.id());
}

#[tokio::test]
async fn create_requires_an_existing_workspace_directory() {
    let rig = rig();
    let ws = rig.workspace("ws-1");
    std::fs::remove_dir_all(&ws.path).unwrap();

    let err = rig.manager.create(rig.create_spec(&ws)).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn create_requires_a_command_from_spec_or_agent_profile() {
    let rig = rig();
    let ws = rig.workspace("ws-1");
    let mut spec = rig.create_spec(&ws);
    spec.agent = AgentId::new("unconfigured-agent");

    let err = rig.manager.create(spec.clone()).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    spec.command = Some("/bin/true".to_string());
    let session = rig.manager.create(spec).await.unwrap();
    assert_eq!(session.meta().command, "/bin/true");
}

#[tokio::test]
async fn create_fails_without_a_registered_backend() {
    let rig = rig();
    let ws = rig.workspace("ws-1");
    let mut spec = rig.create_spec(&ws);
    spec.backend = BackendKind::Local;

    let err = rig.manager.create(spec).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Backend(BackendError::Unavailable(_))
    ));
}

#[tokio::test]
async fn resolve_accepts_exact_id_prefix_and_index() {
    let rig = rig();
    let ws = rig.workspace("ws-1");
    let created = rig.manager.create(rig.create_spec(&ws)).await.unwrap();

    let by_id = rig
        .manager
        .resolve(created.id().as_str(), &rig.cancel)
        .await
        .unwrap();
    assert_eq!(by_id.id(), created.id());

    // "sess-1" is the full id of the first sequential session, so use its
    // unambiguous prefix.
    let by_prefix = rig.manager.resolve("sess", &rig.cancel).await.unwrap();
    assert_eq!(by_prefix.id(), created.id());

    let by_index = rig.manager.resolve("1", &rig.cancel).await.unwrap();
    assert_eq!(by_index.id(), created.id());
}

#[tokio::test]
async fn ambiguous_prefix_is_a_conflict() {
    let rig = rig();
    let ws = rig.workspace("ws-1");
    rig.manager.create(rig.create_spec(&ws)).await.unwrap();
    rig.manager.create(rig.create_spec(&ws)).await.unwrap();

    let err = rig.manager.resolve("sess", &rig.cancel).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    assert!(err.to_string().contains("ambiguous"));
}

#[tokio::test]
async fn resolve_unknown_session_is_not_found() {
    let rig = rig();
    let err = rig.manager.resolve("nope", &rig.cancel).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn list_by_workspace_filters() {
    let rig = rig();
    let ws_a = rig.workspace("ws-a");
    let ws_b = rig.workspace("ws-b");
    rig.manager.create(rig.create_spec(&ws_a)).await.unwrap();
    rig.manager.create(rig.create_spec(&ws_b)).await.unwrap();
    rig.manager.create(rig.create_spec(&ws_a)).await.unwrap();

    let in_a = rig.manager.list_by_workspace(&ws_a.id).unwrap();
    assert_eq!(in_a.len(), 2);
    assert!(in_a.iter().all(|m| m.workspace_id == ws_a.id));
    assert_eq!(rig.manager.list().unwrap().len(), 3);
}

#[tokio::test]
async fn remove_refuses_non_terminal_sessions() {
    let rig = rig();
    let ws = rig.workspace("ws-1");
    let session = rig.manager.create(rig.create_spec(&ws)).await.unwrap();
    session.start(&rig.cancel).await.unwrap();

    let err = rig
        .manager
        .remove(session.id().as_str(), &rig.cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    assert!(err.to_string().contains("still running"));
}

#[tokio::test]
async fn remove_deletes_terminal_sessions() {
    let rig = rig();
    let ws = rig.workspace("ws-1");
    let session = rig.manager.create(rig.create_spec(&ws)).await.unwrap();
    session.start(&rig.cancel).await.unwrap();
    session.stop(&rig.cancel).await.unwrap();

    rig.manager
        .remove(session.id().as_str(), &rig.cancel)
        .await
        .unwrap();

    let err = rig
        .manager
        .resolve(session.id().as_str(), &rig.cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn vanished_workspace_promotes_running_session_to_orphaned() {
    let rig = rig();
    let ws = rig.workspace("ws-1");
    let session = rig.manager.create(rig.create_spec(&ws)).await.unwrap();
    session.start(&rig.cancel).await.unwrap();

    std::fs::remove_dir_all(&ws.path).unwrap();

    let orphan = rig
        .manager
        .resolve(session.id().as_str(), &rig.cancel)
        .await
        .unwrap();
    assert!(orphan.is_orphaned());

    let snap = orphan.status(&rig.cancel).await.unwrap();
    assert_eq!(snap.state, SessionState::Orphaned);
    assert_eq!(snap.error.as_deref(), Some("workspace directory missing"));
    assert!(snap.stopped_at.is_some());
}

#[tokio::test]
async fn orphan_operations_fail_with_conflict() {
    let rig = rig();
    let ws = rig.workspace("ws-1");
    let session = rig.manager.create(rig.create_spec(&ws)).await.unwrap();
    session.start(&rig.cancel).await.unwrap();
    std::fs::remove_dir_all(&ws.path).unwrap();

    let orphan = rig
        .manager
        .resolve(session.id().as_str(), &rig.cancel)
        .await
        .unwrap();

    assert!(matches!(
        orphan.start(&rig.cancel).await.unwrap_err(),
        EngineError::Conflict(_)
    ));
    assert!(matches!(
        orphan.stop(&rig.cancel).await.unwrap_err(),
        EngineError::Conflict(_)
    ));
    assert!(matches!(
        orphan.send_input("hi", &rig.cancel).await.unwrap_err(),
        EngineError::Conflict(_)
    ));
    assert!(matches!(
        orphan.attach_instructions(&rig.cancel).await.unwrap_err(),
        EngineError::Conflict(_)
    ));
}

#[tokio::test]
async fn orphan_status_is_a_no_op_on_disk() {
    let rig = rig();
    let ws = rig.workspace("ws-1");
    let session = rig.manager.create(rig.create_spec(&ws)).await.unwrap();
    session.start(&rig.cancel).await.unwrap();
    std::fs::remove_dir_all(&ws.path).unwrap();

    let orphan = rig
        .manager
        .resolve(session.id().as_str(), &rig.cancel)
        .await
        .unwrap();
    let before = orphan.status(&rig.cancel).await.unwrap();
    let after = orphan.status(&rig.cancel).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn already_terminal_sessions_are_not_re_orphaned() {
    let rig = rig();
    let ws = rig.workspace("ws-1");
    let session = rig.manager.create(rig.create_spec(&ws)).await.unwrap();
    session.start(&rig.cancel).await.unwrap();
    session.stop(&rig.cancel).await.unwrap();

    std::fs::remove_dir_all(&ws.path).unwrap();

    let resolved = rig
        .manager
        .resolve(session.id().as_str(), &rig.cancel)
        .await
        .unwrap();
    assert!(resolved.is_orphaned());
    let snap = resolved.status(&rig.cancel).await.unwrap();
    assert_eq!(snap.state, SessionState::Stopped);
}
