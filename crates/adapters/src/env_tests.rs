// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn lookup<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
    env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn workspace() -> Workspace {
    Workspace::new("ws-1", "/work/ws-1", "feature/x")
}

#[test]
fn identification_variables_are_always_present() {
    let env = merged_env(
        &BTreeMap::new(),
        &[],
        &workspace(),
        &SessionId::new("sess-1"),
        &AgentId::new("claude"),
    );

    assert_eq!(lookup(&env, "AMUX_WORKSPACE_ID"), Some("ws-1"));
    assert_eq!(lookup(&env, "AMUX_WORKSPACE_PATH"), Some("/work/ws-1"));
    assert_eq!(lookup(&env, "AMUX_SESSION_ID"), Some("sess-1"));
    assert_eq!(lookup(&env, "AMUX_AGENT_ID"), Some("claude"));
}

#[test]
fn caller_env_overrides_agent_defaults() {
    let mut agent_env = BTreeMap::new();
    agent_env.insert("MODEL".to_string(), "default".to_string());
    agent_env.insert("KEEP".to_string(), "yes".to_string());

    let env = merged_env(
        &agent_env,
        &[("MODEL".to_string(), "override".to_string())],
        &workspace(),
        &SessionId::new("sess-1"),
        &AgentId::new("claude"),
    );

    assert_eq!(lookup(&env, "MODEL"), Some("override"));
    assert_eq!(lookup(&env, "KEEP"), Some("yes"));
}

#[test]
fn identification_cannot_be_shadowed() {
    let env = merged_env(
        &BTreeMap::new(),
        &[("AMUX_SESSION_ID".to_string(), "spoofed".to_string())],
        &workspace(),
        &SessionId::new("sess-1"),
        &AgentId::new("claude"),
    );

    assert_eq!(lookup(&env, "AMUX_SESSION_ID"), Some("sess-1"));
}

#[test]
fn keys_are_unique() {
    let env = merged_env(
        &BTreeMap::new(),
        &[
            ("A".to_string(), "1".to_string()),
            ("A".to_string(), "2".to_string()),
        ],
        &workspace(),
        &SessionId::new("sess-1"),
        &AgentId::new("claude"),
    );

    let count = env.iter().filter(|(k, _)| k == "A").count();
    assert_eq!(count, 1);
    assert_eq!(lookup(&env, "A"), Some("2"));
}
