// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_agent_table_from_toml() {
    let table = AgentTable::from_toml_str(
        r#"
        [agents.claude]
        command = "claude --continue"
        shell = "/bin/bash"

        [agents.claude.env]
        FOO = "bar"
        "#,
    )
    .unwrap();

    let def = table.get(&AgentId::new("claude"));
    assert_eq!(def.command.as_deref(), Some("claude --continue"));
    assert_eq!(def.shell.as_deref(), Some("/bin/bash"));
    assert_eq!(def.env.get("FOO").map(String::as_str), Some("bar"));
}

#[test]
fn unknown_agent_resolves_to_empty_default() {
    let table = AgentTable::default();
    let def = table.get(&AgentId::new("nope"));
    assert_eq!(def, AgentDef::default());
}

#[test]
fn empty_input_parses_to_empty_table() {
    let table = AgentTable::from_toml_str("").unwrap();
    assert!(table.is_empty());
}

#[test]
fn invalid_toml_is_an_error() {
    let err = AgentTable::from_toml_str("agents = 3").unwrap_err();
    assert!(matches!(err, AgentConfigError::Parse(_)));
}
