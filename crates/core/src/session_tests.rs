// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;
use SessionState::*;

const ALL: [SessionState; 8] = [
    Created, Starting, Running, Stopping, Stopped, Completed, Failed, Orphaned,
];

#[parameterized(
    created_starting = { Created, Starting },
    created_failed = { Created, Failed },
    created_orphaned = { Created, Orphaned },
    starting_running = { Starting, Running },
    starting_failed = { Starting, Failed },
    starting_orphaned = { Starting, Orphaned },
    running_stopping = { Running, Stopping },
    running_completed = { Running, Completed },
    running_failed = { Running, Failed },
    running_orphaned = { Running, Orphaned },
    stopping_stopped = { Stopping, Stopped },
    stopping_failed = { Stopping, Failed },
)]
fn legal_transitions(from: SessionState, to: SessionState) {
    assert!(from.can_transition_to(to), "{from} -> {to} should be legal");
}

#[parameterized(
    created_running = { Created, Running },
    created_stopped = { Created, Stopped },
    starting_stopping = { Starting, Stopping },
    running_started = { Running, Starting },
    stopping_running = { Stopping, Running },
    stopping_completed = { Stopping, Completed },
)]
fn illegal_transitions(from: SessionState, to: SessionState) {
    assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
}

#[test]
fn terminal_states_admit_nothing() {
    for from in [Stopped, Completed, Failed, Orphaned] {
        assert!(from.is_terminal());
        for to in ALL {
            assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
        }
    }
}

#[test]
fn self_transitions_are_illegal() {
    for state in ALL {
        assert!(!state.can_transition_to(state));
    }
}

#[test]
fn non_terminal_states() {
    for state in [Created, Starting, Running, Stopping] {
        assert!(!state.is_terminal());
    }
}

#[test]
fn serde_uses_snake_case() {
    assert_eq!(serde_json::to_string(&Running).unwrap(), "\"running\"");
    assert_eq!(serde_json::to_string(&Orphaned).unwrap(), "\"orphaned\"");
    let state: SessionState = serde_json::from_str("\"stopping\"").unwrap();
    assert_eq!(state, Stopping);
}

#[parameterized(
    working = { "\"working\"" },
    idle = { "\"idle\"" },
)]
fn legacy_states_alias_to_running(json: &str) {
    let state: SessionState = serde_json::from_str(json).unwrap();
    assert_eq!(state, Running);
}

#[test]
fn display_matches_on_disk_spelling() {
    for state in ALL {
        assert_eq!(state.to_string(), state.as_str());
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            format!("\"{}\"", state.as_str())
        );
    }
}

#[test]
fn backend_kind_round_trips() {
    let kind: BackendKind = serde_json::from_str("\"local\"").unwrap();
    assert_eq!(kind, BackendKind::Local);
    assert_eq!(serde_json::to_string(&BackendKind::Tmux).unwrap(), "\"tmux\"");
    assert_eq!(BackendKind::default(), BackendKind::Tmux);
}
