// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! amux-adapters: process backends for sessions.
//!
//! A backend is the strategy for launching, signalling, and observing a
//! session's process. Two real ones exist: tmux (screen capture and input
//! injection available) and local (a direct child in its own process
//! group). Callers only ever see the [`ProcessBackend`] capability set.

pub mod backend;
pub mod env;
pub mod subprocess;

pub use backend::local::LocalBackend;
pub use backend::tmux::TmuxBackend;
pub use backend::{BackendError, Liveness, ProcessBackend, SpawnHandle, SpawnSpec};
pub use env::merged_env;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use backend::fake::{BackendCall, FakeBackend};
