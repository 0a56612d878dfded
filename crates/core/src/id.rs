// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Identifier newtypes and session id minting.
//!
//! Ids are plain strings on disk: the session id names the session's
//! state directory, the workspace id feeds tmux session names and
//! semaphore holder entries. The newtypes keep that string shape while
//! giving each kind its own type, plus the two lookups the CLI offers
//! on ids (exact match and leading prefix) and a display abbreviation
//! that never cuts inside a multi-byte character.

use crate::session::SessionId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Define a string-backed identifier type.
///
/// Generated types serialize as the bare string and expose `as_str`,
/// `into_string`, [`abbrev`](SessionId::abbrev), and
/// [`has_prefix`](SessionId::has_prefix).
macro_rules! string_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }

            /// Leading portion of the id, at most `max` characters, cut
            /// on a character boundary.
            pub fn abbrev(&self, max: usize) -> &str {
                match self.0.char_indices().nth(max) {
                    Some((cut, _)) => &self.0[..cut],
                    None => &self.0,
                }
            }

            /// Whether `query` is a leading fragment of this id. Prefix
            /// resolution in the manager and the CLI goes through this.
            pub fn has_prefix(&self, query: &str) -> bool {
                self.0.starts_with(query)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}
pub(crate) use string_id;

/// Mints fresh session ids for the manager.
///
/// A minted id doubles as the session's state-directory name, so values
/// must be unique per store and filesystem-safe.
pub trait MintIds: Clone + Send + Sync {
    fn mint(&self) -> SessionId;
}

/// Production minting: one random v4 UUID per session.
#[derive(Clone, Copy, Default)]
pub struct RandomIds;

impl MintIds for RandomIds {
    fn mint(&self) -> SessionId {
        SessionId::new(uuid::Uuid::new_v4().to_string())
    }
}

/// Deterministic minting for tests: `<prefix>-1`, `<prefix>-2`, ...
/// Clones share the counter, so one source stays collision-free no
/// matter how it is threaded through a fixture.
#[derive(Clone)]
pub struct CountingIds {
    prefix: Arc<str>,
    minted: Arc<AtomicU64>,
}

impl CountingIds {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.into(),
            minted: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl MintIds for CountingIds {
    fn mint(&self) -> SessionId {
        let n = self.minted.fetch_add(1, Ordering::Relaxed) + 1;
        SessionId::new(format!("{}-{}", self.prefix, n))
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
