// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Best-effort description of the process holding a contended write lock,
/// read from the `.lock.write.info` file the holder published on acquire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub operation: String,
    pub acquired_at: DateTime<Utc>,
}

impl fmt::Display for LockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {} ({})", self.pid, self.operation)
    }
}

/// Errors from the state and semaphore stores.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persisted JSON could not be parsed. Fatal for that entity; never
    /// auto-repaired.
    #[error("corrupt state file: {}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("lock on {} contended{}", path.display(), holder.as_ref().map(|h| format!(" by {h}")).unwrap_or_default())]
    LockContended {
        path: PathBuf,
        /// Populated when the writer's info file was readable.
        holder: Option<LockInfo>,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_contended(&self) -> bool {
        matches!(self, StorageError::LockContended { .. })
    }
}
