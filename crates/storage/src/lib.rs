// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! amux-storage: durable per-session state and per-workspace semaphores.
//!
//! Everything here is plain files plus advisory locks: writers serialize
//! through an exclusive lock on a sibling lock file and replace content via
//! temp-file + rename, so concurrent readers never observe a torn file and
//! a crash mid-write leaves the previous content intact.

pub mod error;
pub mod lock;
pub mod meta;
pub mod semaphore;
pub mod state;

pub use error::{LockInfo, StorageError};
pub use lock::{FileLock, LockMode, LockOptions};
pub use meta::SessionMeta;
pub use semaphore::{SemaphoreFile, SemaphoreStore, SEMAPHORE_VERSION};
pub use state::{SessionStateSnapshot, StateStore};
