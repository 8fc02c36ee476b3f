// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cascade-storage: on-disk state for a Plan Cascade project.
//!
//! Everything durable lives in plain files under the project root: the
//! plan, the agent registry, per-story logs and results, the progress
//! log, and the lock directory. Writes are temp-and-rename atomic;
//! registry and plan mutations are serialized by named file locks.

mod lock;
mod paths;
mod progress;
mod store;

pub use lock::{LockError, LockGuard, LockSet, STALE_LOCK_SECS};
pub use paths::ProjectPaths;
pub use progress::{ProgressEntry, ProgressLog, ProgressToken};
pub use store::StateStore;

use thiserror::Error;

/// Errors surfaced by the state store.
///
/// Reads never produce errors — missing or corrupt files read as absent.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Lock(#[from] LockError),
}
