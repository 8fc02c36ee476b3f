// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named file locks with an mtime-driven staleness TTL.
//!
//! A lock is an empty sentinel file in `.locks/`. Creation with
//! `create_new` is the atomic acquisition primitive. A crashed holder
//! leaves the file behind; any file older than [`STALE_LOCK_SECS`] is
//! considered abandoned and may be broken before re-acquisition.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Locks older than one hour are stale and may be broken.
pub const STALE_LOCK_SECS: u64 = 3600;

/// Lock acquisition failures.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock `{0}` is held by another process; try again")]
    Held(String),
    #[error("io error on lock `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Factory for named locks under a project's `.locks/` directory.
#[derive(Debug, Clone)]
pub struct LockSet {
    locks_dir: PathBuf,
}

impl LockSet {
    pub fn new(locks_dir: PathBuf) -> Self {
        Self { locks_dir }
    }

    fn lock_path(&self, name: &str) -> PathBuf {
        self.locks_dir.join(format!("{name}.lock"))
    }

    /// Acquire the named lock, breaking a stale holder if necessary.
    ///
    /// `ttl` is the age beyond which an existing lock file counts as
    /// abandoned. One retry happens after breaking a stale lock; a live
    /// holder yields [`LockError::Held`].
    pub fn acquire(&self, name: &str, ttl: Duration) -> Result<LockGuard, LockError> {
        fs::create_dir_all(&self.locks_dir).map_err(|source| LockError::Io {
            name: name.to_string(),
            source,
        })?;

        let path = self.lock_path(name);
        for attempt in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    return Ok(LockGuard {
                        name: name.to_string(),
                        path,
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempt == 0 => {
                    if file_age(&path).is_some_and(|age| age >= ttl) {
                        tracing::warn!(lock = name, "breaking stale lock");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    return Err(LockError::Held(name.to_string()));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    return Err(LockError::Held(name.to_string()));
                }
                Err(source) => {
                    return Err(LockError::Io {
                        name: name.to_string(),
                        source,
                    })
                }
            }
        }
        Err(LockError::Held(name.to_string()))
    }

    /// Acquire with the default one-hour staleness TTL.
    pub fn acquire_default(&self, name: &str) -> Result<LockGuard, LockError> {
        self.acquire(name, Duration::from_secs(STALE_LOCK_SECS))
    }

    /// Remove every lock file older than the default TTL.
    ///
    /// Returns the number of locks removed. Errors reading the directory
    /// are treated as "nothing to clean".
    pub fn cleanup_stale_locks(&self) -> usize {
        let Ok(entries) = fs::read_dir(&self.locks_dir) else {
            return 0;
        };
        let ttl = Duration::from_secs(STALE_LOCK_SECS);
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "lock")
                && file_age(&path).is_some_and(|age| age >= ttl)
                && fs::remove_file(&path).is_ok()
            {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, "removed stale lock(s)");
        }
        removed
    }
}

fn file_age(path: &std::path::Path) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

/// Held lock; released on drop on every exit path.
#[derive(Debug)]
pub struct LockGuard {
    name: String,
    path: PathBuf,
}

impl LockGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(lock = %self.name, error = %e, "failed to release lock");
            }
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
