// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic JSON state store.
//!
//! Every write goes to a temp file in the target directory, is fsynced,
//! and is renamed into place — a reader never observes a partial
//! document. Plan and registry mutations additionally hold a named lock
//! so concurrent processes serialize their read-modify-write cycles.

use crate::lock::LockSet;
use crate::paths::ProjectPaths;
use crate::progress::ProgressLog;
use crate::StorageError;
use cascade_core::{time_fmt, AgentRegistry, Clock, Plan, ResultRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

const PLAN_LOCK: &str = "prd";
const REGISTRY_LOCK: &str = "agent-status";

/// File-backed state store for one project.
#[derive(Clone)]
pub struct StateStore<C: Clock> {
    paths: ProjectPaths,
    locks: LockSet,
    progress: ProgressLog,
    clock: C,
}

impl<C: Clock> StateStore<C> {
    pub fn new(paths: ProjectPaths, clock: C) -> Self {
        let locks = LockSet::new(paths.locks_dir());
        let progress = ProgressLog::new(paths.progress());
        Self {
            paths,
            locks,
            progress,
            clock,
        }
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn locks(&self) -> &LockSet {
        &self.locks
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Read a JSON file, treating absence and corruption as `None`.
    pub fn read_json_safe<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt json");
                None
            }
        }
    }

    /// Write a JSON file atomically. Returns false (and logs) on failure.
    pub fn write_json_safe<T: Serialize>(&self, path: &Path, value: &T) -> bool {
        match self.write_json_atomic(path, value) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to write json");
                false
            }
        }
    }

    fn write_json_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(value)?;
        let dir = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(|source| StorageError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        // Temp file lives in the target directory so the rename stays on
        // one filesystem.
        let tmp = dir.join(format!(
            ".{}.tmp-{}",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("state"),
            uuid::Uuid::new_v4().simple()
        ));

        if let Err(source) = write_synced(&tmp, &json) {
            let _ = fs::remove_file(&tmp);
            return Err(StorageError::Io {
                path: tmp,
                source,
            });
        }

        fs::rename(&tmp, path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            StorageError::Io {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Read the plan, or `None` when absent or unreadable.
    pub fn read_plan(&self) -> Option<Plan> {
        self.read_json_safe(&self.paths.plan())
    }

    /// Write the plan atomically under the plan lock.
    pub fn write_plan(&self, plan: &Plan) -> Result<(), StorageError> {
        let _guard = self.locks.acquire_default(PLAN_LOCK)?;
        self.write_json_atomic(&self.paths.plan(), plan)
    }

    /// Read the agent registry; absent or corrupt reads as empty.
    pub fn read_registry(&self) -> AgentRegistry {
        self.read_json_safe(&self.paths.agent_status())
            .unwrap_or_default()
    }

    /// Replace the registry atomically under the registry lock.
    pub fn write_registry(&self, registry: &AgentRegistry) -> Result<(), StorageError> {
        let _guard = self.locks.acquire_default(REGISTRY_LOCK)?;
        self.write_registry_locked(registry)
    }

    /// Atomic read-modify-write of the registry under the registry lock.
    ///
    /// All registry mutations go through here; concurrent reconcilers
    /// serialize on the lock, so promotions are exactly-once and no row
    /// is lost.
    pub fn update_registry<R>(
        &self,
        f: impl FnOnce(&mut AgentRegistry) -> R,
    ) -> Result<R, StorageError> {
        let _guard = self.locks.acquire_default(REGISTRY_LOCK)?;
        let mut registry = self.read_registry();
        let result = f(&mut registry);
        self.write_registry_locked(&registry)?;
        Ok(result)
    }

    fn write_registry_locked(&self, registry: &AgentRegistry) -> Result<(), StorageError> {
        let mut stamped = registry.clone();
        stamped.updated_at = Some(time_fmt::format_utc(self.clock.epoch_ms()));
        self.write_json_atomic(&self.paths.agent_status(), &stamped)
    }

    /// Read a story's durable result record, if written.
    pub fn read_result(&self, story_id: &str) -> Option<ResultRecord> {
        self.read_json_safe(&self.paths.story_result(story_id))
    }

    /// Write a story's result record. Written once per attempt; the file
    /// is removed at relaunch.
    pub fn write_result(&self, record: &ResultRecord) -> bool {
        self.write_json_safe(&self.paths.story_result(record.story_id.as_str()), record)
    }

    /// Best-effort progress append.
    pub fn append_progress(&self, story_id: &str, message: &str) {
        self.progress.append(&self.clock, story_id, message);
    }

    /// The progress log reader.
    pub fn progress(&self) -> &ProgressLog {
        &self.progress
    }
}

/// Write content and fsync before the caller renames into place.
fn write_synced(path: &Path, content: &str) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = fs::File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.write_all(b"\n")?;
    file.sync_all()
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
