// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-platform agent availability detection.
//!
//! An agent is "available" when its binary can be found on `PATH`, in a
//! per-OS list of common install locations, or (on Windows) through the
//! uninstall registry. Results are cached in `.agent-detection.json`
//! with a one-hour TTL so selection does not hammer the filesystem.

use cascade_core::{time_fmt, Clock};
use cascade_storage::StateStore;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Cache format version.
const CACHE_VERSION: u32 = 1;

/// Default cache TTL.
pub const DETECTION_TTL: Duration = Duration::from_secs(3600);

/// Where a binary was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    Path,
    CommonLocation,
    Registry,
}

/// Detection result for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub name: String,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<DetectionSource>,
    /// UTC ISO-8601 stamp of the detection.
    pub detected_at: String,
}

/// The `.agent-detection.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct DetectionCache {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    updated_at: String,
    #[serde(default)]
    platform: String,
    #[serde(default)]
    agents: IndexMap<String, AgentInfo>,
}

/// Binary names an agent may be installed under.
fn binary_names(agent: &str) -> Vec<String> {
    match agent {
        "claude-code" => vec!["claude".to_string()],
        other => vec![other.to_string()],
    }
}

#[cfg(windows)]
const EXE_SUFFIXES: &[&str] = &[".exe", ".cmd", ".bat"];
#[cfg(not(windows))]
const EXE_SUFFIXES: &[&str] = &[""];

/// Common install directories probed after `PATH`.
fn common_dirs() -> Vec<PathBuf> {
    let mut dirs_list = vec![
        PathBuf::from("/usr/local/bin"),
        PathBuf::from("/opt/homebrew/bin"),
    ];
    if let Some(home) = dirs::home_dir() {
        dirs_list.push(home.join(".local/bin"));
        dirs_list.push(home.join(".cargo/bin"));
        dirs_list.push(home.join(".npm-global/bin"));
        dirs_list.push(home.join("node_modules/.bin"));
        dirs_list.push(home.join("AppData/Local/Programs"));
    }
    dirs_list
}

/// Filesystem detector with a JSON cache.
pub struct Detector<C: Clock> {
    store: StateStore<C>,
    ttl: Duration,
}

impl<C: Clock> Detector<C> {
    pub fn new(store: StateStore<C>) -> Self {
        Self {
            store,
            ttl: DETECTION_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Detect one agent, honoring the cache unless `force_refresh`.
    pub fn detect(&self, agent: &str, force_refresh: bool) -> AgentInfo {
        let mut cache = self.load_cache();

        if !force_refresh {
            if let Some(info) = cache.agents.get(agent) {
                if self.is_fresh(info) {
                    return info.clone();
                }
            }
        }

        let info = self.probe(agent);
        cache.agents.insert(agent.to_string(), info.clone());
        self.save_cache(&mut cache);
        info
    }

    /// True when the agent's binary can be found.
    pub fn is_available(&self, agent: &str) -> bool {
        self.detect(agent, false).available
    }

    fn is_fresh(&self, info: &AgentInfo) -> bool {
        let Some(detected_ms) = time_fmt::parse_utc(&info.detected_at) else {
            return false;
        };
        let now_ms = self.store.clock().epoch_ms();
        now_ms.saturating_sub(detected_ms) < self.ttl.as_millis() as u64
    }

    fn probe(&self, agent: &str) -> AgentInfo {
        let stamp = time_fmt::format_utc(self.store.clock().epoch_ms());
        for binary in binary_names(agent) {
            if let Some(path) = find_in_path(&binary) {
                return self.found(agent, path, DetectionSource::Path, &stamp);
            }
            if let Some(path) = find_in_common_dirs(&binary) {
                return self.found(agent, path, DetectionSource::CommonLocation, &stamp);
            }
            #[cfg(windows)]
            if let Some(path) = find_in_registry(&binary) {
                return self.found(agent, path, DetectionSource::Registry, &stamp);
            }
        }
        AgentInfo {
            name: agent.to_string(),
            available: false,
            path: None,
            version: None,
            source: None,
            detected_at: stamp,
        }
    }

    fn found(
        &self,
        agent: &str,
        path: PathBuf,
        source: DetectionSource,
        stamp: &str,
    ) -> AgentInfo {
        let version = probe_version(&path);
        tracing::debug!(agent, path = %path.display(), ?source, "agent detected");
        AgentInfo {
            name: agent.to_string(),
            available: true,
            path: Some(path),
            version,
            source: Some(source),
            detected_at: stamp.to_string(),
        }
    }

    fn load_cache(&self) -> DetectionCache {
        self.store
            .read_json_safe::<DetectionCache>(&self.store.paths().detection_cache())
            .filter(|c| c.version == CACHE_VERSION)
            .unwrap_or_default()
    }

    fn save_cache(&self, cache: &mut DetectionCache) {
        cache.version = CACHE_VERSION;
        cache.updated_at = time_fmt::format_utc(self.store.clock().epoch_ms());
        cache.platform = std::env::consts::OS.to_string();
        self.store
            .write_json_safe(&self.store.paths().detection_cache(), cache);
    }
}

fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        for suffix in EXE_SUFFIXES {
            let candidate = dir.join(format!("{binary}{suffix}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

fn find_in_common_dirs(binary: &str) -> Option<PathBuf> {
    for dir in common_dirs() {
        for suffix in EXE_SUFFIXES {
            let candidate = dir.join(format!("{binary}{suffix}"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(windows)]
fn find_in_registry(binary: &str) -> Option<PathBuf> {
    // Query the uninstall registry for an install location mentioning
    // the binary; best-effort, absence is the common case.
    let output = std::process::Command::new("reg")
        .args([
            "query",
            r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\Uninstall",
            "/s",
            "/f",
            binary,
        ])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("InstallLocation") {
            if let Some(value) = trimmed.split("REG_SZ").nth(1) {
                let candidate = PathBuf::from(value.trim()).join(format!("{binary}.exe"));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
    }
    None
}

/// Best-effort `--version` probe; failures read as "unknown version".
fn probe_version(path: &std::path::Path) -> Option<String> {
    let output = std::process::Command::new(path).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    text.lines().next().map(|l| l.trim().to_string()).filter(|l| !l.is_empty())
}

#[cfg(test)]
#[path = "detect_tests.rs"]
mod tests;
