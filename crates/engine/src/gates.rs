// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quality-gate execution.
//!
//! Gates run an ordered list of verification commands after a story
//! completes. Commands default per detected project kind, fall back when
//! a tool is missing, run under a per-gate timeout, and classify into
//! required vs. advisory failures.

use cascade_core::{GateConfig, GateOutput, GateType};
use indexmap::IndexMap;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Exit code reserved for "command not found / timed out".
pub const GATE_UNAVAILABLE_EXIT: i32 = -1;

/// Shell "command not found" exit codes (sh: 127, cmd.exe: 9009).
const NOT_FOUND_EXITS: &[i32] = &[127, 9009];

/// Captured stdout/stderr excerpts are capped at this many bytes.
const EXCERPT_LIMIT: usize = 4096;

#[allow(clippy::expect_used)]
static FAILURE_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+) (failed|failing)").expect("constant regex pattern is valid"));

/// Auto-detected project kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    Node,
    Python,
    Rust,
    Go,
    Unknown,
}

/// Detect the project kind from marker files.
pub fn detect_project_type(root: &Path) -> ProjectType {
    if root.join("package.json").is_file() {
        ProjectType::Node
    } else if root.join("pyproject.toml").is_file()
        || root.join("setup.py").is_file()
        || root.join("requirements.txt").is_file()
    {
        ProjectType::Python
    } else if root.join("Cargo.toml").is_file() {
        ProjectType::Rust
    } else if root.join("go.mod").is_file() {
        ProjectType::Go
    } else {
        ProjectType::Unknown
    }
}

const VENV_DIR_NAMES: &[&str] = &[".venv", "venv", "env", ".env", "virtualenv", ".virtualenv"];

/// Find a virtual environment directory containing a python executable.
pub fn detect_venv(root: &Path) -> Option<PathBuf> {
    for name in VENV_DIR_NAMES {
        let candidate = root.join(name);
        if venv_python(&candidate).is_some() {
            return Some(candidate);
        }
    }
    None
}

fn venv_bin_dir(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts")
    } else {
        venv.join("bin")
    }
}

fn venv_python(venv: &Path) -> Option<PathBuf> {
    let python = venv_bin_dir(venv).join(if cfg!(windows) { "python.exe" } else { "python" });
    python.is_file().then_some(python)
}

/// Default command + fallbacks per gate type and project kind.
fn default_commands(gate_type: GateType, project: ProjectType) -> (Option<&'static str>, &'static [&'static str]) {
    match (gate_type, project) {
        (GateType::Typecheck, ProjectType::Node) => (Some("tsc --noEmit"), &[]),
        (GateType::Typecheck, ProjectType::Python) => {
            (Some("mypy ."), &["pyright", "python -m mypy ."])
        }
        (GateType::Test, ProjectType::Node) => (Some("npm test"), &["jest", "yarn test"]),
        (GateType::Test, ProjectType::Python) => {
            (Some("pytest -v"), &["python -m pytest -v"])
        }
        (GateType::Test, ProjectType::Rust) => (Some("cargo test"), &[]),
        (GateType::Test, ProjectType::Go) => (Some("go test ./..."), &[]),
        (GateType::Lint, ProjectType::Node) => (Some("eslint ."), &[]),
        (GateType::Lint, ProjectType::Python) => (Some("ruff check ."), &["flake8 ."]),
        (GateType::Lint, ProjectType::Rust) => (Some("cargo clippy"), &[]),
        (GateType::Lint, ProjectType::Go) => (Some("golangci-lint run"), &[]),
        _ => (None, &[]),
    }
}

struct CommandResult {
    exit_code: i32,
    stdout: String,
    stderr: String,
    duration_ms: u64,
    timed_out: bool,
}

impl CommandResult {
    fn not_found(&self) -> bool {
        !self.timed_out && NOT_FOUND_EXITS.contains(&self.exit_code)
    }
}

/// Runs gates for one project root.
pub struct GateRunner {
    root: PathBuf,
}

impl GateRunner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Run every enabled gate in order. Returns outputs keyed by gate
    /// name, in input order.
    pub async fn execute_all(
        &self,
        story_id: &str,
        configs: &[GateConfig],
    ) -> IndexMap<String, GateOutput> {
        let project = detect_project_type(&self.root);
        let mut outputs = IndexMap::new();
        for config in configs.iter().filter(|c| c.enabled) {
            let output = self.run_gate(story_id, config, project).await;
            tracing::info!(
                story_id,
                gate = %config.name,
                passed = output.passed,
                required = output.required,
                "gate finished"
            );
            outputs.insert(config.name.clone(), output);
        }
        outputs
    }

    async fn run_gate(
        &self,
        story_id: &str,
        config: &GateConfig,
        project: ProjectType,
    ) -> GateOutput {
        let (primary, fallbacks) = match &config.command {
            Some(command) => (Some(command.as_str()), &[] as &[&str]),
            None => default_commands(config.gate_type, project),
        };

        let Some(primary) = primary else {
            // Nothing to verify for this project kind: trivially passing.
            return GateOutput {
                name: config.name.clone(),
                gate_type: config.gate_type,
                required: config.required,
                passed: true,
                exit_code: 0,
                stdout_excerpt: String::new(),
                stderr_excerpt: String::new(),
                duration_ms: 0,
                error_summary: None,
            };
        };

        let timeout = Duration::from_secs(config.timeout_seconds);
        let mut attempt = self.run_command(primary, timeout).await;
        let mut command_used = primary;

        // "command not found" walks the fallback list.
        if attempt.not_found() {
            for fallback in fallbacks {
                tracing::debug!(story_id, gate = %config.name, fallback, "trying fallback command");
                let next = self.run_command(fallback, timeout).await;
                let found = !next.not_found();
                attempt = next;
                command_used = fallback;
                if found {
                    break;
                }
            }
        }

        let passed = !attempt.timed_out && attempt.exit_code == 0;
        let error_summary = if attempt.timed_out {
            Some(format!(
                "Command timed out after {} seconds",
                config.timeout_seconds
            ))
        } else if attempt.not_found() {
            Some(format!("Command not found: {command_used}"))
        } else if passed {
            None
        } else {
            summarize_errors(config.gate_type, &attempt.stdout, &attempt.stderr)
        };

        GateOutput {
            name: config.name.clone(),
            gate_type: config.gate_type,
            required: config.required,
            passed,
            // -1 is reserved for "command not found / timed out"
            exit_code: if attempt.timed_out || attempt.not_found() {
                GATE_UNAVAILABLE_EXIT
            } else {
                attempt.exit_code
            },
            stdout_excerpt: excerpt(&attempt.stdout),
            stderr_excerpt: excerpt(&attempt.stderr),
            duration_ms: attempt.duration_ms,
            error_summary,
        }
    }

    async fn run_command(&self, command: &str, timeout: Duration) -> CommandResult {
        let started = Instant::now();

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(self.venv_adjusted(command));
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(self.venv_adjusted(command));
            c
        };
        cmd.current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(venv) = detect_venv(&self.root) {
            let bin = venv_bin_dir(&venv);
            let path = std::env::var_os("PATH").unwrap_or_default();
            let mut entries = vec![bin];
            entries.extend(std::env::split_paths(&path));
            if let Ok(joined) = std::env::join_paths(entries) {
                cmd.env("PATH", joined);
            }
            cmd.env("VIRTUAL_ENV", &venv);
        }

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                let exit_code = if e.kind() == std::io::ErrorKind::NotFound {
                    NOT_FOUND_EXITS[0]
                } else {
                    GATE_UNAVAILABLE_EXIT
                };
                return CommandResult {
                    exit_code,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    timed_out: false,
                };
            }
        };

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let reader = tokio::spawn(async move {
            let mut stdout = String::new();
            let mut stderr = String::new();
            if let Some(pipe) = stdout_pipe.as_mut() {
                let _ = pipe.read_to_string(&mut stdout).await;
            }
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_string(&mut stderr).await;
            }
            (stdout, stderr)
        });

        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let (stdout, stderr) = reader.await.unwrap_or_default();
                CommandResult {
                    exit_code: status.code().unwrap_or(GATE_UNAVAILABLE_EXIT),
                    stdout,
                    stderr,
                    duration_ms: started.elapsed().as_millis() as u64,
                    timed_out: false,
                }
            }
            Ok(Err(e)) => CommandResult {
                exit_code: GATE_UNAVAILABLE_EXIT,
                stdout: String::new(),
                stderr: e.to_string(),
                duration_ms: started.elapsed().as_millis() as u64,
                timed_out: false,
            },
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                reader.abort();
                CommandResult {
                    exit_code: GATE_UNAVAILABLE_EXIT,
                    stdout: String::new(),
                    stderr: String::new(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    timed_out: true,
                }
            }
        }
    }

    /// Substitute a bare `python` invocation with the venv interpreter.
    fn venv_adjusted(&self, command: &str) -> String {
        if let Some(venv) = detect_venv(&self.root) {
            if let Some(python) = venv_python(&venv) {
                if let Some(rest) = command.strip_prefix("python ") {
                    return format!("{} {}", python.display(), rest);
                }
            }
        }
        command.to_string()
    }
}

/// Every enabled required gate passed.
pub fn should_allow_progression(outputs: &IndexMap<String, GateOutput>) -> bool {
    outputs.values().filter(|o| o.required).all(|o| o.passed)
}

/// Best-effort failure digest: test-runner counts when present, else the
/// first few error/fail lines.
fn summarize_errors(gate_type: GateType, stdout: &str, stderr: &str) -> Option<String> {
    let combined = format!("{stdout}\n{stderr}");

    if gate_type == GateType::Test {
        if let Some(caps) = FAILURE_COUNT.captures(&combined) {
            return Some(format!("{} test(s) failed", &caps[1]));
        }
    }

    let lines: Vec<&str> = combined
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("error") || lower.contains("fail")
        })
        .take(5)
        .collect();

    if lines.is_empty() {
        Some("Command failed".to_string())
    } else {
        Some(lines.join("\n"))
    }
}

fn excerpt(text: &str) -> String {
    if text.len() <= EXCERPT_LIMIT {
        return text.to_string();
    }
    let mut end = EXCERPT_LIMIT;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
#[path = "gates_tests.rs"]
mod tests;
