//! Test utilities and mocks for xb unit tests.
//!
//! The central piece is [`RecordingRunner`], a [`ProcessRunner`] that never
//! spawns anything: it records every invocation and answers with a scripted
//! [`MockProcessOutput`].
//!
//! # Example
//!
//! ```rust,ignore
//! let runner = RecordingRunner::new()
//!     .respond_with(|pb| MockProcessOutput::status(if pb.get_args()[0] == "pull" { 1 } else { 0 }));
//! let ctx = test_context(tmp.path(), runner.clone());
//!
//! // Run a handler against ctx...
//! assert_eq!(runner.calls().len(), 1);
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::core::workspace::Workspace;
use crate::util::config::Config;
use crate::util::context::GlobalContext;
use crate::util::process::{Captured, ProcessBuilder, ProcessRunner};
use crate::util::shell::Shell;

/// Mock process output for testing command execution.
#[derive(Debug, Clone, Default)]
pub struct MockProcessOutput {
    /// Exit status code (0 = success).
    pub status: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl MockProcessOutput {
    /// Create a successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        MockProcessOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Create a failure output with the given stderr and status code.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Create an output carrying only a status code.
    pub fn status(status: i32) -> Self {
        MockProcessOutput {
            status,
            ..MockProcessOutput::default()
        }
    }
}

type Responder = dyn Fn(&ProcessBuilder) -> MockProcessOutput + Send + Sync;

/// Process runner that records invocations instead of spawning them.
///
/// Clones share the same call log, so a test can keep one handle while the
/// context owns another. The failure policy of each invocation is honored
/// exactly like the system runner does; redirect targets receive the scripted
/// output.
#[derive(Clone)]
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<ProcessBuilder>>>,
    responder: Arc<Responder>,
}

impl RecordingRunner {
    /// Create a runner answering every invocation with success.
    pub fn new() -> Self {
        RecordingRunner {
            calls: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(|_| MockProcessOutput::default()),
        }
    }

    /// Script the output of each invocation. The closure may also touch the
    /// filesystem to simulate side effects of the tool.
    pub fn respond_with(
        mut self,
        responder: impl Fn(&ProcessBuilder) -> MockProcessOutput + Send + Sync + 'static,
    ) -> Self {
        self.responder = Arc::new(responder);
        self
    }

    /// All invocations so far, in order.
    pub fn calls(&self) -> Vec<ProcessBuilder> {
        self.calls.lock().unwrap().clone()
    }

    /// Invocations rendered as command lines.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(ProcessBuilder::display_command)
            .collect()
    }

    fn record(&self, process: &ProcessBuilder) -> MockProcessOutput {
        self.calls.lock().unwrap().push(process.clone());
        (self.responder)(process)
    }
}

impl Default for RecordingRunner {
    fn default() -> Self {
        RecordingRunner::new()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, process: &ProcessBuilder) -> Result<i32> {
        let output = self.record(process);
        if let Some(path) = process.get_stdout() {
            write_file(path, &output.stdout)?;
        }
        if let Some(path) = process.get_stderr() {
            write_file(path, &output.stderr)?;
        }
        process.check_status(output.status)
    }

    fn capture(&self, process: &ProcessBuilder) -> Result<Captured> {
        let output = self.record(process);
        let status = process.check_status(output.status)?;
        Ok(Captured {
            status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Context rooted at `root` with default configuration, a quiet shell and
/// a cache directory inside `root`.
pub fn test_context(root: &Path, runner: RecordingRunner) -> GlobalContext {
    GlobalContext::with_parts(
        root.to_path_buf(),
        Workspace::new(root, Config::default()),
        Box::new(runner),
        Shell::quiet(),
    )
    .with_cache_dir(root.join(".cache"))
}

/// Same as [`test_context`] with an explicit configuration.
pub fn test_context_with_config(
    root: &Path,
    config: Config,
    runner: RecordingRunner,
) -> GlobalContext {
    GlobalContext::with_parts(
        root.to_path_buf(),
        Workspace::new(root, config),
        Box::new(runner),
        Shell::quiet(),
    )
    .with_cache_dir(root.join(".cache"))
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Create an executable file at `path` and return the path.
pub fn write_executable(path: &Path) -> PathBuf {
    write_file(path, "#!/bin/sh\nexit 0\n").unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::process::FailurePolicy;
    use tempfile::TempDir;

    #[test]
    fn test_recording_runner_records_calls() {
        let runner = RecordingRunner::new();
        runner
            .run(&ProcessBuilder::new("git").args(["pull", "--rebase"]))
            .unwrap();

        assert_eq!(runner.command_lines(), ["git pull --rebase"]);
    }

    #[test]
    fn test_recording_runner_honors_policy() {
        let runner = RecordingRunner::new().respond_with(|_| MockProcessOutput::status(4));

        assert!(runner.run(&ProcessBuilder::new("ninja")).is_err());
        let status = runner
            .run(&ProcessBuilder::new("ninja").policy(FailurePolicy::ReturnCode))
            .unwrap();
        assert_eq!(status, 4);
    }

    #[test]
    fn test_recording_runner_writes_redirects() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("logs/out.log");
        let runner = RecordingRunner::new().respond_with(|_| MockProcessOutput::success("dumped"));

        runner
            .run(&ProcessBuilder::new("dump").stdout_to(&out))
            .unwrap();

        assert_eq!(std::fs::read_to_string(out).unwrap(), "dumped");
    }
}
