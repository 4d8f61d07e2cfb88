//! Subprocess execution utilities.
//!
//! Every external tool `xb` drives (git, the project generator, the build
//! driver, test binaries) goes through a [`ProcessRunner`]. A
//! [`ProcessBuilder`] describes one invocation: program, arguments, working
//! directory, an [`EnvOverlay`] applied on top of the inherited environment,
//! the [`FailurePolicy`] and optional redirect targets for stdout/stderr.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::util::fs::ensure_dir;

/// Status reported under [`FailurePolicy::ReturnCode`] when the program could
/// not be started at all (the shell's "command not found" convention).
pub const SPAWN_FAILURE_STATUS: i32 = 127;

/// What to do when an invocation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Spawn failures and non-zero exits become a [`ProcessError`].
    #[default]
    Raise,
    /// Failures are reported as an integer status instead.
    ReturnCode,
}

/// Failure of an invocation run under [`FailurePolicy::Raise`].
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn `{command}`")]
    Spawn {
        command: String,
        #[source]
        cause: std::io::Error,
    },

    #[error("`{command}` failed with exit code {code}")]
    Failed { command: String, code: i32 },
}

/// Immutable set of environment variables applied to child processes on top
/// of the inherited environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    vars: BTreeMap<String, String>,
}

impl EnvOverlay {
    /// Create an empty overlay.
    pub fn new() -> Self {
        EnvOverlay::default()
    }

    /// Return a copy of this overlay with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Look up a variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Iterate over all variables in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Combine two overlays; values from `other` win.
    pub fn merged(&self, other: &EnvOverlay) -> EnvOverlay {
        let mut vars = self.vars.clone();
        vars.extend(other.vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        EnvOverlay { vars }
    }
}

impl FromIterator<(String, String)> for EnvOverlay {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        EnvOverlay {
            vars: iter.into_iter().collect(),
        }
    }
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    env: EnvOverlay,
    cwd: Option<PathBuf>,
    policy: FailurePolicy,
    stdout: Option<PathBuf>,
    stderr: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: EnvOverlay::new(),
            cwd: None,
            policy: FailurePolicy::Raise,
            stdout: None,
            stderr: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env = self.env.with(key, value);
        self
    }

    /// Apply every variable of `overlay`.
    pub fn overlay(mut self, overlay: &EnvOverlay) -> Self {
        self.env = self.env.merged(overlay);
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Set the failure policy.
    pub fn policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Redirect standard output to a file (truncated on open).
    pub fn stdout_to(mut self, path: impl AsRef<Path>) -> Self {
        self.stdout = Some(path.as_ref().to_path_buf());
        self
    }

    /// Redirect standard error to a file (truncated on open).
    pub fn stderr_to(mut self, path: impl AsRef<Path>) -> Self {
        self.stderr = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn get_program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_env(&self) -> &EnvOverlay {
        &self.env
    }

    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn get_policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn get_stdout(&self) -> Option<&Path> {
        self.stdout.as_deref()
    }

    pub fn get_stderr(&self) -> Option<&Path> {
        self.stderr.as_deref()
    }

    /// Build the Command.
    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in self.env.iter() {
            cmd.env(key, value);
        }

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Display the command for logs and error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }

    /// Map a finished invocation's status through the failure policy.
    pub fn check_status(&self, code: i32) -> Result<i32> {
        if code != 0 && self.policy == FailurePolicy::Raise {
            return Err(ProcessError::Failed {
                command: self.display_command(),
                code,
            }
            .into());
        }
        Ok(code)
    }

    /// Map a spawn failure through the failure policy.
    fn spawn_failed(&self, cause: std::io::Error) -> Result<i32> {
        match self.policy {
            FailurePolicy::Raise => Err(ProcessError::Spawn {
                command: self.display_command(),
                cause,
            }
            .into()),
            FailurePolicy::ReturnCode => {
                tracing::warn!("failed to spawn `{}`: {}", self.display_command(), cause);
                Ok(SPAWN_FAILURE_STATUS)
            }
        }
    }
}

/// Output of a captured invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Executes external processes.
///
/// Implementations must honor the builder's failure policy and redirect
/// targets. The trait is `Sync` so a runner can be shared by the worker pool
/// of `trace-dump`.
pub trait ProcessRunner: Send + Sync {
    /// Run to completion with inherited (or redirected) output and return the
    /// exit status.
    fn run(&self, process: &ProcessBuilder) -> Result<i32>;

    /// Run to completion capturing stdout and stderr.
    fn capture(&self, process: &ProcessBuilder) -> Result<Captured>;
}

/// [`ProcessRunner`] that spawns real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, process: &ProcessBuilder) -> Result<i32> {
        tracing::debug!("running `{}`", process.display_command());

        let mut cmd = process.build_command();

        // The command owns the redirect files from here on; they are closed
        // when `cmd` goes out of scope, whichever way this function returns.
        if let Some(path) = process.get_stdout() {
            cmd.stdout(Stdio::from(open_redirect(path)?));
        }
        if let Some(path) = process.get_stderr() {
            cmd.stderr(Stdio::from(open_redirect(path)?));
        }

        match cmd.status() {
            Ok(status) => process.check_status(exit_code(status)),
            Err(cause) => process.spawn_failed(cause),
        }
    }

    fn capture(&self, process: &ProcessBuilder) -> Result<Captured> {
        tracing::debug!("capturing `{}`", process.display_command());

        let mut cmd = process.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = match cmd.output() {
            Ok(output) => output,
            Err(cause) => {
                let status = process.spawn_failed(cause)?;
                return Ok(Captured {
                    status,
                    ..Captured::default()
                });
            }
        };

        let status = process.check_status(exit_code(output.status))?;
        Ok(Captured {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn open_redirect(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    File::create(path)
        .with_context(|| format!("failed to open redirect target: {}", path.display()))
}

/// Exit code of a finished child; termination by signal counts as 1.
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_display_command() {
        let pb = ProcessBuilder::new("ninja").args(["-C", "build/app/Release"]);

        assert_eq!(pb.display_command(), "ninja -C build/app/Release");
    }

    #[test]
    fn test_overlay_merge_prefers_newer_values() {
        let base = EnvOverlay::new().with("PATH", "a").with("LIB", "x");
        let merged = base.merged(&EnvOverlay::new().with("PATH", "b"));

        assert_eq!(merged.get("PATH"), Some("b"));
        assert_eq!(merged.get("LIB"), Some("x"));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_check_status_follows_policy() {
        let raise = ProcessBuilder::new("tool");
        assert!(raise.check_status(0).is_ok());
        let err = raise.check_status(3).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ProcessError>(),
            Some(ProcessError::Failed { code: 3, .. })
        ));

        let lenient = ProcessBuilder::new("tool").policy(FailurePolicy::ReturnCode);
        assert_eq!(lenient.check_status(3).unwrap(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_return_code_policy_returns_child_status() {
        let status = SystemRunner
            .run(
                &ProcessBuilder::new("sh")
                    .args(["-c", "exit 7"])
                    .policy(FailurePolicy::ReturnCode),
            )
            .unwrap();

        assert_eq!(status, 7);
    }

    #[cfg(unix)]
    #[test]
    fn test_raise_policy_reports_non_zero_exit() {
        let err = SystemRunner
            .run(&ProcessBuilder::new("sh").args(["-c", "exit 2"]))
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ProcessError>(),
            Some(ProcessError::Failed { code: 2, .. })
        ));
    }

    #[test]
    fn test_spawn_failure_propagates_and_releases_redirects() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("logs/out.log");
        let err_log = tmp.path().join("logs/err.log");

        let err = SystemRunner
            .run(
                &ProcessBuilder::new("xb-this-program-does-not-exist")
                    .stdout_to(&out)
                    .stderr_to(&err_log),
            )
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ProcessError>(),
            Some(ProcessError::Spawn { .. })
        ));
        assert!(out.exists());
        // Both handles were released, so the files can be removed.
        std::fs::remove_file(&out).unwrap();
        std::fs::remove_file(&err_log).unwrap();
    }

    #[test]
    fn test_spawn_failure_under_return_code_policy() {
        let status = SystemRunner
            .run(
                &ProcessBuilder::new("xb-this-program-does-not-exist")
                    .policy(FailurePolicy::ReturnCode),
            )
            .unwrap();

        assert_eq!(status, SPAWN_FAILURE_STATUS);
    }

    #[cfg(unix)]
    #[test]
    fn test_redirected_stdout_is_written() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out.log");

        SystemRunner
            .run(&ProcessBuilder::new("sh").args(["-c", "echo hello"]).stdout_to(&out))
            .unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap().trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_with_overlay() {
        let captured = SystemRunner
            .capture(
                &ProcessBuilder::new("sh")
                    .args(["-c", "echo $XB_PROBE"])
                    .overlay(&EnvOverlay::new().with("XB_PROBE", "17")),
            )
            .unwrap();

        assert_eq!(captured.status, 0);
        assert_eq!(captured.stdout.trim(), "17");
    }
}
