//! Global context for xb operations.
//!
//! Provides centralized access to the workspace, the process runner, the
//! shell and the imported native compiler environment.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::core::platform::HostPlatform;
use crate::core::workspace::Workspace;
use crate::toolchain::env::{import_native_toolchain_environment, ImportedEnvironment};
use crate::util::process::{EnvOverlay, ProcessRunner, SystemRunner};
use crate::util::shell::Shell;

/// Global context shared by every handler of one invocation.
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Checkout being operated on
    workspace: Workspace,

    /// Platform-specific behavior is selected from this
    host: HostPlatform,

    /// Executes external processes
    runner: Box<dyn ProcessRunner>,

    /// User-facing output
    shell: Shell,

    /// Per-user cache (relocated checkouts)
    cache_dir: PathBuf,

    /// Native compiler environment, imported at most once
    native_env: OnceCell<Option<ImportedEnvironment>>,
}

impl GlobalContext {
    /// Create a context for the current directory with the system runner.
    pub fn new(shell: Shell) -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        let workspace = Workspace::discover(&cwd)?;
        Ok(GlobalContext::with_parts(cwd, workspace, Box::new(SystemRunner), shell))
    }

    /// Create a context from explicit parts.
    pub fn with_parts(
        cwd: PathBuf,
        workspace: Workspace,
        runner: Box<dyn ProcessRunner>,
        shell: Shell,
    ) -> Self {
        let cache_dir = ProjectDirs::from("", "", "xb")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| workspace.build_dir().join(".cache"));

        GlobalContext {
            cwd,
            workspace,
            host: HostPlatform::current(),
            runner,
            shell,
            cache_dir,
            native_env: OnceCell::new(),
        }
    }

    /// Override the host platform.
    pub fn with_host(mut self, host: HostPlatform) -> Self {
        self.host = host;
        self
    }

    /// Override the cache directory.
    pub fn with_cache_dir(mut self, cache_dir: PathBuf) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    /// Use an already known native environment instead of importing one.
    pub fn with_native_environment(self, env: Option<ImportedEnvironment>) -> Self {
        let _ = self.native_env.set(env);
        self
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn host(&self) -> HostPlatform {
        self.host
    }

    pub fn runner(&self) -> &dyn ProcessRunner {
        self.runner.as_ref()
    }

    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The native compiler environment, imported on first use.
    pub fn native_environment(&self) -> Result<Option<&ImportedEnvironment>> {
        if let Some(env) = self.native_env.get() {
            return Ok(env.as_ref());
        }

        let imported =
            import_native_toolchain_environment(self.runner(), self.workspace.root())?;
        match &imported {
            Some(env) => tracing::info!(
                "imported Visual Studio {} environment from {}",
                env.installation.version,
                env.installation.path.display()
            ),
            None => tracing::debug!("no native compiler environment imported"),
        }

        let _ = self.native_env.set(imported);
        Ok(self.native_env.get().and_then(Option::as_ref))
    }

    /// Overlay applied to toolchain invocations: the imported compiler
    /// environment on Windows, nothing elsewhere.
    pub fn toolchain_overlay(&self) -> Result<EnvOverlay> {
        if !self.host.is_windows() {
            return Ok(EnvOverlay::new());
        }
        Ok(self
            .native_environment()?
            .map(|env| env.overlay.clone())
            .unwrap_or_default())
    }
}
