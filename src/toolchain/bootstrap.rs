//! Build-file generator bootstrap.
//!
//! The generator is resolved through a fallback chain: a freshly built copy
//! in the vendored checkout, then the checked-in prebuilt copy, then a
//! source build. The chain is an explicit state machine:
//!
//! ```text
//! Unresolved ──► Resolved
//!     │
//!     └──► BuildAttempted ──► Resolved
//!                  │
//!                  └──► Failed
//! ```
//!
//! A source build's exit status is not trusted; only the presence of the
//! built binary afterwards decides between `Resolved` and `Failed`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::platform::{is_restricted_filesystem, HostPlatform};
use crate::toolchain::error::ToolchainError;
use crate::toolchain::locate::is_executable;
use crate::util::context::GlobalContext;
use crate::util::process::{EnvOverlay, FailurePolicy, ProcessBuilder};
use crate::util::shell::Status;

/// Where the bootstrapper is in the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapState {
    Unresolved,
    Resolved(PathBuf),
    BuildAttempted,
    Failed,
}

/// Paths involved in resolving the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorLayout {
    /// Vendored source checkout
    pub source_dir: PathBuf,
    /// Output of a source build
    pub built: PathBuf,
    /// Checked-in prebuilt copy
    pub prebuilt: PathBuf,
    /// Bootstrap makefile; its presence marks a fetched checkout
    pub marker: PathBuf,
}

impl GeneratorLayout {
    /// Layout of the generator in the context's workspace.
    pub fn for_context(ctx: &GlobalContext) -> Self {
        let workspace = ctx.workspace();
        let source_dir = workspace.generator_source_dir();
        let mut layout = GeneratorLayout {
            source_dir: source_dir.clone(),
            built: PathBuf::new(),
            prebuilt: workspace.generator_prebuilt(ctx.host()),
            marker: PathBuf::new(),
        };
        layout.rebase(ctx, source_dir);
        layout
    }

    /// Point the source-relative paths at `source_dir`.
    fn rebase(&mut self, ctx: &GlobalContext, source_dir: PathBuf) {
        let generator = &ctx.workspace().config().generator;
        self.built = source_dir
            .join(&generator.built_dir)
            .join(ctx.host().exe_name(&generator.name));
        self.marker = source_dir.join(&generator.bootstrap_makefile);
        self.source_dir = source_dir;
    }
}

/// Resolves the generator executable, building it if needed.
pub struct GeneratorBootstrapper<'a> {
    ctx: &'a GlobalContext,
    layout: GeneratorLayout,
    state: BootstrapState,
    restricted_mounts: Vec<PathBuf>,
}

impl<'a> GeneratorBootstrapper<'a> {
    pub fn new(ctx: &'a GlobalContext) -> Self {
        GeneratorBootstrapper {
            ctx,
            layout: GeneratorLayout::for_context(ctx),
            state: BootstrapState::Unresolved,
            restricted_mounts: Vec::new(),
        }
    }

    /// Treat checkouts under any of `mounts` as living on a filesystem that
    /// forbids executables, in addition to the built-in ones.
    pub fn with_restricted_mounts(mut self, mounts: Vec<PathBuf>) -> Self {
        self.restricted_mounts = mounts;
        self
    }

    pub fn state(&self) -> &BootstrapState {
        &self.state
    }

    pub fn layout(&self) -> &GeneratorLayout {
        &self.layout
    }

    /// Run the fallback chain to completion.
    pub fn ensure(&mut self) -> Result<PathBuf> {
        loop {
            match &self.state {
                BootstrapState::Resolved(path) => return Ok(path.clone()),
                BootstrapState::Failed => {
                    return Err(ToolchainError::BootstrapFailed {
                        name: self.generator_name().to_string(),
                    }
                    .into())
                }
                BootstrapState::Unresolved | BootstrapState::BuildAttempted => {}
            }
            self.step()?;
        }
    }

    /// Advance the state machine by one transition.
    pub fn step(&mut self) -> Result<()> {
        let next = match self.state {
            BootstrapState::Unresolved => self.resolve()?,
            BootstrapState::BuildAttempted => {
                if is_executable(&self.layout.built) {
                    tracing::info!("built {}", self.layout.built.display());
                    BootstrapState::Resolved(self.layout.built.clone())
                } else {
                    tracing::warn!(
                        "source build did not produce {}",
                        self.layout.built.display()
                    );
                    BootstrapState::Failed
                }
            }
            BootstrapState::Resolved(_) | BootstrapState::Failed => return Ok(()),
        };
        self.state = next;
        Ok(())
    }

    fn generator_name(&self) -> &str {
        &self.ctx.workspace().config().generator.name
    }

    fn resolve(&mut self) -> Result<BootstrapState> {
        if self.is_restricted() {
            self.relocate()?;
        }

        if is_executable(&self.layout.built) {
            tracing::debug!("using built generator {}", self.layout.built.display());
            return Ok(BootstrapState::Resolved(self.layout.built.clone()));
        }
        if is_executable(&self.layout.prebuilt) {
            tracing::debug!("using prebuilt generator {}", self.layout.prebuilt.display());
            return Ok(BootstrapState::Resolved(self.layout.prebuilt.clone()));
        }

        self.build_from_source()?;
        Ok(BootstrapState::BuildAttempted)
    }

    fn is_restricted(&self) -> bool {
        let root = self.ctx.workspace().root();
        is_restricted_filesystem(root)
            || self
                .restricted_mounts
                .iter()
                .any(|mount| root.starts_with(mount))
    }

    /// Shallow-clone the vendored source into the cache so it can be built
    /// and executed there.
    fn relocate(&mut self) -> Result<()> {
        let source_dir = self.layout.source_dir.clone();
        if !source_dir.is_dir() {
            return Err(ToolchainError::VendoredSourceMissing { source_dir }.into());
        }

        let name = source_dir
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| self.generator_name().into());
        let dest = self.ctx.cache_dir().join(name);

        if dest.is_dir() {
            tracing::debug!("reusing relocated checkout {}", dest.display());
        } else {
            self.ctx.shell().status(
                Status::Fetching,
                format!("{} into {}", source_dir.display(), dest.display()),
            );
            let url = format!("file://{}", source_dir.display());
            self.ctx.runner().run(
                &ProcessBuilder::new("git")
                    .args(["clone", "--depth", "1"])
                    .arg(&url)
                    .arg(&dest),
            )?;
        }

        let ctx = self.ctx;
        self.layout.rebase(ctx, dest);
        Ok(())
    }

    fn build_from_source(&self) -> Result<()> {
        if !self.layout.marker.is_file() {
            return Err(ToolchainError::DependenciesMissing {
                marker: self.layout.marker.clone(),
            }
            .into());
        }

        let host = self.ctx.host();
        let (make, overlay) = match host {
            HostPlatform::Windows => {
                let Some(env) = self.ctx.native_environment()? else {
                    return Err(ToolchainError::NoCompilerEnvironment.into());
                };
                ("nmake", env.overlay.clone())
            }
            _ => ("make", EnvOverlay::new()),
        };

        self.ctx.shell().status(
            Status::Bootstrapping,
            format!("{} from {}", self.generator_name(), self.layout.source_dir.display()),
        );
        tracing::info!("building {} from source", self.generator_name());

        let status = self.ctx.runner().run(
            &build_command(make, &self.layout.marker, host)
                .cwd(&self.layout.source_dir)
                .overlay(&overlay)
                .policy(FailurePolicy::ReturnCode),
        )?;
        if status != 0 {
            tracing::warn!("{} exited with status {}", make, status);
        }
        Ok(())
    }
}

fn build_command(make: &str, makefile: &Path, host: HostPlatform) -> ProcessBuilder {
    let makefile = makefile
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| makefile.to_path_buf());
    ProcessBuilder::new(make)
        .arg("-f")
        .arg(makefile)
        .arg(host.bootstrap_target())
}

/// Resolve the generator for `ctx`, building it when needed.
pub fn ensure_generator(ctx: &GlobalContext) -> Result<PathBuf> {
    GeneratorBootstrapper::new(ctx).ensure()
}
