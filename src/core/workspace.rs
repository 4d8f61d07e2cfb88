//! Workspace - central layout hub.
//!
//! A Workspace is the checkout `xb` operates on: its root directory plus the
//! merged configuration, exposing every path the handlers and the toolchain
//! bootstrapper touch.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::core::platform::HostPlatform;
use crate::core::profile::Profile;
use crate::util::config::{global_config_path, load_config, Config, PROJECT_CONFIG_FILE};

/// Find the workspace root: the nearest ancestor of `cwd` holding `xb.toml`,
/// or `cwd` itself when there is none.
pub fn find_root(cwd: &Path) -> PathBuf {
    cwd.ancestors()
        .find(|dir| dir.join(PROJECT_CONFIG_FILE).is_file())
        .unwrap_or(cwd)
        .to_path_buf()
}

/// A checkout and its configuration.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    /// Create a workspace from an explicit root and configuration.
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Workspace {
            root: root.into(),
            config,
        }
    }

    /// Discover the workspace containing `cwd` and load its configuration.
    pub fn discover(cwd: &Path) -> Result<Self> {
        let root = find_root(cwd);
        let global = global_config_path();
        let config = load_config(global.as_deref(), &root.join(PROJECT_CONFIG_FILE))?;
        tracing::debug!("workspace root: {}", root.display());
        Ok(Workspace::new(root, config))
    }

    /// Get the workspace root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Project name; defaults to the root directory name.
    pub fn project_name(&self) -> String {
        self.config
            .project
            .name
            .clone()
            .or_else(|| {
                self.root
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "project".to_string())
    }

    /// Generator project description.
    pub fn project_file(&self) -> PathBuf {
        self.root.join(&self.config.project.project_file)
    }

    /// Top-level build output tree.
    pub fn build_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.build_dir)
    }

    /// Generated project tree.
    pub fn generated_dir(&self) -> PathBuf {
        match &self.config.paths.generated_dir {
            Some(dir) => self.root.join(dir),
            None => self.build_dir().join(self.project_name()),
        }
    }

    /// Directory the build driver runs in for `profile`.
    pub fn profile_dir(&self, profile: Profile) -> PathBuf {
        self.generated_dir().join(profile.as_str())
    }

    /// Directory binaries for `profile` are linked into.
    pub fn bin_dir(&self, profile: Profile) -> PathBuf {
        self.build_dir().join("bin").join(profile.as_str())
    }

    /// Vendored generator source checkout.
    pub fn generator_source_dir(&self) -> PathBuf {
        self.root.join(&self.config.generator.source_dir)
    }

    /// Checked-in prebuilt generator.
    pub fn generator_prebuilt(&self, host: HostPlatform) -> PathBuf {
        self.root
            .join(&self.config.generator.prebuilt_dir)
            .join(host.exe_name(&self.config.generator.name))
    }

    /// Vendored build driver checkout.
    pub fn driver_source_dir(&self) -> PathBuf {
        self.root.join(&self.config.driver.source_dir)
    }

    /// Build driver bootstrapped inside its vendored checkout.
    pub fn driver_vendored(&self, host: HostPlatform) -> PathBuf {
        self.driver_source_dir()
            .join(host.exe_name(&self.config.driver.name))
    }

    /// Code-generation test fixtures.
    pub fn fixtures_dir(&self) -> PathBuf {
        self.root.join(&self.config.test.fixtures_dir)
    }

    /// Test runner binary for `profile`.
    pub fn test_binary(&self, profile: Profile, host: HostPlatform) -> PathBuf {
        let stem = self
            .config
            .test
            .binary
            .clone()
            .unwrap_or_else(|| format!("{}-tests", self.project_name()));
        self.bin_dir(profile).join(host.exe_name(&stem))
    }

    /// Trace dump binary for `profile`.
    pub fn trace_dump_binary(&self, profile: Profile, host: HostPlatform) -> PathBuf {
        let stem = self
            .config
            .trace
            .binary
            .clone()
            .unwrap_or_else(|| format!("{}-trace-dump", self.project_name()));
        self.bin_dir(profile).join(host.exe_name(&stem))
    }

    /// Default output directory for trace dumps.
    pub fn trace_dump_dir(&self) -> PathBuf {
        self.build_dir().join("trace-dumps")
    }
}
