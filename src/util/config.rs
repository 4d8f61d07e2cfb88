//! Configuration file support for xb.
//!
//! Two configuration file locations are read:
//! - Global: `<user config dir>/xb/config.toml` - User-wide defaults
//! - Project: `xb.toml` at the workspace root - Project-specific settings
//!
//! Project config takes precedence over global config. Merging happens on
//! the raw TOML tables, so a project file only needs the keys it changes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the project configuration file; also marks the workspace root.
pub const PROJECT_CONFIG_FILE: &str = "xb.toml";

/// xb configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub paths: PathsConfig,
    pub generator: GeneratorConfig,
    pub driver: DriverConfig,
    pub test: TestConfig,
    pub trace: TraceConfig,
}

/// Project identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name (defaults to the workspace directory name)
    pub name: Option<String>,

    /// Generator project description, relative to the root
    pub project_file: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        ProjectConfig {
            name: None,
            project_file: PathBuf::from("premake5.lua"),
        }
    }
}

/// Output tree layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Top-level build output directory (removed by `nuke`)
    pub build_dir: PathBuf,

    /// Generated project directory (removed by `clean`);
    /// defaults to `<build_dir>/<project name>`
    pub generated_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            build_dir: PathBuf::from("build"),
            generated_dir: None,
        }
    }
}

/// Build-file generator and where to find or build it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Executable stem (platform suffix added automatically)
    pub name: String,

    /// Vendored generator source checkout
    pub source_dir: PathBuf,

    /// Makefile used to bootstrap the generator; its presence marks a
    /// fetched checkout
    pub bootstrap_makefile: String,

    /// Output directory of a source build, relative to `source_dir`
    pub built_dir: PathBuf,

    /// Directory holding a checked-in prebuilt copy
    pub prebuilt_dir: PathBuf,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            name: "premake5".to_string(),
            source_dir: PathBuf::from("third_party/premake-core"),
            bootstrap_makefile: "Bootstrap.mak".to_string(),
            built_dir: PathBuf::from("bin/release"),
            prebuilt_dir: PathBuf::from("tools/build/bin"),
        }
    }
}

/// Incremental build driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Executable stem, also the generator backend producing its input
    pub name: String,

    /// Vendored driver source checkout
    pub source_dir: PathBuf,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            name: "ninja".to_string(),
            source_dir: PathBuf::from("third_party/ninja"),
        }
    }
}

/// Test runner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    /// Code-generation fixtures rebuilt with `make -C` before testing
    pub fixtures_dir: PathBuf,

    /// Test binary stem (defaults to `<project name>-tests`)
    pub binary: Option<String>,
}

impl Default for TestConfig {
    fn default() -> Self {
        TestConfig {
            fixtures_dir: PathBuf::from("test/codegen"),
            binary: None,
        }
    }
}

/// Trace dump settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Trace dump binary stem (defaults to `<project name>-trace-dump`)
    pub binary: Option<String>,

    /// Trace file extension
    pub extension: String,

    /// Default number of parallel dumps
    pub jobs: Option<usize>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        TraceConfig {
            binary: None,
            extension: "xtr".to_string(),
            jobs: None,
        }
    }
}

/// Get the global config path (`<user config dir>/xb/config.toml`).
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "xb").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load merged configuration from the global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (`xb.toml`)
/// 2. Global config
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Result<Config> {
    let mut merged = toml::Value::Table(toml::map::Map::new());

    for path in global_path.into_iter().chain(std::iter::once(project_path)) {
        if !path.is_file() {
            continue;
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let value: toml::Value = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))?;
        tracing::debug!("loaded config from {}", path.display());
        merge_values(&mut merged, value);
    }

    merged
        .try_into::<Config>()
        .context("invalid configuration")
}

/// Deep-merge `overlay` into `base`; tables merge key by key, anything else
/// is replaced.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
