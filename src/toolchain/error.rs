//! Toolchain prerequisite errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::util::diagnostic::suggestions;

/// A required tool or checkout is missing and cannot be obtained.
///
/// All variants are fatal: the binary reports them with a remediation hint
/// and exits with status 1.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("vendored dependency checkout is missing ({} not found)", marker.display())]
    DependenciesMissing { marker: PathBuf },

    #[error("no native compiler environment could be imported")]
    NoCompilerEnvironment,

    #[error("cannot relocate {}: vendored source is missing", source_dir.display())]
    VendoredSourceMissing { source_dir: PathBuf },

    #[error("`{name}` could not be located or built")]
    BootstrapFailed { name: String },

    #[error("build driver `{name}` could not be found")]
    DriverMissing { name: String },

    #[error("{} does not exist", path.display())]
    BinaryMissing { path: PathBuf },

    #[error("{} failed its health probe (exit code {code}, expected {expected})", path.display())]
    UnhealthyBinary {
        path: PathBuf,
        code: i32,
        expected: i32,
    },
}

impl ToolchainError {
    /// Remediation hint shown after the error.
    pub fn suggestion(&self) -> &'static str {
        match self {
            ToolchainError::DependenciesMissing { .. }
            | ToolchainError::VendoredSourceMissing { .. } => suggestions::FETCH_DEPENDENCIES,
            ToolchainError::NoCompilerEnvironment => suggestions::INSTALL_COMPILER,
            ToolchainError::BootstrapFailed { .. } => suggestions::BOOTSTRAP_FAILED,
            ToolchainError::DriverMissing { .. } => suggestions::DRIVER_MISSING,
            ToolchainError::BinaryMissing { .. } | ToolchainError::UnhealthyBinary { .. } => {
                suggestions::BUILD_FIRST
            }
        }
    }
}
