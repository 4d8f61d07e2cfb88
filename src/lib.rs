//! xb - build orchestration front-end for a large native project
//!
//! This crate provides the library behind the `xb` binary: the command
//! registry and dispatcher, toolchain discovery and bootstrap, and the
//! command pipelines that drive git, the project generator and the build
//! driver.

pub mod core;
pub mod ops;
pub mod toolchain;
pub mod util;

/// Test utilities and mocks for xb unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a recording process runner and context
/// constructors rooted in temporary directories.
#[cfg(test)]
pub(crate) mod test_support;

pub use crate::core::{dispatch, Command, HostPlatform, Profile, Registry, Workspace};
pub use ops::builtin_commands;
pub use toolchain::ToolchainError;
pub use util::context::GlobalContext;
