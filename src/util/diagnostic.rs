//! User-friendly diagnostic messages.
//!
//! Every fatal error printed by the binary carries the root cause chain and,
//! when the failure is a known prerequisite problem, a remediation hint.

use std::fmt::Write as _;

use crate::toolchain::ToolchainError;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Vendored checkouts are missing or incomplete.
    pub const FETCH_DEPENDENCIES: &str =
        "help: Run `xb setup` to fetch the vendored dependencies";

    /// No Visual Studio installation could be imported.
    pub const INSTALL_COMPILER: &str = "help: Install Visual Studio 2017 or newer with the \
         \"Desktop development with C++\" workload";

    /// The generator could not be obtained.
    pub const BOOTSTRAP_FAILED: &str =
        "help: Run `xb setup`, or build the generator by hand and place it in tools/build/bin";

    /// The build driver is missing.
    pub const DRIVER_MISSING: &str =
        "help: Run `xb setup` to bootstrap the build driver, or put it on PATH";

    /// A binary produced by the build is missing or broken.
    pub const BUILD_FIRST: &str = "help: Run `xb build` first";
}

/// Render an error with its cause chain and, when known, a suggestion.
pub fn render(err: &anyhow::Error) -> String {
    let mut out = format!("error: {:#}", err);
    if let Some(suggestion) = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<ToolchainError>())
        .map(ToolchainError::suggestion)
    {
        let _ = write!(out, "\n\n{}", suggestion);
    }
    out
}
