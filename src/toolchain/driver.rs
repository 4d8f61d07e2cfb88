//! Incremental build driver (`ninja`) discovery and bootstrap.

use std::path::PathBuf;

use anyhow::Result;

use crate::toolchain::error::ToolchainError;
use crate::toolchain::locate::{is_executable, locate};
use crate::util::context::GlobalContext;
use crate::util::process::{EnvOverlay, FailurePolicy, ProcessBuilder};
use crate::util::shell::Status;

/// Script in the vendored checkout that builds the driver.
const CONFIGURE_SCRIPT: &str = "configure.py";

/// Interpreters tried in order to run [`CONFIGURE_SCRIPT`].
const PYTHON_CANDIDATES: &[&str] = &["python3", "python"];

/// Find the build driver: the copy bootstrapped in the vendored checkout,
/// then the search path.
pub fn find_driver(ctx: &GlobalContext) -> Option<PathBuf> {
    let vendored = ctx.workspace().driver_vendored(ctx.host());
    if is_executable(&vendored) {
        return Some(vendored);
    }
    locate(&ctx.workspace().config().driver.name, &EnvOverlay::new())
}

/// Find the build driver, building it from the vendored checkout when it is
/// not available yet.
pub fn ensure_driver(ctx: &GlobalContext) -> Result<PathBuf> {
    if let Some(driver) = find_driver(ctx) {
        tracing::debug!("using build driver {}", driver.display());
        return Ok(driver);
    }
    bootstrap_driver(ctx)
}

/// Build the driver from its vendored checkout.
pub fn bootstrap_driver(ctx: &GlobalContext) -> Result<PathBuf> {
    let name = ctx.workspace().config().driver.name.clone();
    let source_dir = ctx.workspace().driver_source_dir();
    let script = source_dir.join(CONFIGURE_SCRIPT);
    if !script.is_file() {
        return Err(ToolchainError::DependenciesMissing { marker: script }.into());
    }

    let Some(python) = PYTHON_CANDIDATES
        .iter()
        .find_map(|candidate| locate(candidate, &EnvOverlay::new()))
    else {
        tracing::warn!("no python interpreter found to bootstrap {}", name);
        return Err(ToolchainError::DriverMissing { name }.into());
    };

    ctx.shell()
        .status(Status::Bootstrapping, format!("{} from {}", name, source_dir.display()));
    let overlay = ctx.toolchain_overlay()?;
    let status = ctx.runner().run(
        &ProcessBuilder::new(python)
            .arg(CONFIGURE_SCRIPT)
            .arg("--bootstrap")
            .cwd(&source_dir)
            .overlay(&overlay)
            .policy(FailurePolicy::ReturnCode),
    )?;
    if status != 0 {
        tracing::warn!("{} bootstrap exited with status {}", name, status);
    }

    let vendored = ctx.workspace().driver_vendored(ctx.host());
    if is_executable(&vendored) {
        Ok(vendored)
    } else {
        Err(ToolchainError::DriverMissing { name }.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::core::platform::HostPlatform;
    use crate::test_support::{
        test_context, write_executable, write_file, MockProcessOutput, RecordingRunner,
    };

    #[test]
    fn test_vendored_driver_is_preferred() {
        let tmp = TempDir::new().unwrap();
        let host = HostPlatform::current();
        let vendored =
            write_executable(&tmp.path().join("third_party/ninja").join(host.exe_name("ninja")));
        let runner = RecordingRunner::new();
        let ctx = test_context(tmp.path(), runner.clone());

        assert_eq!(ensure_driver(&ctx).unwrap(), vendored);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_bootstrap_without_checkout() {
        let tmp = TempDir::new().unwrap();
        let ctx = test_context(tmp.path(), RecordingRunner::new());

        let err = bootstrap_driver(&ctx).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ToolchainError>(),
            Some(ToolchainError::DependenciesMissing { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_bootstrap_runs_configure_script() {
        if locate("python3", &EnvOverlay::new()).is_none()
            && locate("python", &EnvOverlay::new()).is_none()
        {
            return;
        }
        let tmp = TempDir::new().unwrap();
        let source_dir = tmp.path().join("third_party/ninja");
        write_file(&source_dir.join("configure.py"), "").unwrap();
        let target = source_dir.join("ninja");
        let runner = RecordingRunner::new().respond_with(move |_| {
            write_executable(&target);
            MockProcessOutput::default()
        });
        let ctx = test_context(tmp.path(), runner.clone()).with_host(HostPlatform::Linux);

        let driver = bootstrap_driver(&ctx).unwrap();

        assert_eq!(driver, source_dir.join("ninja"));
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].get_args(), ["configure.py", "--bootstrap"]);
        assert_eq!(calls[0].get_cwd(), Some(source_dir.as_path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_bootstrap_that_builds_nothing() {
        if locate("python3", &EnvOverlay::new()).is_none()
            && locate("python", &EnvOverlay::new()).is_none()
        {
            return;
        }
        let tmp = TempDir::new().unwrap();
        write_file(&tmp.path().join("third_party/ninja/configure.py"), "").unwrap();
        let runner = RecordingRunner::new().respond_with(|_| MockProcessOutput::status(1));
        let ctx = test_context(tmp.path(), runner).with_host(HostPlatform::Linux);

        let err = bootstrap_driver(&ctx).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ToolchainError>(),
            Some(ToolchainError::DriverMissing { .. })
        ));
    }
}
