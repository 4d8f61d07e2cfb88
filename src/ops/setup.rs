//! `xb setup`: prepare a fresh checkout for building.

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use crate::ops::generate::generate_all;
use crate::ops::parse_args;
use crate::toolchain::bootstrap::ensure_generator;
use crate::toolchain::driver::ensure_driver;
use crate::util::context::GlobalContext;
use crate::util::process::ProcessBuilder;
use crate::util::shell::Status;

/// Present at the filesystem root of Cygwin installs.
const CYGWIN_MARKER: &str = "/Cygwin.bat";

#[derive(Parser, Debug)]
#[command(about = "Setup the build environment")]
struct SetupArgs {}

/// Run a git command in the workspace root; failures are fatal.
pub(crate) fn git(ctx: &GlobalContext, args: &[&str]) -> Result<()> {
    ctx.runner().run(
        &ProcessBuilder::new("git")
            .args(args)
            .cwd(ctx.workspace().root()),
    )?;
    Ok(())
}

/// Fetch every submodule recursively.
pub(crate) fn update_submodules(ctx: &GlobalContext) -> Result<()> {
    ctx.shell().status(Status::Fetching, "submodules");
    git(ctx, &["submodule", "update", "--init", "--recursive"])
}

/// Whether file modes should be ignored by git in this checkout.
fn needs_filemode_fix(ctx: &GlobalContext) -> bool {
    ctx.host().is_windows() || Path::new(CYGWIN_MARKER).exists()
}

pub fn setup(ctx: &GlobalContext) -> Result<()> {
    update_submodules(ctx)?;

    if needs_filemode_fix(ctx) {
        ctx.shell()
            .status(Status::Configuring, "git to ignore file mode changes");
        git(ctx, &["config", "core.filemode", "false"])?;
        git(
            ctx,
            &["submodule", "foreach", "--recursive", "git config core.filemode false"],
        )?;
    }

    let driver = ensure_driver(ctx)?;
    tracing::info!("build driver: {}", driver.display());

    let generator = ensure_generator(ctx)?;
    tracing::info!("project generator: {}", generator.display());

    generate_all(ctx)
}

pub fn execute(ctx: &GlobalContext, args: &[String], _cwd: &Path) -> Result<i32> {
    let _args: SetupArgs = match parse_args("setup", args) {
        Ok(args) => args,
        Err(status) => return Ok(status),
    };

    setup(ctx)?;
    ctx.shell().status(Status::Finished, "setup");
    Ok(0)
}
